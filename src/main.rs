use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;

use vitalink::config::Config;
use vitalink::store::PgStore;
use vitalink::utils::auth::JwtVerifier;
use vitalink::{configure, AppState};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    log::info!("connected to PostgreSQL");

    let store = PgStore::new(pool);
    store.migrate().await?;
    log::info!("migrations applied");

    let state = web::Data::new(AppState::new(
        Arc::new(store),
        JwtVerifier::new(&config.jwt_secret, config.jwt_audience.as_deref()),
    ));
    let cors_origin = config.cors_allowed_origin.clone();

    log::info!("listening on http://{}", config.bind_addr);
    HttpServer::new(move || {
        let cors = match &cors_origin {
            Some(origin) => Cors::default().allowed_origin(origin),
            None => Cors::default().allow_any_origin(),
        }
        .allowed_methods(vec!["GET", "POST"])
        .allow_any_header()
        .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind(config.bind_addr)?
    .run()
    .await?;

    Ok(())
}
