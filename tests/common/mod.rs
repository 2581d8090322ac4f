#![allow(dead_code)]

use std::sync::Arc;

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::{test, web};
use chrono::{Duration, NaiveDate};
use serde_json::Value;
use uuid::Uuid;

use vitalink::store::MemoryStore;
use vitalink::utils::auth::{issue_token, JwtVerifier};
use vitalink::utils::clock::Clock;
use vitalink::AppState;

pub const SECRET: &str = "integration-secret";

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
}

pub fn state(store: Arc<MemoryStore>) -> web::Data<AppState> {
    web::Data::new(
        AppState::new(store, JwtVerifier::new(SECRET, None)).with_clock(Clock::Fixed(today())),
    )
}

/// A signed-in user of the identity provider.
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

impl User {
    pub fn new(email: &str) -> Self {
        let id = Uuid::new_v4();
        let token = issue_token(&id, email, SECRET, Duration::hours(1)).unwrap();
        User {
            id,
            email: email.to_string(),
            token,
        }
    }

    pub fn bearer(&self) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", self.token))
    }
}

pub fn get(user: &User, action: &str, query: &str) -> test::TestRequest {
    test::TestRequest::get()
        .uri(&format!("/api?action={action}{query}"))
        .insert_header(user.bearer())
}

pub fn post(user: &User, action: &str, body: Value) -> test::TestRequest {
    test::TestRequest::post()
        .uri(&format!("/api?action={action}"))
        .insert_header(user.bearer())
        .set_json(body)
}

pub async fn call<S, R, B>(app: &S, req: R) -> (StatusCode, Value)
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let response = test::call_service(app, req).await;
    let status = response.status();
    let body = test::read_body(response).await;
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}
