pub mod action_handler;
pub mod daily_handler;
pub mod link_handler;
pub mod profile_handler;

use std::collections::HashMap;
use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::Account;
use crate::store::HealthStore;
use crate::utils::auth::{Identity, JwtVerifier};
use crate::utils::clock::Clock;
use crate::utils::lenient;

pub use action_handler::{dispatch, Action};

/// Shared, request-independent state. Holds no per-user data.
pub struct AppState {
    pub store: Arc<dyn HealthStore>,
    pub verifier: JwtVerifier,
    pub clock: Clock,
}

impl AppState {
    pub fn new(store: Arc<dyn HealthStore>, verifier: JwtVerifier) -> Self {
        Self {
            store,
            verifier,
            clock: Clock::System,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

/// The authenticated caller and their profile, if one has been saved.
pub struct Caller {
    pub identity: Identity,
    pub account: Option<Account>,
}

impl Caller {
    pub fn id(&self) -> Uuid {
        self.identity.account_id
    }

    pub fn require_account(&self) -> Result<&Account, ApiError> {
        self.account
            .as_ref()
            .ok_or_else(|| ApiError::NotFound("profile not found".into()))
    }
}

/// Action inputs: query parameters overlaid by the JSON body fields.
#[derive(Debug, Default)]
pub struct Params(Map<String, Value>);

impl Params {
    pub fn parse(query: HashMap<String, String>, body: &[u8]) -> Result<Self, ApiError> {
        let mut params: Map<String, Value> = query
            .into_iter()
            .filter(|(k, _)| k != "action")
            .map(|(k, v)| (k, Value::String(v)))
            .collect();

        if !body.iter().all(u8::is_ascii_whitespace) {
            match serde_json::from_slice::<Value>(body) {
                Ok(Value::Object(fields)) => params.extend(fields),
                Ok(Value::Null) => {}
                _ => return Err(ApiError::BadRequest("body must be a JSON object".into())),
            }
        }
        Ok(Params(params))
    }

    /// Whether `key` was sent at all, even as `null`.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn text(&self, key: &str) -> Option<String> {
        lenient::text(self.get(key))
    }

    /// Account the action targets: `user_id` when given, the caller otherwise.
    pub fn target(&self, caller: &Caller) -> Result<Uuid, ApiError> {
        match self.text("user_id") {
            None => Ok(caller.id()),
            Some(raw) => Uuid::parse_str(&raw)
                .map_err(|_| ApiError::BadRequest("user_id must be a valid id".into())),
        }
    }
}

async fn healthz() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Mounts the action route and the liveness check.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api").route(web::route().to(dispatch)))
        .route("/healthz", web::get().to(healthz));
}
