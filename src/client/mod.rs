//! Typed HTTP client for the action endpoint, with a per-session read cache.

pub mod cache;

use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{Account, Counterpart, DoctorListing, HabitEntry, VitalEntry};
use cache::{DataKind, ReadCache};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{status}: {message}")]
    Api {
        status: StatusCode,
        code: String,
        message: String,
    },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct ErrorReply {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

/// One signed-in session against the service.
pub struct HealthClient {
    http: Client,
    endpoint: String,
    token: String,
    cache: ReadCache,
}

impl HealthClient {
    pub fn new(base_url: &str, token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: format!("{}/api", base_url.trim_end_matches('/')),
            token: token.into(),
            cache: ReadCache::new(),
        }
    }

    pub fn cache(&self) -> &ReadCache {
        &self.cache
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, ClientError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            let reply: ErrorReply = serde_json::from_slice(&bytes).unwrap_or(ErrorReply {
                error: String::new(),
                message: String::from_utf8_lossy(&bytes).into_owned(),
            });
            return Err(ClientError::Api {
                status,
                code: reply.error,
                message: reply.message,
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn read<T: DeserializeOwned>(
        &self,
        kind: DataKind,
        key: String,
        action: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        if let Some(hit) = self.cache.get(kind, &key) {
            return Ok(serde_json::from_value(hit)?);
        }
        let request = self
            .http
            .get(&self.endpoint)
            .query(&[("action", action)])
            .query(query);
        let value = self.send(request).await?;
        let decoded = serde_json::from_value(value.clone())?;
        self.cache.set(kind, key, value);
        Ok(decoded)
    }

    async fn write(
        &self,
        action: &str,
        body: Value,
        invalidates: &[DataKind],
    ) -> Result<Value, ClientError> {
        let request = self
            .http
            .post(&self.endpoint)
            .query(&[("action", action)])
            .json(&body);
        let value = self.send(request).await;
        // the write may have landed even when the reply failed
        for kind in invalidates {
            self.cache.invalidate(*kind);
        }
        value
    }

    fn target_query(user_id: Option<Uuid>) -> Vec<(&'static str, String)> {
        user_id
            .map(|id| vec![("user_id", id.to_string())])
            .unwrap_or_default()
    }

    fn target_key(user_id: Option<Uuid>) -> String {
        user_id.map(|id| id.to_string()).unwrap_or_else(|| "self".into())
    }

    pub async fn me(&self) -> Result<Option<Account>, ClientError> {
        self.read(DataKind::Me, String::new(), "me", &[]).await
    }

    /// `profile.get`. Returns the raw view (`account` plus role detail).
    pub async fn profile(&self, user_id: Option<Uuid>) -> Result<Value, ClientError> {
        self.read(
            DataKind::Profile,
            Self::target_key(user_id),
            "profile.get",
            &Self::target_query(user_id),
        )
        .await
    }

    /// `profile.upsert`. `fields` holds `role`, `name` and the role detail fields.
    pub async fn save_profile(&self, fields: Value) -> Result<Account, ClientError> {
        let value = self
            .write(
                "profile.upsert",
                fields,
                &[DataKind::Me, DataKind::Profile, DataKind::Doctors, DataKind::Links],
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn log_habits(
        &self,
        date: Option<NaiveDate>,
        steps: i32,
        water_cups: i32,
        sleep_hours: f64,
    ) -> Result<(), ClientError> {
        let body = json!({
            "date": date,
            "steps": steps,
            "water_cups": water_cups,
            "sleep_hours": sleep_hours,
        });
        self.write("habits.upsert", body, &[DataKind::Habits]).await?;
        Ok(())
    }

    pub async fn habits(
        &self,
        user_id: Option<Uuid>,
        range_days: u32,
    ) -> Result<Vec<HabitEntry>, ClientError> {
        let mut query = Self::target_query(user_id);
        query.push(("rangeDays", range_days.to_string()));
        let key = format!("{}:{range_days}", Self::target_key(user_id));
        self.read(DataKind::Habits, key, "habits.fetch", &query).await
    }

    /// `vitals.upsert`. `entry.date` is always sent; `None` fields are stored as not recorded.
    pub async fn log_vitals(&self, entry: &VitalEntry) -> Result<(), ClientError> {
        let body = serde_json::to_value(entry)?;
        self.write("vitals.upsert", body, &[DataKind::Vitals]).await?;
        Ok(())
    }

    pub async fn vitals(
        &self,
        user_id: Option<Uuid>,
        range_days: u32,
    ) -> Result<Vec<VitalEntry>, ClientError> {
        let mut query = Self::target_query(user_id);
        query.push(("rangeDays", range_days.to_string()));
        let key = format!("{}:{range_days}", Self::target_key(user_id));
        self.read(DataKind::Vitals, key, "vitals.fetch", &query).await
    }

    pub async fn doctors(&self) -> Result<Vec<DoctorListing>, ClientError> {
        self.read(DataKind::Doctors, String::new(), "doctors.list", &[])
            .await
    }

    /// Patient side of `link.select`.
    pub async fn select_doctor(&self, doctor_id: Uuid) -> Result<(), ClientError> {
        let body = json!({ "doctor_id": doctor_id });
        self.write("link.select", body, &[DataKind::Links]).await?;
        Ok(())
    }

    /// Doctor side of `link.select`.
    pub async fn select_patient(&self, patient_email: &str) -> Result<(), ClientError> {
        let body = json!({ "patient_email": patient_email });
        self.write("link.select", body, &[DataKind::Links]).await?;
        Ok(())
    }

    pub async fn links(&self) -> Result<Vec<Counterpart>, ClientError> {
        self.read(DataKind::Links, String::new(), "link.list", &[])
            .await
    }
}
