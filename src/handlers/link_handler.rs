use actix_web::HttpResponse;
use serde_json::json;
use uuid::Uuid;

use super::{AppState, Caller, Params};
use crate::error::ApiError;
use crate::models::{Party, Role};

/// `link.select`: the caller raises their own consent flag.
///
/// Patients name a doctor by `doctor_id`; doctors name a patient by `patient_email`.
pub async fn select(
    state: &AppState,
    caller: &Caller,
    params: &Params,
) -> Result<HttpResponse, ApiError> {
    let me = caller.require_account()?;

    let link = match me.role {
        Role::Patient => {
            let raw = params
                .text("doctor_id")
                .ok_or_else(|| ApiError::BadRequest("doctor_id is required".into()))?;
            let doctor_id = Uuid::parse_str(&raw)
                .map_err(|_| ApiError::BadRequest("doctor_id must be a valid id".into()))?;
            let doctor = state
                .store
                .account(me.id, doctor_id)
                .await?
                .filter(|a| a.role == Role::Doctor)
                .ok_or_else(|| ApiError::NotFound("doctor not found".into()))?;
            state
                .store
                .grant_consent(me.id, me.id, doctor.id, Party::Patient)
                .await?
        }
        Role::Doctor => {
            let email = params
                .text("patient_email")
                .ok_or_else(|| ApiError::BadRequest("patient_email is required".into()))?;
            let patient_id = state
                .store
                .patient_id_by_email(me.id, &email)
                .await?
                .ok_or_else(|| ApiError::NotFound("patient not found".into()))?;
            state
                .store
                .grant_consent(me.id, patient_id, me.id, Party::Doctor)
                .await?
        }
    };

    log::info!(
        "consent link {} -> {} now {:?}",
        link.patient_id,
        link.doctor_id,
        link.state()
    );
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "state": link.state() })))
}

/// `link.list`: counterparts with mutual consent.
pub async fn list(state: &AppState, caller: &Caller) -> Result<HttpResponse, ApiError> {
    let me = caller.require_account()?;
    let counterparts = state.store.mutual_counterparts(me.id).await?;
    Ok(HttpResponse::Ok().json(counterparts))
}
