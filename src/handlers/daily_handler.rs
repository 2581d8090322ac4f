use actix_web::HttpResponse;
use chrono::{Days, NaiveDate};
use serde_json::json;

use super::{AppState, Caller, Params};
use crate::access::authorize_target;
use crate::error::ApiError;
use crate::models::{HabitEntry, VitalEntry};
use crate::utils::lenient;

const DEFAULT_RANGE_DAYS: i32 = 7;
const MAX_RANGE_DAYS: i32 = 365;

fn entry_date(state: &AppState, params: &Params) -> Result<NaiveDate, ApiError> {
    lenient::date(params.get("date"))
        .map_err(|_| ApiError::BadRequest("date must be formatted YYYY-MM-DD".into()))
        .map(|d| d.unwrap_or_else(|| state.clock.today()))
}

/// First date inside the `rangeDays` window ending today.
fn window_start(state: &AppState, params: &Params) -> NaiveDate {
    let days = lenient::integer(params.get("rangeDays").or_else(|| params.get("range_days")))
        .unwrap_or(DEFAULT_RANGE_DAYS)
        .clamp(1, MAX_RANGE_DAYS);
    let today = state.clock.today();
    today
        .checked_sub_days(Days::new((days - 1) as u64))
        .unwrap_or(NaiveDate::MIN)
}

fn ok() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "ok": true }))
}

pub async fn upsert_habits(
    state: &AppState,
    caller: &Caller,
    params: &Params,
) -> Result<HttpResponse, ApiError> {
    caller.require_account()?;
    let entry = HabitEntry {
        date: entry_date(state, params)?,
        steps: lenient::count_or_zero(params.get("steps")),
        water_cups: lenient::count_or_zero(params.get("water_cups")),
        sleep_hours: lenient::amount_or_zero(params.get("sleep_hours")),
    };
    state.store.upsert_habit(caller.id(), &entry).await?;
    Ok(ok())
}

pub async fn fetch_habits(
    state: &AppState,
    caller: &Caller,
    params: &Params,
) -> Result<HttpResponse, ApiError> {
    let target = params.target(caller)?;
    authorize_target(state.store.as_ref(), caller.id(), caller.account.as_ref(), target).await?;
    let entries = state
        .store
        .habits_since(caller.id(), target, window_start(state, params))
        .await?;
    Ok(HttpResponse::Ok().json(entries))
}

pub async fn upsert_vitals(
    state: &AppState,
    caller: &Caller,
    params: &Params,
) -> Result<HttpResponse, ApiError> {
    caller.require_account()?;
    let entry = VitalEntry {
        date: entry_date(state, params)?,
        glucose: lenient::number(params.get("glucose")),
        systolic: lenient::integer(params.get("systolic")),
        diastolic: lenient::integer(params.get("diastolic")),
        heart_rate: lenient::integer(params.get("heart_rate")),
        temperature: lenient::number(params.get("temperature")),
    };
    state.store.upsert_vital(caller.id(), &entry).await?;
    Ok(ok())
}

pub async fn fetch_vitals(
    state: &AppState,
    caller: &Caller,
    params: &Params,
) -> Result<HttpResponse, ApiError> {
    let target = params.target(caller)?;
    authorize_target(state.store.as_ref(), caller.id(), caller.account.as_ref(), target).await?;
    let entries = state
        .store
        .vitals_since(caller.id(), target, window_start(state, params))
        .await?;
    Ok(HttpResponse::Ok().json(entries))
}
