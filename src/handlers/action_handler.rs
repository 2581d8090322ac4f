use std::collections::HashMap;

use actix_web::http::Method;
use actix_web::{web, HttpRequest, HttpResponse};

use super::{daily_handler, link_handler, profile_handler, AppState, Caller, Params};
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Me,
    ProfileGet,
    ProfileUpsert,
    HabitsUpsert,
    HabitsFetch,
    VitalsUpsert,
    VitalsFetch,
    DoctorsList,
    LinkSelect,
    LinkList,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::Me,
        Action::ProfileGet,
        Action::ProfileUpsert,
        Action::HabitsUpsert,
        Action::HabitsFetch,
        Action::VitalsUpsert,
        Action::VitalsFetch,
        Action::DoctorsList,
        Action::LinkSelect,
        Action::LinkList,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Action::Me => "me",
            Action::ProfileGet => "profile.get",
            Action::ProfileUpsert => "profile.upsert",
            Action::HabitsUpsert => "habits.upsert",
            Action::HabitsFetch => "habits.fetch",
            Action::VitalsUpsert => "vitals.upsert",
            Action::VitalsFetch => "vitals.fetch",
            Action::DoctorsList => "doctors.list",
            Action::LinkSelect => "link.select",
            Action::LinkList => "link.list",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }

    pub fn method(&self) -> Method {
        match self {
            Action::ProfileUpsert
            | Action::HabitsUpsert
            | Action::VitalsUpsert
            | Action::LinkSelect => Method::POST,
            _ => Method::GET,
        }
    }
}

/// Single entry point: authenticate, resolve the action, load the caller, run it.
pub async fn dispatch(
    req: HttpRequest,
    query: web::Query<HashMap<String, String>>,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let identity = state.verifier.authenticate(&req)?;

    let query = query.into_inner();
    let name = query.get("action").map(String::as_str).unwrap_or_default();
    let action = Action::from_name(name)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown action `{name}`")))?;
    if req.method() != action.method() {
        return Err(ApiError::MethodNotAllowed(req.method().to_string()));
    }

    let params = Params::parse(query, &body)?;
    let account = state
        .store
        .account(identity.account_id, identity.account_id)
        .await?;
    let caller = Caller { identity, account };
    log::debug!("{} by {}", action.name(), caller.id());

    match action {
        Action::Me => Ok(HttpResponse::Ok().json(&caller.account)),
        Action::ProfileGet => profile_handler::get(&state, &caller, &params).await,
        Action::ProfileUpsert => profile_handler::upsert(&state, &caller, &params).await,
        Action::DoctorsList => profile_handler::doctors(&state, &caller).await,
        Action::HabitsUpsert => daily_handler::upsert_habits(&state, &caller, &params).await,
        Action::HabitsFetch => daily_handler::fetch_habits(&state, &caller, &params).await,
        Action::VitalsUpsert => daily_handler::upsert_vitals(&state, &caller, &params).await,
        Action::VitalsFetch => daily_handler::fetch_vitals(&state, &caller, &params).await,
        Action::LinkSelect => link_handler::select(&state, &caller, &params).await,
        Action::LinkList => link_handler::list(&state, &caller).await,
    }
}
