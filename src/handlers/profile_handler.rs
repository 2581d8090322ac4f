use actix_web::HttpResponse;
use chrono::Utc;
use uuid::Uuid;

use super::{AppState, Caller, Params};
use crate::access::authorize_target;
use crate::error::ApiError;
use crate::models::{Account, DoctorDetail, PatientDetail, ProfileView, Role, RoleDetail};
use crate::utils::lenient;

/// `profile.get`: account plus role detail, for self or a consented doctor.
pub async fn get(state: &AppState, caller: &Caller, params: &Params) -> Result<HttpResponse, ApiError> {
    let target = params.target(caller)?;
    authorize_target(state.store.as_ref(), caller.id(), caller.account.as_ref(), target).await?;

    let account = state
        .store
        .account(caller.id(), target)
        .await?
        .ok_or_else(|| ApiError::NotFound("profile not found".into()))?;

    let (patient_detail, doctor_detail) = match account.role {
        Role::Patient => (state.store.patient_detail(caller.id(), target).await?, None),
        Role::Doctor => (None, state.store.doctor_detail(caller.id(), target).await?),
    };

    Ok(HttpResponse::Ok().json(ProfileView {
        account,
        patient_detail,
        doctor_detail,
    }))
}

/// `profile.upsert`: creates the caller's account on first submission, updates it afterwards.
pub async fn upsert(
    state: &AppState,
    caller: &Caller,
    params: &Params,
) -> Result<HttpResponse, ApiError> {
    let requested = params
        .text("role")
        .map(|r| {
            r.parse::<Role>()
                .map_err(|_| ApiError::BadRequest("role must be `patient` or `doctor`".into()))
        })
        .transpose()?;

    let existing = caller.account.as_ref();
    let role = match (existing, requested) {
        (Some(e), Some(r)) if e.role != r => {
            return Err(ApiError::BadRequest("role cannot be changed".into()))
        }
        (Some(e), _) => e.role,
        (None, Some(r)) => r,
        (None, None) => return Err(ApiError::BadRequest("role is required".into())),
    };

    let name = params
        .text("name")
        .or_else(|| existing.map(|e| e.name.clone()))
        .ok_or_else(|| ApiError::BadRequest("name is required".into()))?;

    let account = Account {
        id: caller.id(),
        email: caller.identity.email.clone(),
        name,
        role,
        created_at: existing.map(|e| e.created_at).unwrap_or_else(Utc::now),
    };
    let current = match existing {
        Some(_) => current_detail(state, caller.id(), role).await?,
        None => None,
    };
    let detail = role_detail(role, params, current)?;

    let saved = state.store.save_profile(caller.id(), &account, &detail).await?;
    log::info!("saved {} profile {}", saved.role, saved.id);
    Ok(HttpResponse::Ok().json(saved))
}

async fn current_detail(
    state: &AppState,
    id: Uuid,
    role: Role,
) -> Result<Option<RoleDetail>, ApiError> {
    Ok(match role {
        Role::Patient => state.store.patient_detail(id, id).await?.map(RoleDetail::Patient),
        Role::Doctor => state.store.doctor_detail(id, id).await?.map(RoleDetail::Doctor),
    })
}

/// Builds the detail record to store. Fields missing from the body keep their
/// `current` value; fields sent as `null` or blank are cleared.
fn role_detail(
    role: Role,
    params: &Params,
    current: Option<RoleDetail>,
) -> Result<RoleDetail, ApiError> {
    fn merge<T>(params: &Params, key: &str, kept: Option<T>, sent: impl FnOnce() -> Option<T>) -> Option<T> {
        if params.contains(key) {
            sent()
        } else {
            kept
        }
    }

    Ok(match role {
        Role::Patient => {
            let d = match current {
                Some(RoleDetail::Patient(d)) => d,
                _ => PatientDetail::default(),
            };
            let date_of_birth = if params.contains("date_of_birth") {
                lenient::date(params.get("date_of_birth")).map_err(|_| {
                    ApiError::BadRequest("date_of_birth must be formatted YYYY-MM-DD".into())
                })?
            } else {
                d.date_of_birth
            };
            RoleDetail::Patient(PatientDetail {
                account_id: d.account_id,
                date_of_birth,
                sex: merge(params, "sex", d.sex, || params.text("sex")),
                height_cm: merge(params, "height_cm", d.height_cm, || {
                    lenient::number(params.get("height_cm"))
                }),
                weight_kg: merge(params, "weight_kg", d.weight_kg, || {
                    lenient::number(params.get("weight_kg"))
                }),
                phone: merge(params, "phone", d.phone, || params.text("phone")),
            })
        }
        Role::Doctor => {
            let d = match current {
                Some(RoleDetail::Doctor(d)) => d,
                _ => DoctorDetail::default(),
            };
            let languages = if params.contains("languages") {
                lenient::string_list(params.get("languages"))
            } else {
                d.languages
            };
            RoleDetail::Doctor(DoctorDetail {
                account_id: d.account_id,
                speciality: merge(params, "speciality", d.speciality, || params.text("speciality")),
                languages,
                license_number: merge(params, "license_number", d.license_number, || {
                    params.text("license_number")
                }),
                clinic: merge(params, "clinic", d.clinic, || params.text("clinic")),
                bio: merge(params, "bio", d.bio, || params.text("bio")),
            })
        }
    })
}

/// `doctors.list`: public directory, open to any authenticated caller.
pub async fn doctors(state: &AppState, caller: &Caller) -> Result<HttpResponse, ApiError> {
    let listings = state.store.doctor_directory(caller.id()).await?;
    Ok(HttpResponse::Ok().json(listings))
}
