//! Authorization rule of the access gateway.

use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Account, ConsentLink, Role};
use crate::store::HealthStore;

/// Whether `caller` may read rows owned by `target`.
///
/// Self-access is unconditional. Otherwise the caller must be a doctor and
/// `link` must be the (target, caller) link with both flags set.
pub fn permits(
    caller: Uuid,
    caller_role: Option<Role>,
    target: Uuid,
    link: Option<&ConsentLink>,
) -> bool {
    if caller == target {
        return true;
    }
    caller_role == Some(Role::Doctor)
        && link.is_some_and(|l| l.patient_id == target && l.doctor_id == caller && l.is_mutual())
}

/// Checked before any existence lookup so a missing target and a
/// non-consented one look the same to a cross-account caller.
pub async fn authorize_target(
    store: &dyn HealthStore,
    caller: Uuid,
    caller_account: Option<&Account>,
    target: Uuid,
) -> Result<(), ApiError> {
    if caller == target {
        return Ok(());
    }
    let role = caller_account.map(|a| a.role);
    let link = match role {
        Some(Role::Doctor) => store.consent_link(caller, target, caller).await?,
        _ => None,
    };
    if permits(caller, role, target, link.as_ref()) {
        Ok(())
    } else {
        log::warn!("denied {caller} access to {target}");
        Err(ApiError::Forbidden)
    }
}
