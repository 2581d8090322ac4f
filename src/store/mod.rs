//! Persistence seam between the access gateway and the database.
//!
//! Every operation names the acting account. Implementations enforce row
//! ownership on their own, with the same rule the gateway applies, so a
//! gateway bug cannot leak another account's rows.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{
    Account, ConsentLink, Counterpart, DoctorDetail, DoctorListing, HabitEntry, Party,
    PatientDetail, RoleDetail, VitalEntry,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("row policy denied the operation")]
    Denied,
    #[error("referenced account does not exist or has the wrong role")]
    MissingAccount,
    #[error("{0}")]
    Conflict(String),
    #[error("store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait HealthStore: Send + Sync {
    /// `None` when the account does not exist or is not visible to `actor`.
    async fn account(&self, actor: Uuid, id: Uuid) -> StoreResult<Option<Account>>;

    /// Resolves a patient (never a doctor) by email.
    async fn patient_id_by_email(&self, actor: Uuid, email: &str) -> StoreResult<Option<Uuid>>;

    /// Creates or updates `actor`'s account and detail record. The stored role is never changed.
    async fn save_profile(
        &self,
        actor: Uuid,
        account: &Account,
        detail: &RoleDetail,
    ) -> StoreResult<Account>;

    async fn patient_detail(&self, actor: Uuid, id: Uuid) -> StoreResult<Option<PatientDetail>>;

    async fn doctor_detail(&self, actor: Uuid, id: Uuid) -> StoreResult<Option<DoctorDetail>>;

    /// Writes `actor`'s entry for `entry.date`, replacing any existing one.
    async fn upsert_habit(&self, actor: Uuid, entry: &HabitEntry) -> StoreResult<()>;

    /// `owner`'s entries dated on or after `from`, newest first.
    async fn habits_since(
        &self,
        actor: Uuid,
        owner: Uuid,
        from: NaiveDate,
    ) -> StoreResult<Vec<HabitEntry>>;

    async fn upsert_vital(&self, actor: Uuid, entry: &VitalEntry) -> StoreResult<()>;

    async fn vitals_since(
        &self,
        actor: Uuid,
        owner: Uuid,
        from: NaiveDate,
    ) -> StoreResult<Vec<VitalEntry>>;

    async fn doctor_directory(&self, actor: Uuid) -> StoreResult<Vec<DoctorListing>>;

    async fn consent_link(
        &self,
        actor: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
    ) -> StoreResult<Option<ConsentLink>>;

    /// Atomic insert-if-absent-else-set of `party`'s flag on the (patient, doctor) link.
    async fn grant_consent(
        &self,
        actor: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        party: Party,
    ) -> StoreResult<ConsentLink>;

    /// Counterparts of `actor` whose link has both flags set.
    async fn mutual_counterparts(&self, actor: Uuid) -> StoreResult<Vec<Counterpart>>;
}
