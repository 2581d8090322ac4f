use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::error::ErrorKind;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{HealthStore, StoreError, StoreResult};
use crate::models::{
    Account, ConsentLink, Counterpart, DoctorDetail, DoctorListing, HabitEntry, Party,
    PatientDetail, RoleDetail, VitalEntry,
};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const ACCOUNT_COLUMNS: &str = "id, email, name, role, created_at";
const LINK_COLUMNS: &str =
    "patient_id, doctor_id, patient_consented, doctor_consented, created_at";

/// Postgres-backed store. Row-level security policies from the migrations
/// see the acting account through the `app.account_id` setting.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        MIGRATOR.run(&self.db).await
    }

    /// Opens a transaction scoped to `actor` for the row policies.
    async fn begin_as(&self, actor: Uuid) -> StoreResult<Transaction<'static, Postgres>> {
        let mut tx = self.db.begin().await?;
        sqlx::query("SELECT set_config('app.account_id', $1, true)")
            .bind(actor.to_string())
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

fn map_write_error(err: sqlx::Error) -> StoreError {
    if let Some(db_err) = err.as_database_error() {
        if matches!(db_err.kind(), ErrorKind::UniqueViolation) {
            return StoreError::Conflict("email already registered".into());
        }
        if matches!(db_err.kind(), ErrorKind::ForeignKeyViolation) {
            return StoreError::MissingAccount;
        }
        // insufficient_privilege: a row policy rejected the write
        if db_err.code().as_deref() == Some("42501") {
            return StoreError::Denied;
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl HealthStore for PgStore {
    async fn account(&self, actor: Uuid, id: Uuid) -> StoreResult<Option<Account>> {
        let mut tx = self.begin_as(actor).await?;
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(account)
    }

    async fn patient_id_by_email(&self, actor: Uuid, email: &str) -> StoreResult<Option<Uuid>> {
        let mut tx = self.begin_as(actor).await?;
        let id = sqlx::query_scalar::<_, Option<Uuid>>("SELECT patient_id_by_email($1)")
            .bind(email)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn save_profile(
        &self,
        actor: Uuid,
        account: &Account,
        detail: &RoleDetail,
    ) -> StoreResult<Account> {
        let mut tx = self.begin_as(actor).await?;

        // role is never updated
        let saved = sqlx::query_as::<_, Account>(&format!(
            "INSERT INTO accounts (id, email, name, role) VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email, name = EXCLUDED.name
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.name)
        .bind(account.role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        if saved.role != detail.role() {
            return Err(StoreError::Denied);
        }

        match detail {
            RoleDetail::Patient(d) => {
                sqlx::query(
                    "INSERT INTO patient_details (account_id, date_of_birth, sex, height_cm, weight_kg, phone)
                     VALUES ($1, $2, $3, $4, $5, $6)
                     ON CONFLICT (account_id) DO UPDATE SET
                        date_of_birth = EXCLUDED.date_of_birth,
                        sex = EXCLUDED.sex,
                        height_cm = EXCLUDED.height_cm,
                        weight_kg = EXCLUDED.weight_kg,
                        phone = EXCLUDED.phone",
                )
                .bind(saved.id)
                .bind(d.date_of_birth)
                .bind(&d.sex)
                .bind(d.height_cm)
                .bind(d.weight_kg)
                .bind(&d.phone)
                .execute(&mut *tx)
                .await
                .map_err(map_write_error)?;
            }
            RoleDetail::Doctor(d) => {
                sqlx::query(
                    "INSERT INTO doctor_details (account_id, speciality, languages, license_number, clinic, bio)
                     VALUES ($1, $2, $3, $4, $5, $6)
                     ON CONFLICT (account_id) DO UPDATE SET
                        speciality = EXCLUDED.speciality,
                        languages = EXCLUDED.languages,
                        license_number = EXCLUDED.license_number,
                        clinic = EXCLUDED.clinic,
                        bio = EXCLUDED.bio",
                )
                .bind(saved.id)
                .bind(&d.speciality)
                .bind(&d.languages)
                .bind(&d.license_number)
                .bind(&d.clinic)
                .bind(&d.bio)
                .execute(&mut *tx)
                .await
                .map_err(map_write_error)?;
            }
        }

        tx.commit().await?;
        Ok(saved)
    }

    async fn patient_detail(&self, actor: Uuid, id: Uuid) -> StoreResult<Option<PatientDetail>> {
        let mut tx = self.begin_as(actor).await?;
        let detail = sqlx::query_as::<_, PatientDetail>(
            "SELECT account_id, date_of_birth, sex, height_cm, weight_kg, phone
             FROM patient_details WHERE account_id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(detail)
    }

    async fn doctor_detail(&self, actor: Uuid, id: Uuid) -> StoreResult<Option<DoctorDetail>> {
        let mut tx = self.begin_as(actor).await?;
        let detail = sqlx::query_as::<_, DoctorDetail>(
            "SELECT account_id, speciality, languages, license_number, clinic, bio
             FROM doctor_details WHERE account_id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(detail)
    }

    async fn upsert_habit(&self, actor: Uuid, entry: &HabitEntry) -> StoreResult<()> {
        let mut tx = self.begin_as(actor).await?;
        sqlx::query(
            "INSERT INTO daily_habits (account_id, entry_date, steps, water_cups, sleep_hours)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (account_id, entry_date) DO UPDATE SET
                steps = EXCLUDED.steps,
                water_cups = EXCLUDED.water_cups,
                sleep_hours = EXCLUDED.sleep_hours,
                updated_at = NOW()",
        )
        .bind(actor)
        .bind(entry.date)
        .bind(entry.steps)
        .bind(entry.water_cups)
        .bind(entry.sleep_hours)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;
        tx.commit().await?;
        Ok(())
    }

    async fn habits_since(
        &self,
        actor: Uuid,
        owner: Uuid,
        from: NaiveDate,
    ) -> StoreResult<Vec<HabitEntry>> {
        let mut tx = self.begin_as(actor).await?;
        let rows = sqlx::query_as::<_, HabitEntry>(
            "SELECT entry_date AS date, steps, water_cups, sleep_hours
             FROM daily_habits
             WHERE account_id = $1 AND entry_date >= $2
             ORDER BY entry_date DESC",
        )
        .bind(owner)
        .bind(from)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(rows)
    }

    async fn upsert_vital(&self, actor: Uuid, entry: &VitalEntry) -> StoreResult<()> {
        let mut tx = self.begin_as(actor).await?;
        sqlx::query(
            "INSERT INTO daily_vitals (account_id, entry_date, glucose, systolic, diastolic, heart_rate, temperature)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (account_id, entry_date) DO UPDATE SET
                glucose = EXCLUDED.glucose,
                systolic = EXCLUDED.systolic,
                diastolic = EXCLUDED.diastolic,
                heart_rate = EXCLUDED.heart_rate,
                temperature = EXCLUDED.temperature,
                updated_at = NOW()",
        )
        .bind(actor)
        .bind(entry.date)
        .bind(entry.glucose)
        .bind(entry.systolic)
        .bind(entry.diastolic)
        .bind(entry.heart_rate)
        .bind(entry.temperature)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;
        tx.commit().await?;
        Ok(())
    }

    async fn vitals_since(
        &self,
        actor: Uuid,
        owner: Uuid,
        from: NaiveDate,
    ) -> StoreResult<Vec<VitalEntry>> {
        let mut tx = self.begin_as(actor).await?;
        let rows = sqlx::query_as::<_, VitalEntry>(
            "SELECT entry_date AS date, glucose, systolic, diastolic, heart_rate, temperature
             FROM daily_vitals
             WHERE account_id = $1 AND entry_date >= $2
             ORDER BY entry_date DESC",
        )
        .bind(owner)
        .bind(from)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(rows)
    }

    async fn doctor_directory(&self, actor: Uuid) -> StoreResult<Vec<DoctorListing>> {
        let mut tx = self.begin_as(actor).await?;
        let rows = sqlx::query_as::<_, DoctorListing>(
            "SELECT a.id, a.name, a.email, d.speciality,
                    COALESCE(d.languages, '{}'::text[]) AS languages
             FROM accounts a
             LEFT JOIN doctor_details d ON d.account_id = a.id
             WHERE a.role = 'doctor'
             ORDER BY a.name",
        )
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(rows)
    }

    async fn consent_link(
        &self,
        actor: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
    ) -> StoreResult<Option<ConsentLink>> {
        let mut tx = self.begin_as(actor).await?;
        let link = sqlx::query_as::<_, ConsentLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM consent_links WHERE patient_id = $1 AND doctor_id = $2"
        ))
        .bind(patient_id)
        .bind(doctor_id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(link)
    }

    async fn grant_consent(
        &self,
        actor: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        party: Party,
    ) -> StoreResult<ConsentLink> {
        let (patient_flag, doctor_flag) = match party {
            Party::Patient => (true, false),
            Party::Doctor => (false, true),
        };
        let mut tx = self.begin_as(actor).await?;
        let link = sqlx::query_as::<_, ConsentLink>(&format!(
            "INSERT INTO consent_links (patient_id, doctor_id, patient_consented, doctor_consented)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (patient_id, doctor_id) DO UPDATE SET
                patient_consented = consent_links.patient_consented OR EXCLUDED.patient_consented,
                doctor_consented = consent_links.doctor_consented OR EXCLUDED.doctor_consented
             RETURNING {LINK_COLUMNS}"
        ))
        .bind(patient_id)
        .bind(doctor_id)
        .bind(patient_flag)
        .bind(doctor_flag)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;
        tx.commit().await?;
        Ok(link)
    }

    async fn mutual_counterparts(&self, actor: Uuid) -> StoreResult<Vec<Counterpart>> {
        let mut tx = self.begin_as(actor).await?;
        let rows = sqlx::query_as::<_, Counterpart>(
            "SELECT a.id, a.name, a.email, a.role
             FROM consent_links l
             JOIN accounts a
               ON a.id = CASE WHEN l.patient_id = $1 THEN l.doctor_id ELSE l.patient_id END
             WHERE (l.patient_id = $1 OR l.doctor_id = $1)
               AND l.patient_consented AND l.doctor_consented
             ORDER BY a.name",
        )
        .bind(actor)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(rows)
    }
}
