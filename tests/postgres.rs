//! `PgStore` against a live database, including the row policies and triggers
//! from `migrations/`.
//!
//! Runs only when `VITALINK_TEST_DATABASE_URL` is set. The role it connects as
//! must own (or be able to create) the schema and must not be a superuser or
//! have BYPASSRLS, otherwise the row policies would not apply.

use chrono::{NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use vitalink::models::{
    Account, ConsentState, DoctorDetail, HabitEntry, Party, PatientDetail, Role, RoleDetail,
    VitalEntry,
};
use vitalink::store::{HealthStore, PgStore, StoreError};

const DATABASE_ENV: &str = "VITALINK_TEST_DATABASE_URL";

async fn connect() -> Option<(PgPool, PgStore)> {
    let Ok(url) = std::env::var(DATABASE_ENV) else {
        eprintln!("{DATABASE_ENV} not set, skipping");
        return None;
    };
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .unwrap();
    let bypasses: bool = sqlx::query_scalar(
        "SELECT rolsuper OR rolbypassrls FROM pg_roles WHERE rolname = current_user",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(
        !bypasses,
        "{DATABASE_ENV} must connect as a role without SUPERUSER or BYPASSRLS"
    );
    let store = PgStore::new(pool.clone());
    store.migrate().await.unwrap();
    Some((pool, store))
}

fn jan(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

async fn seeded(store: &PgStore, role: Role) -> Account {
    let id = Uuid::new_v4();
    let account = Account {
        id,
        email: format!("{id}@test.vitalink"),
        name: format!("{role} {id}"),
        role,
        created_at: Utc::now(),
    };
    let detail = match role {
        Role::Patient => RoleDetail::Patient(PatientDetail {
            date_of_birth: Some(jan(1)),
            ..PatientDetail::default()
        }),
        Role::Doctor => RoleDetail::Doctor(DoctorDetail {
            speciality: Some("GP".into()),
            languages: vec!["en".into(), "de".into()],
            ..DoctorDetail::default()
        }),
    };
    store.save_profile(id, &account, &detail).await.unwrap()
}

/// Runs `sql` inside a transaction acting as `actor` and returns the SQLSTATE it failed with.
async fn sqlstate_as(pool: &PgPool, actor: Uuid, sql: &str, binds: &[Uuid]) -> Option<String> {
    let mut tx = pool.begin().await.unwrap();
    sqlx::query("SELECT set_config('app.account_id', $1, true)")
        .bind(actor.to_string())
        .execute(&mut *tx)
        .await
        .unwrap();
    let mut query = sqlx::query(sql);
    for id in binds {
        query = query.bind(*id);
    }
    let result = query.execute(&mut *tx).await;
    tx.rollback().await.ok();
    result
        .err()
        .and_then(|e| e.as_database_error().and_then(|d| d.code()).map(|c| c.into_owned()))
}

#[tokio::test]
async fn consent_scenario_unlocks_doctor_reads() {
    let Some((_, store)) = connect().await else { return };
    let p = seeded(&store, Role::Patient).await;
    let d = seeded(&store, Role::Doctor).await;
    let vitals = VitalEntry {
        date: jan(3),
        glucose: Some(101.5),
        systolic: Some(118),
        diastolic: None,
        heart_rate: None,
        temperature: None,
    };
    store.upsert_vital(p.id, &vitals).await.unwrap();

    assert!(store.vitals_since(d.id, p.id, jan(1)).await.unwrap().is_empty());
    assert!(store.account(d.id, p.id).await.unwrap().is_none());

    let link = store.grant_consent(p.id, p.id, d.id, Party::Patient).await.unwrap();
    assert_eq!(link.state(), ConsentState::OneSidedPatient);

    // the doctor finds an unlinked patient by email
    let found = store
        .patient_id_by_email(d.id, &p.email.to_uppercase())
        .await
        .unwrap();
    assert_eq!(found, Some(p.id));
    assert!(store.vitals_since(d.id, p.id, jan(1)).await.unwrap().is_empty());

    let link = store.grant_consent(d.id, p.id, d.id, Party::Doctor).await.unwrap();
    assert_eq!(link.state(), ConsentState::Mutual);

    assert_eq!(store.vitals_since(d.id, p.id, jan(1)).await.unwrap(), vec![vitals]);
    assert_eq!(store.account(d.id, p.id).await.unwrap().map(|a| a.role), Some(Role::Patient));
    let detail = store.patient_detail(d.id, p.id).await.unwrap().unwrap();
    assert_eq!(detail.date_of_birth, Some(jan(1)));
    let counterparts = store.mutual_counterparts(d.id).await.unwrap();
    assert_eq!(counterparts.iter().map(|c| c.id).collect::<Vec<_>>(), vec![p.id]);

    // repeating either side changes nothing
    let again = store.grant_consent(p.id, p.id, d.id, Party::Patient).await.unwrap();
    assert_eq!(again.state(), ConsentState::Mutual);
}

#[tokio::test]
async fn row_policy_holds_without_the_gateway() {
    let Some((pool, store)) = connect().await else { return };
    let p = seeded(&store, Role::Patient).await;
    let d = seeded(&store, Role::Doctor).await;
    let stranger = seeded(&store, Role::Doctor).await;
    store
        .upsert_habit(p.id, &HabitEntry { date: jan(2), steps: 10, water_cups: 1, sleep_hours: 6.0 })
        .await
        .unwrap();
    store.grant_consent(p.id, p.id, d.id, Party::Patient).await.unwrap();
    store.grant_consent(d.id, p.id, d.id, Party::Doctor).await.unwrap();

    assert_eq!(store.habits_since(d.id, p.id, jan(1)).await.unwrap().len(), 1);
    assert!(store.habits_since(stranger.id, p.id, jan(1)).await.unwrap().is_empty());
    assert!(store.account(stranger.id, p.id).await.unwrap().is_none());
    assert!(store.patient_detail(stranger.id, p.id).await.unwrap().is_none());
    assert!(store.consent_link(stranger.id, p.id, d.id).await.unwrap().is_none());

    // even a linked doctor cannot write the patient's rows
    let code = sqlstate_as(
        &pool,
        d.id,
        "INSERT INTO daily_habits (account_id, entry_date) VALUES ($1, '2024-01-05')",
        &[p.id],
    )
    .await;
    assert_eq!(code.as_deref(), Some("42501"));

    // flags are raised only by their own party and never cleared
    let err = store.grant_consent(p.id, p.id, stranger.id, Party::Doctor).await.unwrap_err();
    assert!(matches!(err, StoreError::Denied));
    let code = sqlstate_as(
        &pool,
        p.id,
        "UPDATE consent_links SET patient_consented = false WHERE patient_id = $1 AND doctor_id = $2",
        &[p.id, d.id],
    )
    .await;
    assert_eq!(code.as_deref(), Some("42501"));
}

#[tokio::test]
async fn repeated_habit_upsert_keeps_one_row() {
    let Some((pool, store)) = connect().await else { return };
    let p = seeded(&store, Role::Patient).await;
    store
        .upsert_habit(p.id, &HabitEntry { date: jan(1), steps: 100, water_cups: 2, sleep_hours: 5.0 })
        .await
        .unwrap();
    let second = HabitEntry { date: jan(1), steps: 5000, water_cups: 6, sleep_hours: 7.5 };
    store.upsert_habit(p.id, &second).await.unwrap();

    assert_eq!(store.habits_since(p.id, p.id, jan(1)).await.unwrap(), vec![second]);
    let rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM daily_habits WHERE account_id = $1 AND entry_date = $2",
    )
    .bind(p.id)
    .bind(jan(1))
    .fetch_one(&pool)
    .await
    .unwrap();
    // outside any actor scope the policy hides every row
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn profiles_decode_and_keep_their_role() {
    let Some((_, store)) = connect().await else { return };
    let d = seeded(&store, Role::Doctor).await;
    let p = seeded(&store, Role::Patient).await;

    let detail = store.doctor_detail(p.id, d.id).await.unwrap().unwrap();
    assert_eq!(detail.languages, vec!["en".to_string(), "de".to_string()]);
    let listing = store
        .doctor_directory(p.id)
        .await
        .unwrap()
        .into_iter()
        .find(|l| l.id == d.id)
        .unwrap();
    assert_eq!(listing.speciality.as_deref(), Some("GP"));
    assert_eq!(listing.languages, detail.languages);

    let as_patient = Account { role: Role::Patient, ..d.clone() };
    let err = store
        .save_profile(d.id, &as_patient, &RoleDetail::Patient(PatientDetail::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Denied));
    assert_eq!(store.account(d.id, d.id).await.unwrap().map(|a| a.role), Some(Role::Doctor));

    let clash = Account { id: Uuid::new_v4(), ..p.clone() };
    let err = store
        .save_profile(clash.id, &clash, &RoleDetail::Patient(PatientDetail::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn writes_need_existing_accounts() {
    let Some((_, store)) = connect().await else { return };
    let ghost = Uuid::new_v4();
    let err = store
        .upsert_habit(ghost, &HabitEntry { date: jan(1), steps: 0, water_cups: 0, sleep_hours: 0.0 })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::MissingAccount));

    let p = seeded(&store, Role::Patient).await;
    let other = seeded(&store, Role::Patient).await;
    let err = store.grant_consent(p.id, p.id, other.id, Party::Patient).await.unwrap_err();
    assert!(matches!(err, StoreError::MissingAccount));
}
