use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use super::{HealthStore, StoreError, StoreResult};
use crate::access;
use crate::models::{
    Account, ConsentLink, Counterpart, DoctorDetail, DoctorListing, HabitEntry, Party,
    PatientDetail, Role, RoleDetail, VitalEntry,
};

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    patient_details: HashMap<Uuid, PatientDetail>,
    doctor_details: HashMap<Uuid, DoctorDetail>,
    habits: BTreeMap<(Uuid, NaiveDate), HabitEntry>,
    vitals: BTreeMap<(Uuid, NaiveDate), VitalEntry>,
    links: HashMap<(Uuid, Uuid), ConsentLink>,
    patient_directory: HashMap<String, Uuid>,
}

impl Tables {
    fn role_of(&self, id: Uuid) -> Option<Role> {
        self.accounts.get(&id).map(|a| a.role)
    }

    fn can_read(&self, actor: Uuid, owner: Uuid) -> bool {
        access::permits(
            actor,
            self.role_of(actor),
            owner,
            self.links.get(&(owner, actor)),
        )
    }

    fn can_read_account(&self, actor: Uuid, id: Uuid) -> bool {
        self.role_of(id) == Some(Role::Doctor) || self.can_read(actor, id)
    }

    fn require_account(&self, id: Uuid, role: Option<Role>) -> StoreResult<()> {
        match self.role_of(id) {
            Some(found) if role.map_or(true, |r| r == found) => Ok(()),
            _ => Err(StoreError::MissingAccount),
        }
    }
}

/// In-process store applying the same row policy as the Postgres schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Number of consent rows for the pair, visible or not.
    pub fn link_rows(&self, patient_id: Uuid, doctor_id: Uuid) -> StoreResult<usize> {
        Ok(self
            .tables()?
            .links
            .keys()
            .filter(|(p, d)| *p == patient_id && *d == doctor_id)
            .count())
    }

    /// Number of habit rows stored for `owner`, across all dates.
    pub fn habit_rows(&self, owner: Uuid) -> StoreResult<usize> {
        Ok(self
            .tables()?
            .habits
            .keys()
            .filter(|(id, _)| *id == owner)
            .count())
    }
}

fn since<T: Clone>(
    rows: &BTreeMap<(Uuid, NaiveDate), T>,
    owner: Uuid,
    from: NaiveDate,
) -> Vec<T> {
    rows.range((owner, from)..=(owner, NaiveDate::MAX))
        .rev()
        .map(|(_, row)| row.clone())
        .collect()
}

#[async_trait]
impl HealthStore for MemoryStore {
    async fn account(&self, actor: Uuid, id: Uuid) -> StoreResult<Option<Account>> {
        let tables = self.tables()?;
        if !tables.can_read_account(actor, id) {
            return Ok(None);
        }
        Ok(tables.accounts.get(&id).cloned())
    }

    async fn patient_id_by_email(&self, _actor: Uuid, email: &str) -> StoreResult<Option<Uuid>> {
        let email = email.trim().to_lowercase();
        Ok(self.tables()?.patient_directory.get(&email).copied())
    }

    async fn save_profile(
        &self,
        actor: Uuid,
        account: &Account,
        detail: &RoleDetail,
    ) -> StoreResult<Account> {
        if account.id != actor {
            return Err(StoreError::Denied);
        }
        let mut tables = self.tables()?;
        if tables
            .accounts
            .values()
            .any(|a| a.id != actor && a.email == account.email)
        {
            return Err(StoreError::Conflict("email already registered".into()));
        }

        let saved = match tables.accounts.get(&actor) {
            Some(existing) => Account {
                email: account.email.clone(),
                name: account.name.clone(),
                ..existing.clone()
            },
            None => account.clone(),
        };
        if saved.role != detail.role() {
            return Err(StoreError::Denied);
        }
        if saved.role == Role::Patient {
            if let Some(previous) = tables.accounts.get(&actor) {
                let previous = previous.email.clone();
                tables.patient_directory.remove(&previous);
            }
            tables.patient_directory.insert(saved.email.clone(), actor);
        }
        tables.accounts.insert(actor, saved.clone());

        match detail {
            RoleDetail::Patient(d) => {
                tables
                    .patient_details
                    .insert(actor, PatientDetail { account_id: actor, ..d.clone() });
            }
            RoleDetail::Doctor(d) => {
                tables
                    .doctor_details
                    .insert(actor, DoctorDetail { account_id: actor, ..d.clone() });
            }
        }
        Ok(saved)
    }

    async fn patient_detail(&self, actor: Uuid, id: Uuid) -> StoreResult<Option<PatientDetail>> {
        let tables = self.tables()?;
        if !tables.can_read(actor, id) {
            return Ok(None);
        }
        Ok(tables.patient_details.get(&id).cloned())
    }

    async fn doctor_detail(&self, _actor: Uuid, id: Uuid) -> StoreResult<Option<DoctorDetail>> {
        Ok(self.tables()?.doctor_details.get(&id).cloned())
    }

    async fn upsert_habit(&self, actor: Uuid, entry: &HabitEntry) -> StoreResult<()> {
        let mut tables = self.tables()?;
        tables.require_account(actor, None)?;
        tables.habits.insert((actor, entry.date), entry.clone());
        Ok(())
    }

    async fn habits_since(
        &self,
        actor: Uuid,
        owner: Uuid,
        from: NaiveDate,
    ) -> StoreResult<Vec<HabitEntry>> {
        let tables = self.tables()?;
        if !tables.can_read(actor, owner) {
            return Ok(Vec::new());
        }
        Ok(since(&tables.habits, owner, from))
    }

    async fn upsert_vital(&self, actor: Uuid, entry: &VitalEntry) -> StoreResult<()> {
        let mut tables = self.tables()?;
        tables.require_account(actor, None)?;
        tables.vitals.insert((actor, entry.date), entry.clone());
        Ok(())
    }

    async fn vitals_since(
        &self,
        actor: Uuid,
        owner: Uuid,
        from: NaiveDate,
    ) -> StoreResult<Vec<VitalEntry>> {
        let tables = self.tables()?;
        if !tables.can_read(actor, owner) {
            return Ok(Vec::new());
        }
        Ok(since(&tables.vitals, owner, from))
    }

    async fn doctor_directory(&self, _actor: Uuid) -> StoreResult<Vec<DoctorListing>> {
        let tables = self.tables()?;
        let mut listings: Vec<DoctorListing> = tables
            .accounts
            .values()
            .filter(|a| a.role == Role::Doctor)
            .map(|a| {
                let detail = tables.doctor_details.get(&a.id);
                DoctorListing {
                    id: a.id,
                    name: a.name.clone(),
                    email: a.email.clone(),
                    speciality: detail.and_then(|d| d.speciality.clone()),
                    languages: detail.map(|d| d.languages.clone()).unwrap_or_default(),
                }
            })
            .collect();
        listings.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listings)
    }

    async fn consent_link(
        &self,
        actor: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
    ) -> StoreResult<Option<ConsentLink>> {
        if actor != patient_id && actor != doctor_id {
            return Ok(None);
        }
        Ok(self.tables()?.links.get(&(patient_id, doctor_id)).cloned())
    }

    async fn grant_consent(
        &self,
        actor: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        party: Party,
    ) -> StoreResult<ConsentLink> {
        let mut tables = self.tables()?;
        tables.require_account(patient_id, Some(Role::Patient))?;
        tables.require_account(doctor_id, Some(Role::Doctor))?;

        let own_side = match party {
            Party::Patient => patient_id,
            Party::Doctor => doctor_id,
        };
        if actor != own_side {
            return Err(StoreError::Denied);
        }
        let link = match tables.links.remove(&(patient_id, doctor_id)) {
            Some(existing) => existing.granted(party),
            None => ConsentLink::first_contact(patient_id, doctor_id, party),
        };
        tables.links.insert((patient_id, doctor_id), link.clone());
        Ok(link)
    }

    async fn mutual_counterparts(&self, actor: Uuid) -> StoreResult<Vec<Counterpart>> {
        let tables = self.tables()?;
        let mut counterparts: Vec<Counterpart> = tables
            .links
            .values()
            .filter(|l| l.is_mutual())
            .filter_map(|l| {
                let other = if l.patient_id == actor {
                    l.doctor_id
                } else if l.doctor_id == actor {
                    l.patient_id
                } else {
                    return None;
                };
                tables.accounts.get(&other).map(|a| Counterpart {
                    id: a.id,
                    name: a.name.clone(),
                    email: a.email.clone(),
                    role: a.role,
                })
            })
            .collect();
        counterparts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(counterparts)
    }
}
