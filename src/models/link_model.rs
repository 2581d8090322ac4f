use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two sides of a consent link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Patient,
    Doctor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentState {
    Unlinked,
    OneSidedPatient,
    OneSidedDoctor,
    Mutual,
}

impl ConsentState {
    pub fn of(link: Option<&ConsentLink>) -> Self {
        match link {
            None => ConsentState::Unlinked,
            Some(l) => match (l.patient_consented, l.doctor_consented) {
                (true, true) => ConsentState::Mutual,
                (true, false) => ConsentState::OneSidedPatient,
                (false, true) => ConsentState::OneSidedDoctor,
                (false, false) => ConsentState::Unlinked,
            },
        }
    }
}

/// Mutual opt-in between one patient and one doctor. Flags are only ever set, never cleared.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct ConsentLink {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_consented: bool,
    pub doctor_consented: bool,
    pub created_at: DateTime<Utc>,
}

impl ConsentLink {
    /// Row created by the first consent action of `party`.
    pub fn first_contact(patient_id: Uuid, doctor_id: Uuid, party: Party) -> Self {
        ConsentLink {
            patient_id,
            doctor_id,
            patient_consented: false,
            doctor_consented: false,
            created_at: Utc::now(),
        }
        .granted(party)
    }

    /// Sets `party`'s flag, leaving the other side untouched.
    pub fn granted(mut self, party: Party) -> Self {
        match party {
            Party::Patient => self.patient_consented = true,
            Party::Doctor => self.doctor_consented = true,
        }
        self
    }

    pub fn is_mutual(&self) -> bool {
        self.patient_consented && self.doctor_consented
    }

    pub fn state(&self) -> ConsentState {
        ConsentState::of(Some(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_reach_mutual_from_either_side() {
        let (p, d) = (Uuid::new_v4(), Uuid::new_v4());

        let link = ConsentLink::first_contact(p, d, Party::Patient);
        assert_eq!(link.state(), ConsentState::OneSidedPatient);
        let link = link.granted(Party::Doctor);
        assert_eq!(link.state(), ConsentState::Mutual);

        let link = ConsentLink::first_contact(p, d, Party::Doctor);
        assert_eq!(link.state(), ConsentState::OneSidedDoctor);
        assert!(link.granted(Party::Patient).is_mutual());
    }

    #[test]
    fn granting_twice_is_idempotent() {
        let link = ConsentLink::first_contact(Uuid::new_v4(), Uuid::new_v4(), Party::Patient);
        let again = link.clone().granted(Party::Patient);
        assert_eq!(link, again);
        assert!(!again.doctor_consented);
    }

    #[test]
    fn mutual_is_terminal() {
        let link = ConsentLink::first_contact(Uuid::new_v4(), Uuid::new_v4(), Party::Patient)
            .granted(Party::Doctor);
        assert_eq!(link.clone().granted(Party::Patient).state(), ConsentState::Mutual);
        assert_eq!(link.granted(Party::Doctor).state(), ConsentState::Mutual);
    }

    #[test]
    fn missing_link_is_unlinked() {
        assert_eq!(ConsentState::of(None), ConsentState::Unlinked);
    }
}
