use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A registered user. The role is fixed once the first profile is saved.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct PatientDetail {
    pub account_id: Uuid,
    pub date_of_birth: Option<NaiveDate>,
    pub sex: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct DoctorDetail {
    pub account_id: Uuid,
    pub speciality: Option<String>,
    pub languages: Vec<String>,
    pub license_number: Option<String>,
    pub clinic: Option<String>,
    pub bio: Option<String>,
}

/// Role-specific detail record, one-to-one with an [`Account`] of the same role.
#[derive(Debug, Clone, PartialEq)]
pub enum RoleDetail {
    Patient(PatientDetail),
    Doctor(DoctorDetail),
}

impl RoleDetail {
    pub fn role(&self) -> Role {
        match self {
            RoleDetail::Patient(_) => Role::Patient,
            RoleDetail::Doctor(_) => Role::Doctor,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub account: Account,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_detail: Option<PatientDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_detail: Option<DoctorDetail>,
}

/// Public directory row: doctor account joined with its detail record.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct DoctorListing {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub speciality: Option<String>,
    pub languages: Vec<String>,
}

/// The other party of a mutual consent link.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Counterpart {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Doctor".parse::<Role>().unwrap(), Role::Doctor);
        assert_eq!(" patient ".parse::<Role>().unwrap(), Role::Patient);
        assert!("nurse".parse::<Role>().is_err());
    }

    #[test]
    fn profile_view_omits_missing_detail() {
        let view = ProfileView {
            account: Account {
                id: Uuid::nil(),
                email: "p@example.com".into(),
                name: "Pat".into(),
                role: Role::Patient,
                created_at: Utc::now(),
            },
            patient_detail: None,
            doctor_detail: None,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["account"]["role"], "patient");
        assert!(json.get("patient_detail").is_none());
        assert!(json.get("doctor_detail").is_none());
    }
}
