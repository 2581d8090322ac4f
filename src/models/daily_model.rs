use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row per account per calendar date. Missing inputs are stored as zero.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct HabitEntry {
    pub date: NaiveDate,
    pub steps: i32,
    pub water_cups: i32,
    pub sleep_hours: f64,
}

/// One row per account per calendar date. `None` means "not recorded".
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct VitalEntry {
    pub date: NaiveDate,
    pub glucose: Option<f64>,
    pub systolic: Option<i32>,
    pub diastolic: Option<i32>,
    pub heart_rate: Option<i32>,
    pub temperature: Option<f64>,
}
