//! Session-scoped read-through cache for [`HealthClient`](super::HealthClient).
//!
//! Entries only save round trips. The server never sees this cache and
//! authorization is always decided server-side.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

/// What kind of data a cached response holds; the unit of invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Me,
    Profile,
    Habits,
    Vitals,
    Doctors,
    Links,
}

#[derive(Debug, Default)]
pub struct ReadCache {
    entries: Mutex<HashMap<(DataKind, String), Value>>,
}

impl ReadCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<(DataKind, String), Value>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, kind: DataKind, key: &str) -> Option<Value> {
        self.entries().get(&(kind, key.to_string())).cloned()
    }

    pub fn set(&self, kind: DataKind, key: impl Into<String>, value: Value) {
        self.entries().insert((kind, key.into()), value);
    }

    /// Drops every entry of `kind`, whatever its key.
    pub fn invalidate(&self, kind: DataKind) {
        self.entries().retain(|(k, _), _| *k != kind);
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
