//! Per-run key prefixes.
//!
//! Every key the harness touches is qualified with a [`Namespace`] so that
//! repeated or parallel runs against one shared server don't trip over each
//! other's leftovers. Allocation is a pure function of an optional override
//! and a timestamp; the caller owns the clock.
//!
//! Two runs started within the same second without an override get the same
//! prefix. That is a known limitation, not something to paper over here.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::constants::NAMESPACE_SEED_PREFIX;

/// Key prefix unique to one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// Use `explicit` verbatim, or derive `ns<unix-seconds>` from `now`.
    #[must_use]
    pub fn allocate(explicit: Option<&str>, now: DateTime<Utc>) -> Self {
        match explicit {
            Some(prefix) => Self(prefix.to_string()),
            None => Self(format!("{NAMESPACE_SEED_PREFIX}{}", now.timestamp())),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Qualify a short key name: `<prefix>_<name>`.
    #[must_use]
    pub fn key(&self, name: &str) -> String {
        format!("{}_{name}", self.0)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
