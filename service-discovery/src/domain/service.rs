//! Services and service tables.

use std::collections::BTreeMap;

use autochecks::{AutocheckRecord, ServiceKey};
use serde::Serialize;

use super::CheckSource;

/// A service produced by a discovery function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCandidate {
    pub key: ServiceKey,
    /// Unevaluated parameter literal.
    pub paramstring: String,
}

impl ServiceCandidate {
    pub fn new(check_type: impl Into<String>, item: Option<String>, paramstring: impl Into<String>) -> Self {
        Self {
            key: ServiceKey::new(check_type, item),
            paramstring: paramstring.into(),
        }
    }

    pub fn check_type(&self) -> &str {
        &self.key.check_type
    }

    pub fn into_record(self) -> AutocheckRecord {
        AutocheckRecord::new(self.key, self.paramstring)
    }
}

/// Classified entry of a service table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceEntry {
    pub source: CheckSource,
    pub paramstring: String,
}

impl ServiceEntry {
    pub fn new(source: CheckSource, paramstring: impl Into<String>) -> Self {
        Self {
            source,
            paramstring: paramstring.into(),
        }
    }
}

/// All services a host has or could have, keyed by service identity.
pub type ServiceTable = BTreeMap<ServiceKey, ServiceEntry>;
