//! Classification of service table entries.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Why a service appears in a host's service table.
///
/// The classification is recomputed on every discovery pass and never stored.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckSource {
    /// Discovered but not yet monitored.
    New,
    /// Discovered and already monitored.
    Old,
    /// Monitored but no longer discovered.
    Vanished,
    /// Configured explicitly, not subject to discovery.
    Manual,
    /// Defined via legacy checks.
    Legacy,
    /// Defined via active checks.
    Active,
    /// Defined via custom checks.
    Custom,
    /// Disabled by an ignore rule.
    Ignored,
    /// Vanished and meanwhile disabled by an ignore rule.
    Obsolete,
    ClusteredNew,
    ClusteredOld,
    ClusteredVanished,
    ClusteredIgnored,
}

impl CheckSource {
    pub fn as_str(&self) -> &str {
        self.as_ref()
    }

    /// Parse a source name. Anything outside the classification is a fatal
    /// internal error.
    pub fn parse(s: &str) -> crate::Result<Self> {
        s.parse()
    }

    /// The source of an entry whose service is assigned to another host.
    pub fn clustered(self) -> Self {
        match self {
            Self::New => Self::ClusteredNew,
            Self::Old => Self::ClusteredOld,
            Self::Vanished => Self::ClusteredVanished,
            Self::Ignored => Self::ClusteredIgnored,
            other => other,
        }
    }

    /// The source after an ignore rule matched the service.
    pub fn ignored(self) -> Self {
        match self {
            Self::Vanished | Self::Obsolete => Self::Obsolete,
            s if s.is_clustered() => Self::ClusteredIgnored,
            _ => Self::Ignored,
        }
    }

    pub fn is_clustered(&self) -> bool {
        matches!(
            self,
            Self::ClusteredNew | Self::ClusteredOld | Self::ClusteredVanished | Self::ClusteredIgnored
        )
    }

    /// Sources that come from configuration rather than discovery.
    pub fn is_static(&self) -> bool {
        matches!(self, Self::Manual | Self::Legacy | Self::Active | Self::Custom)
    }

    /// Static sources whose service description is the item itself.
    pub fn is_rule_based(&self) -> bool {
        matches!(self, Self::Legacy | Self::Active | Self::Custom)
    }
}

impl FromStr for CheckSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "new" => Self::New,
            "old" => Self::Old,
            "vanished" => Self::Vanished,
            "manual" => Self::Manual,
            "legacy" => Self::Legacy,
            "active" => Self::Active,
            "custom" => Self::Custom,
            "ignored" => Self::Ignored,
            "obsolete" => Self::Obsolete,
            "clustered_new" => Self::ClusteredNew,
            "clustered_old" => Self::ClusteredOld,
            "clustered_vanished" => Self::ClusteredVanished,
            "clustered_ignored" => Self::ClusteredIgnored,
            other => return Err(Error::UnknownCheckSource(other.to_string())),
        })
    }
}
