//! Discovery modes.

use serde::{Deserialize, Serialize};

/// How a discovery pass changes the persisted autochecks of a host.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DiscoveryMode {
    /// Add new services, keep everything else.
    #[default]
    New,
    /// Drop vanished and obsolete services, add nothing.
    Remove,
    /// Add new and drop vanished services.
    #[cfg_attr(feature = "clap", value(name = "fixall"))]
    FixAll,
    /// Forget all services of the host and discover them again.
    Refresh,
}

/// Mode of automatic rediscovery as stored in the periodic discovery rule:
/// `0` new, `1` remove, `2` fixall, `3` refresh.
///
/// The same number decides which findings of the health check request a
/// rediscovery: unmonitored services for 0, 2 and 3, vanished services for
/// 1, 2 and 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RediscoveryMode {
    New,
    Remove,
    FixAll,
    Refresh,
}

impl RediscoveryMode {
    pub fn discovery_mode(self) -> DiscoveryMode {
        match self {
            Self::New => DiscoveryMode::New,
            Self::Remove => DiscoveryMode::Remove,
            Self::FixAll => DiscoveryMode::FixAll,
            Self::Refresh => DiscoveryMode::Refresh,
        }
    }

    pub fn triggers_on_new(self) -> bool {
        matches!(self, Self::New | Self::FixAll | Self::Refresh)
    }

    pub fn triggers_on_vanished(self) -> bool {
        matches!(self, Self::Remove | Self::FixAll | Self::Refresh)
    }
}

impl From<RediscoveryMode> for u8 {
    fn from(mode: RediscoveryMode) -> Self {
        match mode {
            RediscoveryMode::New => 0,
            RediscoveryMode::Remove => 1,
            RediscoveryMode::FixAll => 2,
            RediscoveryMode::Refresh => 3,
        }
    }
}

impl TryFrom<u8> for RediscoveryMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::New),
            1 => Ok(Self::Remove),
            2 => Ok(Self::FixAll),
            3 => Ok(Self::Refresh),
            other => Err(format!("invalid rediscovery mode {other}, expected 0..=3")),
        }
    }
}
