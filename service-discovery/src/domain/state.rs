//! Monitoring states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result state of a check, using the plugin exit code convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum State {
    #[default]
    Ok,
    Warn,
    Crit,
    Unknown,
}

impl State {
    /// Status word used in plugin output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warn => "WARN",
            Self::Crit => "CRIT",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Marker appended to summary texts.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Ok => "",
            Self::Warn => "(!)",
            Self::Crit => "(!!)",
            Self::Unknown => "(?)",
        }
    }

    /// Process exit code.
    pub fn code(&self) -> i32 {
        u8::from(*self) as i32
    }

    /// The more severe of two states. CRIT beats UNKNOWN.
    pub fn worst(self, other: State) -> State {
        if self == Self::Crit || other == Self::Crit {
            Self::Crit
        } else if u8::from(self) >= u8::from(other) {
            self
        } else {
            other
        }
    }
}

impl From<State> for u8 {
    fn from(state: State) -> Self {
        match state {
            State::Ok => 0,
            State::Warn => 1,
            State::Crit => 2,
            State::Unknown => 3,
        }
    }
}

impl TryFrom<u8> for State {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Ok),
            1 => Ok(Self::Warn),
            2 => Ok(Self::Crit),
            3 => Ok(Self::Unknown),
            other => Err(format!("invalid monitoring state {other}, expected 0..=3")),
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
