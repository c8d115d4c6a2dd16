use serde::{Deserialize, Serialize};

/// Latent market regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegimeState {
    Bull,
    Neutral,
    Bear,
}

impl std::fmt::Display for RegimeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bull => write!(f, "BULL"),
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::Bear => write!(f, "BEAR"),
        }
    }
}

/// State of a drawdown breaker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerState {
    #[default]
    Active,
    Halted,
}

/// Verdict handed to a generator for the current tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerVerdict {
    #[default]
    Trade,
    Halted,
}

impl BreakerVerdict {
    #[must_use]
    pub const fn is_halted(self) -> bool {
        matches!(self, Self::Halted)
    }
}

impl From<BreakerState> for BreakerVerdict {
    fn from(state: BreakerState) -> Self {
        match state {
            BreakerState::Active => Self::Trade,
            BreakerState::Halted => Self::Halted,
        }
    }
}
