//! Purchasing strategies and the intent → attempt-list table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A concrete acquisition strategy the launcher knows how to realize.
///
/// Unknown names are preserved as [`Strategy::Unknown`] and rejected only when a
/// launch specification is built for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// Spot market at the current spot price.
    SpotOnly,
    /// Spot if it is currently cheaper than on-demand, else on-demand.
    BestEffort,
    /// Spot, upsized to the largest sibling still cheaper than baseline on-demand.
    MaxPerformance,
    /// On-demand. Spelled `none` on the command line.
    OnDemand,
    Unknown(String),
}

impl Strategy {
    pub fn as_str(&self) -> &str {
        match self {
            Self::SpotOnly => "spotonly",
            Self::BestEffort => "besteffort",
            Self::MaxPerformance => "maxperformance",
            Self::OnDemand => "none",
            Self::Unknown(name) => name,
        }
    }

    /// Whether capacity errors on this attempt are final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::OnDemand)
    }

    /// Ordered attempts for a purchasing intent.
    ///
    /// `maxperformance` deliberately has no on-demand tail: it prefers total
    /// failure over paying full price.
    pub fn resolve(intent: &str) -> Vec<Strategy> {
        let Ok(strategy) = intent.parse::<Strategy>();
        match strategy {
            Self::MaxPerformance => vec![Self::MaxPerformance, Self::SpotOnly],
            Self::BestEffort => vec![Self::BestEffort, Self::OnDemand],
            other => vec![other],
        }
    }
}

impl FromStr for Strategy {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let strategy = match s.trim().to_ascii_lowercase().as_str() {
            "spotonly" => Self::SpotOnly,
            "besteffort" => Self::BestEffort,
            "maxperformance" => Self::MaxPerformance,
            "none" => Self::OnDemand,
            _ => Self::Unknown(s.trim().to_string()),
        };
        Ok(strategy)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
