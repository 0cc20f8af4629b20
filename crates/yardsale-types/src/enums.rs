//! Enumeration types for the Yardsale simulation.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Initial wealth
// ---------------------------------------------------------------------------

/// How starting wealth is assigned to agents at initialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionMode {
    /// Every agent starts with exactly the per-capita target.
    #[default]
    Equal,
    /// Every agent draws a uniform amount in `[1, per_capita]`, then the
    /// population is topped up one unit at a time to the target total.
    Randomized,
}

// ---------------------------------------------------------------------------
// Exchange rule
// ---------------------------------------------------------------------------

/// Which agent's wealth the gain/loss percentage is applied to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StakeBasis {
    /// The stake is a percentage of the richer agent's wealth. The poorer
    /// agent gains more on a win than it risks on a loss, so wealth tends
    /// back toward equality and a run may never halt.
    Richer,
    /// The stake is a percentage of the poorer agent's wealth (the classic
    /// yard-sale rule). Wealth condenses.
    #[default]
    Poorer,
}

/// Outcome of the fair coin flipped for one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Winner {
    /// The poorer agent wins and receives `gain_percent` of the stake basis.
    Poorer,
    /// The richer agent wins and receives `loss_percent` of the stake basis.
    Richer,
}

impl Winner {
    /// Map a coin flip to a winner. `true` means the poorer agent wins.
    pub const fn from_coin(poorer_wins: bool) -> Self {
        if poorer_wins { Self::Poorer } else { Self::Richer }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn coin_maps_to_winner() {
        assert_eq!(Winner::from_coin(true), Winner::Poorer);
        assert_eq!(Winner::from_coin(false), Winner::Richer);
    }

    #[test]
    fn modes_use_lowercase_names() {
        let mode: DistributionMode = serde_json::from_str("\"randomized\"").unwrap();
        assert_eq!(mode, DistributionMode::Randomized);
        let basis: StakeBasis = serde_json::from_str("\"poorer\"").unwrap();
        assert_eq!(basis, StakeBasis::Poorer);
        assert_eq!(DistributionMode::default(), DistributionMode::Equal);
        assert_eq!(StakeBasis::default(), StakeBasis::Poorer);
    }
}
