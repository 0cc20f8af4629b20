//! Immutable views of the simulation handed to consumers.
//!
//! The core never exposes its agent collection directly. After each round
//! it builds a [`WealthSnapshot`]; when the run halts it emits an
//! [`OligarchReport`]. Both are owned values, so a renderer on another
//! task can hold them as long as it likes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AgentId, Wealth};

/// Per-round view of the population for status lines and charts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WealthSnapshot {
    /// Completed driver rounds (1-based once the first round finishes).
    pub round: u64,
    /// Number of agents.
    pub population: usize,
    /// Sum of all agents' wealth (constant for the whole run).
    pub total_wealth: Wealth,
    /// Reshuffle-and-exchange passes per round.
    pub plays_per_round: u32,
    /// Total plays executed so far (`round * plays_per_round`).
    pub total_plays: u64,
    /// Wall-clock milliseconds since the previous snapshot.
    pub elapsed_ms: u64,
    /// Current wealth of every agent, ordered by agent index.
    pub wealth: Vec<Wealth>,
    /// History of the currently richest agent, when history is recorded.
    pub leader: Option<LeaderTrace>,
}

impl WealthSnapshot {
    /// Return the largest current wealth, or 0 for an empty population.
    pub fn max_wealth(&self) -> Wealth {
        self.wealth.iter().copied().max().unwrap_or(0)
    }
}

/// Wealth history of a single agent, used for the leader chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderTrace {
    /// The agent the history belongs to.
    pub agent: AgentId,
    /// Every wealth value the agent has held, starting with its initial
    /// wealth and appended after each exchange it took part in.
    pub history: Vec<Wealth>,
}

/// Termination event: an agent reached the oligarch threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OligarchReport {
    /// Identifier of this simulation run.
    pub run_id: Uuid,
    /// The agent that became the oligarch.
    pub agent: AgentId,
    /// The agent's wealth before the first round.
    pub starting_wealth: Wealth,
    /// The agent's wealth when the threshold was reached.
    pub final_wealth: Wealth,
    /// Total wealth in the population.
    pub total_wealth: Wealth,
    /// Threshold the agent reached or exceeded.
    pub threshold: Wealth,
    /// Driver rounds completed when the oligarch was detected.
    pub rounds: u64,
    /// Total plays completed (`rounds * plays_per_round`).
    pub plays: u64,
    /// Wall-clock time the run started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock milliseconds from start to detection.
    pub elapsed_ms: u64,
}

impl core::fmt::Display for OligarchReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "After {} rounds, agent {} (started with ${}) has become an oligarch with ${} out of the available ${}",
            self.rounds, self.agent, self.starting_wealth, self.final_wealth, self.total_wealth,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_report() -> OligarchReport {
        OligarchReport {
            run_id: Uuid::now_v7(),
            agent: AgentId(3),
            starting_wealth: 100,
            final_wealth: 960,
            total_wealth: 1000,
            threshold: 950,
            rounds: 12,
            plays: 1200,
            started_at: Utc::now(),
            elapsed_ms: 5,
        }
    }

    #[test]
    fn report_display_names_agent_and_amounts() {
        let text = make_report().to_string();
        assert!(text.contains("After 12 rounds"));
        assert!(text.contains("agent 3"));
        assert!(text.contains("started with $100"));
        assert!(text.contains("$960 out of the available $1000"));
    }

    #[test]
    fn report_survives_json() {
        let report = make_report();
        let json = serde_json::to_string(&report).unwrap();
        let back: OligarchReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn snapshot_max_wealth() {
        let snapshot = WealthSnapshot {
            round: 1,
            population: 3,
            total_wealth: 30,
            plays_per_round: 1,
            total_plays: 1,
            elapsed_ms: 0,
            wealth: vec![5, 20, 5],
            leader: None,
        };
        assert_eq!(snapshot.max_wealth(), 20);
    }
}
