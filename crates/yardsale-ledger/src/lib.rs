//! Zero-sum bookkeeping for the Yardsale simulation.
//!
//! Every exchange moves wealth from one agent to another; nothing is ever
//! created or destroyed after initialization. This crate records those
//! movements and verifies the conservation law:
//!
//! ```text
//! sum(agent.wealth) after round R == total wealth at initialization
//! ```
//!
//! A violation produces a [`LedgerAnomaly`] -- the simulation's most
//! critical integrity alert. The ledger never panics; it returns results.
//!
//! # Modules
//!
//! - [`conservation`] -- Total-wealth and per-play transfer verification.
//!
//! # Usage
//!
//! ```
//! use yardsale_ledger::{ConservationResult, Transfer, verify_conservation};
//! use yardsale_types::{AgentId, Winner};
//!
//! let transfer = Transfer {
//!     payer: AgentId(0),
//!     payee: AgentId(1),
//!     amount: 20,
//!     winner: Winner::Poorer,
//! };
//! assert_eq!(transfer.amount, 20);
//!
//! // Two agents, total 150, still 150 after the exchange.
//! assert_eq!(verify_conservation(1, 150, [80, 70]), ConservationResult::Balanced);
//! ```

pub mod conservation;

// Re-export primary items at crate root.
pub use conservation::{ConservationResult, verify_conservation, verify_play};

use serde::{Deserialize, Serialize};
use yardsale_types::{AgentId, Wealth, Winner};

// ---------------------------------------------------------------------------
// Transfer record
// ---------------------------------------------------------------------------

/// One movement of wealth between the two agents of a pair.
///
/// The payer's wealth decreases by `amount` and the payee's increases by
/// the same `amount`. A zero amount is valid (truncating division on a
/// small stake).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Agent that lost wealth.
    pub payer: AgentId,
    /// Agent that gained wealth.
    pub payee: AgentId,
    /// Units moved.
    pub amount: Wealth,
    /// Which side of the pair won the coin flip.
    pub winner: Winner,
}

// ---------------------------------------------------------------------------
// Anomaly type
// ---------------------------------------------------------------------------

/// A conservation law violation detected after a round or play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAnomaly {
    /// The round where the anomaly was detected.
    pub round: u64,
    /// The total the population should hold.
    pub expected_total: Wealth,
    /// The total actually observed (`None` if summation overflowed).
    pub actual_total: Option<Wealth>,
    /// Agents whose balance disagrees with the recorded transfers.
    pub agents: Vec<AgentId>,
    /// Human-readable description of the anomaly.
    pub message: String,
}

impl core::fmt::Display for LedgerAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}
