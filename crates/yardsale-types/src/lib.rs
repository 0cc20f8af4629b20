//! Shared type definitions for the Yardsale simulation.
//!
//! This crate holds the plain data that crosses crate boundaries: agent
//! identifiers, the small enumerations that parameterize an exchange, and
//! the immutable snapshots and reports the simulation core hands to its
//! consumers.
//!
//! # Modules
//!
//! - [`ids`] -- Index-based agent identifier
//! - [`enums`] -- Distribution mode, stake basis, and coin-flip winner
//! - [`structs`] -- Wealth snapshots, leader traces, and the oligarch report

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{DistributionMode, StakeBasis, Winner};
pub use ids::AgentId;
pub use structs::{LeaderTrace, OligarchReport, WealthSnapshot};

/// Unit of wealth held by an agent.
///
/// Pure integer arithmetic keeps the total exactly conserved; the practical
/// bound on total wealth is `u64::MAX`.
pub type Wealth = u64;
