//! Agent identifiers.
//!
//! Agents are never added or removed after initialization, so an agent is
//! identified by its position in the population (`0..population`). The
//! newtype keeps those positions from being confused with permutation
//! slots or round counters.

use serde::{Deserialize, Serialize};

/// Index of an agent within the population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub usize);

impl AgentId {
    /// Return the raw population index.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl core::fmt::Display for AgentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for AgentId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl From<AgentId> for usize {
    fn from(id: AgentId) -> Self {
        id.0
    }
}
