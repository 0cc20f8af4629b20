//! Conservation law verification.
//!
//! Two checks are provided:
//!
//! - [`verify_conservation`] sums the current wealth of every agent and
//!   compares it with the total recorded at initialization. The driver runs
//!   it after every round.
//! - [`verify_play`] replays the [`Transfer`] records of one play against
//!   the balances before and after it, so a transfer applied to the wrong
//!   agent (or applied twice) is caught even when the total still matches.
//!
//! Every exchange adds and subtracts the same amount, so both checks pass
//! by construction. They exist to catch corruption early.

use tracing::error;
use yardsale_types::{AgentId, Wealth};

use crate::{LedgerAnomaly, Transfer};

/// The result of a conservation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConservationResult {
    /// The books balance.
    Balanced,
    /// Wealth was created, destroyed, or misrouted.
    Anomaly(LedgerAnomaly),
}

impl ConservationResult {
    /// Returns `true` if the check passed.
    pub const fn is_balanced(&self) -> bool {
        matches!(self, Self::Balanced)
    }
}

/// Verify that the population still holds exactly `expected_total`.
pub fn verify_conservation<I>(round: u64, expected_total: Wealth, balances: I) -> ConservationResult
where
    I: IntoIterator<Item = Wealth>,
{
    let mut sum: Wealth = 0;
    for balance in balances {
        sum = match sum.checked_add(balance) {
            Some(val) => val,
            None => return overflow_anomaly(round, expected_total),
        };
    }

    if sum == expected_total {
        ConservationResult::Balanced
    } else {
        error!(round, expected_total, actual_total = sum, "LEDGER_ANOMALY: total wealth drifted");
        ConservationResult::Anomaly(LedgerAnomaly {
            round,
            expected_total,
            actual_total: Some(sum),
            agents: Vec::new(),
            message: format!(
                "LEDGER_ANOMALY at round {round}: expected total {expected_total}, found {sum}",
            ),
        })
    }
}

/// Verify one play's transfers against the balances on either side of it.
///
/// `before` and `after` are indexed by agent. Each agent's balance after
/// the play must equal its balance before, minus everything it paid, plus
/// everything it received. Transfers naming an agent outside the
/// population are reported against that agent.
pub fn verify_play(
    round: u64,
    transfers: &[Transfer],
    before: &[Wealth],
    after: &[Wealth],
) -> ConservationResult {
    let mut expected: Vec<i128> = before.iter().map(|w| i128::from(*w)).collect();
    let mut misrouted: Vec<AgentId> = Vec::new();

    for transfer in transfers {
        let amount = i128::from(transfer.amount);
        match expected.get_mut(transfer.payer.index()) {
            Some(slot) => *slot = slot.saturating_sub(amount),
            None => misrouted.push(transfer.payer),
        }
        match expected.get_mut(transfer.payee.index()) {
            Some(slot) => *slot = slot.saturating_add(amount),
            None => misrouted.push(transfer.payee),
        }
    }

    let mut agents = misrouted;
    if before.len() != after.len() {
        agents.extend((before.len().min(after.len())..before.len().max(after.len())).map(AgentId));
    }
    for (index, (want, got)) in expected.iter().zip(after).enumerate() {
        if *want < 0 || *want != i128::from(*got) {
            agents.push(AgentId(index));
        }
    }

    if agents.is_empty() {
        return ConservationResult::Balanced;
    }

    agents.sort_unstable();
    agents.dedup();
    let count = agents.len();
    let expected_total = before.iter().fold(0, |acc: Wealth, w| acc.saturating_add(*w));
    let actual_total = after.iter().try_fold(0, |acc: Wealth, w| acc.checked_add(*w));
    error!(round, count, "LEDGER_ANOMALY: transfers do not match balances");
    ConservationResult::Anomaly(LedgerAnomaly {
        round,
        expected_total,
        actual_total,
        agents,
        message: format!(
            "LEDGER_ANOMALY at round {round}: {count} agent balance(s) disagree with recorded transfers",
        ),
    })
}

/// Construct an anomaly result for arithmetic overflow during summation.
fn overflow_anomaly(round: u64, expected_total: Wealth) -> ConservationResult {
    error!(round, expected_total, "LEDGER_ANOMALY: overflow while summing wealth");
    ConservationResult::Anomaly(LedgerAnomaly {
        round,
        expected_total,
        actual_total: None,
        agents: Vec::new(),
        message: format!("LEDGER_ANOMALY at round {round}: arithmetic overflow while summing wealth"),
    })
}
