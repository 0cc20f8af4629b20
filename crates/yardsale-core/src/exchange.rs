//! Pairwise wealth exchange.
//!
//! One play reshuffles the permutation buffer, splits it into two halves,
//! and pairs element `k` of the first half with element `k` of the second.
//! Each pair flips a fair coin:
//!
//! - **Poorer wins**: `gain_percent` of the stake basis moves from the
//!   richer agent to the poorer one.
//! - **Richer wins**: `loss_percent` of the stake basis moves from the
//!   poorer agent to the richer one.
//!
//! The stake basis is the poorer agent's wealth by default
//! ([`StakeBasis::Poorer`]), under which wealth condenses, or the richer
//! agent's ([`StakeBasis::Richer`]), under which it tends back toward
//! equality.
//! The amount moved never exceeds what the paying agent holds, so no
//! balance goes negative, and the same amount is subtracted from one side
//! and added to the other, so total wealth is conserved exactly even under
//! truncating division.
//!
//! # Concurrency
//!
//! Pairs within a play touch disjoint agents. The engine hands each pair
//! its own two `&mut Agent` borrows, taken out of the population exactly
//! once, and settles the pairs on the rayon pool. No locks are involved;
//! the borrow checker proves disjointness. Coin flips are drawn on the
//! calling thread before the fan-out, so a seeded run is reproducible
//! regardless of scheduling. The play returns only after every pair has
//! settled.

use rand::Rng;
use rayon::prelude::*;
use yardsale_ledger::Transfer;
use yardsale_types::{AgentId, StakeBasis, Wealth, Winner};

use crate::shuffle;
use crate::state::Agent;

/// Errors that can occur during a play.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// The population does not match the permutation buffer.
    #[error("population mismatch: engine sized for {expected} agents, got {actual}")]
    PopulationMismatch {
        /// Size of the permutation buffer.
        expected: usize,
        /// Size of the population passed in.
        actual: usize,
    },

    /// The permutation named an agent twice or an agent that does not exist.
    #[error("permutation slot names agent {index} more than once or out of range")]
    InvalidPermutation {
        /// The offending agent index.
        index: usize,
    },

    /// Settling a pair would overdraw the payer or overflow the payee.
    #[error("settlement between agents {first} and {second} is out of range")]
    Settlement {
        /// First agent of the pair.
        first: AgentId,
        /// Second agent of the pair.
        second: AgentId,
    },
}

/// Parameters of the exchange rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeParams {
    /// Percentage moved to the poorer agent when it wins (0-100).
    pub gain_percent: u8,
    /// Percentage moved to the richer agent when it wins (0-100).
    pub loss_percent: u8,
    /// Which agent's wealth the percentage applies to.
    pub stake_basis: StakeBasis,
}

/// Position of an agent within its pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Drawn from the first half of the permutation.
    First,
    /// Drawn from the second half of the permutation.
    Second,
}

/// The result of applying the rule to one pair: who pays, and how much.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    /// The agent that loses wealth.
    pub payer: Position,
    /// Units moved from the payer to the other agent.
    pub amount: Wealth,
}

impl Settlement {
    /// Apply the settlement to the pair's balances.
    ///
    /// Returns `None` if the payer holds less than `amount` or the payee
    /// would overflow; [`settle`] never produces either.
    pub const fn apply(self, first: Wealth, second: Wealth) -> Option<(Wealth, Wealth)> {
        match self.payer {
            Position::First => match (first.checked_sub(self.amount), second.checked_add(self.amount)) {
                (Some(f), Some(s)) => Some((f, s)),
                _ => None,
            },
            Position::Second => match (first.checked_add(self.amount), second.checked_sub(self.amount)) {
                (Some(f), Some(s)) => Some((f, s)),
                _ => None,
            },
        }
    }
}

/// `floor(value * percent / 100)` without intermediate overflow.
///
/// Splitting `value` into `100q + r` gives
/// `value * p / 100 = q * p + r * p / 100`, and `q * p <= value` for
/// `p <= 100`. Percentages above 100 are treated as 100.
#[allow(clippy::arithmetic_side_effects, clippy::cast_lossless)]
pub const fn percent_of(value: Wealth, percent: u8) -> Wealth {
    let p = if percent > 100 { 100 } else { percent as Wealth };
    let q = value / 100;
    let r = value % 100;
    q * p + r * p / 100
}

/// Apply the exchange rule to one pair.
///
/// The richer agent is the one with strictly greater wealth; on a tie the
/// second agent is treated as richer.
pub fn settle(first: Wealth, second: Wealth, winner: Winner, params: ExchangeParams) -> Settlement {
    let first_is_richer = first > second;
    let (richer, poorer) = if first_is_richer { (first, second) } else { (second, first) };
    let basis = match params.stake_basis {
        StakeBasis::Richer => richer,
        StakeBasis::Poorer => poorer,
    };
    let (percent, richer_pays, payer_balance) = match winner {
        Winner::Poorer => (params.gain_percent, true, richer),
        Winner::Richer => (params.loss_percent, false, poorer),
    };
    let payer = if richer_pays == first_is_richer {
        Position::First
    } else {
        Position::Second
    };
    Settlement {
        payer,
        amount: percent_of(basis, percent).min(payer_balance),
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Two agents borrowed out of the population for one play.
struct Pairing<'a> {
    first_id: AgentId,
    first: &'a mut Agent,
    second_id: AgentId,
    second: &'a mut Agent,
    winner: Winner,
}

impl Pairing<'_> {
    fn settle(&mut self, params: ExchangeParams) -> Result<Transfer, ExchangeError> {
        let settlement = settle(self.first.wealth(), self.second.wealth(), self.winner, params);
        let (first_after, second_after) = settlement
            .apply(self.first.wealth(), self.second.wealth())
            .ok_or(ExchangeError::Settlement {
                first: self.first_id,
                second: self.second_id,
            })?;
        self.first.settle(first_after);
        self.second.settle(second_after);

        let (payer, payee) = match settlement.payer {
            Position::First => (self.first_id, self.second_id),
            Position::Second => (self.second_id, self.first_id),
        };
        Ok(Transfer {
            payer,
            payee,
            amount: settlement.amount,
            winner: self.winner,
        })
    }
}

/// Owns the permutation and coin buffers and runs plays over a population.
#[derive(Debug, Clone)]
pub struct ExchangeEngine {
    permutation: Vec<usize>,
    coins: Vec<bool>,
    params: ExchangeParams,
    parallel: bool,
}

impl ExchangeEngine {
    /// Create an engine for a population of the given size.
    pub fn new(population: usize, params: ExchangeParams, parallel: bool) -> Self {
        let mut permutation = vec![0; population];
        shuffle::identity(&mut permutation);
        Self {
            permutation,
            coins: Vec::with_capacity(population / 2),
            params,
            parallel,
        }
    }

    /// The exchange rule parameters.
    pub const fn params(&self) -> ExchangeParams {
        self.params
    }

    /// The permutation used by the most recent play.
    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    /// Run one play over `agents`.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError`] if `agents` does not match the engine's
    /// population or a pair cannot be settled.
    pub fn play<R: Rng + ?Sized>(
        &mut self,
        agents: &mut [Agent],
        rng: &mut R,
    ) -> Result<(), ExchangeError> {
        self.prepare(rng);
        let params = self.params;
        let mut pairs = self.pairings(agents)?;
        if self.parallel {
            pairs
                .par_iter_mut()
                .try_for_each(|pair| pair.settle(params).map(drop))
        } else {
            pairs
                .iter_mut()
                .try_for_each(|pair| pair.settle(params).map(drop))
        }
    }

    /// Run one play over `agents` and return a transfer per pair, in pair
    /// order.
    ///
    /// # Errors
    ///
    /// See [`play`](Self::play).
    pub fn play_recorded<R: Rng + ?Sized>(
        &mut self,
        agents: &mut [Agent],
        rng: &mut R,
    ) -> Result<Vec<Transfer>, ExchangeError> {
        self.prepare(rng);
        let params = self.params;
        let mut pairs = self.pairings(agents)?;
        if self.parallel {
            pairs
                .par_iter_mut()
                .map(|pair| pair.settle(params))
                .collect()
        } else {
            pairs.iter_mut().map(|pair| pair.settle(params)).collect()
        }
    }

    /// Reshuffle and draw one coin per pair. Completes before any pair is
    /// settled.
    fn prepare<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        shuffle::fisher_yates(&mut self.permutation, rng);
        let pairs = self.permutation.len() / 2;
        self.coins.clear();
        self.coins.extend((0..pairs).map(|_| rng.random_bool(0.5)));
    }

    /// Split the population into disjoint pairs following the permutation.
    fn pairings<'a>(&self, agents: &'a mut [Agent]) -> Result<Vec<Pairing<'a>>, ExchangeError> {
        if agents.len() != self.permutation.len() {
            return Err(ExchangeError::PopulationMismatch {
                expected: self.permutation.len(),
                actual: agents.len(),
            });
        }

        let (left, right) = self.permutation.split_at(self.permutation.len() / 2);
        let mut slots: Vec<Option<&'a mut Agent>> = agents.iter_mut().map(Some).collect();

        left.iter()
            .zip(right)
            .zip(&self.coins)
            .map(|((&i, &j), &poorer_wins)| {
                let first = take(&mut slots, i)?;
                let second = take(&mut slots, j)?;
                Ok(Pairing {
                    first_id: AgentId(i),
                    first,
                    second_id: AgentId(j),
                    second,
                    winner: Winner::from_coin(poorer_wins),
                })
            })
            .collect()
    }
}

/// Take the borrow of agent `index` out of its slot. Each slot can be
/// taken once, which is what keeps the pairs disjoint.
fn take<'a>(slots: &mut [Option<&'a mut Agent>], index: usize) -> Result<&'a mut Agent, ExchangeError> {
    slots
        .get_mut(index)
        .and_then(Option::take)
        .ok_or(ExchangeError::InvalidPermutation { index })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    const CLASSIC: ExchangeParams = ExchangeParams {
        gain_percent: 20,
        loss_percent: 17,
        stake_basis: StakeBasis::Richer,
    };

    fn population(balances: &[Wealth]) -> Vec<Agent> {
        balances.iter().map(|&w| Agent::new(w, true)).collect()
    }

    fn total(agents: &[Agent]) -> Wealth {
        agents.iter().map(Agent::wealth).sum()
    }

    #[test]
    fn poorer_wins_takes_gain_of_richer() {
        let settlement = settle(100, 50, Winner::Poorer, CLASSIC);
        assert_eq!(settlement, Settlement { payer: Position::First, amount: 20 });
        assert_eq!(settlement.apply(100, 50), Some((80, 70)));
    }

    #[test]
    fn richer_wins_takes_loss_of_richer() {
        let settlement = settle(100, 50, Winner::Richer, CLASSIC);
        assert_eq!(settlement, Settlement { payer: Position::Second, amount: 17 });
        assert_eq!(settlement.apply(100, 50), Some((117, 33)));
    }

    #[test]
    fn pair_order_does_not_change_the_outcome() {
        let settlement = settle(50, 100, Winner::Poorer, CLASSIC);
        assert_eq!(settlement.apply(50, 100), Some((70, 80)));
        let settlement = settle(50, 100, Winner::Richer, CLASSIC);
        assert_eq!(settlement.apply(50, 100), Some((33, 117)));
    }

    #[test]
    fn tie_treats_second_agent_as_richer() {
        let settlement = settle(100, 100, Winner::Poorer, CLASSIC);
        assert_eq!(settlement.payer, Position::Second);
        assert_eq!(settlement.apply(100, 100), Some((120, 80)));
    }

    #[test]
    fn stake_is_capped_at_payer_balance() {
        // 17% of 1000 is 170, but the poorer agent only holds 10.
        let settlement = settle(1000, 10, Winner::Richer, CLASSIC);
        assert_eq!(settlement.amount, 10);
        assert_eq!(settlement.apply(1000, 10), Some((1010, 0)));
    }

    #[test]
    fn poorer_basis_uses_poorer_wealth() {
        let params = ExchangeParams {
            stake_basis: StakeBasis::Poorer,
            ..CLASSIC
        };
        assert_eq!(settle(100, 50, Winner::Poorer, params).amount, 10);
        assert_eq!(settle(100, 50, Winner::Richer, params).amount, 8);
    }

    #[test]
    fn truncating_division() {
        // 20% of 9 is 1.8 -> 1.
        assert_eq!(settle(9, 3, Winner::Poorer, CLASSIC).amount, 1);
        assert_eq!(settle(4, 0, Winner::Poorer, CLASSIC).amount, 0);
    }

    #[test]
    fn percent_of_matches_naive_formula_and_never_overflows() {
        for value in [0, 1, 99, 100, 101, 12_345, 999_999] {
            for percent in [0, 1, 17, 20, 50, 95, 100] {
                assert_eq!(percent_of(value, percent), value * Wealth::from(percent) / 100);
            }
        }
        assert_eq!(percent_of(Wealth::MAX, 100), Wealth::MAX);
        assert_eq!(percent_of(Wealth::MAX, 50), Wealth::MAX / 2);
        assert_eq!(percent_of(1000, 200), 1000);
    }

    #[test]
    fn apply_rejects_overdraw_and_overflow() {
        let overdraw = Settlement { payer: Position::First, amount: 11 };
        assert_eq!(overdraw.apply(10, 0), None);
        let overflow = Settlement { payer: Position::Second, amount: 1 };
        assert_eq!(overflow.apply(Wealth::MAX, 1), None);
    }

    #[test]
    fn play_conserves_wealth_and_pairs_everyone_once() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut agents = population(&[100; 10]);
        let mut engine = ExchangeEngine::new(10, CLASSIC, true);
        assert_eq!(engine.params(), CLASSIC);
        for _ in 0..200 {
            let transfers = engine.play_recorded(&mut agents, &mut rng).unwrap();
            assert_eq!(transfers.len(), 5);
            assert_eq!(total(&agents), 1000);
            let mut touched: Vec<usize> = transfers
                .iter()
                .flat_map(|t| [t.payer.index(), t.payee.index()])
                .collect();
            touched.sort_unstable();
            assert_eq!(touched, (0..10).collect::<Vec<_>>());
        }
    }

    #[test]
    fn transfers_follow_the_permutation_halves() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut agents = population(&[100; 6]);
        let mut engine = ExchangeEngine::new(6, CLASSIC, false);
        let transfers = engine.play_recorded(&mut agents, &mut rng).unwrap();
        let perm = engine.permutation().to_vec();
        for (k, transfer) in transfers.iter().enumerate() {
            let mut pair = [transfer.payer.index(), transfer.payee.index()];
            pair.sort_unstable();
            let mut expected = [perm[k], perm[k + 3]];
            expected.sort_unstable();
            assert_eq!(pair, expected);
        }
    }

    #[test]
    fn parallel_and_sequential_agree_under_same_seed() {
        let balances: Vec<Wealth> = (1..=64).collect();
        let mut seq_agents = population(&balances);
        let mut par_agents = population(&balances);
        let mut seq = ExchangeEngine::new(64, CLASSIC, false);
        let mut par = ExchangeEngine::new(64, CLASSIC, true);
        let mut seq_rng = StdRng::seed_from_u64(77);
        let mut par_rng = StdRng::seed_from_u64(77);
        for _ in 0..50 {
            seq.play(&mut seq_agents, &mut seq_rng).unwrap();
            par.play(&mut par_agents, &mut par_rng).unwrap();
        }
        assert_eq!(seq_agents, par_agents);
    }

    #[test]
    fn full_loss_percentages_never_go_negative() {
        let params = ExchangeParams {
            gain_percent: 100,
            loss_percent: 100,
            stake_basis: StakeBasis::Richer,
        };
        let mut rng = StdRng::seed_from_u64(8);
        let mut agents = population(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut engine = ExchangeEngine::new(8, params, true);
        for _ in 0..500 {
            engine.play(&mut agents, &mut rng).unwrap();
            assert_eq!(total(&agents), 36);
        }
    }

    #[test]
    fn mismatched_population_is_an_error() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut agents = population(&[1, 2]);
        let mut engine = ExchangeEngine::new(4, CLASSIC, true);
        let err = engine.play(&mut agents, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::PopulationMismatch { expected: 4, actual: 2 }
        ));
    }

    #[test]
    fn history_grows_by_one_per_play() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut agents = population(&[100; 4]);
        let mut engine = ExchangeEngine::new(4, CLASSIC, true);
        engine.play(&mut agents, &mut rng).unwrap();
        engine.play(&mut agents, &mut rng).unwrap();
        for agent in &agents {
            assert_eq!(agent.history().len(), 3);
            assert_eq!(agent.history().last().copied(), Some(agent.wealth()));
        }
    }
}
