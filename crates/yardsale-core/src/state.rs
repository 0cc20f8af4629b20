//! Simulation state: the population, its wealth, and derived thresholds.
//!
//! [`SimulationState`] owns every [`Agent`] exclusively. The exchange
//! engine borrows disjoint pairs of agents for the duration of one play;
//! the driver reads aggregate state only between plays, after every pair
//! has been settled.
//!
//! # Initialization
//!
//! - `equal`: every agent starts with exactly the per-capita target.
//! - `randomized`: every agent draws uniformly from `[1, per_capita]`.
//!
//! Either way, the population is then normalized: while the total is below
//! `population * per_capita`, a uniformly random agent gains one unit. The
//! bumps skew the randomized distribution slightly upward for whichever
//! agents are picked; that normalization is intentional and kept as is.
//! The loop runs once per missing unit, so randomized populations with a
//! very large per-capita target take proportionally long to initialize.

use rand::Rng;
use tracing::{debug, info};
use yardsale_ledger::Transfer;
use yardsale_types::{AgentId, DistributionMode, Wealth};

use crate::config::{ConfigError, SimulationConfig};
use crate::exchange::{self, ExchangeEngine, ExchangeError, ExchangeParams};

/// Errors that can occur while building the simulation state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The configuration was rejected.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// Explicit starting balances sum past `u64::MAX`.
    #[error("starting wealth of {population} agents overflows u64")]
    TotalOverflow {
        /// Number of balances supplied.
        population: usize,
    },
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// One simulated economic actor.
///
/// When history is recorded, the last history entry always equals the
/// current wealth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    wealth: Wealth,
    starting_wealth: Wealth,
    history: Option<Vec<Wealth>>,
}

impl Agent {
    /// Create an agent holding `wealth`, optionally recording history.
    pub fn new(wealth: Wealth, record_history: bool) -> Self {
        Self {
            wealth,
            starting_wealth: wealth,
            history: record_history.then(|| vec![wealth]),
        }
    }

    /// Current wealth.
    pub const fn wealth(&self) -> Wealth {
        self.wealth
    }

    /// Wealth held before the first round.
    pub const fn starting_wealth(&self) -> Wealth {
        self.starting_wealth
    }

    /// Every wealth value held, oldest first. Empty when history is off.
    pub fn history(&self) -> &[Wealth] {
        self.history.as_deref().unwrap_or_default()
    }

    /// Set the wealth after an exchange and append it to the history.
    pub(crate) fn settle(&mut self, wealth: Wealth) {
        self.wealth = wealth;
        if let Some(history) = self.history.as_mut() {
            history.push(wealth);
        }
    }

    /// Add one unit during normalization. The starting wealth and the
    /// initial history entry follow, since no exchange has happened yet.
    fn bump(&mut self) {
        self.wealth = self.wealth.saturating_add(1);
        self.starting_wealth = self.wealth;
        if let Some(history) = self.history.as_mut() {
            history.clear();
            history.push(self.wealth);
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// The population, the exchange engine and its buffers, and the scalar
/// parameters derived at initialization.
#[derive(Debug)]
pub struct SimulationState {
    agents: Vec<Agent>,
    engine: ExchangeEngine,
    plays_per_round: u32,
    total_wealth: Wealth,
    oligarch_threshold: Wealth,
}

impl SimulationState {
    /// Build the population described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Config`] if the configuration is invalid.
    pub fn initialize<R: Rng + ?Sized>(
        config: &SimulationConfig,
        rng: &mut R,
    ) -> Result<Self, StateError> {
        config.validate()?;
        let target = config.target_total()?;
        let population = config.population;

        let mut agents: Vec<Agent> = (0..population)
            .map(|_| {
                let wealth = match config.distribution {
                    DistributionMode::Equal => config.per_capita_wealth,
                    DistributionMode::Randomized => {
                        rng.random_range(1..=config.per_capita_wealth)
                    }
                };
                Agent::new(wealth, config.record_history)
            })
            .collect();

        // Each draw is at most per_capita, so the sum cannot exceed target.
        let mut total: Wealth = agents
            .iter()
            .fold(0, |acc, agent| acc.saturating_add(agent.wealth()));
        let deficit = target.saturating_sub(total);
        while total < target {
            if let Some(agent) = agents.get_mut(rng.random_range(0..population)) {
                agent.bump();
                total = total.saturating_add(1);
            }
        }
        debug!(deficit, "Normalized starting wealth");

        let state = Self::assemble(config, agents, total);
        info!(
            population,
            total_wealth = state.total_wealth,
            oligarch_threshold = state.oligarch_threshold,
            distribution = ?config.distribution,
            "Simulation state initialized"
        );
        Ok(state)
    }

    /// Build a state from explicit starting balances, without normalization.
    ///
    /// The population is `balances.len()`; `config.population` and
    /// `config.per_capita_wealth` are ignored. The total wealth is the sum
    /// of the balances.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Config`] if the remaining parameters or the
    /// population size are invalid, or [`StateError::TotalOverflow`] if the
    /// balances sum past `u64::MAX`.
    pub fn from_balances(
        config: &SimulationConfig,
        balances: &[Wealth],
    ) -> Result<Self, StateError> {
        let checked = SimulationConfig {
            population: balances.len(),
            per_capita_wealth: 1,
            ..config.clone()
        };
        checked.validate()?;

        let total = balances
            .iter()
            .try_fold(0, |acc: Wealth, w| acc.checked_add(*w))
            .ok_or(StateError::TotalOverflow {
                population: balances.len(),
            })?;
        let agents = balances
            .iter()
            .map(|&w| Agent::new(w, config.record_history))
            .collect();
        Ok(Self::assemble(config, agents, total))
    }

    fn assemble(config: &SimulationConfig, agents: Vec<Agent>, total_wealth: Wealth) -> Self {
        let params = ExchangeParams {
            gain_percent: config.gain_percent,
            loss_percent: config.loss_percent,
            stake_basis: config.stake_basis,
        };
        Self {
            engine: ExchangeEngine::new(agents.len(), params, config.parallel_exchange),
            agents,
            plays_per_round: config.plays_per_round,
            total_wealth,
            oligarch_threshold: exchange::percent_of(
                total_wealth,
                config.oligarch_threshold_percent,
            ),
        }
    }

    // -----------------------------------------------------------------------
    // Exchange
    // -----------------------------------------------------------------------

    /// Run one play: reshuffle, then settle every pair.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError`] if the engine's buffers disagree with the
    /// population (never expected for a state built by this module).
    pub fn play<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), ExchangeError> {
        self.engine.play(&mut self.agents, rng)
    }

    /// Run one play and return a transfer record per pair, in pair order.
    ///
    /// # Errors
    ///
    /// See [`play`](Self::play).
    pub fn play_recorded<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<Vec<Transfer>, ExchangeError> {
        self.engine.play_recorded(&mut self.agents, rng)
    }

    /// Run one full round: `plays_per_round` plays.
    ///
    /// # Errors
    ///
    /// See [`play`](Self::play).
    pub fn run_round<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), ExchangeError> {
        for _ in 0..self.plays_per_round {
            self.play(rng)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Return the first agent (lowest index) at or above the oligarch
    /// threshold.
    pub fn find_oligarch(&self) -> Option<AgentId> {
        self.agents
            .iter()
            .position(|agent| agent.wealth() >= self.oligarch_threshold)
            .map(AgentId)
    }

    /// Return the richest agent, ties going to the lowest index.
    pub fn leader(&self) -> Option<AgentId> {
        self.agents
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, Wealth)>, (index, agent)| match best {
                Some((_, top)) if top >= agent.wealth() => best,
                _ => Some((index, agent.wealth())),
            })
            .map(|(index, _)| AgentId(index))
    }

    /// Return every agent, ordered by index.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Return one agent.
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id.index())
    }

    /// Return the current wealth of every agent, ordered by index.
    pub fn wealth(&self) -> Vec<Wealth> {
        self.agents.iter().map(Agent::wealth).collect()
    }

    /// Number of agents.
    pub const fn population(&self) -> usize {
        self.agents.len()
    }

    /// Plays per driver round.
    pub const fn plays_per_round(&self) -> u32 {
        self.plays_per_round
    }

    /// Total wealth, fixed at initialization.
    pub const fn total_wealth(&self) -> Wealth {
        self.total_wealth
    }

    /// Wealth at which an agent becomes an oligarch.
    pub const fn oligarch_threshold(&self) -> Wealth {
        self.oligarch_threshold
    }
}
