//! Round driver and termination monitor.
//!
//! The driver has two states, [`DriverStatus::Running`] and the terminal
//! [`DriverStatus::Halted`]. Each running step executes one round
//! (`plays_per_round` reshuffle-and-exchange passes), audits total wealth,
//! then scans the population for an agent at or above the oligarch
//! threshold. The first such agent halts the run; there is no other exit
//! condition, so adversarial parameters (for example equal gain and loss
//! on a very large population) can run for a long time.
//!
//! [`run_simulation`] wraps the driver in an async loop that hands a
//! [`WealthSnapshot`] to a [`RoundCallback`] after every round and paces
//! rounds with a frame interval. The core has no rendering dependency;
//! consumers decide what to do with snapshots.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;
use yardsale_ledger::{ConservationResult, LedgerAnomaly, verify_conservation};
use yardsale_types::{LeaderTrace, OligarchReport, WealthSnapshot};

use crate::clock::{self, ClockError, RoundClock};
use crate::exchange::ExchangeError;
use crate::state::SimulationState;

/// Rounds between periodic debug status lines.
const STATUS_LOG_INTERVAL: u64 = 100;

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A play failed.
    #[error("exchange error: {source}")]
    Exchange {
        /// The underlying exchange error.
        #[from]
        source: ExchangeError,
    },

    /// The round clock overflowed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// Total wealth changed during a round.
    #[error("conservation violated: {anomaly}")]
    Conservation {
        /// Details of the violation.
        anomaly: LedgerAnomaly,
    },
}

/// Driver state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverStatus {
    /// Rounds continue.
    Running,
    /// An oligarch was found. Terminal.
    Halted(OligarchReport),
}

/// Outcome of a single driver step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// No agent reached the threshold this round.
    Continue,
    /// An agent reached the threshold.
    Halted(OligarchReport),
}

/// Result of a complete run.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    /// The termination event.
    pub report: OligarchReport,
    /// The population at the moment the run halted.
    pub final_snapshot: WealthSnapshot,
}

/// Consumer of per-round snapshots.
///
/// Implementations can render charts, update dashboards, or forward
/// snapshots over a channel. Callbacks run on the driver's task between
/// rounds, so they should return quickly.
pub trait RoundCallback: Send {
    /// Called after each round that did not halt the run.
    fn on_round(&mut self, snapshot: &WealthSnapshot);

    /// Called once when the run halts.
    fn on_halt(&mut self, _report: &OligarchReport, _snapshot: &WealthSnapshot) {}
}

/// A no-op round callback for testing.
pub struct NoOpCallback;

impl RoundCallback for NoOpCallback {
    fn on_round(&mut self, _snapshot: &WealthSnapshot) {}
}

/// Owns the simulation state, its random source, and the round clock.
#[derive(Debug)]
pub struct RoundDriver<R> {
    state: SimulationState,
    rng: R,
    clock: RoundClock,
    run_id: Uuid,
    verify_conservation: bool,
    status: DriverStatus,
}

impl<R: Rng> RoundDriver<R> {
    /// Create a driver at round 0. The clock starts now.
    pub fn new(state: SimulationState, rng: R, verify_conservation: bool) -> Self {
        let clock = RoundClock::new(state.plays_per_round());
        Self {
            state,
            rng,
            clock,
            run_id: Uuid::now_v7(),
            verify_conservation,
            status: DriverStatus::Running,
        }
    }

    /// Execute one round and check for an oligarch.
    ///
    /// Once halted, further calls return the same report without running
    /// any more exchanges.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] if a play fails, the clock overflows, or the
    /// conservation audit finds drift.
    pub fn step(&mut self) -> Result<RoundOutcome, RunnerError> {
        if let DriverStatus::Halted(report) = &self.status {
            return Ok(RoundOutcome::Halted(report.clone()));
        }

        self.state.run_round(&mut self.rng)?;
        let round = self.clock.advance()?;

        if self.verify_conservation {
            let balances = self.state.agents().iter().map(|agent| agent.wealth());
            if let ConservationResult::Anomaly(anomaly) =
                verify_conservation(round, self.state.total_wealth(), balances)
            {
                return Err(RunnerError::Conservation { anomaly });
            }
        }

        if round % STATUS_LOG_INTERVAL == 0 {
            let leader_wealth = self
                .state
                .leader()
                .and_then(|id| self.state.agent(id))
                .map(|agent| agent.wealth());
            debug!(round, leader_wealth, threshold = self.state.oligarch_threshold(), "Round status");
        }

        let Some(agent_id) = self.state.find_oligarch() else {
            return Ok(RoundOutcome::Continue);
        };
        let Some(agent) = self.state.agent(agent_id) else {
            return Ok(RoundOutcome::Continue);
        };

        let report = OligarchReport {
            run_id: self.run_id,
            agent: agent_id,
            starting_wealth: agent.starting_wealth(),
            final_wealth: agent.wealth(),
            total_wealth: self.state.total_wealth(),
            threshold: self.state.oligarch_threshold(),
            rounds: round,
            plays: self.clock.total_plays()?,
            started_at: self.clock.started_at(),
            elapsed_ms: clock::millis(self.clock.elapsed()),
        };
        info!(
            run_id = %report.run_id,
            agent = %report.agent,
            starting_wealth = report.starting_wealth,
            final_wealth = report.final_wealth,
            total_wealth = report.total_wealth,
            rounds = report.rounds,
            "Oligarch found"
        );
        self.status = DriverStatus::Halted(report.clone());
        Ok(RoundOutcome::Halted(report))
    }

    /// Build a snapshot of the current population and reset the lap timer.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Clock`] if the play count overflows.
    pub fn snapshot(&mut self) -> Result<WealthSnapshot, RunnerError> {
        let total_plays = self.clock.total_plays()?;
        let leader = self
            .state
            .leader()
            .and_then(|id| self.state.agent(id).map(|agent| (id, agent)))
            .filter(|(_, agent)| !agent.history().is_empty())
            .map(|(id, agent)| LeaderTrace {
                agent: id,
                history: agent.history().to_vec(),
            });

        Ok(WealthSnapshot {
            round: self.clock.round(),
            population: self.state.population(),
            total_wealth: self.state.total_wealth(),
            plays_per_round: self.state.plays_per_round(),
            total_plays,
            elapsed_ms: clock::millis(self.clock.lap()),
            wealth: self.state.wealth(),
            leader,
        })
    }

    /// The simulation state.
    pub const fn state(&self) -> &SimulationState {
        &self.state
    }

    /// The current driver status.
    pub const fn status(&self) -> &DriverStatus {
        &self.status
    }

    /// The identifier stamped on this run's report.
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Completed rounds.
    pub const fn round(&self) -> u64 {
        self.clock.round()
    }
}

/// Run rounds until an oligarch emerges.
///
/// After each round that does not halt, the callback receives a snapshot
/// and the loop sleeps for `frame_interval` (skipped when zero). When the
/// run halts, the callback receives the report and a final snapshot.
///
/// # Errors
///
/// Returns [`RunnerError`] if a round fails unrecoverably.
pub async fn run_simulation<R: Rng>(
    driver: &mut RoundDriver<R>,
    callback: &mut dyn RoundCallback,
    frame_interval: Duration,
) -> Result<SimulationResult, RunnerError> {
    info!(
        run_id = %driver.run_id(),
        population = driver.state().population(),
        total_wealth = driver.state().total_wealth(),
        plays_per_round = driver.state().plays_per_round(),
        oligarch_threshold = driver.state().oligarch_threshold(),
        frame_interval_ms = clock::millis(frame_interval),
        "Simulation starting"
    );

    loop {
        match driver.step()? {
            RoundOutcome::Continue => {
                let snapshot = driver.snapshot()?;
                callback.on_round(&snapshot);
                if !frame_interval.is_zero() {
                    tokio::time::sleep(frame_interval).await;
                }
            }
            RoundOutcome::Halted(report) => {
                let final_snapshot = driver.snapshot()?;
                callback.on_halt(&report, &final_snapshot);
                return Ok(SimulationResult {
                    report,
                    final_snapshot,
                });
            }
        }
    }
}

/// Log the end of a run.
pub fn log_simulation_end(result: &SimulationResult) {
    let report = &result.report;
    info!(
        run_id = %report.run_id,
        agent = %report.agent,
        rounds = report.rounds,
        plays = report.plays,
        elapsed_ms = report.elapsed_ms,
        "Simulation ended"
    );
    if result.final_snapshot.leader.is_none() {
        warn!("Wealth history was not recorded; no leader trace available");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use yardsale_types::{AgentId, Wealth};

    use super::*;
    use crate::config::SimulationConfig;

    fn driver_from(balances: &[Wealth], config: &SimulationConfig) -> RoundDriver<StdRng> {
        let state = SimulationState::from_balances(config, balances).unwrap();
        RoundDriver::new(state, StdRng::seed_from_u64(42), true)
    }

    /// Counts callback invocations.
    #[derive(Default)]
    struct Recorder {
        rounds: Vec<u64>,
        halted: Option<OligarchReport>,
    }

    impl RoundCallback for Recorder {
        fn on_round(&mut self, snapshot: &WealthSnapshot) {
            self.rounds.push(snapshot.round);
        }

        fn on_halt(&mut self, report: &OligarchReport, _snapshot: &WealthSnapshot) {
            self.halted = Some(report.clone());
        }
    }

    #[test]
    fn step_halts_when_threshold_already_reached() {
        // Gain and loss of zero: nobody's wealth ever changes.
        let config = SimulationConfig {
            gain_percent: 0,
            loss_percent: 0,
            plays_per_round: 3,
            ..SimulationConfig::default()
        };
        let mut driver = driver_from(&[10, 960, 0, 30], &config);
        let RoundOutcome::Halted(report) = driver.step().unwrap() else {
            panic!("expected halt");
        };
        assert_eq!(report.agent, AgentId(1));
        assert_eq!(report.starting_wealth, 960);
        assert_eq!(report.final_wealth, 960);
        assert_eq!(report.total_wealth, 1000);
        assert_eq!(report.threshold, 950);
        assert_eq!(report.rounds, 1);
        assert_eq!(report.plays, 3);
        assert_eq!(report.run_id, driver.run_id());
    }

    #[test]
    fn halted_is_terminal() {
        let config = SimulationConfig {
            gain_percent: 0,
            loss_percent: 0,
            ..SimulationConfig::default()
        };
        let mut driver = driver_from(&[1000, 0], &config);
        let first = driver.step().unwrap();
        let second = driver.step().unwrap();
        assert_eq!(first, second);
        assert_eq!(driver.round(), 1);
        assert!(matches!(driver.status(), DriverStatus::Halted(_)));
    }

    #[test]
    fn step_continues_below_threshold() {
        let config = SimulationConfig {
            gain_percent: 0,
            loss_percent: 0,
            ..SimulationConfig::default()
        };
        let mut driver = driver_from(&[250; 4], &config);
        assert_eq!(driver.step().unwrap(), RoundOutcome::Continue);
        assert_eq!(driver.status(), &DriverStatus::Running);
        assert_eq!(driver.round(), 1);
    }

    #[test]
    fn snapshot_reflects_state() {
        let config = SimulationConfig {
            plays_per_round: 2,
            ..SimulationConfig::default()
        };
        let mut driver = driver_from(&[100; 4], &config);
        driver.step().unwrap();
        let snapshot = driver.snapshot().unwrap();
        assert_eq!(snapshot.round, 1);
        assert_eq!(snapshot.population, 4);
        assert_eq!(snapshot.total_wealth, 400);
        assert_eq!(snapshot.plays_per_round, 2);
        assert_eq!(snapshot.total_plays, 2);
        assert_eq!(snapshot.wealth.iter().sum::<Wealth>(), 400);
        let leader = snapshot.leader.as_ref().unwrap();
        assert_eq!(leader.history.len(), 3);
        assert_eq!(leader.history.last().copied(), Some(snapshot.max_wealth()));
    }

    #[test]
    fn snapshot_reports_play_count_overflow() {
        let mut driver = driver_from(&[100; 4], &SimulationConfig::default());
        driver.clock = RoundClock::at_round(u32::MAX, u64::MAX);
        let err = driver.snapshot().unwrap_err();
        assert!(matches!(
            err,
            RunnerError::Clock {
                source: ClockError::PlayOverflow { round: u64::MAX }
            }
        ));
    }

    #[test]
    fn snapshot_has_no_leader_without_history() {
        let config = SimulationConfig {
            record_history: false,
            ..SimulationConfig::default()
        };
        let mut driver = driver_from(&[100; 4], &config);
        driver.step().unwrap();
        assert!(driver.snapshot().unwrap().leader.is_none());
    }

    #[tokio::test]
    async fn run_simulation_reaches_an_oligarch() {
        // The richer agent takes everything the poorer holds and never
        // pays out, so wealth condenses within a handful of plays.
        let config = SimulationConfig {
            population: 4,
            per_capita_wealth: 100,
            plays_per_round: 10,
            gain_percent: 0,
            loss_percent: 100,
            oligarch_threshold_percent: 75,
            seed: Some(5),
            ..SimulationConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(5);
        let state = SimulationState::initialize(&config, &mut rng).unwrap();
        let mut driver = RoundDriver::new(state, rng, true);
        let mut recorder = Recorder::default();

        let result = run_simulation(&mut driver, &mut recorder, Duration::ZERO)
            .await
            .unwrap();

        let report = &result.report;
        assert!(report.final_wealth >= report.threshold);
        assert_eq!(report.total_wealth, 400);
        assert_eq!(report.threshold, 300);
        assert_eq!(report.starting_wealth, 100);
        assert_eq!(recorder.halted.as_ref(), Some(report));
        // Every round before the halting one produced a snapshot.
        let expected: Vec<u64> = (1..report.rounds).collect();
        assert_eq!(recorder.rounds, expected);
        assert_eq!(result.final_snapshot.round, report.rounds);
        assert_eq!(result.final_snapshot.wealth[report.agent.index()], report.final_wealth);
    }

    #[test]
    fn log_end_does_not_panic() {
        let config = SimulationConfig {
            gain_percent: 0,
            loss_percent: 0,
            ..SimulationConfig::default()
        };
        let mut driver = driver_from(&[1000, 0], &config);
        let RoundOutcome::Halted(report) = driver.step().unwrap() else {
            panic!("expected halt");
        };
        let final_snapshot = driver.snapshot().unwrap();
        log_simulation_end(&SimulationResult {
            report,
            final_snapshot,
        });
    }
}
