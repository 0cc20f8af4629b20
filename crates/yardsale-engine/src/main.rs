//! Engine binary for the Yardsale simulation.
//!
//! Wires configuration, seeding, the round driver, and the snapshot
//! renderer together, runs until an oligarch emerges, and prints the
//! termination report as JSON on stdout. Logs and charts go to stderr.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `yardsale-config.yaml` (or `YARDSALE_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Seed the random source
//! 4. Build and normalize the population
//! 5. Start the renderer task behind a bounded channel
//! 6. Run rounds until an agent crosses the threshold
//! 7. Log the result and print the report

mod callback;
mod error;
mod render;

use std::path::PathBuf;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use yardsale_core::config::{CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH, YardsaleConfig};
use yardsale_core::runner::{self, RoundDriver};
use yardsale_core::state::SimulationState;

use crate::callback::ChannelCallback;
use crate::error::EngineError;

/// Snapshots buffered between the round loop and the renderer.
const FRAME_BUFFER: usize = 4;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step or the simulation itself fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging depends on it, so nothing is logged
    //    until the subscriber is installed.
    let (config, config_path) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging.level)?;
    info!("yardsale-engine starting");
    match &config_path {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("Config file not found, using defaults"),
    }
    let sim = &config.simulation;
    info!(
        population = sim.population,
        plays_per_round = sim.plays_per_round,
        gain_percent = sim.gain_percent,
        loss_percent = sim.loss_percent,
        per_capita_wealth = sim.per_capita_wealth,
        distribution = ?sim.distribution,
        stake_basis = ?sim.stake_basis,
        seed = ?sim.seed,
        "Simulation parameters"
    );

    // 3. Seed the random source.
    let mut rng = sim
        .seed
        .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

    // 4. Build the population.
    let state = SimulationState::initialize(sim, &mut rng).map_err(EngineError::from)?;
    let frame_interval = config.render.frame_interval(state.population());
    let mut driver = RoundDriver::new(state, rng, sim.verify_conservation);

    // 5. Start the renderer.
    let (frames_tx, frames_rx) = mpsc::channel(FRAME_BUFFER);
    let render_config = config.render.clone();
    let renderer =
        tokio::spawn(async move { render::run_renderer(frames_rx, &render_config).await });
    let mut callback = ChannelCallback::new(frames_tx);

    // 6. Run the simulation.
    let result = runner::run_simulation(&mut driver, &mut callback, frame_interval)
        .await
        .map_err(EngineError::from)?;

    // Closing the channel lets the renderer drain and exit. The final frame
    // is drawn here, after every queued round, so it is never dropped.
    let dropped = callback.dropped();
    drop(callback);
    let drawn = renderer.await.map_err(EngineError::from)?;
    render::draw_final(&result.final_snapshot, &config.render);

    // 7. Log and print results.
    runner::log_simulation_end(&result);
    info!(
        report = %result.report,
        frames_drawn = drawn,
        frames_dropped = dropped,
        "yardsale-engine shutdown complete"
    );

    let json = serde_json::to_string_pretty(&result.report).map_err(EngineError::from)?;
    println!("{json}");

    Ok(())
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the configured level applies.
fn init_tracing(level: &str) -> Result<(), EngineError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| EngineError::Logging {
            filter: level.to_owned(),
            message: e.to_string(),
        })?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Load configuration from `YARDSALE_CONFIG` or `yardsale-config.yaml`.
///
/// A missing file means defaults; the seed environment override still
/// applies. Returns the path that was read, if any.
fn load_config() -> Result<(YardsaleConfig, Option<PathBuf>), EngineError> {
    let path = std::env::var_os(CONFIG_ENV_VAR)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if path.exists() {
        let config = YardsaleConfig::from_file(&path)?;
        Ok((config, Some(path)))
    } else {
        let mut config = YardsaleConfig::default();
        config.simulation.apply_env_overrides()?;
        Ok((config, None))
    }
}
