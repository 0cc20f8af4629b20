//! Configuration loading and typed config structures for the Yardsale
//! simulation.
//!
//! The configuration lives in `yardsale-config.yaml`. This module defines
//! strongly-typed structs that mirror the YAML structure, a loader, and
//! [`SimulationConfig::validate`], which rejects parameter combinations the
//! simulation cannot run before anything is allocated.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use yardsale_types::{DistributionMode, StakeBasis, Wealth};

/// Config file read when [`CONFIG_ENV_VAR`] is not set.
pub const DEFAULT_CONFIG_PATH: &str = "yardsale-config.yaml";

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV_VAR: &str = "YARDSALE_CONFIG";

/// Environment variable that overrides `simulation.seed`.
pub const SEED_ENV_VAR: &str = "YARDSALE_SEED";

/// Populations above this size render without a frame delay.
const FAST_RENDER_POPULATION: usize = 3_000;

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is outside the range the simulation accepts.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `yardsale-config.yaml`. Every field has a
/// default matching the classic parameters (100 agents, $100 each, 20%
/// gain, 17% loss, 100 plays per round).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct YardsaleConfig {
    /// Simulation parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Snapshot pacing and chart dimensions.
    #[serde(default)]
    pub render: RenderConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl YardsaleConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// The `YARDSALE_SEED` environment variable overrides
    /// `simulation.seed`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if the seed override is not a number.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.simulation.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }
}

/// Parameters of the wealth-exchange model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Number of agents. Must be even and at least 2.
    #[serde(default = "default_population")]
    pub population: usize,

    /// Reshuffle-and-exchange passes per driver round.
    #[serde(default = "default_plays_per_round")]
    pub plays_per_round: u32,

    /// Percentage of the stake basis moved to the poorer agent when it wins.
    #[serde(default = "default_gain_percent")]
    pub gain_percent: u8,

    /// Percentage of the stake basis moved to the richer agent when it wins.
    #[serde(default = "default_loss_percent")]
    pub loss_percent: u8,

    /// Target starting wealth per agent; the total is this times the
    /// population.
    #[serde(default = "default_per_capita_wealth")]
    pub per_capita_wealth: Wealth,

    /// How starting wealth is assigned.
    #[serde(default)]
    pub distribution: DistributionMode,

    /// Share of total wealth (in percent) that makes an agent an oligarch.
    #[serde(default = "default_oligarch_threshold_percent")]
    pub oligarch_threshold_percent: u8,

    /// Which agent's wealth the gain/loss percentage applies to.
    #[serde(default)]
    pub stake_basis: StakeBasis,

    /// Whether every agent keeps its full wealth history.
    #[serde(default = "default_true")]
    pub record_history: bool,

    /// Whether the pairs of a play are processed on the rayon pool.
    #[serde(default = "default_true")]
    pub parallel_exchange: bool,

    /// Whether total wealth is audited after every round.
    #[serde(default = "default_true")]
    pub verify_conservation: bool,

    /// Random seed for reproducible runs; OS entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SimulationConfig {
    /// Check every parameter against the range the simulation accepts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population < 2 {
            return Err(invalid(format!(
                "population must be at least 2, got {}",
                self.population
            )));
        }
        if self.population % 2 != 0 {
            return Err(invalid(format!(
                "population must be even for pairing, got {}",
                self.population
            )));
        }
        if self.plays_per_round == 0 {
            return Err(invalid("plays_per_round must be at least 1".to_owned()));
        }
        if self.gain_percent > 100 {
            return Err(invalid(format!(
                "gain_percent must be within 0..=100, got {}",
                self.gain_percent
            )));
        }
        if self.loss_percent > 100 {
            return Err(invalid(format!(
                "loss_percent must be within 0..=100, got {}",
                self.loss_percent
            )));
        }
        if self.per_capita_wealth == 0 {
            return Err(invalid("per_capita_wealth must be positive".to_owned()));
        }
        if self.oligarch_threshold_percent == 0 || self.oligarch_threshold_percent > 100 {
            return Err(invalid(format!(
                "oligarch_threshold_percent must be within 1..=100, got {}",
                self.oligarch_threshold_percent
            )));
        }
        self.target_total()?;
        Ok(())
    }

    /// Total wealth the population is normalized to at initialization.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `population * per_capita_wealth`
    /// does not fit in [`Wealth`].
    pub fn target_total(&self) -> Result<Wealth, ConfigError> {
        let population = Wealth::try_from(self.population)
            .map_err(|_err| invalid("population exceeds the wealth range".to_owned()))?;
        population
            .checked_mul(self.per_capita_wealth)
            .ok_or_else(|| {
                invalid(format!(
                    "total wealth {} x {} overflows u64",
                    self.population, self.per_capita_wealth
                ))
            })
    }

    /// Override the seed with the `YARDSALE_SEED` environment variable when
    /// set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the variable is not a `u64`.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var(SEED_ENV_VAR) {
            let seed = val
                .trim()
                .parse::<u64>()
                .map_err(|e| invalid(format!("{SEED_ENV_VAR}={val} is not a u64: {e}")))?;
            self.seed = Some(seed);
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            population: default_population(),
            plays_per_round: default_plays_per_round(),
            gain_percent: default_gain_percent(),
            loss_percent: default_loss_percent(),
            per_capita_wealth: default_per_capita_wealth(),
            distribution: DistributionMode::default(),
            oligarch_threshold_percent: default_oligarch_threshold_percent(),
            stake_basis: StakeBasis::default(),
            record_history: true,
            parallel_exchange: true,
            verify_conservation: true,
            seed: None,
        }
    }
}

/// Snapshot pacing and chart dimensions for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenderConfig {
    /// Milliseconds to wait between rounds. When absent, 16 ms (about 60
    /// frames per second), or no delay for large populations.
    #[serde(default)]
    pub interval_ms: Option<u64>,

    /// Width of the text wealth chart in columns.
    #[serde(default = "default_chart_width")]
    pub chart_width: usize,

    /// Height of the text wealth chart in rows.
    #[serde(default = "default_chart_height")]
    pub chart_height: usize,
}

impl RenderConfig {
    /// Delay between rounds for a population of the given size.
    pub fn frame_interval(&self, population: usize) -> Duration {
        let ms = self.interval_ms.unwrap_or(if population > FAST_RENDER_POPULATION {
            0
        } else {
            default_interval_ms()
        });
        Duration::from_millis(ms)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            interval_ms: None,
            chart_width: default_chart_width(),
            chart_height: default_chart_height(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) used when `RUST_LOG` is
    /// not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Shorthand for a [`ConfigError::Invalid`].
const fn invalid(reason: String) -> ConfigError {
    ConfigError::Invalid { reason }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_population() -> usize {
    100
}

const fn default_plays_per_round() -> u32 {
    100
}

const fn default_gain_percent() -> u8 {
    20
}

const fn default_loss_percent() -> u8 {
    17
}

const fn default_per_capita_wealth() -> Wealth {
    100
}

const fn default_oligarch_threshold_percent() -> u8 {
    95
}

const fn default_interval_ms() -> u64 {
    1000 / 60
}

const fn default_chart_width() -> usize {
    80
}

const fn default_chart_height() -> usize {
    12
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}
