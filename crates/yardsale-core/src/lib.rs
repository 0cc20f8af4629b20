//! Simulation core for the Yardsale wealth-exchange model.
//!
//! A population of agents repeatedly pairs off at random and exchanges
//! wealth on a biased coin flip. Over time wealth concentrates until one
//! agent (the oligarch) holds a configured share of it, at which point the
//! driver halts.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `yardsale-config.yaml` into
//!   strongly-typed, validated structs.
//! - [`clock`] -- Round counter and snapshot timing.
//! - [`shuffle`] -- Durstenfeld Fisher-Yates permutation of agent indices.
//! - [`exchange`] -- Pairwise exchange rule and the parallel play engine.
//! - [`state`] -- [`SimulationState`]: agents, wealth history, thresholds,
//!   and initialization.
//! - [`runner`] -- Round driver, oligarch detection, and the
//!   [`RoundCallback`] snapshot seam.
//!
//! [`SimulationState`]: state::SimulationState
//! [`RoundCallback`]: runner::RoundCallback

pub mod clock;
pub mod config;
pub mod exchange;
pub mod runner;
pub mod shuffle;
pub mod state;
