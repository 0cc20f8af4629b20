//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup and the simulation run.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: yardsale_core::config::ConfigError,
    },

    /// Population initialization failed.
    #[error("state error: {source}")]
    State {
        /// The underlying state error.
        #[from]
        source: yardsale_core::state::StateError,
    },

    /// Simulation runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: yardsale_core::runner::RunnerError,
    },

    /// The logging filter could not be built.
    #[error("invalid log filter {filter:?}: {message}")]
    Logging {
        /// The filter directive that failed to parse.
        filter: String,
        /// Description of the parse failure.
        message: String,
    },

    /// The final report could not be serialized.
    #[error("report serialization failed: {source}")]
    Report {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// The renderer task panicked or was cancelled.
    #[error("renderer task failed: {source}")]
    Renderer {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },
}
