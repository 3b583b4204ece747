//! Error types for the selection engine.
//!
//! Load-time problems that only drop a fragment (an invalid scheme, a bad
//! response code, excess groups) are reported as `tracing` warnings, not
//! errors; only whole-strategy rejection and runtime exhaustion surface here.

use thiserror::Error;

/// Result type alias for the selection engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the selection engine.
#[derive(Error, Debug)]
pub enum Error {
    /// A strategy could not be constructed from its configuration.
    ///
    /// The strategy is dropped; the rest of the configuration proceeds.
    #[error("strategy '{strategy}' rejected: {reason}")]
    ConfigRejected {
        /// Name of the rejected strategy, or `<unnamed>` if the name
        /// itself could not be read.
        strategy: String,
        /// What made the configuration unusable.
        reason: String,
    },

    /// The strategy document could not be parsed at all.
    #[error("config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// No parent is available for the current attempt.
    ///
    /// The caller decides whether to bypass to origin or fail the
    /// transaction, per the strategy's `go_direct` setting.
    #[error("no parent available")]
    NoParentAvailable,
}
