//! Crate-wide error type
//!
//! Behavioural error kinds for the decision engine: validation failures
//! reject a config/override before any state mutates,
//! `NotFound`/`Pending` are surfaced as HTTP statuses by the REST layer, and
//! `Unavailable`/`TransientInternal` degrade a session without ever unwinding
//! into a peer session.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed config or manual override; rejected before any session state changes.
    #[error("validation error: {0}")]
    Validation(String),

    /// Read for an unknown (namespace, name) pair.
    #[error("session {0}/{1} not found")]
    NotFound(String, String),

    /// Session exists but has not produced a first snapshot yet.
    #[error("session {0}/{1} is pending its first evaluation")]
    Pending(String, String),

    /// Forecast or metrics source unreachable or timed out.
    #[error("upstream source unavailable: {0}")]
    Unavailable(String),

    /// Recoverable failure during one evaluation cycle; the previous snapshot is kept.
    #[error("transient evaluation failure: {0}")]
    TransientInternal(String),

    /// Unrecoverable startup failure (bad bind address, missing required env var).
    #[error("fatal configuration error: {0}")]
    Fatal(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
