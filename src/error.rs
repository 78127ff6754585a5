//! Error types for the serving core.
//!
//! CLI orchestration (main.rs and the command modules) stays on `anyhow`;
//! the library surface uses this typed enum so callers can tell "no data"
//! from "bad input" from "dependency failure".

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Matching was requested before an index snapshot was loaded.
    /// Fatal for the request, recoverable by building or loading a snapshot.
    #[error("story index not loaded; build or load a snapshot first")]
    IndexNotLoaded,

    /// A persisted risk model does not line up with the running predictor
    /// (feature order or coefficient shape mismatch). Fatal: predicting
    /// through misaligned columns would silently mis-score.
    #[error("risk model incompatible: {0}")]
    ModelIncompatible(String),

    /// The external conversational reply service failed. Surfaced to the
    /// caller immediately; the core never retries.
    #[error("chat service unavailable: {0}")]
    ChatServiceUnavailable(String),

    /// Input rejected before any computation (oversized text,
    /// out-of-range parameters, empty chat message).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The embedding provider failed or returned malformed vectors.
    #[error("embedding provider error: {0}")]
    Embedding(String),

    /// An index snapshot exists but cannot be read back coherently
    /// (missing metadata, vector length disagreeing with recorded dims).
    #[error("index snapshot corrupt: {0}")]
    Snapshot(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
