//! Error types for the personalization engine.
//!
//! Structured variants via thiserror; controllers and workers wrap these in
//! `anyhow::Result` at the seams. None of these are allowed to take down the
//! host process: callers either recover locally or degrade to defaults.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// A required collaborator was not wired up. Callers return conservative
    /// defaults instead of propagating this to the user.
    #[error("required collaborator unavailable: {0}")]
    DependencyUnavailable(&'static str),

    /// Model generation ran past its soft latency budget. The partial
    /// candidate set produced so far is still valid.
    #[error("model generation exceeded {budget_ms}ms after {generated} candidates")]
    GenerationTimeout { budget_ms: u64, generated: usize },

    /// A single opportunity's handler failed. Caught per-opportunity so the
    /// rest of the batch continues.
    #[error("adaptation handler failed: {0}")]
    ExecutionFailure(String),

    /// No baseline/current metrics at monitoring time; the evaluation is
    /// retried on the next tick rather than misclassified.
    #[error("no metrics available to evaluate adaptation {0}")]
    EvaluationDataMissing(String),

    #[error("invalid adaptation state transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
