use crate::TokenSnapshot;
use labflow_model::{ObjectId, StoreError, ValidationError};
use serde_json::Value;
use thiserror::Error;

/// Failure signal raised by a primitive behavior.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BehaviorError {
    #[error("no implementation registered for behavior '{0}'")]
    Unregistered(String),
    #[error("invalid input '{name}': {message}")]
    InvalidInput { name: String, message: String },
    #[error("behavior failed: {0}")]
    Failed(String),
}

impl BehaviorError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("node '{node}' is missing required value(s): {}", .names.join(", "))]
    MissingRequiredValue {
        node: ObjectId,
        names: Vec<String>,
        tokens: TokenSnapshot,
    },
    #[error("decision '{node}' has no outflow matching {value} and no else outflow")]
    AmbiguousDecision {
        node: ObjectId,
        value: Value,
        tokens: TokenSnapshot,
    },
    #[error("call '{node}' to behavior '{behavior}' failed: {source}")]
    SubworkflowInvocation {
        node: ObjectId,
        behavior: String,
        #[source]
        source: BehaviorError,
        tokens: TokenSnapshot,
    },
    #[error("malformed run: {message}")]
    MalformedRun {
        message: String,
        tokens: TokenSnapshot,
    },
    #[error("run exceeded the limit of {limit} steps")]
    StepLimitExceeded { limit: usize, tokens: TokenSnapshot },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ExecutionError {
    /// Tokens queued when the run failed, if the failure happened mid-run.
    pub fn tokens(&self) -> Option<&TokenSnapshot> {
        match self {
            Self::MissingRequiredValue { tokens, .. }
            | Self::AmbiguousDecision { tokens, .. }
            | Self::SubworkflowInvocation { tokens, .. }
            | Self::MalformedRun { tokens, .. }
            | Self::StepLimitExceeded { tokens, .. } => Some(tokens),
            Self::Store(_) | Self::Validation(_) => None,
        }
    }
}
