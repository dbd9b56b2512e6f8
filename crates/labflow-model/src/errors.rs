use crate::{Diagnostic, Direction, ObjectId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("dangling reference: '{0}' does not resolve to a stored object")]
    DanglingReference(ObjectId),
    #[error("object '{0}' is already stored with different content")]
    Conflict(ObjectId),
    #[error("object '{id}' is a {actual}, expected {expected}")]
    WrongKind {
        id: ObjectId,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Fatal errors raised while composing an activity.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("behavior '{behavior}' has no input parameter named {}", quote_all(.names))]
    UnmatchedParameter { behavior: String, names: Vec<String> },
    #[error("{role} '{object}' is not a member of activity '{activity}'")]
    NotAMember {
        activity: ObjectId,
        object: ObjectId,
        role: &'static str,
    },
    #[error("behavior '{behavior}' already has an {direction} parameter named '{name}'")]
    DuplicateParameter {
        behavior: String,
        name: String,
        direction: Direction,
    },
    #[error("invalid graph: {0}")]
    InvalidGraph(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("validation failed with {errors_count} error(s)")]
pub struct ValidationError {
    pub diagnostics: Vec<Diagnostic>,
    pub errors_count: usize,
}

impl ValidationError {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        let errors_count = diagnostics.iter().filter(|d| d.is_error()).count();
        Self {
            diagnostics,
            errors_count,
        }
    }
}

fn quote_all(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("'{name}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
