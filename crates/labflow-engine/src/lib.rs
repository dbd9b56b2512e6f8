//! Token-flow execution engine for labflow activities.
//!
//! [`ExecutionEngine::run`] interprets an activity stored in an
//! [`labflow_model::ObjectStore`]: it tracks queued tokens per edge, fires
//! enabled nodes one at a time and delegates primitive behaviors to a
//! [`BehaviorExecutor`]. [`ExecutionEngine::start`] hands out the same run as
//! an [`ActivityRun`] that the caller advances node by node.

pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod executor;
mod handlers;
pub mod stepwise;
pub mod tokens;
pub mod trace;

pub use config::*;
pub use engine::*;
pub use errors::*;
pub use events::*;
pub use executor::*;
pub use stepwise::*;
pub use tokens::*;
pub use trace::*;
