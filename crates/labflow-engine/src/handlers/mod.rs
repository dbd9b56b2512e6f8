//! Enablement and firing rules, one module per family of node kinds.
//!
//! Each module extends the run state with the checks and firing steps for its
//! node kinds; the engine dispatches on [`labflow_model::NodeKind`].

mod action;
mod control;
mod decision;
mod parameter;
