//! Activity graph model for executable laboratory protocols.
//!
//! Behaviors and activities are composed with [`ActivityBuilder`], checked with
//! [`validate`], and held in an [`ObjectStore`] that resolves cross-references
//! by identity.

pub mod activity;
pub mod behavior;
pub mod builder;
pub mod diagnostics;
pub mod errors;
pub mod ids;
pub mod lint;
pub mod memory;
pub mod store;

pub use activity::*;
pub use behavior::*;
pub use builder::*;
pub use diagnostics::*;
pub use errors::*;
pub use ids::*;
pub use lint::*;
pub use memory::*;
pub use store::*;
