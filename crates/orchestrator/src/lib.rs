//! Run lifecycle on top of the engine crates: discovery rounds, per-candidate
//! classification, the interaction flow, pacing, budgets, and operator
//! controls (pause, stop, reset).
//!
//! One orchestrator instance is bound to one page and one progress scope.
//! At most one run is active at a time; controls act on the active run and
//! are harmless when none is.

mod engine;
mod errors;

pub use engine::{Orchestrator, RunEnd, RunStats, RunSummary};
pub use errors::ControlError;
