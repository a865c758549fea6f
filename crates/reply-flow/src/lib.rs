//! The interaction state machine: drives one candidate through
//! open-control, compose, guard, submit (or fallback), optional secondary
//! action, and the commit decision.
//!
//! The flow is linear with one designed fallback branch. Any missing
//! control aborts the attempt without committing, so the candidate stays
//! eligible for a future run. A guard timeout is not an error; it routes to
//! the fallback submission trigger.

mod errors;
mod guard;
mod model;
mod runner;
mod tempo;

pub use errors::FlowError;
pub use guard::await_submit_ready;
pub use model::{AttemptReport, FlowPolicy};
pub use runner::execute;
pub use tempo::{build_typing_plan, TypingPlan, TypingStep};
