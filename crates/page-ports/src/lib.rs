//! Port traits over the host page: candidate enumeration and the controls
//! needed to act on one candidate.
//!
//! Everything site-specific (selectors, attribute heuristics) lives behind
//! these traits. The core only consumes the capability surface: list the
//! visible candidates, locate the acting controls, expand and scroll.

mod error;
mod memory;
mod ports;

pub use error::PageError;
pub use memory::{
    CandidateSpec, PageCounters, ScriptedPage, ScriptedPageBuilder, SubmitBehavior, Submission,
};
pub use ports::{
    CandidatePort, ComposerPort, ControlPort, Marker, PagePort, PageScope, SecondaryPort,
};
