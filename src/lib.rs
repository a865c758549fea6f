//! Facade over the replypilot engine crates.
//!
//! Wiring lives here: a [`Session`] binds a page adapter and a storage
//! partition to the orchestrator, spawns runs on the tokio runtime, and maps
//! keyboard shortcuts onto the control surface. The engine itself lives in
//! the workspace crates, re-exported below.

mod session;

pub use session::Session;

pub use replypilot_classifier::{AdoptReason, Decision, SkipReason};
pub use replypilot_core_types::{
    AttemptStage, CandidateKey, DelayPlan, DelayRange, GuardPlan, PilotConfig, RunMode, RunState,
    ScopeKey, ScrollPlan,
};
pub use replypilot_orchestrator::{ControlError, Orchestrator, RunEnd, RunStats, RunSummary};
pub use replypilot_page_ports::{
    CandidatePort, ComposerPort, ControlPort, Marker, PageError, PagePort, PageScope,
    ScriptedPage, SecondaryPort,
};
pub use replypilot_progress_store::{DirStorage, MemoryStorage, ProgressStore, StoragePort};
pub use replypilot_reply_flow::{AttemptReport, FlowError};

/// Install the process-wide tracing subscriber. Filter via `RUST_LOG`,
/// defaulting to `info`. Safe to call more than once.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
