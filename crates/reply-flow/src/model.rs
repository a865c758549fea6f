use chrono::{DateTime, Utc};

use replypilot_core_types::{AttemptId, AttemptStage, DelayPlan, GuardPlan, PilotConfig};

/// Flow-relevant slice of the run configuration.
#[derive(Clone, Debug)]
pub struct FlowPolicy {
    pub delays: DelayPlan,
    pub guard: GuardPlan,
    pub dry_run: bool,
    pub engage_after_reply: bool,
    pub require_engaged_to_commit: bool,
}

impl From<&PilotConfig> for FlowPolicy {
    fn from(cfg: &PilotConfig) -> Self {
        Self {
            delays: cfg.delays.clone(),
            guard: cfg.guard.clone(),
            dry_run: cfg.dry_run,
            engage_after_reply: cfg.engage_after_reply,
            require_engaged_to_commit: cfg.require_engaged_to_commit,
        }
    }
}

/// Outcome of one attempt that ran to completion (possibly via fallback).
#[derive(Clone, Debug)]
pub struct AttemptReport {
    pub attempt_id: AttemptId,
    /// Final stage; `Committed` only when the commit gate passed.
    pub stage: AttemptStage,
    /// A submission was performed (primary click or accepted fallback).
    pub submitted: bool,
    /// The key may be written to the progress store.
    pub committed: bool,
    pub fallback_used: bool,
    pub secondary_engaged: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub latency_ms: u64,
}

impl AttemptReport {
    pub fn new(attempt_id: AttemptId) -> Self {
        let now = Utc::now();
        Self {
            attempt_id,
            stage: AttemptStage::OpeningControl,
            submitted: false,
            committed: false,
            fallback_used: false,
            secondary_engaged: false,
            started_at: now,
            finished_at: now,
            latency_ms: 0,
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self.latency_ms = (self.finished_at - self.started_at).num_milliseconds().max(0) as u64;
        self
    }
}
