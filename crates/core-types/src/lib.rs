//! Shared primitives for the replypilot engine crates.

mod config;
mod gate;

pub use config::{DelayPlan, DelayRange, GuardPlan, PilotConfig, ScrollPlan};
pub use gate::RunGate;

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one interaction attempt, for log correlation.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AttemptId(pub String);

impl AttemptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized identity of one logical candidate. Stable across re-renders of
/// the same unit; the raw-to-normalized mapping lives in the progress store.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct CandidateKey(String);

impl CandidateKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CandidateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scope a progress record is keyed to: the canonical page identifier when
/// the page exposes one, else the navigable path.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ScopeKey(String);

impl ScopeKey {
    pub fn from_page(canonical: Option<&str>, path: &str) -> Self {
        match canonical {
            Some(id) if !id.is_empty() => Self(id.to_string()),
            _ => Self(path.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of one run. `Stopping` is one-way; pause/resume toggle between
/// `Running` and `Paused` without losing loop position.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunState {
    Idle,
    Running,
    Paused,
    Stopping,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// Stage reached by an interaction attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttemptStage {
    OpeningControl,
    Composing,
    GuardWaiting,
    Submitting,
    FallbackSubmitting,
    SecondaryAction,
    Committed,
    Failed,
}

impl fmt::Display for AttemptStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttemptStage::OpeningControl => "opening-control",
            AttemptStage::Composing => "composing",
            AttemptStage::GuardWaiting => "guard-waiting",
            AttemptStage::Submitting => "submitting",
            AttemptStage::FallbackSubmitting => "fallback-submitting",
            AttemptStage::SecondaryAction => "secondary-action",
            AttemptStage::Committed => "committed",
            AttemptStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What a run does with the candidates it discovers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunMode {
    /// Classify and reply.
    Reply,
    /// Scan-only pass adopting candidates that were already handled outside
    /// the tool (manual replies, engaged state).
    Backfill,
}
