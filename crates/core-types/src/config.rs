//! Run configuration: pacing ranges, discovery bounds, behavior flags.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Inclusive millisecond range sampled fresh for every wait, so pacing never
/// repeats a fixed rhythm.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn sample(&self) -> Duration {
        let (lo, hi) = if self.min_ms <= self.max_ms {
            (self.min_ms, self.max_ms)
        } else {
            (self.max_ms, self.min_ms)
        };
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }

    /// Sleep for one sampled duration.
    pub async fn settle(&self) {
        tokio::time::sleep(self.sample()).await;
    }
}

/// Settle delays applied between interaction steps.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DelayPlan {
    /// Between consecutive steps of one attempt.
    pub between_actions: DelayRange,
    /// Cooldown after a completed attempt.
    pub between_replies: DelayRange,
    /// After a pass of expanding collapsed content.
    pub after_expand: DelayRange,
    /// Per character while inserting content.
    pub typing_per_char: DelayRange,
    /// After insertion, so the host page binds the new content.
    pub composer_settle: DelayRange,
}

impl Default for DelayPlan {
    fn default() -> Self {
        Self {
            between_actions: DelayRange::new(4_000, 9_000),
            between_replies: DelayRange::new(15_000, 30_000),
            after_expand: DelayRange::new(1_500, 3_000),
            typing_per_char: DelayRange::new(25, 60),
            composer_settle: DelayRange::new(250, 450),
        }
    }
}

/// Discovery bounds: how hard to look for more candidates and when to give
/// up on a mostly-processed thread.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScrollPlan {
    /// Scroll steps performed when a round surfaces nothing new.
    pub viewport_jumps: u32,
    /// Pause between scroll steps.
    pub pause: DelayRange,
    /// Hard cap on discovery rounds per run.
    pub max_rounds: u32,
    /// Consecutive rounds without new commitments before idle termination.
    pub idle_stop_after: u32,
    /// Expansion repetitions per round before enumerating.
    pub expand_passes: u32,
}

impl Default for ScrollPlan {
    fn default() -> Self {
        Self {
            viewport_jumps: 1,
            pause: DelayRange::new(500, 900),
            max_rounds: 80,
            idle_stop_after: 12,
            expand_passes: 4,
        }
    }
}

/// Bounded readiness poll ahead of submission.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GuardPlan {
    pub poll_interval_ms: u64,
    pub submit_timeout_ms: u64,
}

impl Default for GuardPlan {
    fn default() -> Self {
        Self {
            poll_interval_ms: 60,
            submit_timeout_ms: 2_500,
        }
    }
}

/// Full run configuration. Message templates, interest keywords and the
/// secondary-action flags are configuration, not separate code paths.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PilotConfig {
    /// Reply templates; one is picked uniformly per attempt.
    pub templates: Vec<String>,
    /// Case-insensitive substring predicate. Empty set matches nothing.
    pub keywords: Vec<String>,
    /// Per-run throttle, not an overall limit.
    pub max_actions_per_run: u32,
    /// Adopt candidates the operator already replied to manually.
    pub adopt_own_reply: bool,
    /// Adopt candidates whose secondary control already reports engaged.
    pub adopt_engaged: bool,
    /// Trigger the secondary action after a successful submission.
    pub engage_after_reply: bool,
    /// Commit only when the secondary control reports engaged afterwards.
    pub require_engaged_to_commit: bool,
    /// End the run on the first failed attempt instead of continuing.
    pub stop_on_error: bool,
    /// Rehearse selection and pacing without touching the page.
    pub dry_run: bool,
    /// Persist every N adoptions during scan-heavy passes.
    pub persist_every: u32,
    pub delays: DelayPlan,
    pub scroll: ScrollPlan,
    pub guard: GuardPlan,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            templates: Vec::new(),
            keywords: Vec::new(),
            max_actions_per_run: 30,
            adopt_own_reply: true,
            adopt_engaged: false,
            engage_after_reply: true,
            require_engaged_to_commit: false,
            stop_on_error: false,
            dry_run: false,
            persist_every: 25,
            delays: DelayPlan::default(),
            scroll: ScrollPlan::default(),
            guard: GuardPlan::default(),
        }
    }
}
