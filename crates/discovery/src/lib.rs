//! Candidate discovery over lazily loaded content.
//!
//! The host page renders candidates incrementally behind scrolling and
//! "load more" style controls, so one enumeration pass never sees the whole
//! tree. The driver runs bounded rounds of expand-enumerate-scroll and
//! terminates on either a hard round cap or a run of rounds that commit
//! nothing new.

use std::sync::Arc;

use tracing::{debug, instrument};

use replypilot_core_types::{DelayRange, PilotConfig, ScrollPlan};
use replypilot_page_ports::{CandidatePort, PageError, PagePort};

/// Discovery-relevant slice of the run configuration.
#[derive(Clone, Debug)]
pub struct DiscoveryPolicy {
    pub scroll: ScrollPlan,
    pub after_expand: DelayRange,
}

impl From<&PilotConfig> for DiscoveryPolicy {
    fn from(cfg: &PilotConfig) -> Self {
        Self {
            scroll: cfg.scroll.clone(),
            after_expand: cfg.delays.after_expand,
        }
    }
}

/// Verdict after one discovery round.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RoundStatus {
    Continue,
    /// Too many consecutive rounds without a new commitment.
    IdleStop,
    /// Hard cap on rounds for this run.
    RoundLimit,
}

/// Stateful per-run discovery loop. One instance per run; the round and
/// idle counters are not meaningful across runs.
pub struct DiscoveryDriver {
    page: Arc<dyn PagePort>,
    policy: DiscoveryPolicy,
    rounds: u32,
    idle_rounds: u32,
    last_progress: Option<u64>,
    scrolled_this_round: bool,
}

impl DiscoveryDriver {
    pub fn new(page: Arc<dyn PagePort>, policy: DiscoveryPolicy) -> Self {
        Self {
            page,
            policy,
            rounds: 0,
            idle_rounds: 0,
            last_progress: None,
            scrolled_this_round: false,
        }
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Expand collapsed content, then enumerate the currently visible
    /// candidates. An empty enumeration triggers one scroll pass before
    /// returning, so the next round sees newly surfaced content.
    #[instrument(skip_all, fields(round = self.rounds + 1))]
    pub async fn open_round(&mut self) -> Result<Vec<Arc<dyn CandidatePort>>, PageError> {
        self.rounds += 1;
        self.scrolled_this_round = false;

        for _ in 0..self.policy.scroll.expand_passes {
            let performed = self.page.expand_collapsed().await?;
            if performed == 0 {
                break;
            }
            debug!(performed, "expanded collapsed content");
            self.policy.after_expand.settle().await;
        }

        let candidates = self.page.list_candidates().await?;
        if candidates.is_empty() {
            debug!("no candidates visible, scrolling for more");
            self.scroll_pass().await?;
            self.scrolled_this_round = true;
        }
        Ok(candidates)
    }

    /// Close the round with `committed_total`, a monotone count of
    /// commitments made so far this run. A round that moved the count resets
    /// the idle streak; a stale round scrolls (unless `open_round` already
    /// did) and lengthens it.
    pub async fn close_round(&mut self, committed_total: u64) -> Result<RoundStatus, PageError> {
        let progressed = self
            .last_progress
            .map_or(committed_total > 0, |p| committed_total > p);
        self.last_progress = Some(committed_total);

        if progressed {
            self.idle_rounds = 0;
        } else {
            self.idle_rounds += 1;
            if !self.scrolled_this_round {
                self.scroll_pass().await?;
            }
        }

        if self.idle_rounds >= self.policy.scroll.idle_stop_after {
            debug!(idle_rounds = self.idle_rounds, "discovery idle, stopping");
            return Ok(RoundStatus::IdleStop);
        }
        if self.rounds >= self.policy.scroll.max_rounds {
            debug!(rounds = self.rounds, "discovery round cap reached");
            return Ok(RoundStatus::RoundLimit);
        }
        Ok(RoundStatus::Continue)
    }

    async fn scroll_pass(&self) -> Result<(), PageError> {
        for _ in 0..self.policy.scroll.viewport_jumps {
            self.page.scroll_for_more().await?;
            self.policy.scroll.pause.settle().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use replypilot_page_ports::{CandidateSpec, ScriptedPage};

    use super::*;

    fn fast_policy() -> DiscoveryPolicy {
        DiscoveryPolicy {
            scroll: ScrollPlan {
                viewport_jumps: 1,
                pause: DelayRange::new(0, 1),
                max_rounds: 10,
                idle_stop_after: 3,
                expand_passes: 4,
            },
            after_expand: DelayRange::new(0, 1),
        }
    }

    #[tokio::test]
    async fn expansion_stops_once_nothing_expands() {
        let page = Arc::new(
            ScriptedPage::builder()
                .candidate(CandidateSpec::new("c1", "a"))
                .expansions([2, 1])
                .build(),
        );
        let mut driver = DiscoveryDriver::new(page.clone(), fast_policy());
        let candidates = driver.open_round().await.unwrap();
        assert_eq!(candidates.len(), 1);
        // Two scripted passes plus the empty one that ends the loop.
        assert_eq!(page.counters().expansion_calls, 3);
    }

    #[tokio::test]
    async fn empty_enumeration_scrolls_before_the_next_round() {
        let page = Arc::new(
            ScriptedPage::builder()
                .candidate(CandidateSpec::new("c1", "a"))
                .initially_visible(0)
                .reveal_per_scroll(1)
                .build(),
        );
        let mut driver = DiscoveryDriver::new(page.clone(), fast_policy());

        let first = driver.open_round().await.unwrap();
        assert!(first.is_empty());
        assert_eq!(page.counters().scroll_steps, 1);
        assert_eq!(driver.close_round(0).await.unwrap(), RoundStatus::Continue);
        // The stale close does not scroll again in the same round.
        assert_eq!(page.counters().scroll_steps, 1);

        let second = driver.open_round().await.unwrap();
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn idle_rounds_accumulate_into_a_stop() {
        let page = Arc::new(
            ScriptedPage::builder()
                .candidate(CandidateSpec::new("c1", "a"))
                .build(),
        );
        let mut driver = DiscoveryDriver::new(page.clone(), fast_policy());

        for _ in 0..2 {
            driver.open_round().await.unwrap();
            assert_eq!(driver.close_round(0).await.unwrap(), RoundStatus::Continue);
        }
        driver.open_round().await.unwrap();
        assert_eq!(driver.close_round(0).await.unwrap(), RoundStatus::IdleStop);
        // Each stale round scrolled looking for fresh content.
        assert_eq!(page.counters().scroll_steps, 3);
    }

    #[tokio::test]
    async fn progress_resets_the_idle_streak() {
        let page = Arc::new(
            ScriptedPage::builder()
                .candidate(CandidateSpec::new("c1", "a"))
                .build(),
        );
        let mut driver = DiscoveryDriver::new(page, fast_policy());

        driver.open_round().await.unwrap();
        assert_eq!(driver.close_round(0).await.unwrap(), RoundStatus::Continue);
        driver.open_round().await.unwrap();
        assert_eq!(driver.close_round(0).await.unwrap(), RoundStatus::Continue);
        driver.open_round().await.unwrap();
        // A commitment landed this round.
        assert_eq!(driver.close_round(1).await.unwrap(), RoundStatus::Continue);
        driver.open_round().await.unwrap();
        assert_eq!(driver.close_round(1).await.unwrap(), RoundStatus::Continue);
    }

    #[tokio::test]
    async fn round_cap_terminates_even_with_steady_progress() {
        let page = Arc::new(
            ScriptedPage::builder()
                .candidate(CandidateSpec::new("c1", "a"))
                .build(),
        );
        let mut policy = fast_policy();
        policy.scroll.max_rounds = 2;
        let mut driver = DiscoveryDriver::new(page, policy);

        driver.open_round().await.unwrap();
        assert_eq!(driver.close_round(1).await.unwrap(), RoundStatus::Continue);
        driver.open_round().await.unwrap();
        assert_eq!(driver.close_round(2).await.unwrap(), RoundStatus::RoundLimit);
    }
}
