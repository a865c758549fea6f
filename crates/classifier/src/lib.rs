//! Per-candidate decision: skip, adopt into progress without acting, or act.
//!
//! Check order is significant: the cheap local checks (key, membership) run
//! before anything that inspects the document tree, so already-handled
//! candidates cost no page round-trips at all.

use tracing::trace;

use replypilot_core_types::{CandidateKey, PilotConfig};
use replypilot_page_ports::{CandidatePort, PageError};
use replypilot_progress_store::ProgressStore;

/// Why a candidate was passed over without a progress record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// No stable identity; cannot be tracked reliably.
    Untracked,
    /// Already in the processed set, from this run or a prior one.
    AlreadyProcessed,
    /// Content not rendered yet; may reappear in a later discovery pass.
    EmptyText,
    /// Interest predicate did not match.
    NoKeywordMatch,
}

/// Why a candidate is adopted as handled without performing the action.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdoptReason {
    /// The secondary control already reports the target state.
    AlreadyEngaged,
    /// The operator already handled it manually.
    OwnPriorAction,
}

#[derive(Clone, Debug)]
pub enum Decision {
    Skip(SkipReason),
    /// Commit the key, skip the action.
    Adopt {
        key: CandidateKey,
        reason: AdoptReason,
    },
    Act {
        key: CandidateKey,
        text: String,
    },
}

/// Classifier configuration, carved out of the run config.
#[derive(Clone, Debug)]
pub struct ClassifyPolicy {
    pub keywords: Vec<String>,
    pub adopt_engaged: bool,
    pub adopt_own_reply: bool,
}

impl From<&PilotConfig> for ClassifyPolicy {
    fn from(cfg: &PilotConfig) -> Self {
        Self {
            keywords: cfg.keywords.clone(),
            adopt_engaged: cfg.adopt_engaged,
            adopt_own_reply: cfg.adopt_own_reply,
        }
    }
}

/// Case-insensitive substring match against the keyword set. An empty set
/// matches nothing.
pub fn matches_interest(text: &str, keywords: &[String]) -> bool {
    let haystack = text.to_lowercase();
    keywords
        .iter()
        .any(|kw| !kw.is_empty() && haystack.contains(&kw.to_lowercase()))
}

pub async fn classify(
    candidate: &dyn CandidatePort,
    store: &ProgressStore,
    policy: &ClassifyPolicy,
) -> Result<Decision, PageError> {
    let raw = candidate.raw_key();
    if raw.trim().is_empty() {
        return Ok(Decision::Skip(SkipReason::Untracked));
    }

    let key = store.normalize(&raw);
    if store.has(&key) {
        trace!(key = %key, "already processed, skipping");
        return Ok(Decision::Skip(SkipReason::AlreadyProcessed));
    }

    if policy.adopt_engaged {
        if let Some(secondary) = candidate.secondary_control().await? {
            if secondary.is_engaged().await? {
                return Ok(Decision::Adopt {
                    key,
                    reason: AdoptReason::AlreadyEngaged,
                });
            }
        }
    }

    let text = candidate.text().await?;
    if text.trim().is_empty() {
        return Ok(Decision::Skip(SkipReason::EmptyText));
    }
    if !matches_interest(&text, &policy.keywords) {
        return Ok(Decision::Skip(SkipReason::NoKeywordMatch));
    }

    if policy.adopt_own_reply && candidate.has_own_prior_action().await? {
        return Ok(Decision::Adopt {
            key,
            reason: AdoptReason::OwnPriorAction,
        });
    }

    Ok(Decision::Act { key, text })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use replypilot_core_types::ScopeKey;
    use replypilot_page_ports::{CandidateSpec, PagePort, ScriptedPage};
    use replypilot_progress_store::{KeyNorm, MemoryStorage, ProgressStore};

    use super::*;

    fn empty_store() -> ProgressStore {
        ProgressStore::load(
            Arc::new(MemoryStorage::new()),
            KeyNorm::default(),
            ScopeKey::from_page(None, "/p"),
        )
    }

    fn policy(keywords: &[&str]) -> ClassifyPolicy {
        ClassifyPolicy {
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            adopt_engaged: false,
            adopt_own_reply: true,
        }
    }

    #[tokio::test]
    async fn keyword_match_is_case_insensitive_substring() {
        assert!(matches_interest("Ask me about SYSTEMS design", &[
            "systems".to_string()
        ]));
        assert!(!matches_interest("hello there", &["systems".to_string()]));
        assert!(!matches_interest("anything", &[]));
    }

    #[tokio::test]
    async fn empty_key_skips_untracked() {
        let page = ScriptedPage::builder()
            .candidate(CandidateSpec::new("  ", "ask about systems"))
            .build();
        let candidates = page.list_candidates().await.unwrap();
        let decision = classify(candidates[0].as_ref(), &empty_store(), &policy(&["systems"]))
            .await
            .unwrap();
        assert!(matches!(decision, Decision::Skip(SkipReason::Untracked)));
    }

    #[tokio::test]
    async fn processed_candidate_short_circuits_before_page_inspection() {
        let page = ScriptedPage::builder()
            .candidate(CandidateSpec::new("c1", "ask about systems"))
            .build();
        let mut store = empty_store();
        store.commit(&store.normalize("c1"));

        let candidates = page.list_candidates().await.unwrap();
        let decision = classify(candidates[0].as_ref(), &store, &policy(&["systems"]))
            .await
            .unwrap();
        assert!(matches!(
            decision,
            Decision::Skip(SkipReason::AlreadyProcessed)
        ));
        let counters = page.counters();
        assert_eq!(counters.text_reads, 0);
        assert_eq!(counters.control_lookups, 0);
        assert_eq!(counters.composer_lookups, 0);
    }

    #[tokio::test]
    async fn engaged_candidate_is_adopted_when_configured() {
        let page = ScriptedPage::builder()
            .candidate(CandidateSpec::new("c1", "ask about systems").with_secondary_engaged())
            .build();
        let mut pol = policy(&["systems"]);
        pol.adopt_engaged = true;
        let candidates = page.list_candidates().await.unwrap();
        let decision = classify(candidates[0].as_ref(), &empty_store(), &pol)
            .await
            .unwrap();
        assert!(matches!(
            decision,
            Decision::Adopt {
                reason: AdoptReason::AlreadyEngaged,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn empty_text_and_keyword_miss_skip_without_record() {
        let page = ScriptedPage::builder()
            .candidate(CandidateSpec::new("c1", "   "))
            .candidate(CandidateSpec::new("c2", "hello"))
            .build();
        let store = empty_store();
        let candidates = page.list_candidates().await.unwrap();
        let first = classify(candidates[0].as_ref(), &store, &policy(&["systems"]))
            .await
            .unwrap();
        assert!(matches!(first, Decision::Skip(SkipReason::EmptyText)));
        let second = classify(candidates[1].as_ref(), &store, &policy(&["systems"]))
            .await
            .unwrap();
        assert!(matches!(second, Decision::Skip(SkipReason::NoKeywordMatch)));
    }

    #[tokio::test]
    async fn own_prior_reply_is_adopted() {
        let page = ScriptedPage::builder()
            .candidate(CandidateSpec::new("c1", "ask about systems").with_prior_reply())
            .build();
        let candidates = page.list_candidates().await.unwrap();
        let decision = classify(candidates[0].as_ref(), &empty_store(), &policy(&["systems"]))
            .await
            .unwrap();
        assert!(matches!(
            decision,
            Decision::Adopt {
                reason: AdoptReason::OwnPriorAction,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn matching_unprocessed_candidate_acts() {
        let page = ScriptedPage::builder()
            .candidate(CandidateSpec::new("c1", "ask me about systems"))
            .build();
        let candidates = page.list_candidates().await.unwrap();
        let decision = classify(candidates[0].as_ref(), &empty_store(), &policy(&["systems"]))
            .await
            .unwrap();
        match decision {
            Decision::Act { key, text } => {
                assert_eq!(key.as_str(), "c1");
                assert_eq!(text, "ask me about systems");
            }
            other => panic!("expected act, got {other:?}"),
        }
    }
}
