//! Bounded readiness poll ahead of submission.
//!
//! The host page accepts composed content and enables the submit control
//! asynchronously, with no event the collaborator could surface; a short
//! fixed-interval poll is the only reliable synchronization primitive here.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use replypilot_core_types::{GuardPlan, RunGate};
use replypilot_page_ports::{ComposerPort, ControlPort, PageError};

/// Poll until the composer contains `message` and its submit control is
/// present, visible and enabled. Returns the ready control, or `None` on
/// timeout; the caller routes a timeout to the fallback path, it is not an
/// error. Time spent suspended on a paused gate does not count against the
/// budget, so a resumed attempt gets the full wait it would have had.
pub async fn await_submit_ready(
    composer: &dyn ComposerPort,
    message: &str,
    plan: &GuardPlan,
    gate: &RunGate,
) -> Result<Option<Arc<dyn ControlPort>>, PageError> {
    let interval = Duration::from_millis(plan.poll_interval_ms);
    let mut remaining = Duration::from_millis(plan.submit_timeout_ms);
    loop {
        gate.hold_if_paused().await;
        let step = Instant::now();
        if composer.content().await?.contains(message) {
            if let Some(control) = composer.submit_control().await? {
                if control.is_visible().await? && control.is_enabled().await? {
                    return Ok(Some(control));
                }
            }
        }
        if remaining.is_zero() {
            debug!(timeout_ms = plan.submit_timeout_ms, "submit readiness guard timed out");
            return Ok(None);
        }
        tokio::time::sleep(interval).await;
        remaining = remaining.saturating_sub(step.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use replypilot_core_types::RunState;
    use replypilot_page_ports::{CandidateSpec, PagePort, ScriptedPage, SubmitBehavior};
    use tokio::sync::watch;
    use tokio_util::sync::CancellationToken;

    use super::*;

    async fn open_composer(page: &ScriptedPage) -> Arc<dyn ComposerPort> {
        let candidates = page.list_candidates().await.unwrap();
        let control = candidates[0].action_control().await.unwrap().unwrap();
        control.click().await.unwrap();
        page.active_composer().await.unwrap().unwrap()
    }

    fn fast_guard() -> GuardPlan {
        GuardPlan {
            poll_interval_ms: 5,
            submit_timeout_ms: 60,
        }
    }

    #[tokio::test]
    async fn returns_control_once_content_and_enablement_line_up() {
        let page = ScriptedPage::builder()
            .candidate(CandidateSpec::new("c1", "text"))
            .build();
        let composer = open_composer(&page).await;
        composer.insert("hello").await.unwrap();

        let control =
            await_submit_ready(composer.as_ref(), "hello", &fast_guard(), &RunGate::detached())
                .await
                .unwrap();
        assert!(control.is_some());
    }

    #[tokio::test]
    async fn times_out_when_submit_never_enables() {
        let page = ScriptedPage::builder()
            .candidate(CandidateSpec::new("c1", "text"))
            .submit_behavior(SubmitBehavior::NeverEnabled)
            .build();
        let composer = open_composer(&page).await;
        composer.insert("hello").await.unwrap();

        let control =
            await_submit_ready(composer.as_ref(), "hello", &fast_guard(), &RunGate::detached())
                .await
                .unwrap();
        assert!(control.is_none());
    }

    #[tokio::test]
    async fn paused_time_does_not_consume_the_guard_budget() {
        let page = ScriptedPage::builder()
            .candidate(CandidateSpec::new("c1", "text"))
            .build();
        let composer = open_composer(&page).await;
        // Pause for longer than the whole guard timeout, then make the
        // composer ready shortly after resuming.
        let (tx, rx) = watch::channel(RunState::Paused);
        let gate = RunGate::new(rx, CancellationToken::new());
        let driver = tokio::spawn({
            let composer = composer.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                tx.send(RunState::Running).expect("receiver alive");
                tokio::time::sleep(Duration::from_millis(20)).await;
                composer.insert("hello").await.expect("insert");
            }
        });

        let control = await_submit_ready(composer.as_ref(), "hello", &fast_guard(), &gate)
            .await
            .unwrap();
        assert!(control.is_some());
        driver.await.expect("join");
    }

    #[tokio::test]
    async fn times_out_when_content_never_contains_message() {
        let page = ScriptedPage::builder()
            .candidate(CandidateSpec::new("c1", "text"))
            .build();
        let composer = open_composer(&page).await;
        composer.insert("other").await.unwrap();

        let control =
            await_submit_ready(composer.as_ref(), "hello", &fast_guard(), &RunGate::detached())
                .await
                .unwrap();
        assert!(control.is_none());
    }
}
