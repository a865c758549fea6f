use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use replypilot_core_types::{AttemptId, AttemptStage, CandidateKey, RunGate};
use replypilot_page_ports::{CandidatePort, Marker, PagePort};

use crate::errors::FlowError;
use crate::guard::await_submit_ready;
use crate::model::{AttemptReport, FlowPolicy};
use crate::tempo::build_typing_plan;

/// Settle after triggering the secondary control, before re-reading state.
const SECONDARY_SETTLE: Duration = Duration::from_millis(250);

/// Drive one candidate through the full interaction sequence.
///
/// Once past the opening step the attempt runs to completion even under a
/// stop request, so a half-typed entry is never abandoned; pause is honored
/// at every suspension point throughout.
#[instrument(skip_all, fields(key = %key))]
pub async fn execute(
    page: &dyn PagePort,
    candidate: &dyn CandidatePort,
    key: &CandidateKey,
    message: &str,
    policy: &FlowPolicy,
    gate: &RunGate,
) -> Result<AttemptReport, FlowError> {
    if gate.is_stopping() {
        return Err(FlowError::Cancelled);
    }
    let mut report = AttemptReport::new(AttemptId::new());
    debug!(attempt = %report.attempt_id, "starting interaction attempt");

    // OpeningControl
    report.stage = AttemptStage::OpeningControl;
    candidate
        .bring_into_view()
        .await
        .map_err(|e| FlowError::page(report.stage, e))?;
    policy.delays.between_actions.settle().await;
    gate.hold_if_paused().await;

    let action = candidate
        .action_control()
        .await
        .map_err(|e| FlowError::page(report.stage, e))?
        .ok_or(FlowError::ActionControlMissing)?;
    if policy.dry_run {
        let _ = action.mark(Marker::ActionControl).await;
    } else {
        action
            .click()
            .await
            .map_err(|e| FlowError::page(report.stage, e))?;
    }
    policy.delays.between_actions.settle().await;
    gate.hold_if_paused().await;

    // Composing
    report.stage = AttemptStage::Composing;
    let composer = page
        .active_composer()
        .await
        .map_err(|e| FlowError::page(report.stage, e))?;
    let composer = match composer {
        Some(c) => Some(c),
        // A simulated open never attaches a real composer; that is expected.
        None if policy.dry_run => None,
        None => return Err(FlowError::ComposerMissing),
    };

    if let Some(composer) = composer.as_deref() {
        if policy.dry_run {
            let _ = composer.mark(Marker::Composer).await;
        } else {
            let existing = composer
                .content()
                .await
                .map_err(|e| FlowError::page(report.stage, e))?;
            let needs_space = existing.chars().last().map_or(true, |c| !c.is_whitespace());
            let to_insert = if needs_space {
                format!(" {message}")
            } else {
                message.to_string()
            };
            let plan = build_typing_plan(&to_insert, policy.delays.typing_per_char);
            for step in &plan.steps {
                gate.hold_if_paused().await;
                composer
                    .insert(&step.chunk)
                    .await
                    .map_err(|e| FlowError::page(report.stage, e))?;
                tokio::time::sleep(Duration::from_millis(step.delay_ms)).await;
            }
        }
        policy.delays.composer_settle.settle().await;

        // GuardWaiting
        report.stage = AttemptStage::GuardWaiting;
        let ready = await_submit_ready(composer, message, &policy.guard, gate)
            .await
            .map_err(|e| FlowError::page(report.stage, e))?;

        match ready {
            Some(submit) => {
                report.stage = AttemptStage::Submitting;
                if policy.dry_run {
                    let _ = submit.mark(Marker::Submit).await;
                } else {
                    submit
                        .click()
                        .await
                        .map_err(|e| FlowError::page(report.stage, e))?;
                }
            }
            None => {
                report.stage = AttemptStage::FallbackSubmitting;
                report.fallback_used = true;
                debug!("submit control never became ready, using fallback commit key");
                if policy.dry_run {
                    let _ = composer.mark(Marker::Submit).await;
                } else {
                    composer
                        .dispatch_commit_key()
                        .await
                        .map_err(|e| FlowError::page(report.stage, e))?;
                }
            }
        }
    } else {
        // Dry run with no composer to rehearse against; the decision logic
        // already ran, count it as a simulated submission.
        report.stage = AttemptStage::Submitting;
    }
    report.submitted = true;
    policy.delays.between_actions.settle().await;
    gate.hold_if_paused().await;

    // SecondaryAction: failure here is non-fatal to the attempt.
    if policy.engage_after_reply {
        report.stage = AttemptStage::SecondaryAction;
        match candidate.secondary_control().await {
            Ok(Some(secondary)) => match secondary.is_engaged().await {
                Ok(true) => {
                    report.secondary_engaged = true;
                }
                Ok(false) => {
                    if policy.dry_run {
                        let _ = secondary.mark(Marker::Secondary).await;
                    } else if let Err(err) = secondary.engage().await {
                        warn!(error = %err, "secondary action failed, continuing");
                    } else {
                        report.secondary_engaged = true;
                        tokio::time::sleep(SECONDARY_SETTLE).await;
                    }
                }
                Err(err) => warn!(error = %err, "secondary state unreadable, continuing"),
            },
            Ok(None) => {}
            Err(err) => warn!(error = %err, "secondary control lookup failed, continuing"),
        }
    }

    // Commit gate. An absent secondary control counts as not engaged.
    let committed = if policy.require_engaged_to_commit && !policy.dry_run {
        let engaged = match candidate.secondary_control().await {
            Ok(Some(secondary)) => secondary.is_engaged().await.unwrap_or(false),
            _ => false,
        };
        report.secondary_engaged = engaged;
        engaged
    } else {
        true
    };
    report.committed = committed;
    if committed {
        report.stage = AttemptStage::Committed;
    }
    info!(
        attempt = %report.attempt_id,
        stage = %report.stage,
        fallback = report.fallback_used,
        committed = report.committed,
        "interaction attempt finished"
    );
    Ok(report.finish())
}
