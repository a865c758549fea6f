use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use rand::seq::SliceRandom;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use replypilot_classifier::{classify, ClassifyPolicy, Decision};
use replypilot_core_types::{PilotConfig, RunGate, RunMode, RunState, ScopeKey};
use replypilot_discovery::{DiscoveryDriver, RoundStatus};
use replypilot_page_ports::{CandidatePort, PageError, PagePort};
use replypilot_progress_store::{KeyNorm, ProgressStore, StoragePort};
use replypilot_reply_flow::{execute, FlowError, FlowPolicy};

use crate::ControlError;

/// Why a run ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunEnd {
    /// Too many discovery rounds without new commitments.
    IdleStop,
    /// Discovery round cap.
    RoundLimit,
    /// Per-run action budget spent.
    ActionCap,
    /// Operator stop.
    Stopped,
    /// Page failure, or a failed attempt under `stop_on_error`.
    Error,
}

/// Tally of one completed run.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub mode: RunMode,
    pub end: RunEnd,
    pub rounds: u32,
    /// Submissions performed (including simulated ones in a dry run).
    pub acted: u64,
    /// Candidates adopted into progress without acting.
    pub adopted: u64,
    pub skipped: u64,
    pub failed: u64,
    /// New progress records written this run (acted and adopted).
    pub committed: u64,
    /// Size of the processed set after the run.
    pub processed_total: usize,
    pub error: Option<String>,
}

/// Live view for status displays.
#[derive(Clone, Debug)]
pub struct RunStats {
    pub scope: String,
    pub state: RunState,
    pub processed_total: usize,
    pub acted_this_run: u64,
}

/// One orchestrator per page and progress scope. Controls may be called from
/// any task while a run is active on another.
pub struct Orchestrator {
    page: Arc<dyn PagePort>,
    store: AsyncMutex<ProgressStore>,
    config: SyncMutex<PilotConfig>,
    state: watch::Sender<RunState>,
    cancel: SyncMutex<CancellationToken>,
    running: SyncMutex<bool>,
    acted_this_run: AtomicU64,
}

impl Orchestrator {
    /// Bind to `page`, deriving the progress scope from it and loading any
    /// persisted record for that scope.
    pub async fn connect(
        page: Arc<dyn PagePort>,
        storage: Arc<dyn StoragePort>,
        config: PilotConfig,
    ) -> Result<Self, PageError> {
        let scope = page.scope().await?;
        let scope_key = ScopeKey::from_page(scope.canonical.as_deref(), &scope.path);
        let store = ProgressStore::load(storage, KeyNorm::default(), scope_key);
        info!(scope = %store.scope(), known = store.len(), "orchestrator connected");
        let (state, _) = watch::channel(RunState::Idle);
        Ok(Self {
            page,
            store: AsyncMutex::new(store),
            config: SyncMutex::new(config),
            state,
            cancel: SyncMutex::new(CancellationToken::new()),
            running: SyncMutex::new(false),
            acted_this_run: AtomicU64::new(0),
        })
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Config changes apply from the next run; the active run keeps the
    /// snapshot it started with.
    pub fn set_action_cap(&self, cap: u32) -> Result<(), ControlError> {
        if cap == 0 {
            return Err(ControlError::InvalidCap);
        }
        self.config.lock().max_actions_per_run = cap;
        Ok(())
    }

    pub fn set_interest_keywords(&self, keywords: Vec<String>) {
        self.config.lock().keywords = keywords;
    }

    pub fn set_templates(&self, templates: Vec<String>) {
        self.config.lock().templates = templates;
    }

    pub fn set_dry_run(&self, dry_run: bool) {
        self.config.lock().dry_run = dry_run;
    }

    pub fn pause(&self) {
        self.state.send_if_modified(|s| {
            if *s == RunState::Running {
                info!("run paused");
                *s = RunState::Paused;
                true
            } else {
                false
            }
        });
    }

    pub fn resume(&self) {
        self.state.send_if_modified(|s| {
            if *s == RunState::Paused {
                info!("run resumed");
                *s = RunState::Running;
                true
            } else {
                false
            }
        });
    }

    pub fn toggle_pause(&self) -> RunState {
        match self.state() {
            RunState::Running => self.pause(),
            RunState::Paused => self.resume(),
            _ => {}
        }
        self.state()
    }

    /// Request a stop. Idempotent; harmless when idle. The in-flight attempt,
    /// if any, still runs to completion so no half-typed entry is abandoned.
    pub fn stop(&self) {
        self.state.send_if_modified(|s| match *s {
            RunState::Running | RunState::Paused => {
                info!("stop requested");
                *s = RunState::Stopping;
                true
            }
            _ => false,
        });
        self.cancel.lock().cancel();
    }

    pub async fn stats(&self) -> RunStats {
        let store = self.store.lock().await;
        RunStats {
            scope: store.scope().as_str().to_string(),
            state: self.state(),
            processed_total: store.len(),
            acted_this_run: self.acted_this_run.load(Ordering::Relaxed),
        }
    }

    /// Operator reset: wipe the progress record for this scope. Refused
    /// while a run is active.
    pub async fn reset(&self) -> Result<(), ControlError> {
        if *self.running.lock() {
            return Err(ControlError::AlreadyRunning);
        }
        self.store.lock().await.reset();
        info!("progress record cleared");
        Ok(())
    }

    /// Execute one run to completion. Returns the summary; page failures end
    /// the run rather than propagating, so progress made so far is kept.
    #[instrument(skip(self), fields(mode = ?mode))]
    pub async fn run(&self, mode: RunMode) -> Result<RunSummary, ControlError> {
        {
            let mut running = self.running.lock();
            if *running {
                return Err(ControlError::AlreadyRunning);
            }
            *running = true;
        }
        let cfg = self.config.lock().clone();
        let gate = {
            let mut cancel = self.cancel.lock();
            *cancel = CancellationToken::new();
            RunGate::new(self.state.subscribe(), cancel.clone())
        };
        self.acted_this_run.store(0, Ordering::Relaxed);
        self.state.send_replace(RunState::Running);
        info!(cap = cfg.max_actions_per_run, dry_run = cfg.dry_run, "run started");

        let summary = self.drive(mode, &cfg, &gate).await;

        self.store.lock().await.flush();
        self.state.send_replace(RunState::Idle);
        *self.running.lock() = false;
        info!(
            end = ?summary.end,
            rounds = summary.rounds,
            acted = summary.acted,
            adopted = summary.adopted,
            skipped = summary.skipped,
            failed = summary.failed,
            processed_total = summary.processed_total,
            "run finished"
        );
        Ok(summary)
    }

    async fn drive(&self, mode: RunMode, cfg: &PilotConfig, gate: &RunGate) -> RunSummary {
        let mut driver = DiscoveryDriver::new(self.page.clone(), cfg.into());
        let classify_policy = ClassifyPolicy::from(cfg);
        let flow_policy = FlowPolicy::from(cfg);

        let mut acted: u64 = 0;
        let mut adopted: u64 = 0;
        let mut skipped: u64 = 0;
        let mut failed: u64 = 0;
        let mut committed: u64 = 0;
        let mut end = RunEnd::Stopped;
        let mut error: Option<String> = None;
        let mut warned_no_templates = false;

        'rounds: loop {
            if !gate.checkpoint().await {
                break;
            }
            let candidates = match driver.open_round().await {
                Ok(candidates) => candidates,
                Err(err) => {
                    warn!(error = %err, "discovery failed, ending run");
                    end = RunEnd::Error;
                    error = Some(err.to_string());
                    break;
                }
            };
            debug!(round = driver.rounds(), visible = candidates.len(), "round opened");

            for candidate in candidates {
                if !gate.checkpoint().await {
                    break 'rounds;
                }
                let outcome = match mode {
                    RunMode::Reply => {
                        self.handle_reply(
                            candidate.as_ref(),
                            cfg,
                            &classify_policy,
                            &flow_policy,
                            gate,
                            &mut warned_no_templates,
                        )
                        .await
                    }
                    RunMode::Backfill => self.handle_backfill(candidate.as_ref(), cfg).await,
                };
                match outcome {
                    CandidateOutcome::Acted { newly_committed } => {
                        acted += 1;
                        self.acted_this_run.store(acted, Ordering::Relaxed);
                        committed += u64::from(newly_committed);
                        if acted >= u64::from(cfg.max_actions_per_run) {
                            info!(acted, "action cap reached");
                            end = RunEnd::ActionCap;
                            break 'rounds;
                        }
                        // Cooldown between completed attempts.
                        cfg.delays.between_replies.settle().await;
                    }
                    CandidateOutcome::Adopted { newly_committed } => {
                        adopted += 1;
                        committed += u64::from(newly_committed);
                    }
                    CandidateOutcome::Skipped => skipped += 1,
                    CandidateOutcome::Failed(reason) => {
                        failed += 1;
                        if cfg.stop_on_error {
                            end = RunEnd::Error;
                            error = Some(reason);
                            break 'rounds;
                        }
                    }
                    CandidateOutcome::Cancelled => break 'rounds,
                }
            }

            match driver.close_round(committed).await {
                Ok(RoundStatus::Continue) => {}
                Ok(RoundStatus::IdleStop) => {
                    end = RunEnd::IdleStop;
                    break;
                }
                Ok(RoundStatus::RoundLimit) => {
                    end = RunEnd::RoundLimit;
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "discovery failed, ending run");
                    end = RunEnd::Error;
                    error = Some(err.to_string());
                    break;
                }
            }
        }

        let processed_total = self.store.lock().await.len();
        RunSummary {
            mode,
            end,
            rounds: driver.rounds(),
            acted,
            adopted,
            skipped,
            failed,
            committed,
            processed_total,
            error,
        }
    }

    async fn handle_reply(
        &self,
        candidate: &dyn CandidatePort,
        cfg: &PilotConfig,
        classify_policy: &ClassifyPolicy,
        flow_policy: &FlowPolicy,
        gate: &RunGate,
        warned_no_templates: &mut bool,
    ) -> CandidateOutcome {
        let decision = {
            let store = self.store.lock().await;
            classify(candidate, &store, classify_policy).await
        };
        let decision = match decision {
            Ok(decision) => decision,
            Err(err) => {
                warn!(error = %err, "classification failed, candidate skipped");
                return CandidateOutcome::Failed(err.to_string());
            }
        };

        match decision {
            Decision::Skip(reason) => {
                debug!(reason = ?reason, "candidate skipped");
                CandidateOutcome::Skipped
            }
            Decision::Adopt { key, reason } => {
                debug!(key = %key, reason = ?reason, "candidate adopted");
                let newly_committed = self.store.lock().await.commit(&key);
                CandidateOutcome::Adopted { newly_committed }
            }
            Decision::Act { key, .. } => {
                let message = {
                    let mut rng = rand::thread_rng();
                    cfg.templates.choose(&mut rng).cloned()
                };
                let Some(message) = message else {
                    if !*warned_no_templates {
                        warn!("no reply templates configured, matching candidates are skipped");
                        *warned_no_templates = true;
                    }
                    return CandidateOutcome::Skipped;
                };
                match execute(
                    self.page.as_ref(),
                    candidate,
                    &key,
                    &message,
                    flow_policy,
                    gate,
                )
                .await
                {
                    Ok(report) => {
                        let newly_committed = if report.committed {
                            self.store.lock().await.commit(&key)
                        } else {
                            false
                        };
                        if report.submitted {
                            CandidateOutcome::Acted { newly_committed }
                        } else {
                            CandidateOutcome::Skipped
                        }
                    }
                    Err(FlowError::Cancelled) => CandidateOutcome::Cancelled,
                    Err(err) => {
                        warn!(key = %key, stage = %err.stage(), error = %err, "attempt failed");
                        CandidateOutcome::Failed(err.to_string())
                    }
                }
            }
        }
    }

    /// Scan-only pass: adopt candidates already handled outside the tool.
    /// Writes are batched, so a crash loses at most `persist_every` entries.
    async fn handle_backfill(
        &self,
        candidate: &dyn CandidatePort,
        cfg: &PilotConfig,
    ) -> CandidateOutcome {
        let raw = candidate.raw_key();
        if raw.trim().is_empty() {
            return CandidateOutcome::Skipped;
        }
        let key = {
            let store = self.store.lock().await;
            let key = store.normalize(&raw);
            if store.has(&key) {
                return CandidateOutcome::Skipped;
            }
            key
        };

        let mut handled = match candidate.has_own_prior_action().await {
            Ok(handled) => handled,
            Err(err) => {
                warn!(error = %err, "backfill inspection failed, candidate skipped");
                return CandidateOutcome::Failed(err.to_string());
            }
        };
        if !handled && cfg.adopt_engaged {
            handled = match candidate.secondary_control().await {
                Ok(Some(secondary)) => secondary.is_engaged().await.unwrap_or(false),
                _ => false,
            };
        }
        if !handled {
            return CandidateOutcome::Skipped;
        }

        debug!(key = %key, "backfill adopted");
        let newly_committed = self
            .store
            .lock()
            .await
            .adopt_batched(&key, cfg.persist_every);
        CandidateOutcome::Adopted { newly_committed }
    }
}

enum CandidateOutcome {
    Acted { newly_committed: bool },
    Adopted { newly_committed: bool },
    Skipped,
    Failed(String),
    Cancelled,
}
