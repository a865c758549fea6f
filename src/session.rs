use std::sync::Arc;

use anyhow::{bail, Context};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use replypilot_core_types::{PilotConfig, RunMode, RunState};
use replypilot_orchestrator::{ControlError, Orchestrator, RunStats, RunSummary};
use replypilot_page_ports::PagePort;
use replypilot_progress_store::StoragePort;

type RunTask = JoinHandle<Result<RunSummary, ControlError>>;

/// One operator session: an orchestrator bound to a page, with runs spawned
/// in the background so controls stay responsive.
pub struct Session {
    orchestrator: Arc<Orchestrator>,
    run_task: Mutex<Option<RunTask>>,
}

impl Session {
    pub async fn connect(
        page: Arc<dyn PagePort>,
        storage: Arc<dyn StoragePort>,
        config: PilotConfig,
    ) -> anyhow::Result<Self> {
        let orchestrator = Orchestrator::connect(page, storage, config)
            .await
            .context("binding to the page")?;
        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            run_task: Mutex::new(None),
        })
    }

    /// Start a reply run in the background.
    pub fn start(&self) -> anyhow::Result<()> {
        self.spawn(RunMode::Reply)
    }

    /// Start a scan-only backfill run in the background.
    pub fn backfill(&self) -> anyhow::Result<()> {
        self.spawn(RunMode::Backfill)
    }

    fn spawn(&self, mode: RunMode) -> anyhow::Result<()> {
        let mut slot = self.run_task.lock();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            bail!("a run is already active");
        }
        let orchestrator = self.orchestrator.clone();
        *slot = Some(tokio::spawn(
            async move { orchestrator.run(mode).await },
        ));
        Ok(())
    }

    /// Wait for the last spawned run. `None` when none was spawned.
    pub async fn join(&self) -> anyhow::Result<Option<RunSummary>> {
        let task = self.run_task.lock().take();
        match task {
            None => Ok(None),
            Some(task) => {
                let summary = task.await.context("run task panicked")??;
                Ok(Some(summary))
            }
        }
    }

    pub fn state(&self) -> RunState {
        self.orchestrator.state()
    }

    pub fn pause(&self) {
        self.orchestrator.pause();
    }

    pub fn resume(&self) {
        self.orchestrator.resume();
    }

    pub fn stop(&self) {
        self.orchestrator.stop();
    }

    /// Keyboard shortcut mapping: `p` toggles pause, `s` stops. Returns
    /// whether the key was handled.
    pub fn handle_key(&self, key: char) -> bool {
        match key.to_ascii_lowercase() {
            'p' => {
                let state = self.orchestrator.toggle_pause();
                info!(state = %state, "pause toggled");
                true
            }
            's' => {
                self.orchestrator.stop();
                true
            }
            _ => false,
        }
    }

    pub fn set_action_cap(&self, cap: u32) -> Result<(), ControlError> {
        self.orchestrator.set_action_cap(cap)
    }

    pub fn set_interest_keywords(&self, keywords: Vec<String>) {
        self.orchestrator.set_interest_keywords(keywords)
    }

    pub fn set_templates(&self, templates: Vec<String>) {
        self.orchestrator.set_templates(templates)
    }

    pub fn set_dry_run(&self, dry_run: bool) {
        self.orchestrator.set_dry_run(dry_run)
    }

    pub async fn stats(&self) -> RunStats {
        self.orchestrator.stats().await
    }

    pub async fn reset(&self) -> Result<(), ControlError> {
        self.orchestrator.reset().await
    }
}
