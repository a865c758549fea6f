//! Scripted in-memory page. Backs the crate tests and dry-run rehearsal the
//! same way the real adapter backs production: everything goes through the
//! port traits, and every interaction is counted.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    CandidatePort, ComposerPort, ControlPort, Marker, PageError, PagePort, PageScope,
    SecondaryPort,
};

/// How the scripted submit control behaves while the readiness guard polls.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmitBehavior {
    /// Enabled as soon as the composer holds any content.
    EnableOnContent,
    /// Never becomes enabled; forces the fallback submission path.
    NeverEnabled,
}

/// Interaction tally across the whole page.
#[derive(Clone, Debug, Default)]
pub struct PageCounters {
    pub action_clicks: u32,
    pub submit_clicks: u32,
    pub commit_keys: u32,
    pub inserted_chunks: u32,
    pub secondary_engagements: u32,
    pub scroll_steps: u32,
    pub expansion_calls: u32,
    pub composer_lookups: u32,
    pub text_reads: u32,
    pub control_lookups: u32,
}

/// One accepted submission, primary or fallback.
#[derive(Clone, Debug)]
pub struct Submission {
    pub raw_key: String,
    pub message: String,
    pub via_fallback: bool,
}

/// Declarative description of one scripted candidate.
#[derive(Clone, Debug)]
pub struct CandidateSpec {
    raw_key: String,
    text: String,
    own_prior_action: bool,
    has_action_control: bool,
    secondary: Option<bool>,
    composer_prefill: String,
}

impl CandidateSpec {
    pub fn new(raw_key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            raw_key: raw_key.into(),
            text: text.into(),
            own_prior_action: false,
            has_action_control: true,
            secondary: Some(false),
            composer_prefill: String::new(),
        }
    }

    /// The operator already replied to this candidate manually.
    pub fn with_prior_reply(mut self) -> Self {
        self.own_prior_action = true;
        self
    }

    pub fn without_action_control(mut self) -> Self {
        self.has_action_control = false;
        self
    }

    pub fn without_secondary(mut self) -> Self {
        self.secondary = None;
        self
    }

    pub fn with_secondary_engaged(mut self) -> Self {
        self.secondary = Some(true);
        self
    }

    /// Content already present in the composer when it opens (a mention).
    pub fn with_composer_prefill(mut self, prefill: impl Into<String>) -> Self {
        self.composer_prefill = prefill.into();
        self
    }
}

struct CandidateState {
    spec: CandidateSpec,
    marks: Vec<Marker>,
}

struct ActiveComposer {
    candidate: usize,
    content: String,
}

struct SharedState {
    scope: PageScope,
    candidates: Vec<CandidateState>,
    visible: usize,
    reveal_per_scroll: usize,
    expansion_script: VecDeque<u32>,
    reveal_per_expansion: usize,
    submit_behavior: SubmitBehavior,
    commit_key_fails: bool,
    active: Option<ActiveComposer>,
    counters: PageCounters,
    submissions: Vec<Submission>,
}

impl SharedState {
    fn record_submission(&mut self, via_fallback: bool) {
        if let Some(active) = self.active.take() {
            let raw_key = self.candidates[active.candidate].spec.raw_key.clone();
            self.candidates[active.candidate].spec.own_prior_action = true;
            self.submissions.push(Submission {
                raw_key,
                message: active.content,
                via_fallback,
            });
        }
    }
}

type Shared = Arc<Mutex<SharedState>>;

pub struct ScriptedPageBuilder {
    state: SharedState,
    initially_visible: Option<usize>,
}

impl ScriptedPageBuilder {
    pub fn scope(mut self, canonical: Option<&str>, path: &str) -> Self {
        self.state.scope = PageScope {
            canonical: canonical.map(str::to_string),
            path: path.to_string(),
        };
        self
    }

    pub fn candidate(mut self, spec: CandidateSpec) -> Self {
        self.state.candidates.push(CandidateState {
            spec,
            marks: Vec::new(),
        });
        self
    }

    /// How many candidates are visible before any scrolling or expansion.
    pub fn initially_visible(mut self, count: usize) -> Self {
        self.initially_visible = Some(count);
        self
    }

    pub fn reveal_per_scroll(mut self, count: usize) -> Self {
        self.state.reveal_per_scroll = count;
        self
    }

    /// Expansion counts returned by successive `expand_collapsed` calls;
    /// exhausted script yields zero.
    pub fn expansions(mut self, script: impl IntoIterator<Item = u32>) -> Self {
        self.state.expansion_script = script.into_iter().collect();
        self
    }

    pub fn reveal_per_expansion(mut self, count: usize) -> Self {
        self.state.reveal_per_expansion = count;
        self
    }

    pub fn submit_behavior(mut self, behavior: SubmitBehavior) -> Self {
        self.state.submit_behavior = behavior;
        self
    }

    /// Make the synthetic commit key fail, so fallback submission is
    /// rejected rather than accepted.
    pub fn failing_commit_key(mut self) -> Self {
        self.state.commit_key_fails = true;
        self
    }

    pub fn build(mut self) -> ScriptedPage {
        self.state.visible = self
            .initially_visible
            .unwrap_or(self.state.candidates.len())
            .min(self.state.candidates.len());
        ScriptedPage {
            shared: Arc::new(Mutex::new(self.state)),
        }
    }
}

/// In-memory `PagePort` implementation driven by a script.
pub struct ScriptedPage {
    shared: Shared,
}

impl ScriptedPage {
    pub fn builder() -> ScriptedPageBuilder {
        ScriptedPageBuilder {
            state: SharedState {
                scope: PageScope {
                    canonical: None,
                    path: "/".to_string(),
                },
                candidates: Vec::new(),
                visible: 0,
                reveal_per_scroll: 0,
                expansion_script: VecDeque::new(),
                reveal_per_expansion: 0,
                submit_behavior: SubmitBehavior::EnableOnContent,
                commit_key_fails: false,
                active: None,
                counters: PageCounters::default(),
                submissions: Vec::new(),
            },
            initially_visible: None,
        }
    }

    pub fn counters(&self) -> PageCounters {
        self.shared.lock().counters.clone()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.shared.lock().submissions.clone()
    }

    pub fn marks_for(&self, raw_key: &str) -> Vec<Marker> {
        let state = self.shared.lock();
        state
            .candidates
            .iter()
            .find(|c| c.spec.raw_key == raw_key)
            .map(|c| c.marks.clone())
            .unwrap_or_default()
    }

    pub fn secondary_engaged(&self, raw_key: &str) -> bool {
        let state = self.shared.lock();
        state
            .candidates
            .iter()
            .find(|c| c.spec.raw_key == raw_key)
            .and_then(|c| c.spec.secondary)
            .unwrap_or(false)
    }
}

#[async_trait]
impl PagePort for ScriptedPage {
    async fn scope(&self) -> Result<PageScope, PageError> {
        Ok(self.shared.lock().scope.clone())
    }

    async fn list_candidates(&self) -> Result<Vec<Arc<dyn CandidatePort>>, PageError> {
        let state = self.shared.lock();
        Ok((0..state.visible)
            .map(|index| {
                Arc::new(ScriptedCandidate {
                    shared: self.shared.clone(),
                    index,
                }) as Arc<dyn CandidatePort>
            })
            .collect())
    }

    async fn expand_collapsed(&self) -> Result<u32, PageError> {
        let mut state = self.shared.lock();
        state.counters.expansion_calls += 1;
        let performed = state.expansion_script.pop_front().unwrap_or(0);
        if performed > 0 {
            let reveal = state.reveal_per_expansion * performed as usize;
            state.visible = (state.visible + reveal).min(state.candidates.len());
        }
        Ok(performed)
    }

    async fn scroll_for_more(&self) -> Result<(), PageError> {
        let mut state = self.shared.lock();
        state.counters.scroll_steps += 1;
        let reveal = state.reveal_per_scroll;
        state.visible = (state.visible + reveal).min(state.candidates.len());
        Ok(())
    }

    async fn active_composer(&self) -> Result<Option<Arc<dyn ComposerPort>>, PageError> {
        let mut state = self.shared.lock();
        state.counters.composer_lookups += 1;
        Ok(state.active.as_ref().map(|_| {
            Arc::new(ScriptedComposer {
                shared: self.shared.clone(),
            }) as Arc<dyn ComposerPort>
        }))
    }
}

struct ScriptedCandidate {
    shared: Shared,
    index: usize,
}

#[async_trait]
impl CandidatePort for ScriptedCandidate {
    fn raw_key(&self) -> String {
        self.shared.lock().candidates[self.index].spec.raw_key.clone()
    }

    async fn text(&self) -> Result<String, PageError> {
        let mut state = self.shared.lock();
        state.counters.text_reads += 1;
        Ok(state.candidates[self.index].spec.text.clone())
    }

    async fn has_own_prior_action(&self) -> Result<bool, PageError> {
        Ok(self.shared.lock().candidates[self.index].spec.own_prior_action)
    }

    async fn action_control(&self) -> Result<Option<Arc<dyn ControlPort>>, PageError> {
        let mut state = self.shared.lock();
        state.counters.control_lookups += 1;
        if !state.candidates[self.index].spec.has_action_control {
            return Ok(None);
        }
        Ok(Some(Arc::new(ScriptedActionControl {
            shared: self.shared.clone(),
            index: self.index,
        })))
    }

    async fn secondary_control(&self) -> Result<Option<Arc<dyn SecondaryPort>>, PageError> {
        let mut state = self.shared.lock();
        state.counters.control_lookups += 1;
        if state.candidates[self.index].spec.secondary.is_none() {
            return Ok(None);
        }
        Ok(Some(Arc::new(ScriptedSecondary {
            shared: self.shared.clone(),
            index: self.index,
        })))
    }

    async fn bring_into_view(&self) -> Result<(), PageError> {
        Ok(())
    }
}

struct ScriptedActionControl {
    shared: Shared,
    index: usize,
}

#[async_trait]
impl ControlPort for ScriptedActionControl {
    async fn is_visible(&self) -> Result<bool, PageError> {
        Ok(true)
    }

    async fn is_enabled(&self) -> Result<bool, PageError> {
        Ok(true)
    }

    async fn click(&self) -> Result<(), PageError> {
        let mut state = self.shared.lock();
        state.counters.action_clicks += 1;
        let prefill = state.candidates[self.index].spec.composer_prefill.clone();
        state.active = Some(ActiveComposer {
            candidate: self.index,
            content: prefill,
        });
        Ok(())
    }

    async fn mark(&self, marker: Marker) -> Result<(), PageError> {
        self.shared.lock().candidates[self.index].marks.push(marker);
        Ok(())
    }
}

struct ScriptedSecondary {
    shared: Shared,
    index: usize,
}

#[async_trait]
impl SecondaryPort for ScriptedSecondary {
    async fn is_engaged(&self) -> Result<bool, PageError> {
        Ok(self.shared.lock().candidates[self.index]
            .spec
            .secondary
            .unwrap_or(false))
    }

    async fn engage(&self) -> Result<(), PageError> {
        let mut state = self.shared.lock();
        state.counters.secondary_engagements += 1;
        state.candidates[self.index].spec.secondary = Some(true);
        Ok(())
    }

    async fn mark(&self, marker: Marker) -> Result<(), PageError> {
        self.shared.lock().candidates[self.index].marks.push(marker);
        Ok(())
    }
}

struct ScriptedComposer {
    shared: Shared,
}

#[async_trait]
impl ComposerPort for ScriptedComposer {
    async fn content(&self) -> Result<String, PageError> {
        let state = self.shared.lock();
        state
            .active
            .as_ref()
            .map(|a| a.content.clone())
            .ok_or(PageError::Detached)
    }

    async fn insert(&self, chunk: &str) -> Result<(), PageError> {
        let mut state = self.shared.lock();
        state.counters.inserted_chunks += 1;
        match state.active.as_mut() {
            Some(active) => {
                active.content.push_str(chunk);
                Ok(())
            }
            None => Err(PageError::Detached),
        }
    }

    async fn dispatch_commit_key(&self) -> Result<(), PageError> {
        let mut state = self.shared.lock();
        state.counters.commit_keys += 1;
        if state.commit_key_fails {
            return Err(PageError::Adapter("commit key rejected".to_string()));
        }
        state.record_submission(true);
        Ok(())
    }

    async fn submit_control(&self) -> Result<Option<Arc<dyn ControlPort>>, PageError> {
        let state = self.shared.lock();
        if state.active.is_none() {
            return Ok(None);
        }
        Ok(Some(Arc::new(ScriptedSubmitControl {
            shared: self.shared.clone(),
        })))
    }

    async fn mark(&self, marker: Marker) -> Result<(), PageError> {
        let mut state = self.shared.lock();
        let candidate = state.active.as_ref().map(|a| a.candidate);
        if let Some(index) = candidate {
            state.candidates[index].marks.push(marker);
        }
        Ok(())
    }
}

struct ScriptedSubmitControl {
    shared: Shared,
}

#[async_trait]
impl ControlPort for ScriptedSubmitControl {
    async fn is_visible(&self) -> Result<bool, PageError> {
        Ok(self.shared.lock().active.is_some())
    }

    async fn is_enabled(&self) -> Result<bool, PageError> {
        let state = self.shared.lock();
        match state.submit_behavior {
            SubmitBehavior::NeverEnabled => Ok(false),
            SubmitBehavior::EnableOnContent => Ok(state
                .active
                .as_ref()
                .map(|a| !a.content.is_empty())
                .unwrap_or(false)),
        }
    }

    async fn click(&self) -> Result<(), PageError> {
        let mut state = self.shared.lock();
        state.counters.submit_clicks += 1;
        if state.active.is_none() {
            return Err(PageError::Detached);
        }
        state.record_submission(false);
        Ok(())
    }

    async fn mark(&self, marker: Marker) -> Result<(), PageError> {
        let mut state = self.shared.lock();
        let candidate = state.active.as_ref().map(|a| a.candidate);
        if let Some(index) = candidate {
            state.candidates[index].marks.push(marker);
        }
        Ok(())
    }
}
