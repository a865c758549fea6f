use thiserror::Error;

use replypilot_core_types::AttemptStage;
use replypilot_page_ports::PageError;

/// Failure of one interaction attempt. Aborts the attempt only; the
/// orchestrator logs it and moves to the next candidate.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("action control not found")]
    ActionControlMissing,
    #[error("active composer not found")]
    ComposerMissing,
    #[error("stop requested before the attempt started")]
    Cancelled,
    #[error("page failure during {stage}: {source}")]
    Page {
        stage: AttemptStage,
        #[source]
        source: PageError,
    },
}

impl FlowError {
    pub fn page(stage: AttemptStage, source: PageError) -> Self {
        Self::Page { stage, source }
    }

    /// Stage the attempt died in, for logs and reports.
    pub fn stage(&self) -> AttemptStage {
        match self {
            FlowError::ActionControlMissing => AttemptStage::OpeningControl,
            FlowError::ComposerMissing => AttemptStage::Composing,
            FlowError::Cancelled => AttemptStage::OpeningControl,
            FlowError::Page { stage, .. } => *stage,
        }
    }
}
