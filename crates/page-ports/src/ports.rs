use std::sync::Arc;

use async_trait::async_trait;

use crate::PageError;

/// Identifies the page a progress record is scoped to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PageScope {
    /// Canonical content identifier, when the page exposes one.
    pub canonical: Option<String>,
    /// Navigable path, always available.
    pub path: String,
}

/// Visual marker applied instead of a real trigger in simulation mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Marker {
    ActionControl,
    Composer,
    Submit,
    Secondary,
}

/// The host page as the core sees it.
#[async_trait]
pub trait PagePort: Send + Sync {
    async fn scope(&self) -> Result<PageScope, PageError>;

    /// Currently visible candidates, in document order. Lazy-loaded content
    /// legitimately returns fewer than all logical units; the discovery
    /// driver handles that, it is not an error.
    async fn list_candidates(&self) -> Result<Vec<Arc<dyn CandidatePort>>, PageError>;

    /// Trigger visible "load more" style controls once. Returns how many
    /// expansions were performed.
    async fn expand_collapsed(&self) -> Result<u32, PageError>;

    /// One scroll step to surface more content.
    async fn scroll_for_more(&self) -> Result<(), PageError>;

    /// The active text-entry surface. At most one is active at a time;
    /// last-attached wins if several are technically present.
    async fn active_composer(&self) -> Result<Option<Arc<dyn ComposerPort>>, PageError>;
}

/// One discovered, potentially-actionable unit. Transient: constructed fresh
/// on every discovery pass, never persisted.
#[async_trait]
pub trait CandidatePort: Send + Sync {
    /// Raw identity as extracted from the document; normalized by the
    /// progress store before any comparison.
    fn raw_key(&self) -> String;

    /// Display content used for interest matching. Empty when the unit has
    /// not finished rendering.
    async fn text(&self) -> Result<String, PageError>;

    /// The operator already handled this candidate outside the tool.
    async fn has_own_prior_action(&self) -> Result<bool, PageError>;

    async fn action_control(&self) -> Result<Option<Arc<dyn ControlPort>>, PageError>;

    async fn secondary_control(&self) -> Result<Option<Arc<dyn SecondaryPort>>, PageError>;

    async fn bring_into_view(&self) -> Result<(), PageError>;
}

/// A clickable control with live visibility and enablement.
#[async_trait]
pub trait ControlPort: Send + Sync {
    async fn is_visible(&self) -> Result<bool, PageError>;
    async fn is_enabled(&self) -> Result<bool, PageError>;
    async fn click(&self) -> Result<(), PageError>;
    /// Non-committing visual marker for simulation mode.
    async fn mark(&self, marker: Marker) -> Result<(), PageError>;
}

/// The secondary-action control, with its live engaged state.
#[async_trait]
pub trait SecondaryPort: Send + Sync {
    async fn is_engaged(&self) -> Result<bool, PageError>;
    async fn engage(&self) -> Result<(), PageError>;
    async fn mark(&self, marker: Marker) -> Result<(), PageError>;
}

/// The active text-entry surface.
#[async_trait]
pub trait ComposerPort: Send + Sync {
    async fn content(&self) -> Result<String, PageError>;
    /// Insert one chunk at the end of the existing content.
    async fn insert(&self, chunk: &str) -> Result<(), PageError>;
    /// Synthetic commit key event; the fallback submission trigger.
    async fn dispatch_commit_key(&self) -> Result<(), PageError>;
    /// The submit control tied to this composer, if one can be located.
    async fn submit_control(&self) -> Result<Option<Arc<dyn ControlPort>>, PageError>;
    async fn mark(&self, marker: Marker) -> Result<(), PageError>;
}
