use thiserror::Error;

/// Rejected operator command.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("a run is already active for this page")]
    AlreadyRunning,
    #[error("action cap must be at least 1")]
    InvalidCap,
}
