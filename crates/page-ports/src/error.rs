use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum PageError {
    /// The element backing a handle left the document tree.
    #[error("element detached from the document")]
    Detached,
    /// The underlying page adapter failed.
    #[error("page adapter failure: {0}")]
    Adapter(String),
}
