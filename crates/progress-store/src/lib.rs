//! Durable, scope-keyed set of handled candidate keys.
//!
//! The record survives process restarts and is the only state shared across
//! runs: membership here is what makes the engine idempotent. Reads never
//! fail (absent or malformed documents load as empty), writes are
//! best-effort, and keys are normalized uniformly on load and on every add
//! so two raw representations of the same logical target collapse to one
//! entry.

mod norm;
mod storage;
mod store;

pub use norm::KeyNorm;
pub use storage::{DirStorage, MemoryStorage, StorageError, StoragePort};
pub use store::{ProgressStore, STORAGE_PREFIX};
