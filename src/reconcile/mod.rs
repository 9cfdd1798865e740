//! Synchronizing computed weights with persisted split targets.

pub mod lock;
pub mod reconciler;

pub use lock::RunLock;
pub use reconciler::{PoolOutcome, Reconciler, SplitAction};
