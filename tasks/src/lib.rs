//! Concurrency building blocks layered on the continuation bridge.
//!
//! - [`RecordStore`]: actor-isolated state behind a single mailbox.
//! - [`LockedRecords`]: the same state behind a lock, with a callback API.
//! - [`try_join_all`] / [`join_successes`]: task-group fan-out and fan-in.

mod actor;
mod group;
mod locked;

pub use actor::RecordStore;
pub use group::{join_successes, try_join_all};
pub use locked::LockedRecords;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ActorError {
    #[error("actor has stopped")]
    Stopped,
}
