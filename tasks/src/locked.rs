//! Lock-guarded record store with a completion-handler API.
//!
//! The pre-actor way to make shared state safe: every access takes one lock,
//! and the mutating call reports its result through a callback from a
//! background thread. [`LockedRecords::push_random`] bridges that callback
//! back into an `async` call.

use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tether_bridge::{BridgeError, with_continuation};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct LockedRecords {
    records: Arc<Mutex<Vec<String>>>,
}

impl LockedRecords {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a fresh record on the blocking pool, then call `done` there
    /// with a randomly chosen record.
    ///
    /// Must be called within a Tokio runtime.
    pub fn push_random_with<F>(&self, done: F)
    where
        F: FnOnce(String) + Send + 'static,
    {
        let records = Arc::clone(&self.records);
        tokio::task::spawn_blocking(move || {
            let pick = {
                let mut records = records.lock().unwrap_or_else(PoisonError::into_inner);
                records.push(Uuid::new_v4().to_string());
                records[rand::random_range(0..records.len())].clone()
            };
            done(pick);
        });
    }

    pub async fn push_random(&self) -> Result<String, BridgeError<Infallible>> {
        with_continuation(|continuation| {
            self.push_random_with(move |pick| continuation.resume_returning(pick));
        })
        .await
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lock().clone()
    }
}
