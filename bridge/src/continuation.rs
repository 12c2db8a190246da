//! One-shot continuations.
//!
//! A [`PendingOperation`] is the caller's half of a bridged call: a future that
//! resolves exactly once. Its resolving half comes in two flavours:
//!
//! - [`Continuation`] is consumed by `resume`, so a second resume does not
//!   compile. Use it whenever one code path owns completion.
//! - [`CheckedContinuation`] can be cloned into several callbacks (a success
//!   handler and a failure handler, say). The slot is guarded at runtime and a
//!   second resume is reported according to the [`MisusePolicy`].
//!
//! In both flavours, dropping every resolving handle without resuming wakes the
//! caller with [`ProtocolViolation::Abandoned`] rather than leaving it parked.
//! A primitive that holds on to its continuation and never calls it still
//! parks the caller forever; bounding that wait is the caller's job.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use tether_types::{BridgeError, MisusePolicy, OperationId, ProtocolViolation};

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

fn next_operation_id() -> OperationId {
    OperationId::new(NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed))
}

type Slot<T, E> = oneshot::Sender<Result<T, E>>;

fn deliver<T, E>(operation: OperationId, slot: Slot<T, E>, result: Result<T, E>) {
    if slot.send(result).is_err() {
        tracing::debug!(%operation, "caller stopped waiting before resumption");
    }
}

/// Value wins, then error, then the fallback error.
fn resolve_parts<T, E, F>(value: Option<T>, error: Option<E>, missing: F) -> Result<T, E>
where
    F: FnOnce() -> E,
{
    match (value, error) {
        (Some(value), _) => Ok(value),
        (None, Some(error)) => Err(error),
        (None, None) => Err(missing()),
    }
}

// ============================================================================
// Caller side
// ============================================================================

/// The suspended caller's view of one in-flight bridged call.
///
/// Awaiting it parks the task without holding a worker thread. It resolves to
/// the value or error delivered by the continuation, or to
/// [`ProtocolViolation::Abandoned`] if the continuation was dropped unresumed.
#[must_use = "a pending operation does nothing unless awaited"]
pub struct PendingOperation<T, E> {
    operation: OperationId,
    rx: oneshot::Receiver<Result<T, E>>,
}

impl<T, E> PendingOperation<T, E> {
    pub fn id(&self) -> OperationId {
        self.operation
    }
}

impl<T, E> Future for PendingOperation<T, E> {
    type Output = Result<T, BridgeError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let operation = self.operation;
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(Ok(value))) => Poll::Ready(Ok(value)),
            Poll::Ready(Ok(Err(error))) => Poll::Ready(Err(BridgeError::Underlying(error))),
            Poll::Ready(Err(_)) => {
                Poll::Ready(Err(ProtocolViolation::Abandoned { operation }.into()))
            }
        }
    }
}

impl<T, E> fmt::Debug for PendingOperation<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingOperation")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Move-only continuation
// ============================================================================

/// Resolving half that can be resumed at most once by construction.
#[must_use = "dropping a continuation without resuming abandons the waiting caller"]
pub struct Continuation<T, E> {
    operation: OperationId,
    slot: Option<Slot<T, E>>,
}

impl<T, E> Continuation<T, E> {
    pub fn id(&self) -> OperationId {
        self.operation
    }

    pub fn resume(mut self, result: Result<T, E>) {
        if let Some(slot) = self.slot.take() {
            deliver(self.operation, slot, result);
        }
    }

    pub fn resume_returning(self, value: T) {
        self.resume(Ok(value));
    }

    pub fn resume_throwing(self, error: E) {
        self.resume(Err(error));
    }

    /// Resolve from a completion handler that reports `(value?, error?)`.
    ///
    /// A present value wins over a present error; when both are absent the
    /// caller fails with `missing()`.
    pub fn resume_with_parts<F>(self, value: Option<T>, error: Option<E>, missing: F)
    where
        F: FnOnce() -> E,
    {
        self.resume(resolve_parts(value, error, missing));
    }
}

impl<T, E> Drop for Continuation<T, E> {
    fn drop(&mut self) {
        if self.slot.is_some() {
            tracing::warn!(
                operation = %self.operation,
                "continuation dropped without resuming its caller"
            );
        }
    }
}

impl<T, E> fmt::Debug for Continuation<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("operation", &self.operation)
            .field("resumed", &self.slot.is_none())
            .finish()
    }
}

/// Create a linked continuation and pending operation.
pub fn pending<T, E>() -> (Continuation<T, E>, PendingOperation<T, E>) {
    let operation = next_operation_id();
    let (tx, rx) = oneshot::channel();
    (
        Continuation {
            operation,
            slot: Some(tx),
        },
        PendingOperation { operation, rx },
    )
}

/// Hand a continuation to `body`, then suspend until it is resumed.
///
/// `body` runs synchronously on the calling task before the first suspension,
/// which is where callback registration belongs.
pub async fn with_continuation<T, E, F>(body: F) -> Result<T, BridgeError<E>>
where
    F: FnOnce(Continuation<T, E>),
{
    let (continuation, pending) = pending();
    tracing::trace!(operation = %pending.id(), "suspending on continuation");
    body(continuation);
    pending.await
}

// ============================================================================
// Checked continuation
// ============================================================================

struct CheckedSlot<T, E> {
    operation: OperationId,
    policy: MisusePolicy,
    slot: Mutex<Option<Slot<T, E>>>,
}

impl<T, E> CheckedSlot<T, E> {
    fn take(&self) -> Option<Slot<T, E>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn violated(&self) -> ProtocolViolation {
        let violation = ProtocolViolation::AlreadyResumed {
            operation: self.operation,
        };
        tracing::error!(
            operation = %self.operation,
            policy = self.policy.as_str(),
            "{violation}"
        );
        if self.policy == MisusePolicy::Panic {
            panic!("{violation}");
        }
        violation
    }
}

impl<T, E> Drop for CheckedSlot<T, E> {
    fn drop(&mut self) {
        let slot = self.slot.get_mut().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            tracing::warn!(
                operation = %self.operation,
                "checked continuation dropped without resuming its caller"
            );
        }
    }
}

/// Resolving half that may be shared between several callbacks.
///
/// The first resume wins. Every later resume is a protocol violation: it is
/// logged, then either panics or is returned, depending on the policy.
pub struct CheckedContinuation<T, E> {
    shared: Arc<CheckedSlot<T, E>>,
}

impl<T, E> Clone for CheckedContinuation<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> CheckedContinuation<T, E> {
    pub fn id(&self) -> OperationId {
        self.shared.operation
    }

    pub fn policy(&self) -> MisusePolicy {
        self.shared.policy
    }

    pub fn is_resumed(&self) -> bool {
        self.shared
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    pub fn resume(&self, result: Result<T, E>) -> Result<(), ProtocolViolation> {
        match self.shared.take() {
            Some(slot) => {
                deliver(self.shared.operation, slot, result);
                Ok(())
            }
            None => Err(self.shared.violated()),
        }
    }

    pub fn resume_returning(&self, value: T) -> Result<(), ProtocolViolation> {
        self.resume(Ok(value))
    }

    pub fn resume_throwing(&self, error: E) -> Result<(), ProtocolViolation> {
        self.resume(Err(error))
    }

    /// See [`Continuation::resume_with_parts`].
    pub fn resume_with_parts<F>(
        &self,
        value: Option<T>,
        error: Option<E>,
        missing: F,
    ) -> Result<(), ProtocolViolation>
    where
        F: FnOnce() -> E,
    {
        self.resume(resolve_parts(value, error, missing))
    }
}

impl<T, E> fmt::Debug for CheckedContinuation<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckedContinuation")
            .field("operation", &self.shared.operation)
            .field("policy", &self.shared.policy)
            .field("resumed", &self.is_resumed())
            .finish()
    }
}

/// Create a linked checked continuation and pending operation.
pub fn checked_pending<T, E>(
    policy: MisusePolicy,
) -> (CheckedContinuation<T, E>, PendingOperation<T, E>) {
    let operation = next_operation_id();
    let (tx, rx) = oneshot::channel();
    let shared = Arc::new(CheckedSlot {
        operation,
        policy,
        slot: Mutex::new(Some(tx)),
    });
    (
        CheckedContinuation { shared },
        PendingOperation { operation, rx },
    )
}

/// Checked counterpart of [`with_continuation`].
pub async fn with_checked_continuation<T, E, F>(
    policy: MisusePolicy,
    body: F,
) -> Result<T, BridgeError<E>>
where
    F: FnOnce(CheckedContinuation<T, E>),
{
    let (continuation, pending) = checked_pending(policy);
    tracing::trace!(operation = %pending.id(), "suspending on checked continuation");
    body(continuation);
    pending.await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resume_returning_delivers_value() {
        let result: Result<u32, BridgeError<String>> =
            with_continuation(|c| c.resume_returning(42)).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn resume_throwing_surfaces_underlying_error() {
        let result: Result<u32, BridgeError<String>> =
            with_continuation(|c| c.resume_throwing("offline".to_string())).await;
        assert_eq!(
            result.unwrap_err().into_underlying().as_deref(),
            Some("offline")
        );
    }

    #[tokio::test]
    async fn dropped_continuation_reports_abandoned() {
        let (continuation, pending) = pending::<u32, String>();
        let id = continuation.id();
        drop(continuation);

        let err = pending.await.unwrap_err();
        assert_eq!(
            err.violation(),
            Some(ProtocolViolation::Abandoned { operation: id })
        );
    }

    #[tokio::test]
    async fn resume_from_another_task() {
        let result: Result<&str, BridgeError<String>> = with_continuation(|c| {
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                c.resume_returning("heart.fill");
            });
        })
        .await;
        assert_eq!(result.unwrap(), "heart.fill");
    }

    #[test]
    fn resolve_parts_prefers_value_then_error() {
        let missing = || "missing".to_string();
        assert_eq!(
            resolve_parts(Some(1), Some("err".to_string()), missing),
            Ok(1)
        );
        assert_eq!(
            resolve_parts::<i32, _, _>(None, Some("err".to_string()), missing),
            Err("err".to_string())
        );
        assert_eq!(
            resolve_parts::<i32, _, _>(None, None, missing),
            Err("missing".to_string())
        );
    }

    #[test]
    fn pending_ids_are_unique() {
        let (a, _pa) = pending::<(), ()>();
        let (b, _pb) = pending::<(), ()>();
        assert_ne!(a.id(), b.id());
        a.resume_returning(());
        b.resume_returning(());
    }

    #[test]
    fn checked_second_resume_is_reported() {
        let (continuation, _pending) = checked_pending::<u8, ()>(MisusePolicy::Report);
        let other = continuation.clone();

        assert!(continuation.resume_returning(1).is_ok());
        assert!(continuation.is_resumed());
        assert_eq!(
            other.resume_throwing(()),
            Err(ProtocolViolation::AlreadyResumed {
                operation: continuation.id()
            })
        );
    }

    #[test]
    #[should_panic(expected = "resumed more than once")]
    fn checked_second_resume_panics_under_panic_policy() {
        let (continuation, _pending) = checked_pending::<u8, ()>(MisusePolicy::Panic);
        continuation.resume_returning(1).unwrap();
        let _ = continuation.resume_returning(2);
    }

    #[tokio::test]
    async fn checked_first_resume_wins() {
        let (continuation, pending) = checked_pending::<u8, &str>(MisusePolicy::Report);
        continuation.resume_returning(7).unwrap();
        assert!(continuation.resume_throwing("late").is_err());
        assert_eq!(pending.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn checked_abandoned_only_after_last_clone_drops() {
        let (continuation, pending) = checked_pending::<u8, ()>(MisusePolicy::Report);
        let survivor = continuation.clone();
        drop(continuation);
        assert!(!survivor.is_resumed());
        survivor.resume_returning(3).unwrap();
        assert_eq!(pending.await.unwrap(), 3);

        let (continuation, pending) = checked_pending::<u8, ()>(MisusePolicy::Report);
        let id = continuation.id();
        drop(continuation.clone());
        drop(continuation);
        assert_eq!(
            pending.await.unwrap_err().violation(),
            Some(ProtocolViolation::Abandoned { operation: id })
        );
    }

    #[test]
    fn resume_after_caller_gone_is_not_a_violation() {
        let (continuation, pending) = checked_pending::<u8, ()>(MisusePolicy::Report);
        drop(pending);
        assert!(continuation.resume_returning(1).is_ok());
    }
}
