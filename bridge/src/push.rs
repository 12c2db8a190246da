//! Push-style sources and the single-result adapter over them.
//!
//! A push source calls its subscriber for every value it produces. After each
//! value the subscriber answers with a [`Demand`]; once it answers
//! [`Demand::Done`] (or its [`Subscription`] is cancelled) the source must stop
//! emitting, and anything it emits anyway is dropped unseen.

use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::{Stream, StreamExt};

use crate::continuation::{Continuation, pending};

type Teardown = Box<dyn FnOnce() + Send + 'static>;

/// Whether a subscriber wants further values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demand {
    More,
    Done,
}

struct SubscriptionState {
    cancelled: AtomicBool,
    teardown: Mutex<Vec<Teardown>>,
}

impl SubscriptionState {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            cancelled: AtomicBool::new(false),
            teardown: Mutex::new(Vec::new()),
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let teardown = std::mem::take(
            &mut *self
                .teardown
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for action in teardown {
            action();
        }
    }

    fn on_cancel(&self, action: Teardown) {
        let mut teardown = self
            .teardown
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Checked under the lock so an action is never stranded by a racing cancel.
        if self.is_cancelled() {
            drop(teardown);
            action();
        } else {
            teardown.push(action);
        }
    }
}

/// The sink end of a subscription, handed to a [`PushSource`].
pub struct Subscriber<T> {
    sink: Box<dyn FnMut(T) -> Demand + Send + 'static>,
    state: Arc<SubscriptionState>,
}

impl<T> Subscriber<T> {
    /// Create a subscriber around `sink` and the consumer's cancel handle.
    pub fn new<F>(sink: F) -> (Self, Subscription)
    where
        F: FnMut(T) -> Demand + Send + 'static,
    {
        let state = SubscriptionState::new();
        (
            Self {
                sink: Box::new(sink),
                state: Arc::clone(&state),
            },
            Subscription { state },
        )
    }

    /// Deliver one value. Returns `Done` without running the sink once the
    /// subscription has ended.
    pub fn send(&mut self, value: T) -> Demand {
        if self.state.is_cancelled() {
            return Demand::Done;
        }
        let demand = (self.sink)(value);
        if demand == Demand::Done {
            self.state.cancel();
        }
        demand
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    /// A handle a source keeps to register teardown after moving `self` away.
    pub fn link(&self) -> SubscriptionLink {
        SubscriptionLink {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Source-side view of a subscription's lifetime.
#[derive(Clone)]
pub struct SubscriptionLink {
    state: Arc<SubscriptionState>,
}

impl SubscriptionLink {
    /// Run `action` when the subscription ends, or now if it already has.
    pub fn on_cancel<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.state.on_cancel(Box::new(action));
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}

/// Consumer-side cancel handle. Dropping it cancels the subscription.
#[must_use = "dropping a subscription cancels it immediately"]
pub struct Subscription {
    state: Arc<SubscriptionState>,
}

impl Subscription {
    pub fn cancel(&self) {
        self.state.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.state.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// A multi-value source that pushes into subscribers.
pub trait PushSource<T> {
    fn subscribe(&self, subscriber: Subscriber<T>);
}

/// Resolves its continuation once: with the first value, or with `None` when
/// the source drops the subscriber without emitting.
struct FirstValue<T> {
    continuation: Option<Continuation<Option<T>, Infallible>>,
}

impl<T> FirstValue<T> {
    fn resolve(&mut self, value: Option<T>) {
        if let Some(continuation) = self.continuation.take() {
            continuation.resume_returning(value);
        }
    }
}

impl<T> Drop for FirstValue<T> {
    fn drop(&mut self) {
        self.resolve(None);
    }
}

/// Subscribe to `source`, return its first emission, and unsubscribe.
///
/// Later emissions are never observed. `None` means the source finished
/// without emitting anything.
pub async fn first_emission<T, S>(source: &S) -> Option<T>
where
    S: PushSource<T> + ?Sized,
    T: Send + 'static,
{
    let (continuation, pending) = pending::<Option<T>, Infallible>();
    let operation = pending.id();
    let mut first = FirstValue {
        continuation: Some(continuation),
    };
    let (subscriber, subscription) = Subscriber::new(move |value| {
        first.resolve(Some(value));
        Demand::Done
    });

    source.subscribe(subscriber);
    let outcome = pending.await;
    subscription.cancel();
    tracing::trace!(%operation, "first emission received; subscription cancelled");
    outcome.ok().flatten()
}

/// Pull counterpart of [`first_emission`]: take one item and drop the stream.
pub async fn first_item<S>(stream: S) -> Option<S::Item>
where
    S: Stream,
{
    let mut stream = std::pin::pin!(stream);
    stream.next().await
}
