//! Observable current-value property.
//!
//! [`Published`] holds one value and notifies observers when it changes. It can
//! be consumed three ways: a callback [`sink`](Published::sink), an async
//! [`values`](Published::values) stream, or any [`PushSource`] adapter such as
//! [`first_emission`](crate::first_emission).
//!
//! Observers always see the latest value. Updates made faster than an observer
//! wakes up coalesce into the most recent one.

use std::fmt;

use futures_util::{Stream, StreamExt, stream};
use tokio::sync::watch;

use crate::push::{Demand, PushSource, Subscriber, Subscription};

pub struct Published<T> {
    tx: watch::Sender<T>,
}

impl<T> Published<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Mutate in place and notify observers.
    pub fn modify<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        self.tx.send_modify(f);
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Stream of the current value followed by every later change.
    ///
    /// The stream ends when the `Published` is dropped.
    pub fn values(&self) -> impl Stream<Item = T> + Send + 'static {
        let mut rx = self.tx.subscribe();
        rx.mark_changed();
        stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let value = rx.borrow_and_update().clone();
            Some((value, rx))
        })
    }

    /// Call `f` with the current value and every later change until the
    /// returned subscription is dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn sink<F>(&self, mut f: F) -> Subscription
    where
        F: FnMut(T) + Send + 'static,
    {
        let (subscriber, subscription) = Subscriber::new(move |value| {
            f(value);
            Demand::More
        });
        self.subscribe(subscriber);
        subscription
    }
}

impl<T> PushSource<T> for Published<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Forwards values from a spawned task; must be called within a Tokio runtime.
    fn subscribe(&self, mut subscriber: Subscriber<T>) {
        let values = self.values();
        let link = subscriber.link();
        let forward = tokio::spawn(async move {
            let mut values = std::pin::pin!(values);
            while let Some(value) = values.next().await {
                if subscriber.send(value) == Demand::Done {
                    break;
                }
            }
        });
        link.on_cancel(move || forward.abort());
    }
}

impl<T: fmt::Debug> fmt::Debug for Published<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Published")
            .field("value", &*self.tx.borrow())
            .field("observers", &self.tx.receiver_count())
            .finish()
    }
}
