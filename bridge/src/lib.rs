//! Exactly-once bridges from callback and push APIs into `async` calls.
//!
//! A callback API completes by invoking a handler some time later, on some
//! thread. This crate turns such an API into an ordinary `.await` that resumes
//! exactly once with a value or an error:
//!
//! ```text
//! caller ──call()──► PendingOperation ◄──resume── Continuation ◄── callback
//!    ▲                     │
//!    └──── Result<T, BridgeError<E>> ◄─┘
//! ```
//!
//! Multi-value push sources are adapted to one result by taking the first
//! emission and unsubscribing from the rest.

mod callback;
mod continuation;
mod publisher;
mod push;

pub use callback::{Bridge, CallbackApi, FailureHandler, SuccessHandler, call};
pub use continuation::{
    CheckedContinuation, Continuation, PendingOperation, checked_pending, pending,
    with_checked_continuation, with_continuation,
};
pub use publisher::Published;
pub use push::{
    Demand, PushSource, Subscriber, Subscription, SubscriptionLink, first_emission, first_item,
};
pub use tether_types::{BridgeError, MisusePolicy, OperationId, ProtocolViolation};
