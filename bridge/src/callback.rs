//! Callback-style primitives and the bridge that turns them into `async` calls.

use tether_types::{BridgeError, MisusePolicy};

use crate::continuation::with_checked_continuation;
use crate::push::{PushSource, first_emission};

pub type SuccessHandler<T> = Box<dyn FnOnce(T) + Send + 'static>;
pub type FailureHandler<E> = Box<dyn FnOnce(E) + Send + 'static>;

/// An asynchronous operation exposed through completion callbacks.
///
/// `register` starts the operation for `request`. The implementation must
/// invoke at most one of the two handlers, at most once combined, from any
/// thread. Invoking neither parks the bridged caller indefinitely.
pub trait CallbackApi {
    type Request;
    type Output: Send + 'static;
    type Error: Send + 'static;

    fn register(
        &self,
        request: Self::Request,
        on_success: SuccessHandler<Self::Output>,
        on_failure: FailureHandler<Self::Error>,
    );
}

/// Start `request` on `api` and suspend until one of its handlers fires.
///
/// Both handlers share one checked continuation, so a primitive that calls
/// both (or either twice) is caught by the guard and handled per `policy`.
pub async fn call<A>(
    api: &A,
    request: A::Request,
    policy: MisusePolicy,
) -> Result<A::Output, BridgeError<A::Error>>
where
    A: CallbackApi + ?Sized,
{
    with_checked_continuation(policy, |continuation| {
        let on_failure = continuation.clone();
        // A violation has already been logged (or panicked) by the guard and
        // the primitive has no channel to receive it.
        api.register(
            request,
            Box::new(move |value| {
                let _ = continuation.resume_returning(value);
            }),
            Box::new(move |error| {
                let _ = on_failure.resume_throwing(error);
            }),
        );
    })
    .await
}

/// Explicit bridge handle.
///
/// Carries the misuse policy down a call chain in place of process-global
/// state. Cheap to copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bridge {
    policy: MisusePolicy,
}

impl Bridge {
    #[must_use]
    pub const fn new(policy: MisusePolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub const fn policy(self) -> MisusePolicy {
        self.policy
    }

    pub async fn call<A>(
        &self,
        api: &A,
        request: A::Request,
    ) -> Result<A::Output, BridgeError<A::Error>>
    where
        A: CallbackApi + ?Sized,
    {
        call(api, request, self.policy).await
    }

    /// Adapt a multi-value source to its first emission.
    pub async fn first_emission<T, S>(&self, source: &S) -> Option<T>
    where
        S: PushSource<T> + ?Sized,
        T: Send + 'static,
    {
        first_emission(source).await
    }
}
