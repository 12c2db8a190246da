//! End-to-end properties of the continuation bridge against scripted primitives.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tether_bridge::{
    Bridge, BridgeError, CallbackApi, Demand, FailureHandler, MisusePolicy, ProtocolViolation,
    Published, PushSource, Subscriber, SuccessHandler, first_emission, with_checked_continuation,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct FetchError {
    code: u16,
    reason: &'static str,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code, self.reason)
    }
}

/// Completes on a background thread after `delay`.
struct Delayed {
    delay: Duration,
}

enum Outcome {
    Succeed(String),
    Fail(FetchError),
}

impl CallbackApi for Delayed {
    type Request = Outcome;
    type Output = String;
    type Error = FetchError;

    fn register(
        &self,
        request: Outcome,
        on_success: SuccessHandler<String>,
        on_failure: FailureHandler<FetchError>,
    ) {
        let delay = self.delay;
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            match request {
                Outcome::Succeed(value) => on_success(value),
                Outcome::Fail(error) => on_failure(error),
            }
        });
    }
}

#[tokio::test]
async fn success_value_round_trips_unchanged() {
    let api = Delayed {
        delay: Duration::from_millis(5),
    };
    let bridge = Bridge::new(MisusePolicy::Report);

    let value = bridge
        .call(&api, Outcome::Succeed("heart.fill".to_string()))
        .await
        .unwrap();
    assert_eq!(value, "heart.fill");
}

#[tokio::test]
async fn failure_surfaces_exact_error() {
    let api = Delayed {
        delay: Duration::from_millis(5),
    };
    let bridge = Bridge::new(MisusePolicy::Report);
    let expected = FetchError {
        code: 404,
        reason: "not found",
    };

    let err = bridge
        .call(&api, Outcome::Fail(expected.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.into_underlying(), Some(expected));
}

/// Calls success, then failure, from one background thread.
struct DoubleResumer {
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CallbackApi for DoubleResumer {
    type Request = ();
    type Output = u32;
    type Error = FetchError;

    fn register(
        &self,
        _request: (),
        on_success: SuccessHandler<u32>,
        on_failure: FailureHandler<FetchError>,
    ) {
        let worker = std::thread::spawn(move || {
            on_success(1);
            on_failure(FetchError {
                code: 500,
                reason: "late failure",
            });
        });
        *self.worker.lock().unwrap() = Some(worker);
    }
}

#[tokio::test]
async fn double_resume_is_detected_not_ignored() {
    let api = DoubleResumer {
        worker: Mutex::new(None),
    };
    let bridge = Bridge::new(MisusePolicy::Panic);

    // The caller sees only the first completion.
    let value = bridge.call(&api, ()).await.unwrap();
    assert_eq!(value, 1);

    // The second resume panicked on the primitive's thread.
    let worker = api.worker.lock().unwrap().take().unwrap();
    assert!(worker.join().is_err());
}

#[tokio::test]
async fn double_resume_is_reported_under_report_policy() {
    let violations = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&violations);

    let result: Result<u32, BridgeError<FetchError>> =
        with_checked_continuation(MisusePolicy::Report, move |continuation| {
            let first = continuation.resume_returning(10);
            let second = continuation.resume_throwing(FetchError {
                code: 500,
                reason: "again",
            });
            let mut sink = sink.lock().unwrap();
            sink.push(first);
            sink.push(second);
        })
        .await;

    assert_eq!(result.unwrap(), 10);
    let violations = violations.lock().unwrap();
    assert!(violations[0].is_ok());
    assert!(matches!(
        violations[1],
        Err(ProtocolViolation::AlreadyResumed { .. })
    ));
}

/// Accepts handlers and never calls or drops them.
struct BlackHole {
    parked: Mutex<Vec<(SuccessHandler<u32>, FailureHandler<FetchError>)>>,
}

impl CallbackApi for BlackHole {
    type Request = ();
    type Output = u32;
    type Error = FetchError;

    fn register(
        &self,
        _request: (),
        on_success: SuccessHandler<u32>,
        on_failure: FailureHandler<FetchError>,
    ) {
        self.parked.lock().unwrap().push((on_success, on_failure));
    }
}

#[tokio::test]
async fn never_completing_primitive_leaves_caller_suspended() {
    let api = BlackHole {
        parked: Mutex::new(Vec::new()),
    };
    let bridge = Bridge::new(MisusePolicy::Report);

    let waited = tokio::time::timeout(Duration::from_millis(50), bridge.call(&api, ())).await;
    assert!(waited.is_err(), "caller must still be parked");
    assert_eq!(api.parked.lock().unwrap().len(), 1);
}

/// Accepts handlers and drops them immediately.
struct Forgetful;

impl CallbackApi for Forgetful {
    type Request = ();
    type Output = u32;
    type Error = FetchError;

    fn register(&self, _request: (), _: SuccessHandler<u32>, _: FailureHandler<FetchError>) {}
}

#[tokio::test]
async fn dropped_handlers_resume_caller_with_abandoned() {
    let err = Bridge::new(MisusePolicy::Report)
        .call(&Forgetful, ())
        .await
        .unwrap_err();
    assert!(matches!(
        err.violation(),
        Some(ProtocolViolation::Abandoned { .. })
    ));
}

/// Emits its script synchronously, stopping as soon as demand ends.
struct Scripted {
    script: Vec<&'static str>,
    emitted: Arc<AtomicUsize>,
}

impl PushSource<&'static str> for Scripted {
    fn subscribe(&self, mut subscriber: Subscriber<&'static str>) {
        for &value in &self.script {
            self.emitted.fetch_add(1, Ordering::SeqCst);
            if subscriber.send(value) == Demand::Done {
                break;
            }
        }
    }
}

#[tokio::test]
async fn push_source_yields_first_emission_only() {
    let emitted = Arc::new(AtomicUsize::new(0));
    let source = Scripted {
        script: vec!["A", "B", "C"],
        emitted: Arc::clone(&emitted),
    };

    assert_eq!(first_emission(&source).await, Some("A"));
    assert_eq!(emitted.load(Ordering::SeqCst), 1);
}

/// Emits from a spawned task with a pause between values.
struct Ticking {
    emitted: Arc<AtomicUsize>,
}

impl PushSource<char> for Ticking {
    fn subscribe(&self, mut subscriber: Subscriber<char>) {
        let emitted = Arc::clone(&self.emitted);
        tokio::spawn(async move {
            for value in ['A', 'B', 'C'] {
                if subscriber.is_cancelled() {
                    break;
                }
                emitted.fetch_add(1, Ordering::SeqCst);
                subscriber.send(value);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        });
    }
}

#[tokio::test]
async fn asynchronous_push_source_stops_after_first() {
    let emitted = Arc::new(AtomicUsize::new(0));
    let source = Ticking {
        emitted: Arc::clone(&emitted),
    };

    assert_eq!(first_emission(&source).await, Some('A'));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(emitted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn published_first_emission_is_current_value() {
    let fruits = Published::new(vec!["Apple"]);
    let first = first_emission(&fruits).await;
    fruits.modify(|list| list.push("Banana"));

    assert_eq!(first, Some(vec!["Apple"]));
    tokio::task::yield_now().await;
    assert_eq!(fruits.observer_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_bridges_do_not_interfere() {
    let slow = Delayed {
        delay: Duration::from_millis(30),
    };
    let fast = Delayed {
        delay: Duration::from_millis(5),
    };
    let bridge = Bridge::new(MisusePolicy::Report);
    let failure = FetchError {
        code: 503,
        reason: "unavailable",
    };

    let (left, right) = tokio::join!(
        bridge.call(&slow, Outcome::Succeed("slow".to_string())),
        bridge.call(&fast, Outcome::Fail(failure.clone())),
    );

    assert_eq!(left.unwrap(), "slow");
    assert_eq!(right.unwrap_err().into_underlying(), Some(failure));
}
