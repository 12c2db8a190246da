//! Simulated external collaborators.
//!
//! Stand-ins for the pieces the bridge talks to: a slow local image database
//! with a completion handler, a flaky image server with success/failure
//! handlers, a data task that reports `(bytes?, error?)`, and a fruit basket
//! that fills up over time.

use std::convert::Infallible;
use std::time::Duration;

use tether_bridge::{
    BridgeError, CallbackApi, FailureHandler, MisusePolicy, Published, SuccessHandler,
    with_checked_continuation, with_continuation,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub name: String,
    pub bytes: usize,
}

impl Image {
    fn symbol(name: &str) -> Self {
        Self {
            name: name.to_string(),
            bytes: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("bad url: {0}")]
    BadUrl(String),
    #[error("server returned status {0}")]
    Status(u16),
}

// ============================================================================
// Completion-handler database
// ============================================================================

pub struct HeartDatabase {
    delay: Duration,
}

impl HeartDatabase {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Callback form: `completion` runs on a background task after the delay.
    pub fn fetch_heart<F>(&self, completion: F)
    where
        F: FnOnce(Image) + Send + 'static,
    {
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            completion(Image::symbol("heart.fill"));
        });
    }

    pub async fn heart(&self) -> Result<Image, BridgeError<Infallible>> {
        with_continuation(|continuation| {
            self.fetch_heart(move |image| continuation.resume_returning(image));
        })
        .await
    }
}

// ============================================================================
// Success/failure handler server
// ============================================================================

/// Image server that rejects every id divisible by three.
pub struct ImageServer {
    latency: Duration,
}

impl ImageServer {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl CallbackApi for ImageServer {
    type Request = u32;
    type Output = Image;
    type Error = DownloadError;

    fn register(
        &self,
        id: u32,
        on_success: SuccessHandler<Image>,
        on_failure: FailureHandler<DownloadError>,
    ) {
        let latency = self.latency * (id % 4 + 1);
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            if id % 3 == 0 {
                on_failure(DownloadError::Status(503));
            } else {
                on_success(Image {
                    name: format!("picsum-{id}"),
                    bytes: 200 * 200,
                });
            }
        });
    }
}

// ============================================================================
// Data task with (bytes?, error?) completion
// ============================================================================

/// Reports `(None, None)` for non-https urls, the case a bridge must still
/// resolve.
pub fn data_task<F>(url: &str, completion: F)
where
    F: FnOnce(Option<Vec<u8>>, Option<DownloadError>) + Send + 'static,
{
    let url = url.to_string();
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        if url.starts_with("https://") {
            completion(Some(url.into_bytes()), None);
        } else {
            completion(None, None);
        }
    });
}

pub async fn download(
    url: &str,
    policy: MisusePolicy,
) -> Result<Vec<u8>, BridgeError<DownloadError>> {
    let fallback = DownloadError::BadUrl(url.to_string());
    with_checked_continuation(policy, |continuation| {
        data_task(url, move |bytes, error| {
            let _ = continuation.resume_with_parts(bytes, error, || fallback);
        });
    })
    .await
}

// ============================================================================
// Published property filled over time
// ============================================================================

pub const FRUITS: [&str; 5] = ["Apple", "Banana", "Orange", "Grapes", "Dates"];

pub struct FruitBasket {
    pub fruits: Published<Vec<String>>,
}

impl Default for FruitBasket {
    fn default() -> Self {
        Self {
            fruits: Published::new(Vec::new()),
        }
    }
}

impl FruitBasket {
    /// Append each fruit in turn, pausing `interval` between them.
    pub async fn add_fruits(&self, interval: Duration) {
        for (index, fruit) in FRUITS.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(interval).await;
            }
            self.fruits.modify(|fruits| fruits.push((*fruit).to_string()));
        }
    }
}
