//! Demo scenarios, one per bridging pattern.
//!
//! Each scenario prints what it observed to stdout. Diagnostics go through
//! `tracing` to stderr.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tether_bridge::Bridge;
use tether_config::{ScenarioConfig, TetherConfig};
use tether_tasks::{ActorError, LockedRecords, RecordStore, join_successes, try_join_all};
use thiserror::Error;

use crate::collaborators::{FRUITS, FruitBasket, HeartDatabase, ImageServer, download};

const IMAGE_SERVER_LATENCY: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Continuation,
    Publisher,
    Actor,
    Group,
    All,
}

#[derive(Debug, Error)]
#[error("unknown scenario '{0}' (expected continuation, publisher, actor, group, or all)")]
pub struct UnknownScenario(String);

impl FromStr for Scenario {
    type Err = UnknownScenario;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continuation" => Ok(Scenario::Continuation),
            "publisher" => Ok(Scenario::Publisher),
            "actor" => Ok(Scenario::Actor),
            "group" => Ok(Scenario::Group),
            "all" => Ok(Scenario::All),
            _ => Err(UnknownScenario(s.to_string())),
        }
    }
}

impl Scenario {
    const EACH: [Scenario; 4] = [
        Scenario::Continuation,
        Scenario::Publisher,
        Scenario::Actor,
        Scenario::Group,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Scenario::Continuation => "continuation",
            Scenario::Publisher => "publisher",
            Scenario::Actor => "actor",
            Scenario::Group => "group",
            Scenario::All => "all",
        }
    }

    /// The concrete scenarios to run, in order.
    pub fn expand(self) -> Vec<Scenario> {
        match self {
            Scenario::All => Self::EACH.to_vec(),
            one => vec![one],
        }
    }
}

/// Everything a scenario needs, passed explicitly.
pub struct ScenarioContext {
    bridge: Bridge,
    settings: ScenarioConfig,
}

impl ScenarioContext {
    pub fn new(bridge: Bridge, settings: ScenarioConfig) -> Self {
        Self { bridge, settings }
    }

    pub fn from_config(config: TetherConfig) -> Self {
        Self::new(
            Bridge::new(config.bridge.misuse_policy),
            config.scenarios,
        )
    }

    /// Caller-side bound applied to each scenario.
    pub fn timeout(&self) -> Duration {
        self.settings.timeout()
    }
}

/// Run one concrete scenario. `All` runs each in turn.
pub async fn run(scenario: Scenario, ctx: &ScenarioContext) -> Result<()> {
    for one in scenario.expand() {
        tracing::info!(scenario = one.as_str(), "running scenario");
        match one {
            Scenario::Continuation => continuation(ctx).await?,
            Scenario::Publisher => publisher(ctx).await?,
            Scenario::Actor => actor(ctx).await?,
            Scenario::Group => group(ctx).await?,
            Scenario::All => unreachable!("expand never yields All"),
        }
    }
    Ok(())
}

async fn continuation(ctx: &ScenarioContext) -> Result<()> {
    let db = HeartDatabase::new(ctx.settings.heart_delay());
    let image = db.heart().await.context("loading from image database")?;
    println!("continuation: loaded '{}' from the local database", image.name);

    let policy = ctx.bridge.policy();
    let bytes = download("https://picsum.photos/200", policy)
        .await
        .context("downloading image")?;
    println!("continuation: downloaded {} bytes", bytes.len());

    match download("picsum.photos/200", policy).await {
        Ok(bytes) => println!("continuation: unexpected {} bytes", bytes.len()),
        Err(err) => println!("continuation: malformed url surfaced as '{err}'"),
    }
    Ok(())
}

async fn publisher(ctx: &ScenarioContext) -> Result<()> {
    let basket = Arc::new(FruitBasket::default());

    let updates = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&updates);
    let subscription = basket.fruits.sink(move |_| {
        counter.fetch_add(1, Ordering::Relaxed);
    });

    let producer = {
        let basket = Arc::clone(&basket);
        let interval = ctx.settings.fruit_interval();
        tokio::spawn(async move { basket.add_fruits(interval).await })
    };

    let first = ctx.bridge.first_emission(&basket.fruits).await;
    println!(
        "publisher: first emission held {} fruit(s)",
        first.map_or(0, |fruits| fruits.len())
    );

    let mut values = std::pin::pin!(basket.fruits.values());
    while let Some(fruits) = values.next().await {
        println!("publisher: [{}]", fruits.join(", "));
        if fruits.len() == FRUITS.len() {
            break;
        }
    }

    producer.await.context("fruit producer panicked")?;
    drop(subscription);
    println!(
        "publisher: sink observed {} update(s)",
        updates.load(Ordering::Relaxed)
    );
    Ok(())
}

async fn actor(ctx: &ScenarioContext) -> Result<()> {
    let rounds = ctx.settings.actor_rounds;
    let store = RecordStore::spawn("records", 32);

    let views = ["home", "account"].map(|view| {
        let store = store.clone();
        tokio::spawn(async move {
            let mut last = String::new();
            for _ in 0..rounds {
                last = store.push_random().await?;
            }
            Ok::<_, ActorError>((view, last))
        })
    });
    for view in views {
        let (name, last) = view.await.context("view task panicked")??;
        println!("actor: {name} view last saw {last}");
    }
    println!(
        "actor: '{}' holds {} records",
        store.label(),
        store.len().await?
    );

    let locked = LockedRecords::new();
    let pushes = (0..rounds).map(|_| {
        let locked = locked.clone();
        async move { locked.push_random().await }
    });
    try_join_all(pushes)
        .await
        .context("pushing into lock-guarded records")?;
    println!("actor: lock-guarded store holds {} records", locked.len());
    Ok(())
}

async fn group(ctx: &ScenarioContext) -> Result<()> {
    let server = Arc::new(ImageServer::new(IMAGE_SERVER_LATENCY));
    let bridge = ctx.bridge;
    let size = ctx.settings.group_size as u32;

    let requests = (1..=size).map(|id| {
        let server = Arc::clone(&server);
        async move { bridge.call(server.as_ref(), id).await }
    });
    let images = join_successes(requests).await;
    println!("group: loaded {} of {size} images", images.len());
    for image in &images {
        println!("group:   {} ({} bytes)", image.name, image.bytes);
    }

    let strict = (1..=size).map(|id| {
        let server = Arc::clone(&server);
        async move { bridge.call(server.as_ref(), id).await }
    });
    match try_join_all(strict).await {
        Ok(all) => println!("group: all-or-nothing batch loaded {} images", all.len()),
        Err(err) => println!("group: all-or-nothing batch failed: {err}"),
    }
    Ok(())
}
