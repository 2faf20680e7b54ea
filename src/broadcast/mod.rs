//! Live score-delta broadcast.
//!
//! A single [`BroadcastChannel`] owns the registry of connected subscribers.
//! `subscribe`, `unsubscribe`, `tick` and `disconnect_all` are the only ways
//! to mutate it, and all of them take the same mutex. Each subscriber owns a
//! bounded queue; a tick enqueues without waiting, so a slow client never
//! stalls the loop.
//!
//! ## Delivery
//!
//! - Best effort, at most once per tick per registered subscriber
//! - A closed subscriber is removed during the tick that finds it closed
//! - A full queue drops that tick's event for that subscriber only
//! - A subscriber that misses `max_missed_ticks` consecutive ticks on a full
//!   queue is evicted

pub mod policy;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BroadcastConfig;
use crate::metrics::{record_subscription, record_tick_metrics};
use crate::types::{DeltaEvent, SellerId};

pub use policy::{DeltaGenerator, TargetPolicy};

/// Identity of one subscriber connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receiving end of a subscription.
///
/// Dropping it closes the connection's queue; the next tick deregisters it.
#[derive(Debug)]
pub struct Subscription {
    id: ConnectionId,
    receiver: mpsc::Receiver<DeltaEvent>,
}

impl Subscription {
    /// Connection identity, used to unsubscribe.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Wait for the next event. `None` once the channel deregistered us.
    pub async fn recv(&mut self) -> Option<DeltaEvent> {
        self.receiver.recv().await
    }

    /// Take an already queued event without waiting.
    pub fn try_recv(&mut self) -> Option<DeltaEvent> {
        self.receiver.try_recv().ok()
    }
}

#[derive(Debug)]
struct Subscriber {
    sender: mpsc::Sender<DeltaEvent>,
    interest: Option<SellerId>,
    connected_at: DateTime<Utc>,
    missed: u32,
}

#[derive(Debug)]
struct Registry {
    subscribers: HashMap<ConnectionId, Subscriber>,
    generator: DeltaGenerator,
    cursor: usize,
}

/// Outcome of one tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// The event that was fanned out.
    pub event: DeltaEvent,
    /// Subscribers registered when the tick started.
    pub attempted: usize,
    /// Subscribers the event was enqueued for.
    pub delivered: usize,
    /// Subscribers whose queue was full and that stay registered.
    pub dropped: usize,
    /// Subscribers found closed and deregistered.
    pub removed: Vec<ConnectionId>,
    /// Subscribers deregistered after too many consecutive full-queue misses.
    pub evicted: Vec<ConnectionId>,
}

/// Registry of live subscribers plus the periodic delta source.
#[derive(Debug)]
pub struct BroadcastChannel {
    registry: Mutex<Registry>,
    config: BroadcastConfig,
}

impl BroadcastChannel {
    /// Create a channel with an entropy-seeded generator.
    pub fn new(config: BroadcastConfig) -> Self {
        let generator = DeltaGenerator::new(config.bounds);
        Self::with_generator(config, generator)
    }

    /// Create a channel with an explicit generator.
    pub fn with_generator(config: BroadcastConfig, generator: DeltaGenerator) -> Self {
        Self {
            registry: Mutex::new(Registry {
                subscribers: HashMap::new(),
                generator,
                cursor: 0,
            }),
            config,
        }
    }

    /// Channel configuration.
    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    /// Register a new subscriber.
    ///
    /// `interest` is the seller the client is viewing; it only feeds the
    /// [`TargetPolicy::Interested`] policy.
    pub fn subscribe(&self, interest: Option<SellerId>) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.config.queue_depth.max(1));
        let id = ConnectionId::generate();

        let count = {
            let mut registry = self.registry.lock();
            registry.subscribers.insert(
                id,
                Subscriber {
                    sender,
                    interest,
                    connected_at: Utc::now(),
                    missed: 0,
                },
            );
            registry.subscribers.len()
        };

        debug!(connection_id = %id, subscribers = count, "Subscriber registered");
        record_subscription("subscribe", count);
        Subscription { id, receiver }
    }

    /// Remove a subscriber. Unknown or already removed ids are a no-op.
    ///
    /// Returns whether a subscriber was removed.
    pub fn unsubscribe(&self, id: ConnectionId) -> bool {
        let (removed, count) = {
            let mut registry = self.registry.lock();
            let removed = registry.subscribers.remove(&id);
            (removed, registry.subscribers.len())
        };

        match removed {
            Some(subscriber) => {
                let connected_for = Utc::now() - subscriber.connected_at;
                debug!(
                    connection_id = %id,
                    subscribers = count,
                    connected_secs = connected_for.num_seconds(),
                    "Subscriber removed"
                );
                record_subscription("unsubscribe", count);
                true
            }
            None => false,
        }
    }

    /// Deregister every subscriber, ending their streams.
    ///
    /// Returns how many were removed.
    pub fn disconnect_all(&self) -> usize {
        let drained: Vec<_> = self.registry.lock().subscribers.drain().collect();
        if !drained.is_empty() {
            record_subscription("disconnect_all", 0);
        }
        drained.len()
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().subscribers.len()
    }

    /// Produce one delta and enqueue it for every registered subscriber.
    ///
    /// Returns `None` when the target policy yields no seller.
    pub fn tick(&self) -> Option<TickReport> {
        let mut registry = self.registry.lock();
        let Registry {
            subscribers,
            generator,
            cursor,
        } = &mut *registry;

        let target = self
            .config
            .target
            .select(subscribers.values().filter_map(|s| s.interest.as_ref()), cursor);
        let Some(target) = target else {
            warn!("Broadcast target policy selected no seller, skipping tick");
            return None;
        };

        let event = DeltaEvent::new(target, generator.next_change());
        let max_missed = self.config.max_missed_ticks.max(1);
        let attempted = subscribers.len();
        let mut delivered = 0;
        let mut dropped = 0;
        let mut removed = Vec::new();
        let mut evicted = Vec::new();

        for (id, subscriber) in subscribers.iter_mut() {
            match subscriber.sender.try_send(event.clone()) {
                Ok(()) => {
                    subscriber.missed = 0;
                    delivered += 1;
                }
                Err(TrySendError::Full(_)) => {
                    subscriber.missed = subscriber.missed.saturating_add(1);
                    if subscriber.missed >= max_missed {
                        evicted.push(*id);
                    } else {
                        dropped += 1;
                    }
                }
                Err(TrySendError::Closed(_)) => removed.push(*id),
            }
        }
        for id in removed.iter().chain(&evicted) {
            subscribers.remove(id);
        }
        let remaining = subscribers.len();
        drop(registry);

        if dropped > 0 {
            warn!(dropped = dropped, "Subscriber queues full, dropping delta");
        }
        for id in &removed {
            warn!(connection_id = %id, "Subscriber closed, deregistered");
        }
        for id in &evicted {
            warn!(
                connection_id = %id,
                missed_ticks = max_missed,
                "Subscriber stalled, evicted"
            );
        }
        if !removed.is_empty() || !evicted.is_empty() {
            record_subscription("tick_cleanup", remaining);
        }

        record_tick_metrics(delivered, dropped, removed.len() + evicted.len());
        Some(TickReport {
            event,
            attempted,
            delivered,
            dropped,
            removed,
            evicted,
        })
    }

    /// Tick on the configured interval until `shutdown` resolves.
    ///
    /// The first tick fires one full interval after start. On shutdown all
    /// subscribers are disconnected.
    pub async fn run(self: Arc<Self>, shutdown: impl Future<Output = ()>) {
        let period = self.config.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval_ms = period.as_millis() as u64, "Broadcast loop started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(report) = self.tick() {
                        debug!(
                            seller_id = %report.event.seller_id,
                            change = report.event.change,
                            delivered = report.delivered,
                            "Broadcast tick"
                        );
                    }
                }
                _ = &mut shutdown => break,
            }
        }
        let disconnected = self.disconnect_all();
        info!(disconnected = disconnected, "Broadcast loop stopped");
    }
}
