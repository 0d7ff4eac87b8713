//! Partition task and the handle sessions use to reach it

use bytes::Bytes;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::codec::ClientMessage;
use crate::config::MovementConfig;
use crate::movement::state::MotionState;
use crate::movement::{ActorId, ControllerId};
use crate::util::time::{unix_millis, Timer};

use super::partition::{Outbound, Partition, Recipient};

/// Inputs older than this when drained are logged
const STALE_INPUT_MS: u64 = 250;

/// Decoded client frame on its way to the partition
#[derive(Debug, Clone)]
pub struct PartitionInput {
    pub controller: ControllerId,
    pub message: ClientMessage,
    pub received_at: u64,
}

#[derive(Debug)]
pub enum PartitionRequest {
    Connect {
        controller: ControllerId,
        /// Frames addressed to this controller alone
        outbound: mpsc::Sender<Bytes>,
        reply: oneshot::Sender<ActorId>,
    },
    Disconnect {
        controller: ControllerId,
    },
    Client(PartitionInput),
}

/// Encoded frame for every observer, optionally minus one
#[derive(Debug, Clone)]
pub struct ObserverFrame {
    pub except: Option<ControllerId>,
    pub frame: Bytes,
}

impl ObserverFrame {
    pub fn is_for(&self, controller: ControllerId) -> bool {
        self.except != Some(controller)
    }
}

/// Handle to a running partition
#[derive(Clone)]
pub struct PartitionHandle {
    requests: mpsc::Sender<PartitionRequest>,
    observers: broadcast::Sender<ObserverFrame>,
    snapshots: Arc<DashMap<ActorId, MotionState>>,
    actor_count: Arc<AtomicUsize>,
    controller_count: Arc<AtomicUsize>,
}

impl PartitionHandle {
    /// Join as a new controller. Returns `None` once the partition is gone.
    pub async fn connect(
        &self,
        controller: ControllerId,
        outbound: mpsc::Sender<Bytes>,
    ) -> Option<ActorId> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(PartitionRequest::Connect {
                controller,
                outbound,
                reply,
            })
            .await
            .ok()?;
        rx.await.ok()
    }

    pub async fn disconnect(&self, controller: ControllerId) {
        let _ = self
            .requests
            .send(PartitionRequest::Disconnect { controller })
            .await;
    }

    /// Queue a client frame; false when the partition has stopped
    pub async fn submit(&self, controller: ControllerId, message: ClientMessage) -> bool {
        let input = PartitionInput {
            controller,
            message,
            received_at: unix_millis(),
        };
        self.requests
            .send(PartitionRequest::Client(input))
            .await
            .is_ok()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ObserverFrame> {
        self.observers.subscribe()
    }

    /// Movement state as of the last completed tick
    pub fn snapshot(&self, actor: ActorId) -> Option<MotionState> {
        self.snapshots.get(&actor).map(|entry| entry.value().clone())
    }

    pub fn actor_count(&self) -> usize {
        self.actor_count.load(Ordering::Relaxed)
    }

    pub fn controller_count(&self) -> usize {
        self.controller_count.load(Ordering::Relaxed)
    }
}

/// Owns a [`Partition`] and drives it on a fixed tick
pub struct PartitionRunner {
    partition: Partition,
    requests: mpsc::Receiver<PartitionRequest>,
    observers: broadcast::Sender<ObserverFrame>,
    direct: HashMap<ControllerId, mpsc::Sender<Bytes>>,
    snapshots: Arc<DashMap<ActorId, MotionState>>,
    actor_count: Arc<AtomicUsize>,
    controller_count: Arc<AtomicUsize>,
}

impl PartitionRunner {
    pub fn new(config: MovementConfig) -> (Self, PartitionHandle) {
        let (requests_tx, requests) = mpsc::channel(1024);
        let (observers, _) = broadcast::channel(256);
        let snapshots = Arc::new(DashMap::new());
        let actor_count = Arc::new(AtomicUsize::new(0));
        let controller_count = Arc::new(AtomicUsize::new(0));

        let handle = PartitionHandle {
            requests: requests_tx,
            observers: observers.clone(),
            snapshots: snapshots.clone(),
            actor_count: actor_count.clone(),
            controller_count: controller_count.clone(),
        };

        let runner = Self {
            partition: Partition::new(config),
            requests,
            observers,
            direct: HashMap::new(),
            snapshots,
            actor_count,
            controller_count,
        };

        (runner, handle)
    }

    /// Run the tick loop until every handle is dropped
    pub async fn run(mut self) {
        let config = self.partition.config().clone();
        let tick_ms = config.tick_ms();
        info!(
            tick_rate = config.tick_rate,
            resync_ms = config.cyclic_resync_interval_ms,
            "Partition started"
        );

        if config.patrol_actors > 0 {
            self.partition.spawn_patrols(config.patrol_actors);
            self.flush();
        }

        let mut tick_interval = interval(Duration::from_millis(tick_ms as u64));
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;
            let timer = Timer::new();

            if !self.process_requests() {
                info!("All partition handles dropped, stopping");
                break;
            }

            self.partition.tick(tick_ms);
            self.flush();
            self.publish();

            let elapsed = timer.elapsed_ms();
            if elapsed > tick_ms as u64 {
                warn!(elapsed_ms = elapsed, budget_ms = tick_ms, "Partition tick overran");
            }
        }
    }

    /// Drain queued requests; false once no handle can send any more
    fn process_requests(&mut self) -> bool {
        loop {
            match self.requests.try_recv() {
                Ok(request) => {
                    self.handle_request(request);
                    self.flush();
                }
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn handle_request(&mut self, request: PartitionRequest) {
        match request {
            PartitionRequest::Connect {
                controller,
                outbound,
                reply,
            } => {
                self.direct.insert(controller, outbound);
                let actor = self.partition.connect(controller);
                if reply.send(actor).is_err() {
                    debug!(controller = %controller, "Connect caller went away");
                }
            }
            PartitionRequest::Disconnect { controller } => {
                self.direct.remove(&controller);
                self.partition.disconnect(controller);
            }
            PartitionRequest::Client(input) => {
                let lag = unix_millis().saturating_sub(input.received_at);
                if lag > STALE_INPUT_MS {
                    debug!(controller = %input.controller, lag_ms = lag, "Late client input");
                }
                self.partition
                    .handle_client_message(input.controller, input.message);
            }
        }
    }

    /// Encode and route everything the partition queued
    fn flush(&mut self) {
        loop {
            let outbound = self.partition.drain_outbound();
            if outbound.is_empty() {
                break;
            }
            for item in outbound {
                match item {
                    Outbound::Send {
                        to: Recipient::Controller(controller),
                        message,
                    } => {
                        let Some(tx) = self.direct.get(&controller) else {
                            continue;
                        };
                        if tx.try_send(message.encode()).is_err() {
                            warn!(controller = %controller, "Controller queue full, frame dropped");
                        }
                    }
                    Outbound::Send {
                        to: Recipient::Observers { except },
                        message,
                    } => {
                        // no subscribers is fine
                        let _ = self.observers.send(ObserverFrame {
                            except,
                            frame: message.encode(),
                        });
                    }
                    Outbound::Disconnect {
                        controller,
                        violations,
                    } => {
                        info!(controller = %controller, violations, "Disconnecting misbehaving controller");
                        // dropping the sender ends the session's writer
                        self.direct.remove(&controller);
                        self.partition.disconnect(controller);
                    }
                }
            }
        }
    }

    fn publish(&self) {
        for actor in self.partition.actors() {
            self.snapshots.insert(actor.id(), actor.motion().clone());
        }
        self.snapshots
            .retain(|id, _| self.partition.actor(*id).is_some());
        self.actor_count
            .store(self.partition.actor_count(), Ordering::Relaxed);
        self.controller_count
            .store(self.partition.controller_count(), Ordering::Relaxed);
    }
}
