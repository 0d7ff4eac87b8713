//! Sequenced command/acknowledgement channel
//!
//! The server changes a mover's capabilities unilaterally: the command is
//! applied to the server copy at once, sent to whoever controls the mover
//! and tracked until the controller acknowledges it. Each category holds at
//! most one outstanding command; issuing a newer one supersedes the older.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::command::{CommandCategory, MovementCommand};
use super::force::MovementForce;
use super::mover::{Capabilities, Mover};
use super::state::MotionState;
use super::{ActorId, ControllerId};

/// Who simulates a mover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Controller {
    Server,
    Remote(ControllerId),
}

impl Controller {
    pub fn remote(self) -> Option<ControllerId> {
        match self {
            Self::Remote(id) => Some(id),
            Self::Server => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryState {
    Idle,
    AwaitingAck(u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingCommand {
    pub seq: u32,
    pub command: MovementCommand,
    /// Unix millis at issue time
    pub issued_at: u64,
}

/// What the caller must put on the wire after `issue`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dispatch {
    /// Send to the controlling client; it must ack `seq`
    ToController {
        controller: ControllerId,
        seq: u32,
        command: MovementCommand,
    },
    /// Server-driven mover: tell observers, nothing to ack
    Broadcast { command: MovementCommand },
}

/// Result of an acknowledgement that is not a protocol violation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AckOutcome {
    Confirmed(PendingCommand),
    /// Older than the command currently outstanding in that category
    Stale { pending: u32 },
    /// Category has nothing outstanding
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    #[error("unknown actor {0}")]
    UnknownActor(ActorId),

    #[error("ack seq {seq} for {actor} is ahead of last issued {last_issued}")]
    SequenceFromFuture {
        actor: ActorId,
        seq: u32,
        last_issued: u32,
    },

    #[error("ack seq {seq} for {actor} names the wrong category")]
    CategoryMismatch { actor: ActorId, seq: u32 },

    #[error("{controller} does not control {actor}")]
    NotController {
        actor: ActorId,
        controller: ControllerId,
    },
}

/// Everything a newly assigned controller needs to take over a mover
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlSnapshot {
    pub actor: ActorId,
    pub motion: MotionState,
    pub capabilities: Capabilities,
    pub forces: Vec<MovementForce>,
}

impl ControlSnapshot {
    pub fn of(mover: &Mover) -> Self {
        Self {
            actor: mover.id(),
            motion: mover.motion.clone(),
            capabilities: mover.capabilities,
            forces: mover.forces.iter().copied().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reassignment {
    /// Commands force-resolved without an ack
    pub released: Vec<PendingCommand>,
    /// Present when the new controller is a remote client
    pub snapshot: Option<ControlSnapshot>,
}

#[derive(Debug)]
struct ActorChannel {
    controller: Controller,
    last_issued: u32,
    pending: HashMap<CommandCategory, PendingCommand>,
}

impl ActorChannel {
    fn new(controller: Controller) -> Self {
        Self {
            controller,
            last_issued: 0,
            pending: HashMap::new(),
        }
    }
}

pub struct CommandChannel {
    actors: HashMap<ActorId, ActorChannel>,
    min_speed: f32,
}

impl CommandChannel {
    pub fn new(min_speed: f32) -> Self {
        Self {
            actors: HashMap::new(),
            min_speed,
        }
    }

    pub fn register(&mut self, actor: ActorId, controller: Controller) {
        self.actors.insert(actor, ActorChannel::new(controller));
    }

    /// Forget an actor; outstanding commands are discarded unacknowledged
    pub fn unregister(&mut self, actor: ActorId) -> Vec<PendingCommand> {
        self.actors
            .remove(&actor)
            .map(|channel| channel.pending.into_values().collect())
            .unwrap_or_default()
    }

    pub fn controller(&self, actor: ActorId) -> Option<Controller> {
        self.actors.get(&actor).map(|c| c.controller)
    }

    pub fn state(&self, actor: ActorId, category: CommandCategory) -> CategoryState {
        self.actors
            .get(&actor)
            .and_then(|c| c.pending.get(&category))
            .map_or(CategoryState::Idle, |p| CategoryState::AwaitingAck(p.seq))
    }

    pub fn last_issued(&self, actor: ActorId) -> Option<u32> {
        self.actors.get(&actor).map(|c| c.last_issued)
    }

    pub fn pending_count(&self, actor: ActorId) -> usize {
        self.actors.get(&actor).map_or(0, |c| c.pending.len())
    }

    /// Check that `controller` currently controls `actor`
    pub fn authorize(&self, actor: ActorId, controller: ControllerId) -> Result<(), ProtocolViolation> {
        match self.controller(actor) {
            None => Err(ProtocolViolation::UnknownActor(actor)),
            Some(Controller::Remote(current)) if current == controller => Ok(()),
            Some(_) => Err(ProtocolViolation::NotController { actor, controller }),
        }
    }

    /// Apply `command` to `mover` and decide how to deliver it
    pub fn issue(
        &mut self,
        mover: &mut Mover,
        command: MovementCommand,
        now_ms: u64,
    ) -> Result<Dispatch, ProtocolViolation> {
        let actor = mover.id();
        let channel = self
            .actors
            .get_mut(&actor)
            .ok_or(ProtocolViolation::UnknownActor(actor))?;

        command.apply(mover, self.min_speed);

        let controller = match channel.controller {
            Controller::Server => return Ok(Dispatch::Broadcast { command }),
            Controller::Remote(id) => id,
        };

        channel.last_issued += 1;
        let seq = channel.last_issued;
        let category = command.category();
        let superseded = channel.pending.insert(
            category,
            PendingCommand {
                seq,
                command,
                issued_at: now_ms,
            },
        );
        if let Some(old) = superseded {
            debug!(actor = %actor, category = ?category, old = old.seq, seq, "command superseded");
        }

        Ok(Dispatch::ToController {
            controller,
            seq,
            command,
        })
    }

    /// Resolve an ack that names its category
    pub fn on_ack(
        &mut self,
        actor: ActorId,
        category: CommandCategory,
        seq: u32,
    ) -> Result<AckOutcome, ProtocolViolation> {
        let channel = self
            .actors
            .get_mut(&actor)
            .ok_or(ProtocolViolation::UnknownActor(actor))?;

        if seq > channel.last_issued {
            return Err(ProtocolViolation::SequenceFromFuture {
                actor,
                seq,
                last_issued: channel.last_issued,
            });
        }

        let Some(pending) = channel.pending.get(&category).copied() else {
            debug!(actor = %actor, category = ?category, seq, "duplicate ack");
            return Ok(AckOutcome::Duplicate);
        };

        if seq < pending.seq {
            if category == CommandCategory::Teleport {
                warn!(actor = %actor, seq, pending = pending.seq, "teleport ack lags; client may be desynced");
            } else {
                debug!(actor = %actor, category = ?category, seq, pending = pending.seq, "stale ack");
            }
            return Ok(AckOutcome::Stale { pending: pending.seq });
        }

        if seq > pending.seq {
            return Err(ProtocolViolation::CategoryMismatch { actor, seq });
        }

        channel.pending.remove(&category);
        Ok(AckOutcome::Confirmed(pending))
    }

    /// Resolve an ack that carries only a sequence number
    pub fn on_generic_ack(
        &mut self,
        actor: ActorId,
        seq: u32,
    ) -> Result<(Option<CommandCategory>, AckOutcome), ProtocolViolation> {
        let channel = self
            .actors
            .get(&actor)
            .ok_or(ProtocolViolation::UnknownActor(actor))?;

        if seq > channel.last_issued {
            return Err(ProtocolViolation::SequenceFromFuture {
                actor,
                seq,
                last_issued: channel.last_issued,
            });
        }

        let matched = channel
            .pending
            .iter()
            .find(|(_, p)| p.seq == seq)
            .map(|(category, _)| *category);

        match matched {
            Some(category) => self.on_ack(actor, category, seq).map(|o| (Some(category), o)),
            None => {
                let newest = channel.pending.values().map(|p| p.seq).max();
                let outcome = match newest {
                    Some(pending) if pending > seq => AckOutcome::Stale { pending },
                    _ => AckOutcome::Duplicate,
                };
                debug!(actor = %actor, seq, ?outcome, "generic ack matched nothing");
                Ok((None, outcome))
            }
        }
    }

    /// Hand a mover to a new controller, resolving everything outstanding.
    ///
    /// The sequence counter survives so numbers are never reused.
    pub fn reassign_mover(
        &mut self,
        mover: &Mover,
        controller: Controller,
    ) -> Result<Reassignment, ProtocolViolation> {
        let actor = mover.id();
        let channel = self
            .actors
            .get_mut(&actor)
            .ok_or(ProtocolViolation::UnknownActor(actor))?;

        let mut released: Vec<PendingCommand> = channel.pending.drain().map(|(_, p)| p).collect();
        released.sort_by_key(|p| p.seq);
        channel.controller = controller;

        let snapshot = match controller {
            Controller::Remote(_) => Some(ControlSnapshot::of(mover)),
            Controller::Server => None,
        };
        Ok(Reassignment { released, snapshot })
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}
