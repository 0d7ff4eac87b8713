//! Single-threaded owner of all movement state in one world partition
//!
//! Nothing here blocks or awaits. Inbound work arrives as method calls,
//! outbound frames pile up until the runner drains them.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::f32::consts::TAU;
use tracing::{debug, info, warn};

use crate::codec::{ClientMessage, ServerMessage};
use crate::config::MovementConfig;
use crate::movement::channel::{
    AckOutcome, CommandChannel, ControlSnapshot, Controller, Dispatch, ProtocolViolation,
};
use crate::movement::channel::CategoryState;
use crate::movement::command::{CommandCategory, MovementCommand};
use crate::movement::flags::{MovementFlags, MovementFlags2, SplineFlags};
use crate::movement::force::ForceSync;
use crate::movement::spline::{MoveSpec, SplineEngine, SplineError, SplineTiming};
use crate::movement::state::{MotionState, Pose, TransportState};
use crate::movement::transport::{to_local, to_world};
use crate::movement::{ActorId, ControllerId};

use super::actor::Actor;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PartitionError {
    #[error("unknown actor {0}")]
    UnknownActor(ActorId),

    #[error(transparent)]
    InvalidWaypoints(#[from] SplineError),

    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),

    #[error("pose is not finite")]
    NonFinitePose,

    #[error("{0} cannot ride itself")]
    SelfTransport(ActorId),

    #[error("{transport} is itself riding a transport")]
    NestedTransport { transport: ActorId },
}

/// Who an outbound frame is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Controller(ControllerId),
    /// Every connected client, optionally minus one
    Observers { except: Option<ControllerId> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Send {
        to: Recipient,
        message: ServerMessage,
    },
    /// The session layer must drop this connection
    Disconnect {
        controller: ControllerId,
        violations: u32,
    },
}

#[derive(Debug, Default)]
struct Session {
    actors: Vec<ActorId>,
    violations: u32,
    disconnecting: bool,
}

pub struct Partition {
    config: MovementConfig,
    actors: HashMap<ActorId, Actor>,
    channel: CommandChannel,
    engine: SplineEngine,
    sessions: HashMap<ControllerId, Session>,
    outbound: Vec<Outbound>,
    rng: ChaCha8Rng,
    next_actor: u64,
    clock_ms: u64,
}

impl Partition {
    pub fn new(config: MovementConfig) -> Self {
        Self {
            channel: CommandChannel::new(config.min_speed),
            engine: SplineEngine::new(config.cyclic_resync_interval_ms),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            actors: HashMap::new(),
            sessions: HashMap::new(),
            outbound: Vec::new(),
            next_actor: 0,
            clock_ms: 0,
        }
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    /// Milliseconds of simulated time since the partition started
    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    pub fn actor(&self, actor: ActorId) -> Option<&Actor> {
        self.actors.get(&actor)
    }

    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn controller_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn controller_of(&self, actor: ActorId) -> Option<Controller> {
        self.channel.controller(actor)
    }

    /// Current movement snapshot of `actor`
    pub fn snapshot(&self, actor: ActorId) -> Option<MotionState> {
        self.actors.get(&actor).map(|a| a.motion().clone())
    }

    pub fn is_on_path(&self, actor: ActorId) -> bool {
        self.engine.is_active(actor)
    }

    pub fn drain_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbound)
    }

    fn send(&mut self, to: Recipient, message: ServerMessage) {
        self.outbound.push(Outbound::Send { to, message });
    }

    fn broadcast(&mut self, message: ServerMessage, except: Option<ControllerId>) {
        self.send(Recipient::Observers { except }, message);
    }

    fn broadcast_state(&mut self, actor: ActorId, except: Option<ControllerId>) {
        if let Some(state) = self.snapshot(actor) {
            self.broadcast(ServerMessage::MovementUpdate(state), except);
        }
    }

    fn random_spawn_pose(&mut self) -> Pose {
        let angle = self.rng.gen_range(0.0..TAU);
        let distance = self.rng.gen_range(0.0..=self.config.spawn_radius);
        let orientation = self.rng.gen_range(0.0..TAU);
        Pose::new(angle.cos() * distance, angle.sin() * distance, 0.0, orientation)
    }

    /// Register a client session and give it a mover of its own
    pub fn connect(&mut self, controller: ControllerId) -> ActorId {
        self.sessions.entry(controller).or_default();

        // bring the newcomer up to date before anything else
        let mut ids: Vec<ActorId> = self.actors.keys().copied().collect();
        ids.sort();
        for id in ids {
            if let Some(state) = self.snapshot(id) {
                self.send(
                    Recipient::Controller(controller),
                    ServerMessage::MovementUpdate(state),
                );
            }
            if let Some(desc) = self.engine.describe(id) {
                self.send(
                    Recipient::Controller(controller),
                    ServerMessage::MonsterMove(desc),
                );
            }
        }

        let pose = self.random_spawn_pose();
        let actor = self.spawn_actor(Controller::Remote(controller), pose);
        info!(controller = %controller, actor = %actor, "Controller connected");
        actor
    }

    /// Forget a session and remove every actor it controlled
    pub fn disconnect(&mut self, controller: ControllerId) -> Vec<ActorId> {
        let Some(session) = self.sessions.remove(&controller) else {
            return Vec::new();
        };
        for actor in &session.actors {
            if let Err(err) = self.remove_actor(*actor) {
                debug!(controller = %controller, error = %err, "Actor already gone");
            }
        }
        info!(
            controller = %controller,
            actors = session.actors.len(),
            violations = session.violations,
            "Controller disconnected"
        );
        session.actors
    }

    pub fn spawn_actor(&mut self, controller: Controller, pose: Pose) -> ActorId {
        self.next_actor += 1;
        let id = ActorId(self.next_actor);
        let actor = Actor::new(id, pose);
        let snapshot = ControlSnapshot::of(&actor.mover);
        self.actors.insert(id, actor);
        self.channel.register(id, controller);

        let except = controller.remote();
        if let Some(remote) = except {
            self.sessions.entry(remote).or_default().actors.push(id);
            self.send(
                Recipient::Controller(remote),
                ServerMessage::ControlSnapshot(snapshot),
            );
        }
        self.broadcast_state(id, except);

        debug!(actor = %id, controller = ?controller, "Actor spawned");
        id
    }

    pub fn remove_actor(&mut self, actor: ActorId) -> Result<(), PartitionError> {
        let removed = self
            .actors
            .remove(&actor)
            .ok_or(PartitionError::UnknownActor(actor))?;

        self.engine.stop(actor);
        let discarded = self.channel.unregister(actor);
        if !discarded.is_empty() {
            debug!(actor = %actor, pending = discarded.len(), "Discarded unacknowledged commands");
        }

        for passenger in &removed.passengers {
            if let Some(rider) = self.actors.get_mut(passenger) {
                rider.mover.motion.transport = None;
            }
            self.broadcast_state(*passenger, None);
        }
        if let Some(transport) = removed.transport() {
            if let Some(carrier) = self.actors.get_mut(&transport) {
                carrier.remove_passenger(actor);
            }
        }
        for session in self.sessions.values_mut() {
            session.actors.retain(|a| *a != actor);
        }

        self.broadcast(ServerMessage::ActorLeft { actor }, None);
        Ok(())
    }

    /// Place `pose` as the actor's world pose, keeping its transport-local
    /// pose consistent
    fn set_world_pose(&mut self, actor: ActorId, pose: Pose) {
        let carrier_pose = self
            .actors
            .get(&actor)
            .and_then(Actor::transport)
            .and_then(|t| self.actors.get(&t))
            .map(Actor::pose);
        if let Some(entry) = self.actors.get_mut(&actor) {
            let motion = &mut entry.mover.motion;
            motion.pose = pose;
            if let (Some(transport), Some(carrier)) = (motion.transport.as_mut(), carrier_pose) {
                transport.local = to_local(&pose, &carrier);
            }
        }
    }

    /// Stop the actor's path and freeze its last pose into the snapshot
    pub fn stop_path(&mut self, actor: ActorId) -> Option<Pose> {
        let pose = self.engine.stop(actor)?;
        self.set_world_pose(actor, pose);
        if let Some(entry) = self.actors.get_mut(&actor) {
            entry.mover.motion.spline_enabled = false;
        }
        self.broadcast_state(actor, None);
        Some(pose)
    }

    /// Put an actor somewhere decided outside the movement layer
    pub fn apply_external_pose(
        &mut self,
        actor: ActorId,
        pose: Pose,
        is_teleport: bool,
    ) -> Result<(), PartitionError> {
        if !pose.is_finite() {
            return Err(PartitionError::NonFinitePose);
        }
        if !self.actors.contains_key(&actor) {
            return Err(PartitionError::UnknownActor(actor));
        }
        if is_teleport {
            return self
                .on_capability_request(actor, MovementCommand::Teleport { pose })
                .map(|_| ());
        }

        if self.engine.is_active(actor) {
            self.engine.stop(actor);
            if let Some(entry) = self.actors.get_mut(&actor) {
                entry.mover.motion.spline_enabled = false;
            }
        }
        self.set_world_pose(actor, pose);
        self.broadcast_state(actor, None);
        Ok(())
    }

    /// Issue a server command against an actor's movement
    pub fn on_capability_request(
        &mut self,
        actor: ActorId,
        command: MovementCommand,
    ) -> Result<Dispatch, PartitionError> {
        if !self.actors.contains_key(&actor) {
            return Err(PartitionError::UnknownActor(actor));
        }
        if command.preempts_spline() && self.engine.is_active(actor) {
            self.stop_path(actor);
        }

        let entry = self
            .actors
            .get_mut(&actor)
            .ok_or(PartitionError::UnknownActor(actor))?;
        let previous_transport = entry.transport();
        let dispatch = self.channel.issue(&mut entry.mover, command, self.clock_ms)?;

        if let (MovementCommand::Teleport { .. }, Some(transport)) = (command, previous_transport) {
            if let Some(carrier) = self.actors.get_mut(&transport) {
                carrier.remove_passenger(actor);
            }
        }

        match dispatch {
            Dispatch::ToController {
                controller,
                seq,
                command,
            } => {
                debug!(actor = %actor, seq, category = ?command.category(), "Command issued");
                self.send(
                    Recipient::Controller(controller),
                    ServerMessage::Command {
                        actor,
                        seq,
                        command,
                    },
                );
            }
            Dispatch::Broadcast { command } => {
                self.broadcast(ServerMessage::StateChange { actor, command }, None);
            }
        }
        Ok(dispatch)
    }

    /// Launch a path for `actor`, replacing any current one
    pub fn start_path(&mut self, actor: ActorId, mut spec: MoveSpec) -> Result<u32, PartitionError> {
        let entry = self
            .actors
            .get(&actor)
            .ok_or(PartitionError::UnknownActor(actor))?;
        let motion = entry.motion();

        // a path starts where the actor is
        let origin = match spec.transport {
            Some(carrier) => motion
                .transport
                .filter(|t| t.transport == carrier)
                .map(|t| t.local.position),
            None => Some(motion.pose.position),
        };
        let cyclic = spec.flags.contains(SplineFlags::CYCLIC);
        let prefix = match (origin, spec.waypoints.first()) {
            (Some(origin), Some(first)) if !cyclic && *first != origin => Some(origin),
            _ => None,
        };
        if let Some(origin) = prefix {
            spec.waypoints.insert(0, origin);
        }
        spec.safe_fall = motion.has_flag(MovementFlags::FALLING_SLOW);

        let actors = &self.actors;
        let lookup = |id: ActorId| actors.get(&id).map(Actor::pose);
        let spline_id = self.engine.start(actor, spec, &lookup)?;

        if let Some(entry) = self.actors.get_mut(&actor) {
            entry.mover.motion.spline_enabled = true;
        }
        if let Some(desc) = self.engine.describe(actor) {
            self.broadcast(ServerMessage::MonsterMove(desc), None);
        }
        Ok(spline_id)
    }

    pub fn board_transport(
        &mut self,
        passenger: ActorId,
        transport: ActorId,
        seat: i8,
        local: Pose,
    ) -> Result<(), PartitionError> {
        if passenger == transport {
            return Err(PartitionError::SelfTransport(passenger));
        }
        if !local.is_finite() {
            return Err(PartitionError::NonFinitePose);
        }
        let carrier = self
            .actors
            .get(&transport)
            .ok_or(PartitionError::UnknownActor(transport))?;
        if carrier.transport().is_some() {
            return Err(PartitionError::NestedTransport { transport });
        }
        let carrier_pose = carrier.pose();
        if !self.actors.contains_key(&passenger) {
            return Err(PartitionError::UnknownActor(passenger));
        }

        self.leave_transport(passenger)?;

        if let Some(rider) = self.actors.get_mut(&passenger) {
            let motion = &mut rider.mover.motion;
            motion.transport = Some(TransportState::new(transport, local, seat));
            motion.pose = to_world(&local, &carrier_pose);
        }
        if let Some(carrier) = self.actors.get_mut(&transport) {
            carrier.add_passenger(passenger);
        }

        debug!(passenger = %passenger, transport = %transport, seat, "Boarded transport");
        self.broadcast_state(passenger, None);
        Ok(())
    }

    pub fn leave_transport(&mut self, passenger: ActorId) -> Result<(), PartitionError> {
        let rider = self
            .actors
            .get_mut(&passenger)
            .ok_or(PartitionError::UnknownActor(passenger))?;
        let Some(transport) = rider.mover.motion.transport.take() else {
            return Ok(());
        };
        if let Some(carrier) = self.actors.get_mut(&transport.transport) {
            carrier.remove_passenger(passenger);
        }
        debug!(passenger = %passenger, transport = %transport.transport, "Left transport");
        self.broadcast_state(passenger, None);
        Ok(())
    }

    /// Hand `actor` to another controller; everything outstanding is
    /// resolved and the new remote controller receives a full snapshot
    pub fn reassign_mover(
        &mut self,
        actor: ActorId,
        controller: Controller,
    ) -> Result<(), PartitionError> {
        if !self.actors.contains_key(&actor) {
            return Err(PartitionError::UnknownActor(actor));
        }
        if controller.remote().is_some() && self.engine.is_active(actor) {
            self.stop_path(actor);
        }

        let previous = self.channel.controller(actor);
        let entry = self
            .actors
            .get(&actor)
            .ok_or(PartitionError::UnknownActor(actor))?;
        let reassignment = self.channel.reassign_mover(&entry.mover, controller)?;

        if let Some(Controller::Remote(old)) = previous {
            if let Some(session) = self.sessions.get_mut(&old) {
                session.actors.retain(|a| *a != actor);
            }
        }
        if let Controller::Remote(new) = controller {
            self.sessions.entry(new).or_default().actors.push(actor);
            if let Some(snapshot) = reassignment.snapshot {
                self.send(
                    Recipient::Controller(new),
                    ServerMessage::ControlSnapshot(snapshot),
                );
            }
        }

        info!(
            actor = %actor,
            controller = ?controller,
            released = reassignment.released.len(),
            "Mover reassigned"
        );
        Ok(())
    }

    /// Entry point for every decoded inbound frame
    pub fn handle_client_message(&mut self, from: ControllerId, message: ClientMessage) {
        match self.process_client_message(from, message) {
            Ok(()) => {}
            Err(PartitionError::Protocol(
                violation @ (ProtocolViolation::UnknownActor(_)
                | ProtocolViolation::NotController { .. }),
            )) => {
                debug!(controller = %from, error = %violation, "Dropped message for actor not under control");
            }
            Err(PartitionError::Protocol(violation)) => self.record_violation(from, violation),
            Err(other) => {
                warn!(controller = %from, error = %other, "Rejected client message");
            }
        }
    }

    fn record_violation(&mut self, controller: ControllerId, violation: ProtocolViolation) {
        let limit = self.config.max_protocol_violations;
        let session = self.sessions.entry(controller).or_default();
        session.violations += 1;
        warn!(
            controller = %controller,
            violations = session.violations,
            error = %violation,
            "Protocol violation"
        );
        if session.violations > limit && !session.disconnecting {
            session.disconnecting = true;
            let violations = session.violations;
            warn!(controller = %controller, violations, "Violation budget exhausted");
            self.outbound.push(Outbound::Disconnect {
                controller,
                violations,
            });
        }
    }

    fn process_client_message(
        &mut self,
        from: ControllerId,
        message: ClientMessage,
    ) -> Result<(), PartitionError> {
        let actor = message.actor();
        self.channel.authorize(actor, from)?;

        match message {
            ClientMessage::MovementUpdate(state) => self.apply_client_update(from, state),
            ClientMessage::SplineArrived {
                spline_id, pose, ..
            } => {
                self.on_spline_arrived(actor, spline_id, pose);
                Ok(())
            }
            ClientMessage::KnockbackAck { seq, .. } => {
                let outcome = self.channel.on_ack(actor, CommandCategory::Knockback, seq)?;
                self.after_ack(actor, from, outcome);
                Ok(())
            }
            ClientMessage::TeleportAck { seq, move_time, .. } => {
                let outcome = self.channel.on_ack(actor, CommandCategory::Teleport, seq)?;
                if let AckOutcome::Confirmed(_) = outcome {
                    if let Some(entry) = self.actors.get_mut(&actor) {
                        entry.mover.motion.advance_timestamp(move_time);
                    }
                }
                self.after_ack(actor, from, outcome);
                Ok(())
            }
            ClientMessage::CollisionHeightAck {
                seq,
                height,
                mount_display_id,
                reason,
                ..
            } => {
                let outcome = self
                    .channel
                    .on_ack(actor, CommandCategory::CollisionHeight, seq)?;
                if let AckOutcome::Confirmed(pending) = outcome {
                    let echoed = MovementCommand::SetCollisionHeight {
                        height,
                        mount_display_id,
                        reason,
                    };
                    if pending.command != echoed {
                        warn!(actor = %actor, seq, "Collision height ack echoes different values");
                    }
                }
                self.after_ack(actor, from, outcome);
                Ok(())
            }
            ClientMessage::VehicleRecordAck {
                seq,
                vehicle_record_id,
                ..
            } => {
                let outcome = self
                    .channel
                    .on_ack(actor, CommandCategory::VehicleRecord, seq)?;
                if let AckOutcome::Confirmed(pending) = outcome {
                    if pending.command != (MovementCommand::SetVehicleRecord { vehicle_record_id }) {
                        warn!(actor = %actor, seq, "Vehicle record ack echoes a different record");
                    }
                }
                self.after_ack(actor, from, outcome);
                Ok(())
            }
            ClientMessage::Ack { seq, .. } => {
                let (_, outcome) = self.channel.on_generic_ack(actor, seq)?;
                self.after_ack(actor, from, outcome);
                Ok(())
            }
        }
    }

    /// Observers learn the new state once the controller has applied it
    fn after_ack(&mut self, actor: ActorId, from: ControllerId, outcome: AckOutcome) {
        if let AckOutcome::Confirmed(pending) = outcome {
            debug!(actor = %actor, seq = pending.seq, "Command confirmed");
            self.broadcast_state(actor, Some(from));
        }
    }

    fn apply_client_update(
        &mut self,
        from: ControllerId,
        mut state: MotionState,
    ) -> Result<(), PartitionError> {
        if !state.pose.is_finite() {
            return Err(PartitionError::NonFinitePose);
        }
        let actor = state.guid;
        if self.engine.is_active(actor) {
            debug!(actor = %actor, "Ignoring client update while a server path runs");
            return Ok(());
        }
        if let CategoryState::AwaitingAck(seq) =
            self.channel.state(actor, CommandCategory::Teleport)
        {
            debug!(actor = %actor, seq, "Ignoring client update sent before a teleport landed");
            return Ok(());
        }

        if let Some(transport) = state.transport {
            let valid = transport.transport != actor
                && transport.local.is_finite()
                && self
                    .actors
                    .get(&transport.transport)
                    .is_some_and(|carrier| carrier.transport().is_none());
            if !valid {
                warn!(actor = %actor, transport = %transport.transport, "Dropping unusable transport record");
                state.transport = None;
            }
        }

        let entry = self
            .actors
            .get_mut(&actor)
            .ok_or(PartitionError::UnknownActor(actor))?;
        let old_transport = entry.transport();
        let motion = &mut entry.mover.motion;

        // removed forces and capabilities are the server's
        state.removed_forces = std::mem::take(&mut motion.removed_forces);
        state.spline_enabled = motion.spline_enabled;
        state.advance_timestamp(motion.timestamp());
        state.adopt_capabilities(motion);
        let new_transport = state.transport.map(|t| t.transport);
        *motion = state;

        if old_transport != new_transport {
            if let Some(old) = old_transport.and_then(|t| self.actors.get_mut(&t)) {
                old.remove_passenger(actor);
            }
            if let Some(new) = new_transport.and_then(|t| self.actors.get_mut(&t)) {
                new.add_passenger(actor);
            }
        }

        self.broadcast_state(actor, Some(from));
        Ok(())
    }

    fn on_spline_arrived(&mut self, actor: ActorId, spline_id: u32, pose: Pose) {
        if self.engine.spline_id(actor) != Some(spline_id) {
            debug!(actor = %actor, spline_id, "Arrival for a path that is no longer running");
            return;
        }
        let Some(path) = self.engine.path(actor) else {
            return;
        };
        let final_point = path.final_point();
        let on_transport = path.transport().is_some();
        self.engine.stop(actor);

        let Some(entry) = self.actors.get_mut(&actor) else {
            return;
        };
        let orientation = if pose.orientation.is_finite() {
            pose.orientation
        } else {
            entry.pose().orientation
        };
        entry.mover.motion.spline_enabled = false;

        if on_transport {
            if let Some(transport) = entry.mover.motion.transport.as_mut() {
                transport.local.position = final_point;
                transport.local.orientation = orientation;
            }
            // world pose follows on the next tick
        } else {
            let mut snapped = entry.pose();
            snapped.position = final_point;
            snapped.orientation = orientation;
            entry.mover.motion.pose = snapped;
        }
        self.broadcast_state(actor, None);
    }

    /// Advance simulated time by `delta_ms`
    pub fn tick(&mut self, delta_ms: u32) {
        self.clock_ms += delta_ms as u64;
        let now = self.clock_ms as u32;

        // carriers move before whatever rides them
        let mut moving: Vec<ActorId> = self.engine.active_actors().collect();
        moving.sort_by_key(|id| {
            let riding = self
                .actors
                .get(id)
                .is_some_and(|a| a.transport().is_some());
            (riding, *id)
        });

        for actor in moving {
            let step = {
                let actors = &self.actors;
                let lookup = |id: ActorId| actors.get(&id).map(Actor::pose);
                self.engine.advance(actor, delta_ms, &lookup)
            };
            let Some(step) = step else {
                continue;
            };

            if let Some(entry) = self.actors.get_mut(&actor) {
                let motion = &mut entry.mover.motion;
                motion.pose = step.pose;
                if let (Some(local), Some(transport)) = (step.local, motion.transport.as_mut()) {
                    transport.local = local;
                }
                motion.advance_timestamp(now);
                if step.just_finished {
                    motion.spline_enabled = false;
                }
            }

            if step.just_finished {
                self.broadcast_state(actor, None);
            }
            if step.resync_due {
                self.broadcast(
                    ServerMessage::CyclicResync {
                        actor,
                        spline_id: step.spline_id,
                        time_passed: step.time_passed,
                    },
                    None,
                );
            }
        }

        self.apply_forces(delta_ms, now);

        // passengers follow their carrier
        let riders: Vec<(ActorId, ActorId)> = self
            .actors
            .iter()
            .filter(|(id, _)| !self.engine.is_active(**id))
            .filter_map(|(id, a)| a.transport().map(|t| (*id, t)))
            .collect();
        for (rider, carrier) in riders {
            let carrier_pose = self.actors.get(&carrier).map(Actor::pose);
            let Some(entry) = self.actors.get_mut(&rider) else {
                continue;
            };
            let motion = &mut entry.mover.motion;
            match (carrier_pose, motion.transport) {
                (Some(carrier_pose), Some(transport)) => {
                    motion.pose = to_world(&transport.local, &carrier_pose);
                }
                _ => motion.transport = None,
            }
        }

        // announce removed forces once, then forget them
        let mut echo: Vec<ActorId> = self
            .actors
            .values()
            .filter(|a| !a.motion().removed_forces.is_empty())
            .map(Actor::id)
            .collect();
        echo.sort();
        for actor in echo {
            self.broadcast_state(actor, None);
            if let Some(entry) = self.actors.get_mut(&actor) {
                entry.mover.motion.removed_forces.clear();
            }
        }

        self.sync_forces();
    }

    /// Move idle server-controlled actors by the forces acting on them.
    /// Remote movers integrate their own forces and report the result.
    fn apply_forces(&mut self, delta_ms: u32, now: u32) {
        let mut drifting: Vec<ActorId> = self
            .actors
            .values()
            .filter(|a| {
                let motion = a.motion();
                !a.mover.forces.is_empty()
                    && a.transport().is_none()
                    && !motion.is_rooted()
                    && !motion
                        .flags2()
                        .contains(MovementFlags2::IGNORE_MOVEMENT_FORCES)
                    && !self.engine.is_active(a.id())
                    && matches!(self.channel.controller(a.id()), Some(Controller::Server))
            })
            .map(Actor::id)
            .collect();
        drifting.sort();

        let seconds = delta_ms as f32 / 1000.0;
        for actor in drifting {
            let Some(entry) = self.actors.get(&actor) else {
                continue;
            };
            let frame = entry
                .mover
                .forces
                .iter()
                .find_map(|f| f.transport)
                .and_then(|t| self.actors.get(&t))
                .map(Actor::pose);
            let velocity = entry
                .mover
                .forces
                .effective_velocity_contribution(entry.pose().position, frame.as_ref());
            if velocity == glam::Vec3::ZERO {
                continue;
            }
            if let Some(entry) = self.actors.get_mut(&actor) {
                let motion = &mut entry.mover.motion;
                motion.pose.position += velocity * seconds;
                motion.advance_timestamp(now);
            }
            self.broadcast_state(actor, None);
        }
    }

    /// Tell observers about forces added since the last tick. Removals
    /// travel in the removed-forces list of the next update.
    fn sync_forces(&mut self) {
        let mut added = Vec::new();
        for entry in self.actors.values_mut() {
            let actor = entry.id();
            for change in entry.mover.forces.take_pending_sync() {
                match change {
                    ForceSync::Added(id) => {
                        if let Some(force) = entry.mover.forces.get(id) {
                            added.push((actor, *force));
                        }
                    }
                    ForceSync::Removed(id) => {
                        debug!(actor = %actor, force = ?id, "Force removed");
                    }
                }
            }
        }
        added.sort_by_key(|(actor, force)| (*actor, force.id));

        for (actor, force) in added {
            // server-controlled movers announced it when the command was issued
            let Some(Controller::Remote(controller)) = self.channel.controller(actor) else {
                continue;
            };
            self.broadcast(
                ServerMessage::StateChange {
                    actor,
                    command: MovementCommand::ApplyForce { force },
                },
                Some(controller),
            );
        }
    }

    /// Spawn server-driven actors walking closed loops around random points
    pub fn spawn_patrols(&mut self, count: u32) -> Vec<ActorId> {
        let mut spawned = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let center = self.random_spawn_pose().position;
            let radius = self.rng.gen_range(5.0..20.0);
            let corners = self.rng.gen_range(4..7);
            let phase = self.rng.gen_range(0.0..TAU);
            let waypoints: Vec<_> = (0..corners)
                .map(|i| {
                    let angle = phase + TAU * i as f32 / corners as f32;
                    center + glam::Vec3::new(angle.cos() * radius, angle.sin() * radius, 0.0)
                })
                .collect();
            let speed = self.rng.gen_range(2.0..6.0);

            let actor = self.spawn_actor(Controller::Server, Pose::at(waypoints[0]));
            let spec = MoveSpec::new(waypoints, SplineTiming::Velocity(speed))
                .with_flags(SplineFlags::CYCLIC | SplineFlags::CATMULLROM | SplineFlags::WALKMODE);
            match self.start_path(actor, spec) {
                Ok(_) => spawned.push(actor),
                Err(err) => {
                    warn!(actor = %actor, error = %err, "Patrol route rejected");
                    if let Err(err) = self.remove_actor(actor) {
                        debug!(actor = %actor, error = %err, "Rejected patrol already gone");
                    }
                }
            }
        }
        info!(count = spawned.len(), "Patrols spawned");
        spawned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::command::Capability;
    use crate::movement::force::{ForceKind, MovementForce};
    use crate::movement::mover::SpeedAxis;
    use crate::movement::spline::PathEncoding;
    use crate::movement::ForceId;
    use glam::Vec3;

    fn partition() -> Partition {
        Partition::new(MovementConfig {
            seed: 1,
            ..MovementConfig::default()
        })
    }

    fn messages_to(out: &[Outbound], to: Recipient) -> Vec<&ServerMessage> {
        out.iter()
            .filter_map(|o| match o {
                Outbound::Send { to: t, message } if *t == to => Some(message),
                _ => None,
            })
            .collect()
    }

    fn all_observers() -> Recipient {
        Recipient::Observers { except: None }
    }

    fn violations(p: &Partition, controller: ControllerId) -> u32 {
        p.sessions.get(&controller).map_or(0, |s| s.violations)
    }

    fn square(center: Vec3, half: f32) -> Vec<Vec3> {
        vec![
            center + Vec3::new(-half, -half, 0.0),
            center + Vec3::new(half, -half, 0.0),
            center + Vec3::new(half, half, 0.0),
            center + Vec3::new(-half, half, 0.0),
        ]
    }

    #[test]
    fn connect_sends_snapshot_to_controller_and_state_to_others() {
        let mut p = partition();
        let first = ControllerId::new();
        let a = p.connect(first);
        p.drain_outbound();

        let second = ControllerId::new();
        let b = p.connect(second);
        let out = p.drain_outbound();

        let to_second = messages_to(&out, Recipient::Controller(second));
        assert!(to_second
            .iter()
            .any(|m| matches!(m, ServerMessage::MovementUpdate(s) if s.guid == a)));
        assert!(to_second
            .iter()
            .any(|m| matches!(m, ServerMessage::ControlSnapshot(s) if s.actor == b)));

        let others = messages_to(&out, Recipient::Observers { except: Some(second) });
        assert!(matches!(others.as_slice(), [ServerMessage::MovementUpdate(s)] if s.guid == b));
        assert_eq!(p.controller_of(b), Some(Controller::Remote(second)));
    }

    #[test]
    fn knockback_round_trip_updates_observers_once() {
        let mut p = partition();
        let c = ControllerId::new();
        let actor = p.connect(c);
        p.drain_outbound();

        let knockback = MovementCommand::Knockback {
            horizontal_speed: 8.0,
            vertical_speed: 12.0,
            direction: 0.3,
        };
        p.on_capability_request(actor, knockback).unwrap();
        let out = p.drain_outbound();
        assert_eq!(
            messages_to(&out, Recipient::Controller(c)),
            vec![&ServerMessage::Command {
                actor,
                seq: 1,
                command: knockback
            }]
        );
        assert!(p.snapshot(actor).unwrap().is_falling());

        p.handle_client_message(c, ClientMessage::KnockbackAck { actor, seq: 1 });
        let out = p.drain_outbound();
        let observers = messages_to(&out, Recipient::Observers { except: Some(c) });
        assert!(matches!(observers.as_slice(), [ServerMessage::MovementUpdate(s)] if s.is_falling()));

        p.handle_client_message(c, ClientMessage::KnockbackAck { actor, seq: 1 });
        assert!(p.drain_outbound().is_empty());
        assert_eq!(violations(&p, c), 0);
    }

    #[test]
    fn acks_from_the_future_exhaust_the_budget() {
        let mut p = Partition::new(MovementConfig {
            max_protocol_violations: 2,
            ..MovementConfig::default()
        });
        let c = ControllerId::new();
        let actor = p.connect(c);
        p.drain_outbound();

        for _ in 0..3 {
            p.handle_client_message(c, ClientMessage::Ack { actor, seq: 99 });
        }
        let out = p.drain_outbound();
        assert_eq!(
            out,
            vec![Outbound::Disconnect {
                controller: c,
                violations: 3
            }]
        );

        p.handle_client_message(c, ClientMessage::Ack { actor, seq: 99 });
        assert!(p.drain_outbound().is_empty(), "disconnect is requested once");
    }

    #[test]
    fn updates_for_foreign_actors_are_dropped() {
        let mut p = partition();
        let owner = ControllerId::new();
        let intruder = ControllerId::new();
        let actor = p.connect(owner);
        p.connect(intruder);
        p.drain_outbound();

        let mut forged = p.snapshot(actor).unwrap();
        forged.pose.position = Vec3::new(999.0, 0.0, 0.0);
        p.handle_client_message(intruder, ClientMessage::MovementUpdate(forged));

        assert!(p.drain_outbound().is_empty());
        assert_ne!(p.snapshot(actor).unwrap().pose.position.x, 999.0);
        assert_eq!(violations(&p, intruder), 0);
    }

    #[test]
    fn client_update_is_validated() {
        let mut p = partition();
        let c = ControllerId::new();
        let actor = p.connect(c);
        p.drain_outbound();

        let mut update = p.snapshot(actor).unwrap();
        update.pose.position = Vec3::new(f32::NAN, 0.0, 0.0);
        p.handle_client_message(c, ClientMessage::MovementUpdate(update));
        assert!(p.drain_outbound().is_empty());

        let mut update = p.snapshot(actor).unwrap();
        update.pose.position = Vec3::new(4.0, 5.0, 6.0);
        update.advance_timestamp(500);
        p.handle_client_message(c, ClientMessage::MovementUpdate(update));
        assert_eq!(p.snapshot(actor).unwrap().timestamp(), 500);

        let mut older = p.snapshot(actor).unwrap();
        older.replace_timestamp(100);
        older.pose.position = Vec3::new(7.0, 5.0, 6.0);
        p.handle_client_message(c, ClientMessage::MovementUpdate(older));

        let state = p.snapshot(actor).unwrap();
        assert_eq!(state.timestamp(), 500);
        assert_eq!(state.pose.position, Vec3::new(7.0, 5.0, 6.0));
        let out = p.drain_outbound();
        assert_eq!(
            messages_to(&out, Recipient::Observers { except: Some(c) }).len(),
            2
        );
    }

    #[test]
    fn reassignment_snapshots_new_controller_and_ignores_old_ack() {
        let mut p = partition();
        let old = ControllerId::new();
        let actor = p.connect(old);
        for speed in [3.0, 3.5, 4.0, 4.5] {
            p.on_capability_request(
                actor,
                MovementCommand::SetSpeed {
                    axis: SpeedAxis::Walk,
                    speed,
                },
            )
            .unwrap();
        }
        let run = MovementCommand::SetSpeed {
            axis: SpeedAxis::Run,
            speed: 14.0,
        };
        let dispatch = p.on_capability_request(actor, run).unwrap();
        assert!(matches!(dispatch, Dispatch::ToController { seq: 5, .. }));

        let new = ControllerId::new();
        p.connect(new);
        p.drain_outbound();
        p.reassign_mover(actor, Controller::Remote(new)).unwrap();

        let out = p.drain_outbound();
        let to_new = messages_to(&out, Recipient::Controller(new));
        assert!(matches!(
            to_new.as_slice(),
            [ServerMessage::ControlSnapshot(s)] if s.capabilities.speeds.get(SpeedAxis::Run) == 14.0
        ));

        p.handle_client_message(old, ClientMessage::Ack { actor, seq: 5 });
        p.handle_client_message(new, ClientMessage::Ack { actor, seq: 5 });
        assert!(p.drain_outbound().is_empty());
        assert_eq!(violations(&p, old), 0);
        assert_eq!(violations(&p, new), 0);

        let removed = p.disconnect(old);
        assert!(!removed.contains(&actor));
        assert!(p.actor(actor).is_some());
    }

    #[test]
    fn path_starts_at_current_position_and_finishes_once() {
        let mut p = partition();
        let actor = p.spawn_actor(Controller::Server, Pose::new(0.0, 0.0, 0.0, 0.0));
        p.drain_outbound();

        let spec = MoveSpec::new(vec![Vec3::new(10.0, 0.0, 0.0)], SplineTiming::Duration(1000));
        let spline_id = p.start_path(actor, spec).unwrap();
        let out = p.drain_outbound();
        let moves = messages_to(&out, all_observers());
        let [ServerMessage::MonsterMove(desc)] = moves.as_slice() else {
            panic!("expected one path announcement, got {moves:?}");
        };
        assert_eq!(desc.spline_id, spline_id);
        assert_eq!(desc.path.waypoints().first(), Some(&Vec3::ZERO));
        assert!(matches!(desc.path, PathEncoding::Compressed(_)));
        assert!(p.snapshot(actor).unwrap().spline_enabled);

        p.tick(600);
        assert!(p.drain_outbound().is_empty());
        p.tick(600);
        let out = p.drain_outbound();
        let updates = messages_to(&out, all_observers());
        assert!(matches!(
            updates.as_slice(),
            [ServerMessage::MovementUpdate(s)] if s.pose.position == Vec3::new(10.0, 0.0, 0.0) && !s.spline_enabled
        ));
        assert!(!p.is_on_path(actor));

        p.tick(600);
        assert!(p.drain_outbound().is_empty());
    }

    #[test]
    fn cyclic_patrol_resyncs_with_wrapped_time() {
        let mut p = Partition::new(MovementConfig {
            cyclic_resync_interval_ms: 4000,
            ..MovementConfig::default()
        });
        let route = square(Vec3::ZERO, 5.0);
        let actor = p.spawn_actor(Controller::Server, Pose::at(route[0]));
        let spec = MoveSpec::new(route, SplineTiming::Duration(4000)).with_flags(SplineFlags::CYCLIC);
        let spline_id = p.start_path(actor, spec).unwrap();
        p.drain_outbound();

        p.tick(4500);
        let out = p.drain_outbound();
        assert_eq!(
            messages_to(&out, all_observers()),
            vec![&ServerMessage::CyclicResync {
                actor,
                spline_id,
                time_passed: 500
            }]
        );
        assert!(p.is_on_path(actor));
    }

    #[test]
    fn root_preempts_a_running_path() {
        let mut p = partition();
        let actor = p.spawn_actor(Controller::Server, Pose::new(0.0, 0.0, 0.0, 0.0));
        let spec = MoveSpec::new(vec![Vec3::new(20.0, 0.0, 0.0)], SplineTiming::Duration(2000));
        p.start_path(actor, spec).unwrap();
        p.tick(500);
        let moved = p.snapshot(actor).unwrap().pose;
        p.drain_outbound();

        let root = MovementCommand::SetCapability {
            capability: Capability::Root,
            enabled: true,
        };
        let dispatch = p.on_capability_request(actor, root).unwrap();
        assert_eq!(dispatch, Dispatch::Broadcast { command: root });
        assert!(!p.is_on_path(actor));

        let state = p.snapshot(actor).unwrap();
        assert!(state.is_rooted());
        assert!(!state.spline_enabled);
        assert_eq!(state.pose.position, moved.position);

        let out = p.drain_outbound();
        let observed = messages_to(&out, all_observers());
        assert!(matches!(observed[0], ServerMessage::MovementUpdate(_)));
        assert_eq!(
            observed[1],
            &ServerMessage::StateChange {
                actor,
                command: root
            }
        );
    }

    #[test]
    fn passengers_ride_moving_transports() {
        let mut p = partition();
        let ship = p.spawn_actor(Controller::Server, Pose::new(10.0, 0.0, 0.0, 0.0));
        let rider = p.spawn_actor(Controller::Server, Pose::default());
        let local = Pose::new(1.0, 0.0, 0.5, 0.0);
        p.board_transport(rider, ship, 0, local).unwrap();
        assert_eq!(
            p.snapshot(rider).unwrap().pose.position,
            Vec3::new(11.0, 0.0, 0.5)
        );
        assert_eq!(p.actor(ship).unwrap().passengers, vec![rider]);

        let spec = MoveSpec::new(vec![Vec3::new(10.0, 20.0, 0.0)], SplineTiming::Duration(1000));
        p.start_path(ship, spec).unwrap();
        p.tick(500);

        let ship_pose = p.snapshot(ship).unwrap().pose;
        let rider_pose = p.snapshot(rider).unwrap().pose;
        let expected = to_world(&local, &ship_pose);
        assert!((rider_pose.position - expected.position).length() < 1e-4);
        assert!(ship_pose.position.y > 0.0);

        assert_eq!(
            p.board_transport(ship, rider, 0, local),
            Err(PartitionError::NestedTransport { transport: rider })
        );

        p.leave_transport(rider).unwrap();
        assert!(p.actor(ship).unwrap().passengers.is_empty());
        assert!(p.snapshot(rider).unwrap().transport.is_none());
    }

    #[test]
    fn removing_a_transport_releases_passengers() {
        let mut p = partition();
        let ship = p.spawn_actor(Controller::Server, Pose::default());
        let rider = p.spawn_actor(Controller::Server, Pose::default());
        p.board_transport(rider, ship, 1, Pose::new(0.0, 2.0, 0.0, 0.0))
            .unwrap();
        p.drain_outbound();

        p.remove_actor(ship).unwrap();
        assert!(p.snapshot(rider).unwrap().transport.is_none());
        let out = p.drain_outbound();
        assert!(messages_to(&out, all_observers())
            .iter()
            .any(|m| **m == ServerMessage::ActorLeft { actor: ship }));
        assert_eq!(p.remove_actor(ship), Err(PartitionError::UnknownActor(ship)));
    }

    #[test]
    fn removed_forces_are_echoed_once() {
        let mut p = partition();
        let actor = p.spawn_actor(Controller::Server, Pose::default());
        let force = MovementForce {
            id: ForceId(5),
            origin: Vec3::ZERO,
            direction: Vec3::X,
            magnitude: 3.0,
            transport: None,
            kind: ForceKind::SingleDirectional,
        };
        p.on_capability_request(actor, MovementCommand::ApplyForce { force })
            .unwrap();
        p.on_capability_request(actor, MovementCommand::RemoveForce { id: ForceId(5) })
            .unwrap();
        p.drain_outbound();

        p.tick(33);
        let out = p.drain_outbound();
        assert!(matches!(
            messages_to(&out, all_observers()).as_slice(),
            [ServerMessage::MovementUpdate(s)] if s.removed_forces == vec![ForceId(5)]
        ));
        assert!(p.snapshot(actor).unwrap().removed_forces.is_empty());

        p.tick(33);
        assert!(p.drain_outbound().is_empty());
    }

    #[test]
    fn spline_arrival_matches_by_id() {
        let mut p = partition();
        let c = ControllerId::new();
        let actor = p.connect(c);
        let start = p.snapshot(actor).unwrap().pose.position;
        let target = start + Vec3::new(8.0, 0.0, 0.0);

        let first = p
            .start_path(actor, MoveSpec::new(vec![target], SplineTiming::Duration(5000)))
            .unwrap();
        let second = p
            .start_path(actor, MoveSpec::new(vec![target], SplineTiming::Duration(5000)))
            .unwrap();
        assert!(second > first);
        p.drain_outbound();

        p.handle_client_message(
            c,
            ClientMessage::SplineArrived {
                actor,
                spline_id: first,
                pose: Pose::at(target),
            },
        );
        assert!(p.is_on_path(actor));
        assert!(p.drain_outbound().is_empty());

        p.handle_client_message(
            c,
            ClientMessage::SplineArrived {
                actor,
                spline_id: second,
                pose: Pose::new(0.0, 0.0, 0.0, 1.0),
            },
        );
        assert!(!p.is_on_path(actor));
        let state = p.snapshot(actor).unwrap();
        assert!((state.pose.position - target).length() < 0.5);
        assert_eq!(state.pose.orientation, 1.0);
    }

    #[test]
    fn teleport_is_sequenced_and_clears_transport() {
        let mut p = partition();
        let c = ControllerId::new();
        let actor = p.connect(c);
        let ship = p.spawn_actor(Controller::Server, Pose::default());
        p.board_transport(actor, ship, 0, Pose::default()).unwrap();
        p.drain_outbound();

        let target = Pose::new(100.0, 100.0, 5.0, 0.0);
        p.apply_external_pose(actor, target, true).unwrap();
        let out = p.drain_outbound();
        assert!(matches!(
            messages_to(&out, Recipient::Controller(c)).as_slice(),
            [ServerMessage::Command { seq: 1, command: MovementCommand::Teleport { .. }, .. }]
        ));
        assert!(p.actor(ship).unwrap().passengers.is_empty());
        assert_eq!(p.snapshot(actor).unwrap().pose, target);

        p.handle_client_message(
            c,
            ClientMessage::TeleportAck {
                actor,
                seq: 1,
                move_time: 7000,
            },
        );
        assert_eq!(p.snapshot(actor).unwrap().timestamp(), 7000);
        assert_eq!(
            p.apply_external_pose(actor, Pose::new(f32::INFINITY, 0.0, 0.0, 0.0), false),
            Err(PartitionError::NonFinitePose)
        );
    }

    #[test]
    fn client_update_cannot_change_capabilities() {
        let mut p = partition();
        let c = ControllerId::new();
        let actor = p.connect(c);
        p.drain_outbound();

        // composed before the client saw the root
        let mut stale = p.snapshot(actor).unwrap();
        stale.add_flags(MovementFlags::FORWARD);
        stale.pose.position += Vec3::new(1.0, 0.0, 0.0);

        let root = MovementCommand::SetCapability {
            capability: Capability::Root,
            enabled: true,
        };
        p.on_capability_request(actor, root).unwrap();
        p.handle_client_message(c, ClientMessage::MovementUpdate(stale));

        let state = p.snapshot(actor).unwrap();
        assert!(state.is_rooted());
        assert!(!state.is_moving());

        let mut forged = p.snapshot(actor).unwrap();
        forged.add_flags(
            MovementFlags::DISABLE_GRAVITY | MovementFlags::DISABLE_COLLISION | MovementFlags::HOVER,
        );
        forged.update_flags2(MovementFlags2::IGNORE_MOVEMENT_FORCES, true);
        p.handle_client_message(c, ClientMessage::MovementUpdate(forged));

        let state = p.snapshot(actor).unwrap();
        assert!(!state.has_flag(MovementFlags::DISABLE_GRAVITY));
        assert!(!state.has_flag(MovementFlags::DISABLE_COLLISION));
        assert!(!state.has_flag(MovementFlags::HOVER));
        assert!(!state
            .flags2()
            .contains(MovementFlags2::IGNORE_MOVEMENT_FORCES));
        assert!(state.is_rooted());
    }

    #[test]
    fn updates_before_teleport_ack_are_ignored() {
        let mut p = partition();
        let c = ControllerId::new();
        let actor = p.connect(c);
        p.drain_outbound();

        let mut stale = p.snapshot(actor).unwrap();
        stale.pose.position += Vec3::new(2.0, 0.0, 0.0);
        stale.advance_timestamp(100);

        let target = Pose::new(500.0, -20.0, 3.0, 1.0);
        p.apply_external_pose(actor, target, true).unwrap();
        p.drain_outbound();

        p.handle_client_message(c, ClientMessage::MovementUpdate(stale));
        assert_eq!(p.snapshot(actor).unwrap().pose, target);
        assert!(p.drain_outbound().is_empty());
        assert_eq!(violations(&p, c), 0);

        p.handle_client_message(
            c,
            ClientMessage::TeleportAck {
                actor,
                seq: 1,
                move_time: 200,
            },
        );
        let mut landed = p.snapshot(actor).unwrap();
        landed.pose.position += Vec3::new(0.0, 1.0, 0.0);
        landed.advance_timestamp(300);
        p.handle_client_message(c, ClientMessage::MovementUpdate(landed));
        assert_eq!(
            p.snapshot(actor).unwrap().pose.position,
            target.position + Vec3::new(0.0, 1.0, 0.0)
        );
    }

    #[test]
    fn forces_on_remote_movers_reach_observers_once() {
        let mut p = partition();
        let c = ControllerId::new();
        let actor = p.connect(c);
        p.drain_outbound();

        let force = MovementForce {
            id: ForceId(9),
            origin: Vec3::ZERO,
            direction: Vec3::Y,
            magnitude: 2.0,
            transport: None,
            kind: ForceKind::SingleDirectional,
        };
        p.on_capability_request(actor, MovementCommand::ApplyForce { force })
            .unwrap();
        p.drain_outbound();

        p.tick(33);
        let out = p.drain_outbound();
        assert_eq!(
            messages_to(&out, Recipient::Observers { except: Some(c) }),
            vec![&ServerMessage::StateChange {
                actor,
                command: MovementCommand::ApplyForce { force }
            }]
        );

        // the controller integrates its own forces
        p.tick(33);
        assert!(p.drain_outbound().is_empty());
    }

    #[test]
    fn server_movers_drift_under_forces() {
        let mut p = partition();
        let actor = p.spawn_actor(Controller::Server, Pose::default());
        let force = MovementForce {
            id: ForceId(1),
            origin: Vec3::ZERO,
            direction: Vec3::X,
            magnitude: 3.0,
            transport: None,
            kind: ForceKind::SingleDirectional,
        };
        p.on_capability_request(actor, MovementCommand::ApplyForce { force })
            .unwrap();
        p.drain_outbound();

        p.tick(500);
        let position = p.snapshot(actor).unwrap().pose.position;
        assert!(position.distance(Vec3::new(1.5, 0.0, 0.0)) < 1e-4);
        let out = p.drain_outbound();
        assert_eq!(messages_to(&out, all_observers()).len(), 1);

        let root = MovementCommand::SetCapability {
            capability: Capability::Root,
            enabled: true,
        };
        p.on_capability_request(actor, root).unwrap();
        p.tick(500);
        assert_eq!(p.snapshot(actor).unwrap().pose.position, position);
    }

    #[test]
    fn patrols_run_closed_loops() {
        let mut p = partition();
        let patrols = p.spawn_patrols(3);
        assert_eq!(patrols.len(), 3);
        for actor in &patrols {
            assert!(p.is_on_path(*actor));
            assert_eq!(p.controller_of(*actor), Some(Controller::Server));
        }
        for _ in 0..100 {
            p.tick(100);
        }
        assert!(patrols.iter().all(|a| p.is_on_path(*a)));
    }
}
