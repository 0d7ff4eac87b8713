//! Actors as the partition sees them

use crate::movement::mover::Mover;
use crate::movement::state::{MotionState, Pose};
use crate::movement::ActorId;

/// One simulated participant
#[derive(Debug, Clone)]
pub struct Actor {
    pub mover: Mover,
    /// Actors riding on this one; ids only, resolved through the partition
    pub passengers: Vec<ActorId>,
}

impl Actor {
    pub fn new(id: ActorId, pose: Pose) -> Self {
        Self {
            mover: Mover::new(id, pose),
            passengers: Vec::new(),
        }
    }

    pub fn id(&self) -> ActorId {
        self.mover.id()
    }

    pub fn motion(&self) -> &MotionState {
        &self.mover.motion
    }

    pub fn pose(&self) -> Pose {
        self.mover.motion.pose
    }

    /// Transport this actor rides, if any
    pub fn transport(&self) -> Option<ActorId> {
        self.mover.motion.transport.map(|t| t.transport)
    }

    pub(crate) fn add_passenger(&mut self, passenger: ActorId) {
        if !self.passengers.contains(&passenger) {
            self.passengers.push(passenger);
        }
    }

    pub(crate) fn remove_passenger(&mut self, passenger: ActorId) {
        self.passengers.retain(|p| *p != passenger);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passenger_list_has_no_duplicates() {
        let mut ship = Actor::new(ActorId(1), Pose::default());
        ship.add_passenger(ActorId(2));
        ship.add_passenger(ActorId(2));
        assert_eq!(ship.passengers, vec![ActorId(2)]);

        ship.remove_passenger(ActorId(2));
        assert!(ship.passengers.is_empty());
    }
}
