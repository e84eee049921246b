//! Player-facing value types shared by the authoritative and predicted sides.

use crate::input::Input;
use crate::math::{Quat, Vec3};
use crate::PUSH_COOLDOWN_MS;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One of the two competing teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub fn opponent(self) -> Team {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }
}

/// Push trigger state.
///
/// `Armed` is set on the attack rising edge when the cooldown has elapsed and
/// is consumed by the push scan, which leaves the player `CoolingDown`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum PushState {
    #[default]
    Idle,
    Armed,
    CoolingDown {
        since: u64,
    },
}

/// Kinematic state of one player.
///
/// The server's authoritative player and the client's predicted shadow copy
/// both embed this value type; the physics core only ever sees `Kinematics`.
#[derive(Debug, Clone, Default)]
pub struct Kinematics {
    pub position: Vec3,
    pub velocity: Vec3,
    pub acceleration: Vec3,
    pub orientation: Quat,

    /// FIFO queue of unconsumed inputs, fully drained every physics tick.
    pub inputs: VecDeque<Input>,
    /// Timestamp of the most recently consumed input (the snapshot ack).
    pub last_input: u64,

    pub moving: bool,
    pub on_floor: bool,
    /// Airborne from being shoved; normal steering is disabled until landing.
    pub in_push: bool,
    /// Pending shove direction set by another player's push scan.
    pub pushed_dir: Vec3,

    pub push: PushState,
    /// Previous attack state, for rising-edge detection across inputs.
    pub attack_held: bool,
}

impl Kinematics {
    pub fn at(position: Vec3) -> Kinematics {
        Kinematics {
            position,
            ..Kinematics::default()
        }
    }

    /// Whether the push cooldown has elapsed (the `ready` snapshot field).
    pub fn ready(&self, now: u64) -> bool {
        match self.push {
            PushState::CoolingDown { since } => now.saturating_sub(since) > PUSH_COOLDOWN_MS,
            _ => true,
        }
    }
}
