//! Timestamped input commands sent from clients to the authoritative server.

use crate::math::round_milli;
use serde::{Deserialize, Serialize};

/// A single captured input frame.
///
/// Immutable once created; the physics core consumes each input at most once.
/// Move intents are signed unit scalars; the orientation is the capture-time
/// camera quaternion serialized as 4 floats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Input {
    /// Capture time, monotonic milliseconds.
    pub time: u64,
    /// Orientation quaternion as [x, y, z, w].
    pub angle: [f32; 4],
    /// Forward intent: -1 forward, 0 none, 1 backward (forward is -Z).
    pub forwardmove: i8,
    /// Side intent: -1 left, 0 none, 1 right.
    pub sidemove: i8,
    /// Jump intent.
    pub upmove: bool,
    /// Attack/push trigger.
    pub attack: bool,
}

impl Input {
    /// A neutral input at the given capture time.
    pub fn new(time: u64) -> Input {
        Input {
            time,
            angle: [0.0, 0.0, 0.0, 1.0],
            forwardmove: 0,
            sidemove: 0,
            upmove: false,
            attack: false,
        }
    }

    /// Rounds the orientation to three decimals before transmission.
    pub fn round_angle(mut self) -> Input {
        for component in &mut self.angle {
            *component = round_milli(*component);
        }
        self
    }
}
