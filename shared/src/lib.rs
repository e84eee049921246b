//! State and logic shared by the authoritative server and predicting clients.
//!
//! The deterministic physics core lives here so both sides step the exact
//! same code: the server over real inputs, the client over predicted and
//! replayed ones.

pub mod input;
pub mod math;
pub mod physics;
pub mod player;
pub mod protocol;

pub use input::Input;
pub use math::{Cell, Quat, Vec3};
pub use player::{Kinematics, PushState, Team};
pub use protocol::{
    MatchResult, Packet, PlayerSnapshot, ReadyEntry, TeamRespawns, WorldSnapshot,
};

/// Steering acceleration applied while a move key is held, units/s^2.
pub const PLAYER_ACCEL: f32 = 60.0;
/// Ground friction deceleration, units/s^2 (opposes horizontal velocity).
pub const FRICTION_ACCEL: f32 = -PLAYER_ACCEL / 6.0;
pub const GRAVITY_ACCEL: f32 = -9.8;
/// Per-axis horizontal speed cap, units/s.
pub const XZ_VELOCITY_CLAMP: f32 = 4.0;
pub const JUMP_VELOCITY: f32 = 5.0;
/// Speed imparted to a shoved player, units/s.
pub const PUSH_VELOCITY: f32 = 18.0;

/// Edge length of one life-grid cell, world units.
pub const GRID_SIZE: f32 = 4.0;
/// Arena half-extent: the world spans [-WORLD_SIZE, WORLD_SIZE] on x and z.
pub const WORLD_SIZE: f32 = 32.0;
/// Player collision half-extent.
pub const PLAYER_SIZE: f32 = 1.0;

/// Maximum reach of a push, world units.
pub const PUSH_DISTANCE: f32 = 6.0;
/// Half-angle of the push cone, radians.
pub const PUSH_CONE: f32 = std::f32::consts::FRAC_PI_3;
pub const PUSH_COOLDOWN_MS: u64 = 5000;

/// Server physics and broadcast frequency, Hz.
pub const TICK_RATE: u32 = 60;
/// Client-side cap on the pending-input ring used for replay.
pub const INPUT_BUFFER_SIZE: usize = 100;
/// Client-side cap on retained snapshots.
pub const SNAPSHOT_BUFFER_SIZE: usize = 100;

/// Milliseconds since the Unix epoch; all protocol timestamps use this clock.
pub fn timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
