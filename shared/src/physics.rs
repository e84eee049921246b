//! Deterministic three-phase physics core.
//!
//! The server and the client's reconciliation replay both drive these exact
//! functions, so a player's trajectory is a pure function of
//! (state, inputs, delta-times). Callers run each phase across the whole
//! player population before starting the next one: phase 1 may plant a
//! pending shove on *other* players that phase 2 must consume.

use crate::input::Input;
use crate::math::{sign, snap_to_grid, Quat, Vec3};
use crate::player::{Kinematics, PushState};
use crate::{
    FRICTION_ACCEL, GRAVITY_ACCEL, JUMP_VELOCITY, PLAYER_ACCEL, PLAYER_SIZE, PUSH_CONE,
    PUSH_DISTANCE, PUSH_VELOCITY, WORLD_SIZE, XZ_VELOCITY_CLAMP,
};

/// Another player's collision volume, identified for skip-self scans.
#[derive(Debug, Clone, Copy)]
pub struct Obstacle {
    pub id: u32,
    pub position: Vec3,
}

/// Phase 1: drain the input queue and accumulate forces.
///
/// Sets horizontal acceleration from the move intents (unless airborne from a
/// shove), jumps only when resting on a surface, absorbs the capture-time
/// orientation, then applies friction and gravity. Returns true when an
/// attack rising edge armed a push and the cooldown has elapsed; the caller
/// performs the scan over the other players and must then call
/// [`finish_push`].
pub fn process_inputs(kin: &mut Kinematics, now: u64) -> bool {
    // Intent-driven acceleration lives only for one tick; an empty queue
    // (no packets this tick) means no steering, not stale steering. Friction
    // below would otherwise accumulate unboundedly across idle ticks.
    kin.acceleration.x = 0.0;
    kin.acceleration.z = 0.0;

    while let Some(input) = kin.inputs.pop_front() {
        if !kin.in_push {
            kin.acceleration.z = input.forwardmove.clamp(-1, 1) as f32 * PLAYER_ACCEL;
            kin.acceleration.x = input.sidemove.clamp(-1, 1) as f32 * PLAYER_ACCEL;

            if input.upmove && kin.on_floor {
                kin.velocity.y = JUMP_VELOCITY;
            }
        }

        kin.orientation = Quat::from_array(input.angle).normalize();

        let rising_edge = input.attack && !kin.attack_held;
        kin.attack_held = input.attack;
        if rising_edge && kin.ready(now) {
            kin.push = PushState::Armed;
        } else if !input.attack && kin.push == PushState::Armed {
            // Released before the tick processed it.
            kin.push = PushState::Idle;
        }

        kin.last_input = input.time;
    }

    kin.moving = kin.acceleration.x != 0.0 || kin.acceleration.z != 0.0;
    if kin.on_floor {
        kin.acceleration.z += FRICTION_ACCEL * sign(kin.velocity.z);
        kin.acceleration.x += FRICTION_ACCEL * sign(kin.velocity.x);
    }
    kin.acceleration.y = GRAVITY_ACCEL;

    kin.push == PushState::Armed
}

/// Records a completed push scan, starting the cooldown.
pub fn finish_push(kin: &mut Kinematics, now: u64) {
    kin.push = PushState::CoolingDown { since: now };
}

/// Whether a pusher at `origin` facing along `orientation` shoves a target.
///
/// The target must be within push reach and inside the view cone around the
/// pusher's forward vector. Returns the shove direction (the normalized
/// forward vector) on a hit.
pub fn aim_push(origin: Vec3, orientation: Quat, target: Vec3) -> Option<Vec3> {
    if origin.distance_to(target) > PUSH_DISTANCE {
        return None;
    }

    let to_target = target.sub(origin);
    let forward = orientation.rotate(Vec3::new(0.0, 0.0, -1.0));

    if forward.angle_to(to_target) < PUSH_CONE {
        Some(forward.normalize())
    } else {
        None
    }
}

/// Phase 2: first half of velocity-Verlet — move the player.
///
/// A pending shove overwrites the velocity and puts the player in a
/// push-induced arc (gravity-only acceleration, no orientation-relative
/// steering). The position delta is clamped horizontally and resolved against
/// the world bounds and every other player before being applied.
pub fn integrate_position(kin: &mut Kinematics, dt: f32, obstacles: &[Obstacle]) {
    if kin.pushed_dir.manhattan() != 0.0 {
        kin.velocity = kin.pushed_dir.scale(PUSH_VELOCITY);
        kin.pushed_dir = Vec3::default();
        kin.acceleration = Vec3::new(0.0, GRAVITY_ACCEL, 0.0);
        kin.in_push = true;
    }

    // delta = dt * (v + dt * a / 2)
    let mut dir = kin.velocity.add(kin.acceleration.scale(dt / 2.0)).scale(dt);

    if !kin.in_push {
        dir = kin.orientation.yaw_only().rotate(dir);
    }

    dir.x = dir.x.clamp(-XZ_VELOCITY_CLAMP, XZ_VELOCITY_CLAMP);
    dir.z = dir.z.clamp(-XZ_VELOCITY_CLAMP, XZ_VELOCITY_CLAMP);

    resolve_collisions(kin, &mut dir, obstacles);

    kin.position = kin.position.add(dir);
}

/// Clamps a proposed position delta against the world bounds and the other
/// players' bounding cubes.
fn resolve_collisions(kin: &mut Kinematics, dir: &mut Vec3, obstacles: &[Obstacle]) {
    let old = kin.position;
    let mut new = old.add(*dir);
    kin.on_floor = false;

    // World borders: the floor stops vertical motion and ends a push arc.
    if new.y <= 0.0 {
        dir.y = -old.y;
        kin.velocity.y = 0.0;
        kin.on_floor = true;
        kin.in_push = false;
    }

    let lb = -WORLD_SIZE + PLAYER_SIZE;
    let rb = WORLD_SIZE - PLAYER_SIZE;
    if new.x <= lb {
        dir.x = lb - old.x;
    }
    if new.x >= rb {
        dir.x = rb - old.x;
    }
    if new.z <= lb {
        dir.z = lb - old.z;
    }
    if new.z >= rb {
        dir.z = rb - old.z;
    }

    new = old.add(*dir);

    for other in obstacles {
        // Each player occupies a generous box around its grid cell so two
        // players never visually overlap.
        let lo = Vec3::new(
            snap_to_grid(other.position.x) - PLAYER_SIZE,
            snap_to_grid(other.position.y) - PLAYER_SIZE,
            snap_to_grid(other.position.z) - PLAYER_SIZE,
        );
        let span = crate::GRID_SIZE + 2.0 * PLAYER_SIZE;
        let hi = lo.add(Vec3::new(span, span, span));

        let inside = lo.x <= new.x
            && hi.x >= new.x
            && lo.y <= new.y
            && hi.y >= new.y
            && lo.z <= new.z
            && hi.z >= new.z;
        if !inside {
            continue;
        }

        // Clamp only on the axes the old position was already past, so the
        // player can still slide along the box's other faces.
        if old.x <= lo.x {
            dir.x = lo.x - old.x;
        }
        if old.x >= hi.x {
            dir.x = hi.x - old.x;
        }
        if old.y <= lo.y {
            dir.y = lo.y - old.y;
            kin.velocity.y = 0.0;
            kin.on_floor = true;
            kin.in_push = false;
        }
        if old.y >= hi.y {
            dir.y = hi.y - old.y;
            kin.velocity.y = 0.0;
            kin.on_floor = true;
            kin.in_push = false;
        }
        if old.z <= lo.z {
            dir.z = lo.z - old.z;
        }
        if old.z >= hi.z {
            dir.z = hi.z - old.z;
        }
    }
}

/// Phase 3: second half of velocity-Verlet — update the velocity.
///
/// When the player is stationary and grounded, friction must not reverse the
/// direction of motion: if the acceleration would overshoot the current
/// horizontal speed the player is clamped to exactly stopped instead.
/// Velocity and position are rounded to three decimals afterwards so
/// identical inputs always reproduce identical snapshots.
pub fn integrate_velocity(kin: &mut Kinematics, dt: f32) {
    if kin.moving || !kin.on_floor {
        kin.velocity = kin.velocity.add(kin.acceleration.scale(dt));
    } else {
        let mut difference = kin.acceleration.scale(dt);
        difference.y = 0.0;
        let mut xz_speed = kin.velocity;
        xz_speed.y = 0.0;

        kin.velocity = kin.velocity.add(kin.acceleration.scale(dt));
        if difference.length() >= xz_speed.length() {
            kin.velocity.x = 0.0;
            kin.velocity.z = 0.0;
        }
    }

    kin.velocity.x = kin.velocity.x.clamp(-XZ_VELOCITY_CLAMP, XZ_VELOCITY_CLAMP);
    kin.velocity.z = kin.velocity.z.clamp(-XZ_VELOCITY_CLAMP, XZ_VELOCITY_CLAMP);

    kin.velocity = kin.velocity.round_milli();
    kin.position = kin.position.round_milli();
}
