//! 3D vector and quaternion primitives used by the deterministic simulation.

use crate::{GRID_SIZE, WORLD_SIZE, XZ_VELOCITY_CLAMP};
use serde::{Deserialize, Serialize};

/// Rounds a scalar to three decimal places.
///
/// Every integration step rounds velocity and position through this so that
/// repeated runs with identical inputs produce bit-identical snapshots.
pub fn round_milli(n: f32) -> f32 {
    (n * 1000.0).round() / 1000.0
}

/// Sign of a scalar, with `sign(0) == 0`.
///
/// `f32::signum` returns 1.0 for 0.0, which would make friction push a
/// resting player sideways.
pub fn sign(n: f32) -> f32 {
    if n > 0.0 {
        1.0
    } else if n < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Represents a vector in 3D space. Y is up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Vec3 {
        Vec3 { x, y, z }
    }

    ///Returns the sum of two vectors.
    pub fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    ///Returns the difference of two vectors.
    pub fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    ///Returns the scaled vector.
    pub fn scale(self, scalar: f32) -> Vec3 {
        Vec3::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }

    ///Returns the magnitude of the vector.
    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    ///Returns the Manhattan length (sum of absolute components).
    pub fn manhattan(self) -> f32 {
        self.x.abs() + self.y.abs() + self.z.abs()
    }

    pub fn distance_to(self, other: Vec3) -> f32 {
        other.sub(self).length()
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    ///Returns the normalized vector, or zero if the vector is zero.
    pub fn normalize(self) -> Vec3 {
        let len = self.length();
        if len == 0.0 {
            Vec3::default()
        } else {
            self.scale(1.0 / len)
        }
    }

    /// Angle between two vectors in radians.
    pub fn angle_to(self, other: Vec3) -> f32 {
        let denominator = (self.length() * other.length()).max(f32::EPSILON);
        (self.dot(other) / denominator).clamp(-1.0, 1.0).acos()
    }

    ///Returns the vector with every component rounded to three decimals.
    pub fn round_milli(self) -> Vec3 {
        Vec3::new(round_milli(self.x), round_milli(self.y), round_milli(self.z))
    }

    /// Exponentially interpolates toward a target position.
    ///
    /// Snaps outright when the gap exceeds the horizontal speed clamp (no
    /// point easing across a teleport) and does nothing when already within
    /// a tight epsilon.
    pub fn smoothed(self, target: Vec3, amount: f32) -> Vec3 {
        let distance = self.distance_to(target);
        if distance > XZ_VELOCITY_CLAMP {
            target
        } else if distance > 0.1 {
            self.add(target.sub(self).scale(amount))
        } else {
            self
        }
    }
}

/// Represents a rotation as a unit quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Quat {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl Quat {
    /// Builds a quaternion from its wire representation.
    ///
    /// Orientations travel as 4 floats because quaternion objects do not
    /// survive the wire format.
    pub fn from_array(a: [f32; 4]) -> Quat {
        Quat {
            x: a[0],
            y: a[1],
            z: a[2],
            w: a[3],
        }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    pub fn normalize(self) -> Quat {
        let len = (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt();
        if len == 0.0 {
            Quat::default()
        } else {
            Quat {
                x: self.x / len,
                y: self.y / len,
                z: self.z / len,
                w: self.w / len,
            }
        }
    }

    /// Rotates a vector by this quaternion.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let u = Vec3::new(self.x, self.y, self.z);
        let t = u.cross(v).scale(2.0);
        v.add(t.scale(self.w)).add(u.cross(t))
    }

    /// Strips pitch and roll, leaving only the rotation about the Y axis.
    ///
    /// Movement intents are rotated through this so steering is always
    /// relative to where the player faces along the horizontal plane.
    pub fn yaw_only(self) -> Quat {
        Quat {
            x: 0.0,
            y: self.y,
            z: 0.0,
            w: self.w,
        }
        .normalize()
    }

    /// Builds an orientation from mouse-look yaw and pitch (yaw about Y
    /// applied first, then pitch about the local X axis).
    pub fn from_yaw_pitch(yaw: f32, pitch: f32) -> Quat {
        let (sy, cy) = (yaw / 2.0).sin_cos();
        let (sp, cp) = (pitch / 2.0).sin_cos();
        // q_yaw * q_pitch
        Quat {
            x: cy * sp,
            y: sy * cp,
            z: -sy * sp,
            w: cy * cp,
        }
    }

    /// Spherical interpolation toward another quaternion.
    pub fn slerp(self, other: Quat, t: f32) -> Quat {
        let mut b = other;
        let mut cos_theta =
            self.x * b.x + self.y * b.y + self.z * b.z + self.w * b.w;

        // Take the short way around.
        if cos_theta < 0.0 {
            cos_theta = -cos_theta;
            b = Quat {
                x: -b.x,
                y: -b.y,
                z: -b.z,
                w: -b.w,
            };
        }

        // Nearly parallel: fall back to a normalized lerp.
        if cos_theta > 0.9995 {
            return Quat {
                x: self.x + (b.x - self.x) * t,
                y: self.y + (b.y - self.y) * t,
                z: self.z + (b.z - self.z) * t,
                w: self.w + (b.w - self.w) * t,
            }
            .normalize();
        }

        let theta = cos_theta.acos();
        let sin_theta = theta.sin();
        let wa = ((1.0 - t) * theta).sin() / sin_theta;
        let wb = (t * theta).sin() / sin_theta;
        Quat {
            x: self.x * wa + b.x * wb,
            y: self.y * wa + b.y * wb,
            z: self.z * wa + b.z * wb,
            w: self.w * wa + b.w * wb,
        }
        .normalize()
    }
}

/// Snaps a world coordinate down to the low edge of its containing grid cell.
pub fn snap_to_grid(n: f32) -> f32 {
    (n / GRID_SIZE).floor() * GRID_SIZE
}

/// Grid cells along x and z (world spans ±WORLD_SIZE).
pub const GRID_CELLS_XZ: i32 = (2.0 * WORLD_SIZE / GRID_SIZE) as i32;
/// Grid cells along y (world floor is 0).
pub const GRID_CELLS_Y: i32 = (WORLD_SIZE / GRID_SIZE) as i32;

/// A cell coordinate of the automaton grid.
pub type Cell = [i32; 3];

/// Canonical world → grid-cell mapping. Coordinates outside the world are
/// clamped onto the nearest cell.
pub fn world_to_cell(pos: Vec3) -> Cell {
    [
        (((pos.x + WORLD_SIZE) / GRID_SIZE).floor() as i32).clamp(0, GRID_CELLS_XZ - 1),
        ((pos.y / GRID_SIZE).floor() as i32).clamp(0, GRID_CELLS_Y - 1),
        (((pos.z + WORLD_SIZE) / GRID_SIZE).floor() as i32).clamp(0, GRID_CELLS_XZ - 1),
    ]
}

/// Canonical grid-cell → world mapping: the cell's center point.
pub fn cell_to_world(cell: Cell) -> Vec3 {
    Vec3::new(
        (cell[0] as f32 + 0.5) * GRID_SIZE - WORLD_SIZE,
        (cell[1] as f32 + 0.5) * GRID_SIZE,
        (cell[2] as f32 + 0.5) * GRID_SIZE - WORLD_SIZE,
    )
}

/// Manhattan distance between two grid cells.
pub fn cell_distance(a: Cell, b: Cell) -> i32 {
    (a[0] - b[0]).abs() + (a[1] - b[1]).abs() + (a[2] - b[2]).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_round_milli() {
        assert_eq!(round_milli(1.23456), 1.235);
        assert_eq!(round_milli(-0.0004), 0.0);
        assert_eq!(round_milli(2.0), 2.0);
    }

    #[test]
    fn test_sign_of_zero() {
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(3.5), 1.0);
        assert_eq!(sign(-0.001), -1.0);
    }

    #[test]
    fn test_vector_length_and_normalize() {
        let v = Vec3::new(3.0, 0.0, 4.0);
        assert_approx_eq!(v.length(), 5.0);
        let n = v.normalize();
        assert_approx_eq!(n.length(), 1.0);
        assert_eq!(Vec3::default().normalize(), Vec3::default());
    }

    #[test]
    fn test_manhattan() {
        assert_eq!(Vec3::new(1.0, -2.0, 3.0).manhattan(), 6.0);
        assert_eq!(Vec3::default().manhattan(), 0.0);
    }

    #[test]
    fn test_angle_between_vectors() {
        let forward = Vec3::new(0.0, 0.0, -1.0);
        let right = Vec3::new(1.0, 0.0, 0.0);
        assert_approx_eq!(forward.angle_to(right), std::f32::consts::FRAC_PI_2, 1e-5);
        assert_approx_eq!(forward.angle_to(forward), 0.0, 1e-3);
    }

    #[test]
    fn test_smoothed_snaps_when_far() {
        let p = Vec3::default();
        let far = Vec3::new(20.0, 0.0, 0.0);
        assert_eq!(p.smoothed(far, 0.4), far);
    }

    #[test]
    fn test_smoothed_noop_when_close() {
        let p = Vec3::new(1.0, 1.0, 1.0);
        let target = Vec3::new(1.05, 1.0, 1.0);
        assert_eq!(p.smoothed(target, 0.4), p);
    }

    #[test]
    fn test_smoothed_lerps_in_between() {
        let p = Vec3::default();
        let target = Vec3::new(1.0, 0.0, 0.0);
        let s = p.smoothed(target, 0.4);
        assert_approx_eq!(s.x, 0.4);
    }

    #[test]
    fn test_quat_identity_rotation() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        let r = Quat::default().rotate(v);
        assert_approx_eq!(r.x, v.x);
        assert_approx_eq!(r.y, v.y);
        assert_approx_eq!(r.z, v.z);
    }

    #[test]
    fn test_quat_yaw_rotation() {
        // 90° about Y takes -Z to -X.
        let q = Quat::from_yaw_pitch(std::f32::consts::FRAC_PI_2, 0.0);
        let r = q.rotate(Vec3::new(0.0, 0.0, -1.0));
        assert_approx_eq!(r.x, -1.0, 1e-5);
        assert_approx_eq!(r.z, 0.0, 1e-5);
    }

    #[test]
    fn test_yaw_only_strips_pitch() {
        let q = Quat::from_yaw_pitch(1.0, 0.8).yaw_only();
        // A yaw-only rotation keeps horizontal vectors horizontal.
        let r = q.rotate(Vec3::new(0.0, 0.0, -1.0));
        assert_approx_eq!(r.y, 0.0, 1e-5);
        assert_approx_eq!(r.length(), 1.0, 1e-5);
    }

    #[test]
    fn test_slerp_endpoints() {
        let a = Quat::default();
        let b = Quat::from_yaw_pitch(1.2, 0.0);
        let s0 = a.slerp(b, 0.0);
        let s1 = a.slerp(b, 1.0);
        assert_approx_eq!(s0.w, a.w, 1e-4);
        assert_approx_eq!(s1.y.abs(), b.y.abs(), 1e-4);
    }

    #[test]
    fn test_quat_array_roundtrip() {
        let q = Quat::from_yaw_pitch(0.7, -0.3);
        let r = Quat::from_array(q.to_array());
        assert_eq!(q, r);
    }

    #[test]
    fn test_snap_to_grid() {
        assert_eq!(snap_to_grid(5.9), 4.0);
        assert_eq!(snap_to_grid(-0.1), -4.0);
        assert_eq!(snap_to_grid(8.0), 8.0);
    }

    #[test]
    fn test_grid_mapping_roundtrip() {
        // cell -> world -> cell is the identity for every cell in the grid.
        for x in 0..GRID_CELLS_XZ {
            for y in 0..GRID_CELLS_Y {
                for z in 0..GRID_CELLS_XZ {
                    let cell = [x, y, z];
                    assert_eq!(world_to_cell(cell_to_world(cell)), cell);
                }
            }
        }
    }

    #[test]
    fn test_world_to_cell_clamps() {
        let below = world_to_cell(Vec3::new(-100.0, -5.0, 100.0));
        assert_eq!(below, [0, 0, GRID_CELLS_XZ - 1]);
    }

    #[test]
    fn test_cell_distance() {
        assert_eq!(cell_distance([0, 0, 0], [1, 2, 3]), 6);
        assert_eq!(cell_distance([4, 4, 4], [4, 4, 4]), 0);
    }
}
