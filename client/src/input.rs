//! Keyboard and mouse sampling into networked input frames.

use macroquad::prelude::*;
use shared::{timestamp_ms, Input, Quat};

/// Mouse sensitivity, radians per pixel.
const MOUSE_SENSITIVITY: f32 = 0.003;
/// Pitch is clamped short of straight up/down to keep the camera sane.
const PITCH_LIMIT: f32 = 1.5;

/// Samples raw input and turns it into immutable [`Input`] frames.
///
/// Yaw and pitch accumulate from mouse deltas between frames; each captured
/// frame carries the full orientation quaternion rather than the deltas.
pub struct InputManager {
    yaw: f32,
    pitch: f32,
    last_mouse: Vec2,
}

impl InputManager {
    pub fn new() -> InputManager {
        InputManager {
            yaw: 0.0,
            pitch: 0.0,
            last_mouse: mouse_position().into(),
        }
    }

    /// The current view orientation.
    pub fn orientation(&self) -> Quat {
        Quat::from_yaw_pitch(self.yaw, self.pitch)
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// True on the frame the ready-vote key was pressed.
    pub fn ready_toggled(&self) -> bool {
        is_key_pressed(KeyCode::R)
    }

    /// Samples one input frame at the current wall-clock time.
    pub fn sample(&mut self) -> Input {
        let mouse: Vec2 = mouse_position().into();
        let delta = mouse - self.last_mouse;
        self.last_mouse = mouse;

        self.yaw -= delta.x * MOUSE_SENSITIVITY;
        self.pitch = (self.pitch - delta.y * MOUSE_SENSITIVITY).clamp(-PITCH_LIMIT, PITCH_LIMIT);

        let mut input = Input::new(timestamp_ms());

        if is_key_down(KeyCode::W) {
            input.forwardmove -= 1;
        }
        if is_key_down(KeyCode::S) {
            input.forwardmove += 1;
        }
        if is_key_down(KeyCode::A) {
            input.sidemove -= 1;
        }
        if is_key_down(KeyCode::D) {
            input.sidemove += 1;
        }
        input.upmove = is_key_down(KeyCode::Space);
        input.attack = is_mouse_button_down(MouseButton::Left);
        input.angle = self.orientation().to_array();

        input.round_angle()
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_is_unit() {
        let manager = InputManager {
            yaw: 1.2,
            pitch: -0.4,
            last_mouse: Vec2::ZERO,
        };
        let q = manager.orientation();
        let len = (q.x * q.x + q.y * q.y + q.z * q.z + q.w * q.w).sqrt();
        assert!((len - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_pitch_limit() {
        let pitch: f32 = 2.0;
        assert_eq!(pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT), PITCH_LIMIT);
    }
}
