//! 3D scene and HUD drawing.

use crate::game::{ClientWorld, MatchPhase};
use macroquad::prelude::*;
use shared::math::cell_to_world;
use shared::{MatchResult, ReadyEntry, Team, GRID_SIZE, PLAYER_SIZE, WORLD_SIZE};
use std::collections::HashMap;

/// Camera eye height above the player's feet.
const EYE_HEIGHT: f32 = 1.6;

/// Everything the HUD needs besides the world itself.
pub struct HudInfo {
    pub ping_ms: u64,
    pub connected: bool,
    /// Push cooldown elapsed.
    pub push_ready: bool,
    pub phase: MatchPhase,
    pub votes: HashMap<u32, ReadyEntry>,
}

fn team_color(team: Team) -> Color {
    match team {
        Team::Red => Color::from_rgba(220, 60, 60, 255),
        Team::Blue => Color::from_rgba(60, 120, 220, 255),
    }
}

fn to_vec3(v: shared::Vec3) -> Vec3 {
    vec3(v.x, v.y, v.z)
}

pub struct Renderer;

impl Renderer {
    pub fn new() -> Renderer {
        Renderer
    }

    pub fn render(&mut self, world: &ClientWorld, self_id: Option<u32>, hud: &HudInfo) {
        clear_background(Color::from_rgba(18, 18, 24, 255));

        let camera = self.camera_for(world, self_id);
        set_camera(&camera);

        self.draw_arena();
        self.draw_players(world, self_id);
        self.draw_respawn_points(world);

        set_default_camera();
        self.draw_hud(world, self_id, hud);
    }

    /// First-person camera at the local player, falling back to an overview
    /// before the player exists.
    fn camera_for(&self, world: &ClientWorld, self_id: Option<u32>) -> Camera3D {
        if let Some(player) = self_id.and_then(|id| world.players.get(&id)) {
            let eye = to_vec3(player.kin.position) + vec3(0.0, EYE_HEIGHT, 0.0);
            let forward = to_vec3(player.kin.orientation.rotate(shared::Vec3::new(0.0, 0.0, -1.0)));
            Camera3D {
                position: eye,
                target: eye + forward,
                up: vec3(0.0, 1.0, 0.0),
                ..Default::default()
            }
        } else {
            Camera3D {
                position: vec3(0.0, WORLD_SIZE, WORLD_SIZE),
                target: vec3(0.0, 0.0, 0.0),
                up: vec3(0.0, 1.0, 0.0),
                ..Default::default()
            }
        }
    }

    fn draw_arena(&self) {
        draw_grid(
            (2.0 * WORLD_SIZE / GRID_SIZE) as u32,
            GRID_SIZE,
            Color::from_rgba(90, 90, 90, 255),
            Color::from_rgba(50, 50, 50, 255),
        );

        // Wall outlines at the clamp boundary.
        let wall = WORLD_SIZE;
        for (a, b) in [
            (vec3(-wall, 0.0, -wall), vec3(wall, 0.0, -wall)),
            (vec3(wall, 0.0, -wall), vec3(wall, 0.0, wall)),
            (vec3(wall, 0.0, wall), vec3(-wall, 0.0, wall)),
            (vec3(-wall, 0.0, wall), vec3(-wall, 0.0, -wall)),
        ] {
            draw_line_3d(a, b, YELLOW);
            draw_line_3d(
                a + vec3(0.0, 2.0 * PLAYER_SIZE, 0.0),
                b + vec3(0.0, 2.0 * PLAYER_SIZE, 0.0),
                YELLOW,
            );
        }
    }

    fn draw_players(&self, world: &ClientWorld, self_id: Option<u32>) {
        for player in world.players.values() {
            if Some(player.id) == self_id {
                // The camera sits inside the local player.
                continue;
            }
            let mut color = team_color(player.team);
            if player.dead {
                color.a = 0.25;
            }
            let center = to_vec3(player.kin.position) + vec3(0.0, PLAYER_SIZE, 0.0);
            let size = vec3(2.0 * PLAYER_SIZE, 2.0 * PLAYER_SIZE, 2.0 * PLAYER_SIZE);
            draw_cube(center, size, None, color);
            draw_cube_wires(center, size, BLACK);
        }
    }

    fn draw_respawn_points(&self, world: &ClientWorld) {
        for (team, cells) in [
            (Team::Red, &world.respawns.red),
            (Team::Blue, &world.respawns.blue),
        ] {
            let mut color = team_color(team);
            color.a = 0.3;
            for &cell in cells {
                let center = to_vec3(cell_to_world(cell)) + vec3(0.0, GRID_SIZE / 2.0, 0.0);
                draw_cube(center, vec3(GRID_SIZE, GRID_SIZE, GRID_SIZE), None, color);
            }
        }
    }

    fn draw_hud(&self, world: &ClientWorld, self_id: Option<u32>, hud: &HudInfo) {
        let mut y = 24.0;
        let mut line = |text: &str, color: Color| {
            draw_text(text, 12.0, y, 20.0, color);
            y += 20.0;
        };

        let connection = if hud.connected {
            format!("connected  {}ms", hud.ping_ms)
        } else {
            "connecting...".to_string()
        };
        line(&connection, WHITE);

        match hud.phase {
            MatchPhase::Lobby => {
                line("lobby - press R to ready up", WHITE);
                let mut ids: Vec<&u32> = hud.votes.keys().collect();
                ids.sort();
                for id in ids {
                    let entry = &hud.votes[id];
                    let marker = if entry.readied { "ready" } else { "  -  " };
                    let label = format!("  player {} [{}]", id, marker);
                    line(&label, team_color(entry.team));
                }
            }
            MatchPhase::Running => {
                let push = if hud.push_ready { "push READY" } else { "push cooling down" };
                line(push, if hud.push_ready { GREEN } else { GRAY });

                let alive = world.players.values().filter(|p| !p.dead).count();
                line(&format!("{} alive", alive), WHITE);
            }
            MatchPhase::Over(result) => {
                let text = match result {
                    MatchResult::Draw => "match over: draw",
                    MatchResult::RedWins => "match over: red wins",
                    MatchResult::BlueWins => "match over: blue wins",
                };
                line(text, YELLOW);
            }
        }

        let dead = self_id
            .and_then(|id| world.players.get(&id))
            .map(|p| p.dead)
            .unwrap_or(false);
        if dead {
            let text = "YOU ARE DEAD - waiting for respawn";
            let size = measure_text(text, None, 32, 1.0);
            draw_text(
                text,
                (screen_width() - size.width) / 2.0,
                screen_height() / 2.0,
                32.0,
                RED,
            );
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
