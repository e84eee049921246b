//! Authoritative world state and the fixed-tick simulation step.

use log::{debug, info};
use rand::Rng;
use shared::math::Cell;
use shared::physics::{self, Obstacle};
use shared::{
    Input, Kinematics, MatchResult, PlayerSnapshot, Team, Vec3, WorldSnapshot, INPUT_BUFFER_SIZE,
    PLAYER_SIZE, WORLD_SIZE,
};
use std::collections::HashMap;

/// Server-side view of one player.
pub struct AuthoritativePlayer {
    pub id: u32,
    pub team: Team,
    pub dead: bool,
    /// Respawn cell claimed for this player while dead, if any.
    pub cell: Option<Cell>,
    pub kin: Kinematics,
}

/// The canonical game state. All mutation happens on the tick task.
#[derive(Default)]
pub struct World {
    pub players: HashMap<u32, AuthoritativePlayer>,
}

impl World {
    pub fn new() -> World {
        World::default()
    }

    fn team_size(&self, team: Team) -> usize {
        self.players.values().filter(|p| p.team == team).count()
    }

    /// Adds a player on the smaller team at a random floor position.
    ///
    /// Ties go to red so the first two joiners always oppose each other.
    pub fn add_player(&mut self, id: u32) -> Team {
        let team = if self.team_size(Team::Blue) < self.team_size(Team::Red) {
            Team::Blue
        } else {
            Team::Red
        };

        let mut rng = rand::thread_rng();
        let limit = WORLD_SIZE - PLAYER_SIZE;
        let spawn = Vec3::new(
            rng.gen_range(-limit..limit),
            0.0,
            rng.gen_range(-limit..limit),
        );

        info!(
            "Added player {} ({:?}) at ({:.1}, {:.1})",
            id, team, spawn.x, spawn.z
        );
        self.players.insert(
            id,
            AuthoritativePlayer {
                id,
                team,
                dead: false,
                cell: None,
                kin: Kinematics::at(spawn),
            },
        );
        team
    }

    pub fn remove_player(&mut self, id: &u32) {
        if self.players.remove(id).is_some() {
            info!("Removed player {}", id);
        }
    }

    /// Queues an input for consumption on the next tick. The queue is capped;
    /// a stalled tick task sheds the oldest inputs first.
    pub fn enqueue_input(&mut self, id: u32, input: Input) {
        if let Some(player) = self.players.get_mut(&id) {
            if player.kin.inputs.len() >= INPUT_BUFFER_SIZE {
                player.kin.inputs.pop_front();
            }
            player.kin.inputs.push_back(input);
        }
    }

    fn sorted_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.players.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Obstacles one player collides with: every other living player.
    fn obstacles_for(&self, id: u32) -> Vec<Obstacle> {
        let mut obstacles: Vec<Obstacle> = self
            .players
            .values()
            .filter(|p| p.id != id && !p.dead)
            .map(|p| Obstacle {
                id: p.id,
                position: p.kin.position,
            })
            .collect();
        obstacles.sort_unstable_by_key(|o| o.id);
        obstacles
    }

    /// Advances the simulation by one tick.
    ///
    /// Runs each phase across the whole population in ascending id order
    /// before starting the next, so a push lands against the positions every
    /// player had at the start of the tick.
    pub fn step(&mut self, dt: f32, now: u64) {
        let ids = self.sorted_ids();

        // Phase 1: consume inputs, resolve push triggers.
        for &id in &ids {
            let (origin, orientation) = {
                let player = match self.players.get_mut(&id) {
                    Some(p) => p,
                    None => continue,
                };
                if player.dead {
                    // Dead players keep sending inputs; they must not act.
                    player.kin.inputs.clear();
                    continue;
                }
                if !physics::process_inputs(&mut player.kin, now) {
                    continue;
                }
                physics::finish_push(&mut player.kin, now);
                (player.kin.position, player.kin.orientation)
            };

            debug!("Player {} pushes", id);
            for &other_id in &ids {
                if other_id == id {
                    continue;
                }
                if let Some(other) = self.players.get_mut(&other_id) {
                    if other.dead {
                        continue;
                    }
                    other.kin.pushed_dir =
                        physics::aim_push(origin, orientation, other.kin.position)
                            .unwrap_or_default();
                }
            }
        }

        // Phase 2: move everyone against start-of-phase obstacle positions.
        for &id in &ids {
            let obstacles = self.obstacles_for(id);
            if let Some(player) = self.players.get_mut(&id) {
                if !player.dead {
                    physics::integrate_position(&mut player.kin, dt, &obstacles);
                }
            }
        }

        // Phase 3: settle velocities.
        for &id in &ids {
            if let Some(player) = self.players.get_mut(&id) {
                if !player.dead {
                    physics::integrate_velocity(&mut player.kin, dt);
                }
            }
        }
    }

    pub fn snapshot(&self, now: u64) -> WorldSnapshot {
        let players = self
            .players
            .values()
            .map(|p| {
                (
                    p.id,
                    PlayerSnapshot {
                        position: p.kin.position,
                        velocity: p.kin.velocity,
                        angle: p.kin.orientation.to_array(),
                        last_input: p.kin.last_input,
                        ready: p.kin.ready(now),
                        team: p.team,
                        dead: p.dead,
                    },
                )
            })
            .collect();
        WorldSnapshot { time: now, players }
    }

    /// The match outcome, or `None` while both teams still have players alive.
    pub fn match_result(&self) -> Option<MatchResult> {
        let red_alive = self.players.values().any(|p| p.team == Team::Red && !p.dead);
        let blue_alive = self
            .players
            .values()
            .any(|p| p.team == Team::Blue && !p.dead);

        match (red_alive, blue_alive) {
            (true, true) => None,
            (true, false) => Some(MatchResult::RedWins),
            (false, true) => Some(MatchResult::BlueWins),
            (false, false) => Some(MatchResult::Draw),
        }
    }
}
