//! Client-side world: local prediction, snapshot smoothing, reconciliation.
//!
//! The local player runs the shared physics core ahead of the server and is
//! snapped back plus replayed whenever a snapshot arrives. Remote players
//! never predict; they interpolate toward their authoritative state.

use log::debug;
use shared::physics::{self, Obstacle};
use shared::{
    Input, Kinematics, Quat, Team, TeamRespawns, WorldSnapshot, INPUT_BUFFER_SIZE,
    SNAPSHOT_BUFFER_SIZE,
};
use std::collections::HashMap;

/// Smoothing factor for remote player positions.
const POSITION_LERP: f32 = 0.4;
/// Smoothing factor for remote player orientations.
const ORIENTATION_SLERP: f32 = 0.75;

/// Where the match currently stands, as far as this client knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPhase {
    /// Waiting for everyone's ready vote.
    #[default]
    Lobby,
    Running,
    Over(shared::MatchResult),
}

/// Client-side view of one player.
pub struct PredictedPlayer {
    pub id: u32,
    pub team: Team,
    pub dead: bool,
    pub kin: Kinematics,
}

/// All state the client simulates or mirrors.
#[derive(Default)]
pub struct ClientWorld {
    pub players: HashMap<u32, PredictedPlayer>,
    /// Recent snapshots, oldest first.
    pub snapshots: Vec<WorldSnapshot>,
    /// Locally captured inputs retained for replay, oldest first.
    pub self_inputs: Vec<Input>,
    /// Latest respawn-point sets, for visualization.
    pub respawns: TeamRespawns,
}

impl ClientWorld {
    pub fn new() -> ClientWorld {
        ClientWorld::default()
    }

    pub fn add_player(&mut self, id: u32, team: Team) {
        self.players.entry(id).or_insert(PredictedPlayer {
            id,
            team,
            dead: false,
            kin: Kinematics::default(),
        });
    }

    pub fn remove_player(&mut self, id: &u32) {
        self.players.remove(id);
    }

    /// Buffers a captured input and queues it for local prediction.
    pub fn record_input(&mut self, self_id: u32, input: Input) {
        if let Some(player) = self.players.get_mut(&self_id) {
            player.kin.inputs.push_back(input.clone());
        }
        self.self_inputs.push(input);
        if self.self_inputs.len() > INPUT_BUFFER_SIZE {
            let excess = self.self_inputs.len() - INPUT_BUFFER_SIZE;
            self.self_inputs.drain(0..excess);
        }
    }

    fn obstacles_excluding(&self, id: u32) -> Vec<Obstacle> {
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

    /// Advances the local player one predicted step.
    ///
    /// Remote players are not stepped; their motion comes entirely from
    /// snapshot smoothing.
    pub fn predict(&mut self, self_id: u32, now: u64, dt: f32) {
        let obstacles = self.obstacles_excluding(self_id);
        if let Some(player) = self.players.get_mut(&self_id) {
            if player.dead {
                player.kin.inputs.clear();
                return;
            }
            if physics::process_inputs(&mut player.kin, now) {
                // The push itself lands server-side; locally we only start
                // the cooldown so the HUD agrees.
                physics::finish_push(&mut player.kin, now);
            }
            physics::integrate_position(&mut player.kin, dt, &obstacles);
            physics::integrate_velocity(&mut player.kin, dt);
        }
    }

    /// Ingests an authoritative snapshot.
    pub fn apply_snapshot(&mut self, snapshot: WorldSnapshot, self_id: Option<u32>) {
        for (&id, ps) in &snapshot.players {
            let player = self.players.entry(id).or_insert(PredictedPlayer {
                id,
                team: ps.team,
                dead: ps.dead,
                kin: Kinematics::at(ps.position),
            });
            player.team = ps.team;
            player.dead = ps.dead;
            player.kin.last_input = ps.last_input;

            if Some(id) == self_id {
                // Reconciliation below owns the local player's kinematics.
                continue;
            }
            player.kin.position = player.kin.position.smoothed(ps.position, POSITION_LERP);
            player.kin.velocity = ps.velocity;
            player.kin.orientation = player
                .kin
                .orientation
                .slerp(Quat::from_array(ps.angle).normalize(), ORIENTATION_SLERP);
        }

        self.snapshots.push(snapshot);
        if self.snapshots.len() > SNAPSHOT_BUFFER_SIZE {
            let excess = self.snapshots.len() - SNAPSHOT_BUFFER_SIZE;
            self.snapshots.drain(0..excess);
        }

        if let Some(self_id) = self_id {
            self.reconcile(self_id);
        }
    }

    /// Resets the local player onto the authoritative state and replays every
    /// buffered input the server has not consumed yet.
    ///
    /// Each replayed input advances time by the gap to its predecessor, so
    /// the replayed trajectory matches what the server will compute when the
    /// same inputs drain through its queue.
    fn reconcile(&mut self, self_id: u32) {
        let authoritative = match self
            .snapshots
            .last()
            .and_then(|s| s.players.get(&self_id))
        {
            Some(ps) => ps.clone(),
            None => return,
        };

        let obstacles = self.obstacles_excluding(self_id);
        let player = match self.players.get_mut(&self_id) {
            Some(p) => p,
            None => return,
        };

        if authoritative.dead {
            // No prediction while dead; track the server exactly.
            player.kin = Kinematics::at(authoritative.position);
            player.kin.last_input = authoritative.last_input;
            return;
        }

        // Locate the first buffered input newer than the server's ack. The
        // predecessor must exist too: it anchors the first replay delta.
        let inputs = &self.self_inputs;
        let mut first = 0;
        for i in (0..inputs.len()).rev() {
            if inputs[i].time <= authoritative.last_input {
                first = i + 1;
                break;
            }
        }
        if first == 0 || first >= inputs.len() {
            // Nothing newer than the ack, or no anchor before it.
            return;
        }

        player.kin.position = authoritative.position;
        player.kin.velocity = authoritative.velocity;
        player.kin.acceleration = Default::default();
        player.kin.orientation = Quat::from_array(authoritative.angle).normalize();
        player.kin.inputs.clear();

        debug!(
            "Reconcile: replaying {} inputs from ack {}",
            inputs.len() - first,
            authoritative.last_input
        );

        for i in first..inputs.len() {
            let input = inputs[i].clone();
            let dt = input.time.saturating_sub(inputs[i - 1].time) as f32 / 1000.0;
            let now = input.time;
            player.kin.inputs.push_back(input);
            if physics::process_inputs(&mut player.kin, now) {
                physics::finish_push(&mut player.kin, now);
            }
            physics::integrate_position(&mut player.kin, dt, &obstacles);
            physics::integrate_velocity(&mut player.kin, dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{PlayerSnapshot, Vec3};

    fn snapshot_of(time: u64, entries: Vec<(u32, PlayerSnapshot)>) -> WorldSnapshot {
        WorldSnapshot {
            time,
            players: entries.into_iter().collect(),
        }
    }

    fn player_snapshot(position: Vec3, last_input: u64) -> PlayerSnapshot {
        PlayerSnapshot {
            position,
            velocity: Vec3::default(),
            angle: Quat::default().to_array(),
            last_input,
            ready: true,
            team: Team::Red,
            dead: false,
        }
    }

    fn forward_input(time: u64) -> Input {
        let mut input = Input::new(time);
        input.forwardmove = -1;
        input
    }

    #[test]
    fn test_snapshot_creates_remote_players() {
        let mut world = ClientWorld::new();
        let snap = snapshot_of(
            100,
            vec![(7, player_snapshot(Vec3::new(1.0, 0.0, 2.0), 0))],
        );
        world.apply_snapshot(snap, None);

        let player = &world.players[&7];
        assert_eq!(player.team, Team::Red);
        // A brand new player starts exactly at the authoritative position.
        assert_eq!(player.kin.position, Vec3::new(1.0, 0.0, 2.0));
    }

    #[test]
    fn test_remote_positions_lerp_toward_snapshot() {
        let mut world = ClientWorld::new();
        world.add_player(7, Team::Red);

        let snap = snapshot_of(100, vec![(7, player_snapshot(Vec3::new(1.0, 0.0, 0.0), 0))]);
        world.apply_snapshot(snap, None);

        let player = &world.players[&7];
        assert_approx_eq!(player.kin.position.x, 0.4, 1e-6);
    }

    #[test]
    fn test_remote_positions_snap_on_large_gap() {
        let mut world = ClientWorld::new();
        world.add_player(7, Team::Red);

        let far = Vec3::new(20.0, 0.0, 20.0);
        let snap = snapshot_of(100, vec![(7, player_snapshot(far, 0))]);
        world.apply_snapshot(snap, None);

        assert_eq!(world.players[&7].kin.position, far);
    }

    #[test]
    fn test_prediction_moves_local_player() {
        let mut world = ClientWorld::new();
        world.add_player(1, Team::Red);
        world.players.get_mut(&1).unwrap().kin.on_floor = true;

        world.record_input(1, forward_input(100));
        world.predict(1, 100, 1.0 / 60.0);

        assert!(world.players[&1].kin.position.z < 0.0);
        assert_eq!(world.self_inputs.len(), 1);
    }

    #[test]
    fn test_replay_reproduces_server_trajectory() {
        // Server side: a fresh player consumes three inputs tick by tick.
        let mut server_kin = Kinematics::default();
        server_kin.on_floor = true;
        let times = [1000u64, 1016, 1032];
        let mut prev = 984u64;
        for &t in &times {
            server_kin.inputs.push_back(forward_input(t));
            let dt = (t - prev) as f32 / 1000.0;
            prev = t;
            if physics::process_inputs(&mut server_kin, t) {
                physics::finish_push(&mut server_kin, t);
            }
            physics::integrate_position(&mut server_kin, dt, &[]);
            physics::integrate_velocity(&mut server_kin, dt);
        }

        // Client side: the server acked nothing past input 984, so all three
        // inputs replay from the authoritative base.
        let mut world = ClientWorld::new();
        world.add_player(1, Team::Red);
        world.players.get_mut(&1).unwrap().kin.on_floor = true;
        world.record_input(1, Input::new(984));
        for &t in &times {
            world.record_input(1, forward_input(t));
        }

        let mut base = player_snapshot(Vec3::default(), 984);
        base.velocity = Vec3::default();
        let snap = snapshot_of(1040, vec![(1, base)]);
        world.apply_snapshot(snap, Some(1));

        let replayed = &world.players[&1].kin;
        assert_eq!(replayed.position, server_kin.position);
        assert_eq!(replayed.velocity, server_kin.velocity);
    }

    #[test]
    fn test_reconcile_skips_when_everything_acked() {
        let mut world = ClientWorld::new();
        world.add_player(1, Team::Red);
        world.record_input(1, forward_input(100));
        world.record_input(1, forward_input(116));

        // Move the predicted player somewhere the snapshot disagrees with.
        world.players.get_mut(&1).unwrap().kin.position = Vec3::new(3.0, 0.0, -3.0);

        // Ack covers every buffered input: no replay, no snap-back.
        let snap = snapshot_of(200, vec![(1, player_snapshot(Vec3::default(), 116))]);
        world.apply_snapshot(snap, Some(1));

        assert_eq!(world.players[&1].kin.position, Vec3::new(3.0, 0.0, -3.0));
    }

    #[test]
    fn test_dead_local_player_tracks_server() {
        let mut world = ClientWorld::new();
        world.add_player(1, Team::Red);
        world.record_input(1, forward_input(100));
        world.record_input(1, forward_input(116));

        let mut ps = player_snapshot(Vec3::new(5.0, 0.0, 5.0), 100);
        ps.dead = true;
        let snap = snapshot_of(200, vec![(1, ps)]);
        world.apply_snapshot(snap, Some(1));

        let player = &world.players[&1];
        assert!(player.dead);
        assert_eq!(player.kin.position, Vec3::new(5.0, 0.0, 5.0));
        assert!(player.kin.inputs.is_empty());
    }

    #[test]
    fn test_input_ring_is_bounded() {
        let mut world = ClientWorld::new();
        world.add_player(1, Team::Red);
        for t in 0..(INPUT_BUFFER_SIZE as u64 + 50) {
            world.record_input(1, Input::new(t));
        }
        assert_eq!(world.self_inputs.len(), INPUT_BUFFER_SIZE);
        assert_eq!(world.self_inputs[0].time, 50);
    }

    #[test]
    fn test_snapshot_ring_is_bounded() {
        let mut world = ClientWorld::new();
        for t in 0..(SNAPSHOT_BUFFER_SIZE as u64 + 5) {
            world.apply_snapshot(snapshot_of(t, vec![]), None);
        }
        assert_eq!(world.snapshots.len(), SNAPSHOT_BUFFER_SIZE);
        assert_eq!(world.snapshots[0].time, 5);
    }

    #[test]
    fn test_dead_remote_excluded_from_prediction_obstacles() {
        let mut world = ClientWorld::new();
        world.add_player(1, Team::Red);
        world.add_player(2, Team::Blue);
        {
            let remote = world.players.get_mut(&2).unwrap();
            remote.dead = true;
            remote.kin.position = Vec3::new(0.0, 0.0, -2.0);
        }
        let me = world.players.get_mut(&1).unwrap();
        me.kin.on_floor = true;

        // Walk straight through where the dead player stands.
        for step in 0..120u64 {
            let t = 1000 + step * 16;
            world.record_input(1, forward_input(t));
            world.predict(1, t, 16.0 / 1000.0);
        }
        assert!(world.players[&1].kin.position.z < -2.0);
    }
}
