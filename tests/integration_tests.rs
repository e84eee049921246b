//! Integration tests across the shared physics core, the authoritative
//! server, and the client's replay logic.

use bincode::{deserialize, serialize};
use shared::math::cell_to_world;
use shared::physics;
use shared::{Input, Kinematics, Packet, Team, Vec3, WORLD_SIZE, XZ_VELOCITY_CLAMP};
use std::net::UdpSocket;
use std::thread;
use std::time::Duration;
use tokio::time::sleep;

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;
    use shared::{MatchResult, PlayerSnapshot, Quat, TeamRespawns, WorldSnapshot};
    use std::collections::HashMap;

    /// Tests packet serialization round-trip for network protocol validation
    #[tokio::test]
    async fn packet_serialization_roundtrip() {
        let mut input = Input::new(123456789);
        input.forwardmove = -1;
        input.attack = true;

        let test_packets = vec![
            Packet::Connect { client_version: 1 },
            Packet::Input(input),
            Packet::ReadyUp(true),
            Packet::Connected { id: 42 },
            Packet::PlayerConnected {
                id: 7,
                team: Team::Blue,
            },
            Packet::PlayerDisconnected { id: 7 },
            Packet::Generation {
                respawns: TeamRespawns {
                    red: vec![[1, 0, 1]],
                    blue: vec![],
                },
            },
            Packet::GameStart { time: 999 },
            Packet::GameEnd {
                result: MatchResult::BlueWins,
            },
            Packet::Rejected {
                reason: "Test".to_string(),
            },
        ];

        for packet in test_packets {
            let serialized = serialize(&packet).unwrap();
            let deserialized: Packet = deserialize(&serialized).unwrap();

            match (&packet, &deserialized) {
                (Packet::Connect { .. }, Packet::Connect { .. }) => {}
                (Packet::Input(a), Packet::Input(b)) => {
                    assert_eq!(a.time, b.time);
                    assert_eq!(a.forwardmove, b.forwardmove);
                    assert_eq!(a.attack, b.attack);
                }
                (Packet::ReadyUp(a), Packet::ReadyUp(b)) => assert_eq!(a, b),
                (Packet::Connected { .. }, Packet::Connected { .. }) => {}
                (Packet::PlayerConnected { .. }, Packet::PlayerConnected { .. }) => {}
                (Packet::PlayerDisconnected { .. }, Packet::PlayerDisconnected { .. }) => {}
                (Packet::Generation { .. }, Packet::Generation { .. }) => {}
                (Packet::GameStart { .. }, Packet::GameStart { .. }) => {}
                (Packet::GameEnd { .. }, Packet::GameEnd { .. }) => {}
                (Packet::Rejected { .. }, Packet::Rejected { .. }) => {}
                _ => panic!("Packet type mismatch after serialization"),
            }
        }
    }

    /// A snapshot survives the wire without losing kinematic precision
    #[test]
    fn snapshot_roundtrip_preserves_rounded_state() {
        let mut players = HashMap::new();
        for id in 0..16u32 {
            players.insert(
                id,
                PlayerSnapshot {
                    position: Vec3::new(id as f32 * 1.125, 0.25, -3.375),
                    velocity: Vec3::new(0.001, -0.002, 0.003),
                    angle: Quat::from_yaw_pitch(0.3 * id as f32, 0.1).to_array(),
                    last_input: 1000 + id as u64,
                    ready: id % 2 == 0,
                    team: if id % 2 == 0 { Team::Red } else { Team::Blue },
                    dead: id % 5 == 0,
                },
            );
        }
        let snapshot = WorldSnapshot {
            time: 123456789,
            players,
        };

        let bytes = serialize(&Packet::Snapshot(snapshot.clone())).unwrap();
        let packet: Packet = deserialize(&bytes).unwrap();

        match packet {
            Packet::Snapshot(decoded) => {
                assert_eq!(decoded.time, snapshot.time);
                assert_eq!(decoded.players.len(), snapshot.players.len());
                for (id, original) in &snapshot.players {
                    let player = &decoded.players[id];
                    // Rounded-to-milli components are exactly representable,
                    // so equality is exact.
                    assert_eq!(player.position, original.position);
                    assert_eq!(player.velocity, original.velocity);
                    assert_eq!(player.angle, original.angle);
                    assert_eq!(player.last_input, original.last_input);
                }
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    /// Tests real UDP socket communication
    #[tokio::test]
    async fn udp_socket_communication() {
        let server_socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind server socket");
        let server_addr = server_socket.local_addr().unwrap();

        // Echo server
        let server_socket_clone = server_socket.try_clone().unwrap();
        thread::spawn(move || {
            let mut buf = [0; 4096];
            if let Ok((size, client_addr)) = server_socket_clone.recv_from(&mut buf) {
                let _ = server_socket_clone.send_to(&buf[..size], client_addr);
            }
        });

        sleep(Duration::from_millis(10)).await;

        let client_socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind client socket");
        client_socket
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();

        let test_packet = Packet::Connect { client_version: 1 };
        let serialized = serialize(&test_packet).unwrap();

        client_socket.send_to(&serialized, server_addr).unwrap();

        let mut buf = [0; 4096];
        let (size, _) = client_socket.recv_from(&mut buf).unwrap();
        let received_packet: Packet = deserialize(&buf[..size]).unwrap();

        match received_packet {
            Packet::Connect { client_version } => assert_eq!(client_version, 1),
            _ => panic!("Wrong packet type received"),
        }
    }
}

/// PHYSICS DETERMINISM TESTS
mod determinism_tests {
    use super::*;
    use server::game::World;

    fn scripted_inputs(start: u64, count: u64) -> Vec<Input> {
        (0..count)
            .map(|i| {
                let mut input = Input::new(start + i * 16);
                input.forwardmove = if i % 7 == 0 { 0 } else { -1 };
                input.sidemove = if i % 3 == 0 { 1 } else { 0 };
                input.upmove = i % 13 == 0;
                input
            })
            .collect()
    }

    /// The server's trajectory for a player is exactly reproduced by feeding
    /// the same inputs with the same deltas through the shared core, which is
    /// what the client's reconciliation replay does.
    #[test]
    fn replay_matches_server_trajectory() {
        let inputs = scripted_inputs(1000, 60);

        // Server path.
        let mut world = World::new();
        world.add_player(1);
        {
            let player = world.players.get_mut(&1).unwrap();
            player.kin = Kinematics::default();
            player.kin.on_floor = true;
        }
        for input in &inputs {
            world.enqueue_input(1, input.clone());
            world.step(16.0 / 1000.0, input.time);
        }
        let server_kin = &world.players[&1].kin;

        // Replay path over the bare physics core.
        let mut kin = Kinematics::default();
        kin.on_floor = true;
        for input in &inputs {
            kin.inputs.push_back(input.clone());
            if physics::process_inputs(&mut kin, input.time) {
                physics::finish_push(&mut kin, input.time);
            }
            physics::integrate_position(&mut kin, 16.0 / 1000.0, &[]);
            physics::integrate_velocity(&mut kin, 16.0 / 1000.0);
        }

        assert_eq!(kin.position, server_kin.position);
        assert_eq!(kin.velocity, server_kin.velocity);
    }

    /// Rest invariant: no inputs, no velocity, no movement, forever.
    #[test]
    fn resting_player_never_drifts() {
        let mut kin = Kinematics::default();
        kin.on_floor = true;

        for tick in 0..600u64 {
            if physics::process_inputs(&mut kin, tick * 16) {
                physics::finish_push(&mut kin, tick * 16);
            }
            physics::integrate_position(&mut kin, 16.0 / 1000.0, &[]);
            physics::integrate_velocity(&mut kin, 16.0 / 1000.0);
        }

        assert_eq!(kin.position, Vec3::default());
        assert_eq!(kin.velocity, Vec3::default());
    }

    /// Rounding invariant: every component is a multiple of 0.001 after any
    /// integration step.
    #[test]
    fn state_components_stay_on_milli_lattice() {
        let mut kin = Kinematics::default();
        kin.on_floor = true;

        // One f32 ulp at |position|*1000 can approach 0.002, so the lattice
        // check needs a tolerance above that.
        let is_milli = |n: f32| {
            let scaled = n * 1000.0;
            (scaled - scaled.round()).abs() < 5e-3
        };

        for (i, input) in scripted_inputs(0, 120).into_iter().enumerate() {
            let now = input.time;
            kin.inputs.push_back(input);
            if physics::process_inputs(&mut kin, now) {
                physics::finish_push(&mut kin, now);
            }
            // An awkward dt that produces non-terminating intermediate values.
            let dt = 0.0171;
            physics::integrate_position(&mut kin, dt, &[]);
            physics::integrate_velocity(&mut kin, dt);

            for v in [kin.position, kin.velocity] {
                assert!(
                    is_milli(v.x) && is_milli(v.y) && is_milli(v.z),
                    "off-lattice component at step {}: {:?}",
                    i,
                    v
                );
            }
        }
    }

    /// Speed clamp holds under arbitrary input streams.
    #[test]
    fn horizontal_speed_never_exceeds_clamp() {
        let mut kin = Kinematics::default();
        kin.on_floor = true;

        for input in scripted_inputs(0, 300) {
            let now = input.time;
            kin.inputs.push_back(input);
            if physics::process_inputs(&mut kin, now) {
                physics::finish_push(&mut kin, now);
            }
            physics::integrate_position(&mut kin, 16.0 / 1000.0, &[]);
            physics::integrate_velocity(&mut kin, 16.0 / 1000.0);

            assert!(kin.velocity.x.abs() <= XZ_VELOCITY_CLAMP + 1e-4);
            assert!(kin.velocity.z.abs() <= XZ_VELOCITY_CLAMP + 1e-4);
        }
    }

    /// A player pressed against the arena edge stays inside it.
    #[test]
    fn walls_contain_every_trajectory() {
        let mut world = World::new();
        world.add_player(1);
        {
            let player = world.players.get_mut(&1).unwrap();
            player.kin = Kinematics::at(Vec3::new(0.0, 0.0, -30.0));
            player.kin.on_floor = true;
        }

        // Hold forward (into the -z wall) for five seconds.
        for tick in 0..300u64 {
            let mut input = Input::new(tick * 16);
            input.forwardmove = -1;
            world.enqueue_input(1, input);
            world.step(16.0 / 1000.0, tick * 16);

            let pos = world.players[&1].kin.position;
            assert!(pos.z >= -(WORLD_SIZE - shared::PLAYER_SIZE) - 1e-4);
            assert!(pos.x.abs() <= WORLD_SIZE - shared::PLAYER_SIZE + 1e-4);
            assert!(pos.y >= 0.0);
        }
    }
}

/// LIFE ENGINE TESTS
mod life_tests {
    use super::*;
    use server::game::World;
    use server::life::run_generation;
    use shared::math::Cell;

    fn place(world: &mut World, id: u32, team: Team, cell: Cell) {
        world.add_player(id);
        let player = world.players.get_mut(&id).unwrap();
        player.team = team;
        player.kin.position = cell_to_world(cell);
    }

    /// A lone player dies of underpopulation.
    #[test]
    fn lone_player_dies() {
        let mut world = World::new();
        place(&mut world, 1, Team::Red, [8, 0, 8]);
        let outcome = run_generation(&mut world);
        assert_eq!(outcome.died, vec![1]);
    }

    /// Two or three same-team neighbors and no enemies mean survival.
    #[test]
    fn supported_player_survives() {
        let mut world = World::new();
        place(&mut world, 1, Team::Red, [8, 0, 8]);
        place(&mut world, 2, Team::Red, [7, 0, 8]);
        place(&mut world, 3, Team::Red, [9, 0, 8]);
        let outcome = run_generation(&mut world);
        assert!(!outcome.died.contains(&1));
    }

    /// Exactly three same-team neighbors and no enemies birth a respawn point.
    #[test]
    fn triomino_births_respawn_point() {
        let mut world = World::new();
        place(&mut world, 1, Team::Red, [7, 0, 8]);
        place(&mut world, 2, Team::Red, [9, 0, 8]);
        place(&mut world, 3, Team::Red, [8, 0, 7]);
        let outcome = run_generation(&mut world);
        assert!(outcome.respawns.red.contains(&[8, 0, 8]));
    }

    /// Generations only mutate aliveness and positions; ids and teams are
    /// stable across the whole match.
    #[test]
    fn generations_preserve_roster() {
        let mut world = World::new();
        for id in 0..10 {
            world.add_player(id);
        }
        let teams: Vec<Team> = (0..10).map(|id| world.players[&id].team).collect();

        for _ in 0..5 {
            run_generation(&mut world);
        }

        assert_eq!(world.players.len(), 10);
        for id in 0..10u32 {
            assert_eq!(world.players[&id].team, teams[id as usize]);
        }
    }
}
