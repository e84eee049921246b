//! Client networking and the main frame/tick loop.

use crate::game::{ClientWorld, MatchPhase};
use crate::input::InputManager;
use crate::rendering::{HudInfo, Renderer};
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use macroquad::window::next_frame;
use shared::{timestamp_ms, Packet, ReadyEntry, TICK_RATE};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::interval;

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    self_id: Option<u32>,
    connected: bool,
    /// Our own match-start vote.
    readied: bool,

    world: ClientWorld,
    input_manager: InputManager,
    renderer: Renderer,

    ping_ms: u64,
    phase: MatchPhase,
    votes: HashMap<u32, ReadyEntry>,
}

impl Client {
    pub async fn new(server_addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            self_id: None,
            connected: false,
            readied: false,
            world: ClientWorld::new(),
            input_manager: InputManager::new(),
            renderer: Renderer::new(),
            ping_ms: 0,
            phase: MatchPhase::Lobby,
            votes: HashMap::new(),
        })
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to {}...", self.server_addr);
        self.send_packet(&Packet::Connect { client_version: 1 })
            .await
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected { id } => {
                info!("Connected with id {}", id);
                self.self_id = Some(id);
                self.connected = true;
            }

            Packet::PlayerConnected { id, team } => {
                info!("Player {} joined team {:?}", id, team);
                self.world.add_player(id, team);
            }

            Packet::PlayerDisconnected { id } => {
                info!("Player {} left", id);
                self.world.remove_player(&id);
                self.votes.remove(&id);
            }

            Packet::Snapshot(snapshot) => {
                self.ping_ms = timestamp_ms().saturating_sub(snapshot.time);
                self.world.apply_snapshot(snapshot, self.self_id);
            }

            Packet::Generation { respawns } => {
                info!(
                    "Generation: {} red / {} blue respawn points",
                    respawns.red.len(),
                    respawns.blue.len()
                );
                self.world.respawns = respawns;
            }

            Packet::ReadyUpdate(votes) => {
                self.votes = votes;
            }

            Packet::GameStart { time } => {
                info!("Match started at {}", time);
                self.phase = MatchPhase::Running;
            }

            Packet::GameEnd { result } => {
                info!("Match over: {:?}", result);
                self.phase = MatchPhase::Over(result);
            }

            Packet::Rejected { reason } => {
                error!("Server rejected us: {}", reason);
                self.connected = false;
                self.self_id = None;
            }

            _ => {
                warn!("Unexpected packet type from server");
            }
        }
    }

    /// Samples and ships one input frame, keeping a copy for prediction.
    async fn capture_input(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let self_id = match (self.connected, self.self_id) {
            (true, Some(id)) => id,
            _ => return Ok(()),
        };

        if self.input_manager.ready_toggled() && self.phase == MatchPhase::Lobby {
            self.readied = !self.readied;
            self.send_packet(&Packet::ReadyUp(self.readied)).await?;
        }

        let input = self.input_manager.sample();
        self.send_packet(&Packet::Input(input.clone())).await?;
        self.world.record_input(self_id, input);
        Ok(())
    }

    fn hud_info(&self) -> HudInfo {
        let push_ready = self
            .self_id
            .and_then(|id| self.world.players.get(&id))
            .map(|p| p.kin.ready(timestamp_ms()))
            .unwrap_or(true);

        HudInfo {
            ping_ms: self.ping_ms,
            connected: self.connected,
            push_ready,
            phase: self.phase,
            votes: self.votes.clone(),
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let tick = Duration::from_secs_f64(1.0 / TICK_RATE as f64);
        let mut input_interval = interval(tick);
        let mut physics_interval = interval(tick);

        let mut buffer = [0u8; 4096];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                                self.handle_packet(packet);
                            } else {
                                warn!("Failed to deserialize packet from server");
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = input_interval.tick() => {
                    if let Err(e) = self.capture_input().await {
                        error!("Error sending input: {}", e);
                    }
                },

                _ = physics_interval.tick() => {
                    if let Some(id) = self.self_id {
                        let dt = tick.as_secs_f32();
                        self.world.predict(id, timestamp_ms(), dt);
                    }

                    let hud = self.hud_info();
                    self.renderer.render(&self.world, self.self_id, &hud);
                    next_frame().await;
                },
            }
        }
    }
}
