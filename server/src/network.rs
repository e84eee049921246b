//! UDP server loop: packet handling, tick scheduling, broadcasting.

use crate::client_manager::ClientManager;
use crate::game::World;
use crate::life;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{timestamp_ms, Packet, ReadyEntry, TICK_RATE};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Messages sent from network tasks to the main server loop.
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: u32,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the main loop to the network sender task.
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
    },
}

/// Main server coordinating networking and the authoritative simulation.
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    world: World,
    generation_period: Duration,

    /// All votes are in and the match is running.
    started: bool,
    /// A `GameEnd` went out; the generation timer is disarmed.
    match_over: bool,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        max_clients: usize,
        generation_period: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            world: World::new(),
            generation_period,
            started: false,
            match_over: false,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    /// Spawns the task that continuously listens for incoming packets.
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 4096];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task that drains the outgoing packet queue.
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns the task that monitors client timeouts.
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet) {
        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket { packet }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// The match-start vote table sent with every `ReadyUpdate`.
    async fn ready_entries(&self) -> HashMap<u32, ReadyEntry> {
        let clients = self.clients.read().await;
        clients
            .ids()
            .into_iter()
            .filter_map(|id| {
                self.world.players.get(&id).map(|p| {
                    (
                        id,
                        ReadyEntry {
                            readied: clients.readied(id),
                            team: p.team,
                        },
                    )
                })
            })
            .collect()
    }

    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if self.started || self.match_over {
                    self.send_packet(
                        Packet::Rejected {
                            reason: "Match already started".to_string(),
                        },
                        addr,
                    );
                    return;
                }

                // A reconnect from the same address supersedes the old entry.
                let existing_client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };
                if let Some(existing_id) = existing_client_id {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    let mut clients = self.clients.write().await;
                    clients.remove_client(&existing_id);
                    self.world.remove_player(&existing_id);
                    self.broadcast_packet(Packet::PlayerDisconnected { id: existing_id });
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr)
                };

                if let Some(id) = client_id {
                    let team = self.world.add_player(id);
                    self.send_packet(Packet::Connected { id }, addr);
                    self.broadcast_packet(Packet::PlayerConnected { id, team });
                } else {
                    self.send_packet(
                        Packet::Rejected {
                            reason: "Server full".to_string(),
                        },
                        addr,
                    );
                }
            }

            Packet::Input(input) => {
                let client_id = {
                    let mut clients = self.clients.write().await;
                    let id = clients.find_client_by_addr(addr);
                    if let Some(id) = id {
                        clients.touch(id);
                    }
                    id
                };

                if let Some(id) = client_id {
                    self.world.enqueue_input(id, input);
                }
            }

            Packet::ReadyUp(readied) => {
                let client_id = {
                    let mut clients = self.clients.write().await;
                    let id = clients.find_client_by_addr(addr);
                    if let Some(id) = id {
                        clients.touch(id);
                        clients.set_readied(id, readied);
                    }
                    id
                };

                if client_id.is_none() {
                    return;
                }

                let entries = self.ready_entries().await;
                self.broadcast_packet(Packet::ReadyUpdate(entries));

                let all_readied = {
                    let clients = self.clients.read().await;
                    clients.all_readied()
                };
                if all_readied && !self.started {
                    self.started = true;
                    let time = timestamp_ms();
                    info!("All players ready, match starting at {}", time);
                    self.broadcast_packet(Packet::GameStart { time });
                }
            }

            Packet::Disconnect => {
                let client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };

                if let Some(id) = client_id {
                    let mut clients = self.clients.write().await;
                    clients.remove_client(&id);
                    self.world.remove_player(&id);
                    self.broadcast_packet(Packet::PlayerDisconnected { id });
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Runs one automaton generation and emits the results.
    fn run_generation(&mut self) {
        let outcome = life::run_generation(&mut self.world);
        self.broadcast_packet(Packet::Generation {
            respawns: outcome.respawns,
        });

        if let Some(result) = self.world.match_result() {
            info!("Match over: {:?}", result);
            self.broadcast_packet(Packet::GameEnd { result });
            self.match_over = true;
        }
    }

    /// Main server loop coordinating all operations.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let tick_duration = Duration::from_secs_f64(1.0 / TICK_RATE as f64);
        let mut physics_interval = interval(tick_duration);
        let mut broadcast_interval = interval(tick_duration);
        let mut generation_interval = interval(self.generation_period);
        let mut last_tick = Instant::now();
        let mut tick_count: u64 = 0;
        // Set exactly once when the match starts; re-votes must not re-arm.
        let mut armed = false;

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                            if self.started && !armed {
                                armed = true;
                                generation_interval.reset();
                            }
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            self.world.remove_player(&client_id);
                            self.broadcast_packet(Packet::PlayerDisconnected { id: client_id });
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = physics_interval.tick() => {
                    let now = Instant::now();
                    // Measured, not assumed: interval jitter must not skew
                    // the integration.
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    self.world.step(dt, timestamp_ms());
                    tick_count += 1;

                    if tick_count % (TICK_RATE as u64 * 10) == 0 {
                        let client_count = {
                            let clients = self.clients.read().await;
                            clients.len()
                        };
                        if client_count > 0 {
                            debug!("Tick {}: {} clients, {:.1}Hz",
                                   tick_count, client_count, 1.0 / dt);
                        }
                    }
                },

                _ = broadcast_interval.tick() => {
                    let client_count = {
                        let clients = self.clients.read().await;
                        clients.len()
                    };
                    if client_count > 0 {
                        let snapshot = self.world.snapshot(timestamp_ms());
                        self.broadcast_packet(Packet::Snapshot(snapshot));
                    }
                },

                _ = generation_interval.tick(), if armed && !self.match_over => {
                    self.run_generation();
                },
            }
        }

        Ok(())
    }
}
