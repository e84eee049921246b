//! Server-side connection bookkeeping.
//!
//! Tracks which address belongs to which player id, the match-start votes,
//! and connection liveness. Simulation state lives in [`crate::game::World`];
//! this module never touches it.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// One connected client.
#[derive(Debug)]
pub struct Connection {
    pub id: u32,
    pub addr: SocketAddr,
    /// Last time any packet arrived from this address.
    pub last_seen: Instant,
    /// Match-start vote, distinct from the snapshot's push-cooldown `ready`.
    pub readied: bool,
}

impl Connection {
    pub fn new(id: u32, addr: SocketAddr) -> Connection {
        Connection {
            id,
            addr,
            last_seen: Instant::now(),
            readied: false,
        }
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// All active connections, capped at a configured capacity.
pub struct ClientManager {
    clients: HashMap<u32, Connection>,
    next_client_id: u32,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> ClientManager {
        ClientManager {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a new connection, or `None` at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Connection::new(client_id, addr));
        Some(client_id)
    }

    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Refreshes the liveness timestamp for a client.
    pub fn touch(&mut self, client_id: u32) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_seen = Instant::now();
        }
    }

    /// Records a match-start vote. Returns false for unknown ids.
    pub fn set_readied(&mut self, client_id: u32, readied: bool) -> bool {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.readied = readied;
            true
        } else {
            false
        }
    }

    pub fn readied(&self, client_id: u32) -> bool {
        self.clients
            .get(&client_id)
            .map(|c| c.readied)
            .unwrap_or(false)
    }

    /// True once every connected client voted ready, with a two-player floor
    /// so a lone joiner cannot start a match against nobody.
    pub fn all_readied(&self) -> bool {
        self.clients.len() >= 2 && self.clients.values().all(|c| c.readied)
    }

    /// Removes and returns clients that went silent past the timeout.
    pub fn check_timeouts(&mut self) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(CLIENT_TIMEOUT))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }
        timed_out
    }

    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.clients.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
