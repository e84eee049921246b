//! Wire protocol shared by the server and client.
//!
//! Every message travels as one bincode-serialized [`Packet`]. Delivery is
//! fire-and-forget: the only acknowledgement is the `last_input` timestamp a
//! snapshot echoes back for each player.

use crate::input::Input;
use crate::math::{Cell, Vec3};
use crate::player::Team;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Serializable per-player fields of one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Orientation as 4 floats; quaternions do not survive the wire format.
    pub angle: [f32; 4],
    /// Timestamp of the last input the server consumed for this player.
    pub last_input: u64,
    /// Push cooldown elapsed (the player can shove again).
    pub ready: bool,
    pub team: Team,
    pub dead: bool,
}

/// A point-in-time copy of every player's authoritative state.
///
/// Built fresh each broadcast tick; the server keeps no history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub time: u64,
    pub players: HashMap<u32, PlayerSnapshot>,
}

/// Respawn-point grid coordinates per team, recomputed each generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamRespawns {
    pub red: Vec<Cell>,
    pub blue: Vec<Cell>,
}

impl TeamRespawns {
    pub fn of(&self, team: Team) -> &Vec<Cell> {
        match team {
            Team::Red => &self.red,
            Team::Blue => &self.blue,
        }
    }

    pub fn of_mut(&mut self, team: Team) -> &mut Vec<Cell> {
        match team {
            Team::Red => &mut self.red,
            Team::Blue => &mut self.blue,
        }
    }
}

/// A player's match-start vote as broadcast in `ReadyUpdate`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReadyEntry {
    pub readied: bool,
    pub team: Team,
}

/// How a finished match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchResult {
    /// Nobody left alive.
    Draw,
    RedWins,
    BlueWins,
}

impl MatchResult {
    /// The wire result code: 0 draw, 1 red, 2 blue.
    pub fn code(self) -> u8 {
        match self {
            MatchResult::Draw => 0,
            MatchResult::RedWins => 1,
            MatchResult::BlueWins => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Packet {
    // client -> server
    Connect {
        client_version: u32,
    },
    Input(Input),
    ReadyUp(bool),
    Disconnect,

    // server -> client
    Connected {
        id: u32,
    },
    PlayerConnected {
        id: u32,
        team: Team,
    },
    PlayerDisconnected {
        id: u32,
    },
    Snapshot(WorldSnapshot),
    Generation {
        respawns: TeamRespawns,
    },
    ReadyUpdate(HashMap<u32, ReadyEntry>),
    GameStart {
        time: u64,
    },
    GameEnd {
        result: MatchResult,
    },
    Rejected {
        reason: String,
    },
}
