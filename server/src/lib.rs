//! Authoritative game server.
//!
//! Owns the canonical [`game::World`], consumes client inputs in timestamp
//! order, steps the shared physics core at a fixed tick rate, and broadcasts
//! state snapshots over UDP. A slower independent timer drives the two-team
//! life automaton in [`life`], which is what actually decides who stays in
//! the match.
//!
//! The event loop is single-writer: only the main task in [`network`]
//! mutates the world, so a broadcast can never observe a half-applied tick.

pub mod client_manager;
pub mod game;
pub mod life;
pub mod network;
