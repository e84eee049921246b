//! Game client: prediction, reconciliation, rendering.
//!
//! The client applies its own inputs immediately through the shared physics
//! core instead of waiting for the server, then snaps back and replays the
//! unacknowledged tail of its input buffer whenever an authoritative snapshot
//! disagrees. Remote players never predict; they smooth toward snapshots.
//!
//! Module layout:
//! - [`game`]: predicted world, snapshot ingestion, replay reconciliation
//! - [`input`]: keyboard/mouse sampling into immutable input frames
//! - [`network`]: UDP loop, packet dispatch, the frame/tick schedule
//! - [`rendering`]: 3D scene and HUD

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
