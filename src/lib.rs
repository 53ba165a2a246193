//! Direwolf display server library.
//!
//! In-memory distribution of radio telemetry: APRS packets and RSSI
//! samples are ingested over HTTP, retained in bounded histories, and
//! fanned out to any number of SSE subscribers with history replay.

pub mod actions;
pub mod config;
pub mod hub;
pub mod models;
pub mod passcode;
pub mod session;
pub mod store;
pub mod web;

pub use config::Settings;
pub use hub::BroadcastHub;
pub use models::{MessageKind, PacketEvent, RssiSample, StreamMessage};
pub use session::StreamSession;
pub use store::RetentionStore;
