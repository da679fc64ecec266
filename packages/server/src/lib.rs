//! Real-time room relay for collaborative code editing.
//!
//! Connections join a room over WebSocket; the relay keeps each connection's
//! presence (identity, color, cursor, selection), fans cursor, selection and
//! whole-file code changes out to the other connections in the room, and
//! persists room chat, replaying recent history to every joiner.

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

// Re-export entry points
pub use config::ServerConfig;
pub use error::ServerError;
pub use ui::run;
