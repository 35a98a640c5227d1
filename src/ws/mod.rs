//! WebSocket endpoints and wire protocol

pub mod handler;
pub mod lobby;
pub mod protocol;
