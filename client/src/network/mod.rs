//! Network
//!
//! Live push channel to the messaging backend.

pub mod websocket;

pub use websocket::{ConnectionStatus, PushChannel};
