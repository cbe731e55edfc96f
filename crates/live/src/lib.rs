//! Client for the Gemini Live bidirectional voice API.

pub mod audio;
pub mod client;
pub mod types;

pub use client::{ClientTx, LiveClient, LiveError, ServerRx};
pub use types::{ClientEvent, ServerMessage};
