//! Client-facing side of the console: the JSON envelope protocol and the gateway that
//! routes envelopes to sessions.

pub mod gateway;
pub mod protocol;

pub use gateway::{ClientConnection, Gateway};
pub use protocol::{ClientMessage, ServerMessage};
