pub mod player;
pub mod protocol;
pub mod room;

/// Protocol version exchanged during the handshake.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
