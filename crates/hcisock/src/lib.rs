//! hcisock - Raw Bluetooth HCI sockets for Linux
//!
//! This library provides access to a controller through a Linux HCI socket
//! (raw, user or control channel). On the raw channel it compensates for a
//! kernel quirk: an LE connection made through a raw HCI socket is dropped
//! by the kernel unless an L2CAP socket to the same peer is open, so the
//! socket tracks connection-lifecycle packets and keeps companion "shadow"
//! L2CAP sockets open for as long as each connection lives.

pub mod config;
pub mod conn_params;
pub mod error;
pub mod gap;
pub mod hci;
pub mod shadow;

// Re-export common types for convenience
pub use config::Config;
pub use conn_params::ConnectionParameterOverride;
pub use error::{ConfigError, HciError};
pub use gap::{AddressType, BdAddr};
pub use hci::{BindMode, ConnectionParameters, HciPacketKind, HciSocket, SocketEvent};
pub use shadow::{Direction, Disposition, ShadowManager, ShadowState};
