//! Shadow-connection tracking
//!
//! Linux forgets an LE connection created through a raw HCI socket unless an
//! L2CAP socket to the same peer is open. This module opens, refreshes and
//! closes such companion sockets as connection-lifecycle packets pass through
//! the HCI socket.

pub mod manager;
pub mod socket;


pub use self::manager::{Direction, Disposition, ShadowInfo, ShadowManager, ShadowState};
pub use self::socket::{
    KernelL2cap, L2capConnector, L2capEndpoint, L2capLink, ShadowSocket, ATT_CID,
};
