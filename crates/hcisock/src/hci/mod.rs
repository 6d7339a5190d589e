//! Bluetooth HCI (Host Controller Interface) implementation
//!
//! This module provides functionality for interacting with HCI interfaces.

pub mod constants;
pub mod device;
pub mod packet;
pub mod socket;


pub use device::{DeviceEntry, DeviceFlags, DeviceInfo};
pub use packet::{classify, ConnectionParameters, HciPacketKind};
pub use socket::{BindMode, HciSocket, SocketEvent};
