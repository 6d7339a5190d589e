//! HCI protocol constants
//!
//! This module contains constants used in the Bluetooth HCI protocol and the
//! Linux HCI socket interface.

// HCI packet types
pub const HCI_COMMAND_PKT: u8 = 0x01;
pub const HCI_ACL_PKT: u8 = 0x02;
pub const HCI_EVENT_PKT: u8 = 0x04;

// LE Controller OGF (Opcode Group Field)
pub const OGF_LE: u8 = 0x08;

// LE Command OCF values (OGF: 0x08)
pub const OCF_LE_CREATE_CONNECTION: u16 = 0x000D;
pub const OCF_LE_CREATE_CONNECTION_CANCEL: u16 = 0x000E;
pub const OCF_LE_EXTENDED_CREATE_CONNECTION: u16 = 0x0043;

// HCI Events
pub const EVT_DISCONN_COMPLETE: u8 = 0x05;
pub const EVT_CMD_COMPLETE: u8 = 0x0E;
pub const EVT_LE_META_EVENT: u8 = 0x3E;

// LE Meta Events
pub const EVT_LE_CONN_COMPLETE: u8 = 0x01;
pub const EVT_LE_ENHANCED_CONN_COMPLETE: u8 = 0x0A;

// Status
pub const HCI_SUCCESS: u8 = 0x00;

// Largest packet read from the socket in one go
pub const HCI_MAX_FRAME_SIZE: usize = 1024;

// Socket families and protocols
pub const BTPROTO_L2CAP: i32 = 0;
pub const BTPROTO_HCI: i32 = 1;

// HCI socket channels
pub const HCI_CHANNEL_RAW: u16 = 0;
pub const HCI_CHANNEL_USER: u16 = 1;
pub const HCI_CHANNEL_CONTROL: u16 = 3;

pub const HCI_DEV_NONE: u16 = 0xffff;
pub const HCI_MAX_DEV: usize = 16;

// Socket options
pub const SOL_HCI: i32 = 0;
pub const HCI_FILTER: i32 = 2;

// ioctls: _IOR('H', 210, int) and _IOR('H', 211, int)
pub const HCIGETDEVLIST: u64 = 0x8004_48D2;
pub const HCIGETDEVINFO: u64 = 0x8004_48D3;

// hci_dev_info.flags bit positions
pub const HCI_UP: u32 = 0;
pub const HCI_INIT: u32 = 1;
pub const HCI_RUNNING: u32 = 2;
pub const HCI_PSCAN: u32 = 3;
pub const HCI_ISCAN: u32 = 4;
pub const HCI_AUTH: u32 = 5;
pub const HCI_ENCRYPT: u32 = 6;
pub const HCI_INQUIRY: u32 = 7;
pub const HCI_RAW: u32 = 8;

/// Builds a command opcode from its group and command fields
pub const fn opcode(ogf: u8, ocf: u16) -> u16 {
    ((ogf as u16) << 10) | (ocf & 0x3ff)
}
