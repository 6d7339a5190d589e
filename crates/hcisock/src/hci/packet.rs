//! HCI packet classification
//!
//! This module recognizes the handful of connection-lifecycle packets the
//! shadow-connection workaround reacts to. Recognition is by exact frame
//! length plus fixed-offset signature bytes; anything else is ordinary data.
//! All offsets are measured from the packet-type indicator at byte 0 and are
//! kept together in the layout tables below.

use crate::gap::BdAddr;
use crate::hci::constants::*;
use byteorder::{ByteOrder, LittleEndian};

const LE_CREATE_CONN_OPCODE: u16 = opcode(OGF_LE, OCF_LE_CREATE_CONNECTION);
const LE_EXT_CREATE_CONN_OPCODE: u16 = opcode(OGF_LE, OCF_LE_EXTENDED_CREATE_CONNECTION);

/// Exact length and required bytes of a recognized frame
#[derive(Debug, Clone, Copy)]
pub struct FrameSignature {
    pub len: usize,
    pub bytes: &'static [(usize, u8)],
}

impl FrameSignature {
    pub fn matches(&self, data: &[u8]) -> bool {
        data.len() == self.len
            && self
                .bytes
                .iter()
                .all(|&(offset, value)| data[offset] == value)
    }
}

/// Layout of the LE (Enhanced) Connection Complete events
#[derive(Debug, Clone, Copy)]
pub struct ConnectionCompleteLayout {
    pub frame: FrameSignature,
    pub handle: usize,
    pub peer_addr_type: usize,
    pub peer_addr: usize,
}

/// Layout of the Disconnection Complete event
#[derive(Debug, Clone, Copy)]
pub struct DisconnectionCompleteLayout {
    pub frame: FrameSignature,
    pub handle: usize,
}

/// Layout of the LE (Extended) Create Connection commands
#[derive(Debug, Clone, Copy)]
pub struct CreateConnectionLayout {
    pub frame: FrameSignature,
    pub peer_addr_type: usize,
    pub peer_addr: usize,
    /// First of four consecutive u16 fields: min/max interval, latency, timeout
    pub conn_params: usize,
}

/// LE Connection Complete, successful status only
pub const LE_CONNECTION_COMPLETE: ConnectionCompleteLayout = ConnectionCompleteLayout {
    frame: FrameSignature {
        len: 22,
        bytes: &[
            (0, HCI_EVENT_PKT),
            (1, EVT_LE_META_EVENT),
            (2, 0x13),
            (3, EVT_LE_CONN_COMPLETE),
            (4, HCI_SUCCESS),
        ],
    },
    handle: 5,
    peer_addr_type: 8,
    peer_addr: 9,
};

/// LE Enhanced Connection Complete, successful status only
pub const LE_ENHANCED_CONNECTION_COMPLETE: ConnectionCompleteLayout = ConnectionCompleteLayout {
    frame: FrameSignature {
        len: 34,
        bytes: &[
            (0, HCI_EVENT_PKT),
            (1, EVT_LE_META_EVENT),
            (2, 0x1f),
            (3, EVT_LE_ENHANCED_CONN_COMPLETE),
            (4, HCI_SUCCESS),
        ],
    },
    handle: 5,
    peer_addr_type: 8,
    peer_addr: 9,
};

/// Disconnection Complete, successful status only
pub const DISCONNECTION_COMPLETE: DisconnectionCompleteLayout = DisconnectionCompleteLayout {
    frame: FrameSignature {
        len: 7,
        bytes: &[
            (0, HCI_EVENT_PKT),
            (1, EVT_DISCONN_COMPLETE),
            (2, 0x04),
            (3, HCI_SUCCESS),
        ],
    },
    handle: 4,
};

/// LE Create Connection command
pub const LE_CREATE_CONNECTION: CreateConnectionLayout = CreateConnectionLayout {
    frame: FrameSignature {
        len: 29,
        bytes: &[
            (0, HCI_COMMAND_PKT),
            (1, (LE_CREATE_CONN_OPCODE & 0xff) as u8),
            (2, (LE_CREATE_CONN_OPCODE >> 8) as u8),
            (3, 0x19),
        ],
    },
    peer_addr_type: 9,
    peer_addr: 10,
    conn_params: 17,
};

/// LE Extended Create Connection command with two initiating PHYs
pub const LE_EXTENDED_CREATE_CONNECTION: CreateConnectionLayout = CreateConnectionLayout {
    frame: FrameSignature {
        len: 46,
        bytes: &[
            (0, HCI_COMMAND_PKT),
            (1, (LE_EXT_CREATE_CONN_OPCODE & 0xff) as u8),
            (2, (LE_EXT_CREATE_CONN_OPCODE >> 8) as u8),
            (3, 0x2a),
        ],
    },
    peer_addr_type: 6,
    peer_addr: 7,
    conn_params: 18,
};

/// Connection timing requested by an LE create connection command
///
/// Intervals are in units of 1.25 ms, the supervision timeout in 10 ms.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionParameters {
    pub min_interval: u16,
    pub max_interval: u16,
    pub latency: u16,
    pub supervision_timeout: u16,
}

impl ConnectionParameters {
    fn read(data: &[u8]) -> Self {
        Self {
            min_interval: LittleEndian::read_u16(&data[0..2]),
            max_interval: LittleEndian::read_u16(&data[2..4]),
            latency: LittleEndian::read_u16(&data[4..6]),
            supervision_timeout: LittleEndian::read_u16(&data[6..8]),
        }
    }
}

/// What a classified packet means for connection bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HciPacketKind {
    LeConnectionComplete {
        handle: u16,
        peer: BdAddr,
        peer_addr_type: u8,
    },
    LeEnhancedConnectionComplete {
        handle: u16,
        peer: BdAddr,
        peer_addr_type: u8,
    },
    DisconnectionComplete {
        handle: u16,
    },
    LeCreateConnectionCommand {
        peer: BdAddr,
        peer_addr_type: u8,
        params: ConnectionParameters,
    },
    LeCreateEnhancedConnectionCommand {
        peer: BdAddr,
        peer_addr_type: u8,
        params: ConnectionParameters,
    },
    NotRecognized,
}

impl HciPacketKind {
    /// True for the controller-to-host events
    pub fn is_event(&self) -> bool {
        matches!(
            self,
            Self::LeConnectionComplete { .. }
                | Self::LeEnhancedConnectionComplete { .. }
                | Self::DisconnectionComplete { .. }
        )
    }

    /// True for the host-to-controller commands
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            Self::LeCreateConnectionCommand { .. } | Self::LeCreateEnhancedConnectionCommand { .. }
        )
    }
}

fn read_peer(data: &[u8], offset: usize) -> BdAddr {
    let mut bytes = [0u8; 6];
    bytes.copy_from_slice(&data[offset..offset + 6]);
    BdAddr::new(bytes)
}

fn read_completion(data: &[u8], layout: &ConnectionCompleteLayout) -> (u16, BdAddr, u8) {
    (
        LittleEndian::read_u16(&data[layout.handle..layout.handle + 2]),
        read_peer(data, layout.peer_addr),
        data[layout.peer_addr_type],
    )
}

fn read_create(data: &[u8], layout: &CreateConnectionLayout) -> (BdAddr, u8, ConnectionParameters) {
    (
        read_peer(data, layout.peer_addr),
        data[layout.peer_addr_type],
        ConnectionParameters::read(&data[layout.conn_params..layout.conn_params + 8]),
    )
}

/// Classify a complete HCI frame (packet-type byte included)
pub fn classify(data: &[u8]) -> HciPacketKind {
    if LE_CONNECTION_COMPLETE.frame.matches(data) {
        let (handle, peer, peer_addr_type) = read_completion(data, &LE_CONNECTION_COMPLETE);
        HciPacketKind::LeConnectionComplete {
            handle,
            peer,
            peer_addr_type,
        }
    } else if LE_ENHANCED_CONNECTION_COMPLETE.frame.matches(data) {
        let (handle, peer, peer_addr_type) =
            read_completion(data, &LE_ENHANCED_CONNECTION_COMPLETE);
        HciPacketKind::LeEnhancedConnectionComplete {
            handle,
            peer,
            peer_addr_type,
        }
    } else if DISCONNECTION_COMPLETE.frame.matches(data) {
        let offset = DISCONNECTION_COMPLETE.handle;
        HciPacketKind::DisconnectionComplete {
            handle: LittleEndian::read_u16(&data[offset..offset + 2]),
        }
    } else if LE_CREATE_CONNECTION.frame.matches(data) {
        let (peer, peer_addr_type, params) = read_create(data, &LE_CREATE_CONNECTION);
        HciPacketKind::LeCreateConnectionCommand {
            peer,
            peer_addr_type,
            params,
        }
    } else if LE_EXTENDED_CREATE_CONNECTION.frame.matches(data) {
        let (peer, peer_addr_type, params) = read_create(data, &LE_EXTENDED_CREATE_CONNECTION);
        HciPacketKind::LeCreateEnhancedConnectionCommand {
            peer,
            peer_addr_type,
            params,
        }
    } else {
        HciPacketKind::NotRecognized
    }
}

/// Frame builders shared by the unit tests
#[cfg(test)]
pub(crate) mod frames {
    use super::*;

    fn stamp(frame: &FrameSignature) -> Vec<u8> {
        let mut data = vec![0u8; frame.len];
        for &(offset, value) in frame.bytes {
            data[offset] = value;
        }
        data
    }

    fn put_params(data: &mut [u8], offset: usize, params: &ConnectionParameters) {
        LittleEndian::write_u16(&mut data[offset..], params.min_interval);
        LittleEndian::write_u16(&mut data[offset + 2..], params.max_interval);
        LittleEndian::write_u16(&mut data[offset + 4..], params.latency);
        LittleEndian::write_u16(&mut data[offset + 6..], params.supervision_timeout);
    }

    fn completion(
        layout: &ConnectionCompleteLayout,
        handle: u16,
        peer: BdAddr,
        peer_type: u8,
    ) -> Vec<u8> {
        let mut data = stamp(&layout.frame);
        LittleEndian::write_u16(&mut data[layout.handle..], handle);
        data[layout.peer_addr_type] = peer_type;
        data[layout.peer_addr..layout.peer_addr + 6].copy_from_slice(&peer.bytes);
        data
    }

    fn create(
        layout: &CreateConnectionLayout,
        peer: BdAddr,
        peer_type: u8,
        params: &ConnectionParameters,
    ) -> Vec<u8> {
        let mut data = stamp(&layout.frame);
        data[layout.peer_addr_type] = peer_type;
        data[layout.peer_addr..layout.peer_addr + 6].copy_from_slice(&peer.bytes);
        put_params(&mut data, layout.conn_params, params);
        data
    }

    pub fn le_connection_complete(handle: u16, peer: BdAddr, peer_type: u8) -> Vec<u8> {
        completion(&LE_CONNECTION_COMPLETE, handle, peer, peer_type)
    }

    pub fn le_enhanced_connection_complete(handle: u16, peer: BdAddr, peer_type: u8) -> Vec<u8> {
        completion(&LE_ENHANCED_CONNECTION_COMPLETE, handle, peer, peer_type)
    }

    pub fn disconnection_complete(handle: u16) -> Vec<u8> {
        let mut data = stamp(&DISCONNECTION_COMPLETE.frame);
        LittleEndian::write_u16(&mut data[DISCONNECTION_COMPLETE.handle..], handle);
        data[6] = 0x13;
        data
    }

    pub fn le_create_connection(
        peer: BdAddr,
        peer_type: u8,
        params: &ConnectionParameters,
    ) -> Vec<u8> {
        create(&LE_CREATE_CONNECTION, peer, peer_type, params)
    }

    pub fn le_extended_create_connection(
        peer: BdAddr,
        peer_type: u8,
        params: &ConnectionParameters,
    ) -> Vec<u8> {
        create(&LE_EXTENDED_CREATE_CONNECTION, peer, peer_type, params)
    }
}
