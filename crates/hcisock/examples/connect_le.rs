//! Example: Creating an LE connection through a raw HCI socket
//!
//! Writes an LE Create Connection command for the peer given on the command
//! line. The socket replaces it with a shadow L2CAP connect, so the kernel
//! keeps the resulting connection.
//!
//! Usage: connect_le AA:BB:CC:DD:EE:FF [random]

use hcisock::hci::classify;
use hcisock::hci::constants::{opcode, HCI_COMMAND_PKT, OCF_LE_CREATE_CONNECTION, OGF_LE};
use hcisock::{BdAddr, HciSocket, SocketEvent};
use std::time::{Duration, Instant};

fn parse_address(text: &str) -> Option<BdAddr> {
    let mut bytes = [0u8; 6];
    let mut parts = text.split(':');
    // Displayed most significant byte first
    for byte in bytes.iter_mut().rev() {
        *byte = u8::from_str_radix(parts.next()?, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(BdAddr::new(bytes))
}

fn create_connection(peer: BdAddr, peer_type: u8) -> Vec<u8> {
    let mut command = vec![HCI_COMMAND_PKT];
    command.extend_from_slice(&opcode(OGF_LE, OCF_LE_CREATE_CONNECTION).to_le_bytes());
    command.push(25);
    command.extend_from_slice(&0x0060u16.to_le_bytes()); // scan interval
    command.extend_from_slice(&0x0030u16.to_le_bytes()); // scan window
    command.push(0); // filter policy
    command.push(peer_type);
    command.extend_from_slice(peer.as_slice());
    command.push(0); // own address type
    command.extend_from_slice(&0x0018u16.to_le_bytes()); // min interval
    command.extend_from_slice(&0x0028u16.to_le_bytes()); // max interval
    command.extend_from_slice(&0u16.to_le_bytes()); // latency
    command.extend_from_slice(&0x01F4u16.to_le_bytes()); // supervision timeout
    command.extend_from_slice(&0u16.to_le_bytes());
    command.extend_from_slice(&0u16.to_le_bytes());
    command
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let peer = match args.next().as_deref().and_then(parse_address) {
        Some(peer) => peer,
        None => {
            eprintln!("Usage: connect_le AA:BB:CC:DD:EE:FF [random]");
            return Ok(());
        }
    };
    let peer_type = match args.next().as_deref() {
        Some("random") => 1,
        _ => 0,
    };

    let mut socket = HciSocket::open(0)?;
    socket.write(&create_connection(peer, peer_type))?;
    println!("Requested connection to {}", peer);

    let start_time = Instant::now();
    while start_time.elapsed() < Duration::from_secs(10) {
        if !socket.wait_readable(Some(Duration::from_millis(200)))? {
            continue;
        }
        socket.drain(|event| {
            if let SocketEvent::Data(packet) = event {
                let kind = classify(packet);
                if kind.is_event() {
                    println!("{:?}", kind);
                }
            }
        });

        // The tracker confirms the shadow once the controller reports the handle
        let connected = socket
            .shadows()
            .is_some_and(|shadows| shadows.is_connected(&peer));
        if connected {
            println!("Connected to {}", peer);
            break;
        }
    }

    if let Some(shadows) = socket.shadows() {
        println!("Shadow state: {:?}", shadows.state(&peer));
    }
    Ok(())
}
