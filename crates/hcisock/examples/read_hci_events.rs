//! Example: Reading HCI packets
//!
//! Prints every packet seen on the raw channel for a few seconds, together
//! with how the connection tracker classifies it.

use hcisock::hci::{classify, HciPacketKind};
use hcisock::{HciSocket, SocketEvent};
use std::time::{Duration, Instant};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Opening HCI socket for device 0...");
    let mut socket = HciSocket::open(0)?;

    println!("\nReading HCI packets for 5 seconds...");
    let start_time = Instant::now();

    while start_time.elapsed() < Duration::from_secs(5) {
        if !socket.wait_readable(Some(Duration::from_millis(100)))? {
            continue;
        }

        socket.drain(|event| match event {
            SocketEvent::Data(packet) => match classify(packet) {
                HciPacketKind::NotRecognized => println!("{}", hex::encode(packet)),
                kind => println!("{} {:?}", hex::encode(packet), kind),
            },
            SocketEvent::Error(e) => eprintln!("Error reading packet: {}", e),
        });
        socket.cleanup();
    }

    if let Some(shadows) = socket.shadows() {
        println!(
            "Shadows: {} connecting, {} connected",
            shadows.connecting_count(),
            shadows.connected_count()
        );
    }
    println!("Finished reading packets");
    Ok(())
}
