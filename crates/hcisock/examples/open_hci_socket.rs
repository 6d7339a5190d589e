//! Example: Opening an HCI socket
//!
//! This example demonstrates how to open a raw HCI socket using the hcisock library.

use hcisock::HciSocket;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Opening HCI socket on the first device that is up...");

    let mut socket = HciSocket::new()?;
    for device in socket.device_list()? {
        println!("hci{}: {:?}", device.dev_id, device.flags);
    }

    match socket.bind_raw(None) {
        Ok(dev_id) => {
            let (address, address_type) = socket.local_address();
            println!("Bound raw channel of hci{}", dev_id);
            println!("Local address: {} (type {})", address, address_type);
            println!("Socket file descriptor: {}", socket.as_raw_fd());

            // The socket and its shadow connections are closed on drop
            println!("Socket will be closed when this function returns.");
        }
        Err(e) => {
            eprintln!("Failed to bind HCI socket: {}", e);
            eprintln!("This might be because:");
            eprintln!("1. You don't have sufficient permissions to access the Bluetooth device");
            eprintln!("2. No Bluetooth adapter is available");
        }
    }

    Ok(())
}
