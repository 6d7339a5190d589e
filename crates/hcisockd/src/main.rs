//! hcisockd - keeps LE connections made over a raw HCI socket alive
//!
//! Binds the raw channel of a controller and services it: every packet is
//! passed through the shadow-connection tracker, and speculative shadows
//! are reaped on each tick.

use hcisock::{Config, HciSocket, SocketEvent};
use log::{debug, error, info, trace, warn};
use std::process::ExitCode;
use std::thread;

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    debug!("Configuration: {:?}", config);

    let tick = config.reap_interval();
    let requested = config.dev_id;
    let mut socket = HciSocket::with_config(config)?;
    let dev_id = socket.bind_raw(requested)?;
    let (address, address_type) = socket.local_address();
    info!(
        "Servicing hci{} ({} type {})",
        dev_id, address, address_type
    );

    if !socket.is_dev_up() {
        warn!(
            "hci{} is not up, no connections will be tracked until it is",
            dev_id
        );
    }

    loop {
        let mut failed = false;
        let serviced = socket.service(tick, |event| match event {
            SocketEvent::Data(packet) => trace!("<- {}", hex::encode(packet)),
            SocketEvent::Error(e) => {
                warn!("Read from hci{} failed: {}", dev_id, e);
                failed = true;
            }
        });

        if let Err(e) = serviced {
            warn!("Waiting on hci{} failed: {}", dev_id, e);
            failed = true;
        }

        // Back off a tick after a transport error
        if failed {
            thread::sleep(tick);
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
