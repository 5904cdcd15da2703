//! Prints every `TouchpadEvent` the relay broadcasts.
//!
//! Run with:
//!     cargo run --bin swipe-relay-monitor
//!
//! Each event is printed as `<fingers> <direction>` using the wire
//! encoding (`0 0` marks the end of a swipe).  Press Ctrl-C to quit.

use log::{error, info};
use std::process::ExitCode;
use swipe_relay::bus::client::RelayClient;
use swipe_relay::bus::default_socket_path;

fn main() -> ExitCode {
    env_logger::init();

    let path = default_socket_path();
    let subscription = match RelayClient::connect(&path).and_then(|client| client.subscribe()) {
        Ok(subscription) => subscription,
        Err(e) => {
            error!("cannot subscribe to relay at {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };
    info!("watching {}", path.display());

    for event in subscription {
        match event {
            Ok(event) => {
                let (fingers, direction) = event.to_wire();
                println!("{} {}\t{}", fingers, direction, event);
            }
            Err(e) => {
                error!("subscription error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }
    info!("relay went away");
    ExitCode::SUCCESS
}
