//! Monitor incoming packets and modem events.
//!
//! Demonstrates subscribing to the driver event stream and draining
//! received data packets as they arrive. This is useful for watching mesh
//! traffic or debugging modem communication.
//!
//! # Requirements
//!
//! - An XBee modem in API mode 1 connected via serial
//! - Serial port path adjusted for your system
//!
//! # Usage
//!
//! ```sh
//! cargo run -p zbmodem --example monitor_packets
//! ```

use std::time::Duration;

use zbmodem::xbee::XbeeBuilder;
use zbmodem::ModemEvent;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let serial_port = "/dev/ttyUSB0";

    println!("Connecting to modem on {}...", serial_port);

    let modem = XbeeBuilder::new()
        .serial_port(serial_port)
        .baud_rate(9_600)
        .build()
        .await?;

    println!("Associated: {}", modem.associated().await);
    if let Ok(rssi) = modem.last_rssi().await {
        println!("Last RSSI: -{} dBm", rssi);
    }

    // Subscribe to driver events.
    let mut events = modem.subscribe();
    println!("Monitoring for 60 seconds...\n");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(60);

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, events.recv()).await {
            Ok(Ok(event)) => match event {
                ModemEvent::FrameBuffered { frame_type, id } => {
                    println!("frame buffered: type 0x{frame_type:02X} id 0x{id:02X}");
                    while let Some(packet) = modem.rx_packet().await {
                        println!(
                            "  packet from 0x{:016X}: {:02X?}",
                            packet.source, packet.payload
                        );
                    }
                }
                ModemEvent::Associated { status } => {
                    println!("associated (status 0x{status:02X})");
                }
                ModemEvent::Disassociated { status } => {
                    println!("disassociated (status 0x{status:02X})");
                }
            },
            Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(n))) => {
                println!("(missed {} events due to lag)", n);
            }
            Ok(Err(tokio::sync::broadcast::error::RecvError::Closed)) => {
                println!("Event channel closed.");
                break;
            }
            Err(_) => {
                // Timeout -- monitoring period elapsed.
                break;
            }
        }
    }

    println!("\nMonitoring complete.");
    Ok(())
}
