//! Real-time power monitoring example
//!
//! Run with: cargo run --example power_monitor [ADDRESS]
//!
//! Without an address the first sensor found is used.

use pwr_provider_ble::{
    create_provider, ClientEvent, ClientSender, PowerProvider, ProviderSettings, Result,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let wanted = std::env::args().nth(1).map(|a| a.to_ascii_uppercase());

    println!("Power Monitor");
    println!("=============\n");

    let provider = create_provider("BLE", &ProviderSettings::default()).await?;
    let (client, mut events) = ClientSender::channel();
    provider.open(client);

    println!("Looking for power sensors...\n");
    provider.start_scan();

    // Wait for the handshake to finish
    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::OpenResult(false) => {
                println!("Bluetooth is not available");
                return Ok(());
            }
            ClientEvent::ScanResult(device) => {
                println!("Found {}", device);
                if wanted.as_deref().map_or(true, |a| a == device.address) {
                    println!("Connecting...\n");
                    provider.connect(&device);
                }
            }
            ClientEvent::ConnectResult(true) => break,
            ClientEvent::ConnectResult(false) => {
                println!("Connection failed");
                provider.close().await;
                return Ok(());
            }
            ClientEvent::Log { source, message } => tracing::debug!("[{}] {}", source, message),
            _ => {}
        }
    }

    println!("Connected! Monitoring power...");
    println!("Press Ctrl+C to exit.\n");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\n\nExiting...");
                break;
            }
            Some(event) = events.recv() => {
                if event == ClientEvent::DisconnectResult(true) {
                    println!("\nSensor went away");
                    break;
                }
            }
            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                let battery = provider
                    .battery_level()
                    .map(|b| format!("{b}%"))
                    .unwrap_or_else(|| "?".to_string());
                println!("{:>5} W   battery {}", provider.power_value(), battery);
            }
        }
    }

    provider.close().await;
    Ok(())
}
