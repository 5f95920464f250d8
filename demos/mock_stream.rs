//! Mock provider example
//!
//! Run with: cargo run --example mock_stream
//!
//! Drives the synthetic provider through a full scan, connect and
//! disconnect cycle and prints what a client would see.

use pwr_provider_ble::{
    create_provider, ClientDispatcher, DeviceRef, PowerProvider, ProviderClient, ProviderSettings,
    Result,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct PrintingClient {
    found: mpsc::UnboundedSender<DeviceRef>,
}

impl ProviderClient for PrintingClient {
    fn on_open_result(&self, ok: bool) {
        println!("open: {ok}");
    }

    fn on_scan_result(&self, device: DeviceRef) {
        println!("scan: {device}");
        let _ = self.found.send(device);
    }

    fn on_connect_result(&self, ok: bool) {
        println!("connect: {ok}");
    }

    fn on_disconnect_result(&self, ok: bool) {
        println!("disconnect: {ok}");
    }

    fn on_close_result(&self, ok: bool) {
        println!("close: {ok}");
    }

    fn log(&self, source: &str, message: &str) {
        println!("[{source}] {message}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = ProviderSettings::default().with_mock(true);
    let provider = create_provider("MockPWR", &settings).await?;

    let (found_tx, mut found_rx) = mpsc::unbounded_channel();
    let (sender, dispatcher) = ClientDispatcher::spawn(Arc::new(PrintingClient { found: found_tx }));

    provider.open(sender);
    provider.start_scan();

    if let Some(device) = found_rx.recv().await {
        provider.connect(&device);
    }

    while !provider.is_connected() {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    for _ in 0..8 {
        tokio::time::sleep(Duration::from_millis(750)).await;
        println!(
            "{:>5} W   battery {:?}%",
            provider.power_value(),
            provider.battery_level()
        );
    }

    provider.close().await;
    drop(provider);
    dispatcher.join().await;

    Ok(())
}
