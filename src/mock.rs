//! A fake power provider for exercising user interfaces without hardware.
//!
//! Scans surface a fixed set of made-up sensors, connects always succeed
//! after a delay, and a connected sensor produces random power values.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::ops::Range;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::client::ClientSender;
use crate::clock::{Clock, SystemClock};
use crate::config::MockConfig;
use crate::data::{DeviceRef, PowerSample};
use crate::provider::PowerProvider;

/// Registry key of the mock provider.
pub const NAME: &str = "MockPWR";

fn random_power(range: &Range<u16>) -> u16 {
    if range.is_empty() {
        return range.start;
    }
    rand::thread_rng().gen_range(range.clone())
}

#[derive(Default)]
struct MockState {
    client: Option<ClientSender>,
    scanning: bool,
    connecting: bool,
    connected: bool,
    sample: Option<PowerSample>,
}

#[derive(Default)]
struct MockTasks {
    scan: Option<JoinHandle<()>>,
    link: Option<JoinHandle<()>>,
}

/// Timer-driven fake provider.
pub struct MockPowerProvider {
    config: MockConfig,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<MockState>>,
    tasks: Mutex<MockTasks>,
}

impl MockPowerProvider {
    /// Create a mock provider.
    pub fn new(config: MockConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Create a mock provider with an explicit time source.
    pub fn with_clock(config: MockConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Arc::new(Mutex::new(MockState::default())),
            tasks: Mutex::new(MockTasks::default()),
        }
    }

    /// Address of the `index`th fake sensor.
    pub fn fake_address(index: u32) -> String {
        format!("00:43:A8:23:11:{:02X}", index % 256)
    }

    fn abort_link(&self) {
        if let Some(task) = self.tasks.lock().link.take() {
            task.abort();
        }
    }
}

impl Default for MockPowerProvider {
    fn default() -> Self {
        Self::new(MockConfig::default())
    }
}

impl Drop for MockPowerProvider {
    fn drop(&mut self) {
        let mut tasks = self.tasks.lock();
        for task in [tasks.scan.take(), tasks.link.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

#[async_trait]
impl PowerProvider for MockPowerProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn provider_name(&self) -> &'static str {
        NAME
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn is_bonding_device(&self) -> bool {
        false
    }

    fn open(&self, client: ClientSender) {
        info!("Mock provider opened");
        client.open_result(true);
        self.state.lock().client = Some(client);
    }

    async fn close(&self) {
        self.stop_scan();
        let busy = {
            let state = self.state.lock();
            state.connecting || state.connected
        };
        if busy {
            self.disconnect().await;
        }

        if let Some(client) = self.state.lock().client.take() {
            client.close_result(true);
        }
    }

    fn start_scan(&self) {
        {
            let mut state = self.state.lock();
            if state.scanning || state.client.is_none() {
                return;
            }
            state.scanning = true;
        }

        debug!("Mock scan started");
        let state = self.state.clone();
        let interval = self.config.scan_interval;
        let count = self.config.scan_results;

        let task = tokio::spawn(async move {
            for index in 0..count {
                tokio::time::sleep(interval).await;

                let guard = state.lock();
                if !guard.scanning {
                    return;
                }
                if let Some(client) = &guard.client {
                    client.scan_result(DeviceRef::new(
                        NAME,
                        format!("{NAME} {}", index + 1),
                        MockPowerProvider::fake_address(index),
                    ));
                }
            }
        });

        if let Some(previous) = self.tasks.lock().scan.replace(task) {
            previous.abort();
        }
    }

    fn stop_scan(&self) {
        self.state.lock().scanning = false;
        if let Some(task) = self.tasks.lock().scan.take() {
            task.abort();
        }
    }

    fn is_scanning(&self) -> bool {
        self.state.lock().scanning
    }

    fn connect(&self, device: &DeviceRef) {
        {
            let state = self.state.lock();
            if state.connecting || state.connected || state.client.is_none() {
                return;
            }
        }

        self.stop_scan();
        self.state.lock().connecting = true;
        info!("Mock connecting to {}", device);

        let state = self.state.clone();
        let clock = self.clock.clone();
        let delay = self.config.connect_delay;
        let interval = self.config.sample_interval;
        let range = self.config.power_range.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut guard = state.lock();
                if !guard.connecting {
                    return;
                }
                guard.connecting = false;
                guard.connected = true;
                if let Some(client) = &guard.client {
                    client.connect_result(true);
                }
            }

            loop {
                tokio::time::sleep(interval).await;

                let power = random_power(&range);

                let mut guard = state.lock();
                if !guard.connected {
                    return;
                }
                guard.sample = Some(PowerSample::new(
                    power,
                    clock.wall_clock_ms(),
                    clock.monotonic_ns(),
                ));
            }
        });

        if let Some(previous) = self.tasks.lock().link.replace(task) {
            previous.abort();
        }
    }

    async fn disconnect(&self) {
        {
            let state = self.state.lock();
            if !state.connecting && !state.connected {
                debug!("Mock not connected, ignoring disconnect");
                return;
            }
        }

        self.abort_link();

        let mut state = self.state.lock();
        state.connecting = false;
        state.connected = false;
        if let Some(client) = &state.client {
            client.disconnect_result(true);
        }
    }

    fn is_connecting(&self) -> bool {
        self.state.lock().connecting
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn power_value(&self) -> u16 {
        self.state.lock().sample.map(|s| s.power).unwrap_or(0)
    }

    fn power_timestamp(&self) -> i64 {
        self.state
            .lock()
            .sample
            .map(|s| s.timestamp_wall_clock_ms)
            .unwrap_or(0)
    }

    fn power_elapsed_realtime(&self) -> u64 {
        self.state
            .lock()
            .sample
            .map(|s| s.timestamp_monotonic_ns)
            .unwrap_or(0)
    }

    fn power_sample(&self) -> Option<PowerSample> {
        self.state.lock().sample
    }

    fn battery_level(&self) -> Option<u8> {
        Some(rand::thread_rng().gen_range(0..=100))
    }
}
