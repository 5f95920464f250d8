//! Client notification sink.
//!
//! Providers report every asynchronous outcome to a [`ProviderClient`].
//! Notifications never call the client directly: they are queued on a
//! [`ClientSender`] and delivered in order on one execution context, so the
//! client never sees two notifications at once even though hardware events
//! arrive on other tasks.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::data::DeviceRef;

/// Receiver of provider outcomes.
#[cfg_attr(test, mockall::automock)]
pub trait ProviderClient: Send + Sync {
    /// Result of `open`.
    fn on_open_result(&self, ok: bool);

    /// A device surfaced by a scan. Fires once per address per scan.
    fn on_scan_result(&self, device: DeviceRef);

    /// Result of `connect`.
    fn on_connect_result(&self, ok: bool);

    /// Result of `disconnect`, or an unrequested link loss.
    fn on_disconnect_result(&self, ok: bool);

    /// Result of `close`.
    fn on_close_result(&self, ok: bool);

    /// A diagnostic line. Best effort; not a stable error channel.
    fn log(&self, source: &str, message: &str);
}

/// A queued notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// See [`ProviderClient::on_open_result`].
    OpenResult(bool),
    /// See [`ProviderClient::on_scan_result`].
    ScanResult(DeviceRef),
    /// See [`ProviderClient::on_connect_result`].
    ConnectResult(bool),
    /// See [`ProviderClient::on_disconnect_result`].
    DisconnectResult(bool),
    /// See [`ProviderClient::on_close_result`].
    CloseResult(bool),
    /// See [`ProviderClient::log`].
    Log {
        /// Provider that produced the line.
        source: String,
        /// The line.
        message: String,
    },
}

impl ClientEvent {
    /// Hand this notification to a client.
    pub fn deliver(self, client: &dyn ProviderClient) {
        match self {
            Self::OpenResult(ok) => client.on_open_result(ok),
            Self::ScanResult(device) => client.on_scan_result(device),
            Self::ConnectResult(ok) => client.on_connect_result(ok),
            Self::DisconnectResult(ok) => client.on_disconnect_result(ok),
            Self::CloseResult(ok) => client.on_close_result(ok),
            Self::Log { source, message } => client.log(&source, &message),
        }
    }

    /// Check if this is a log line.
    pub fn is_log(&self) -> bool {
        matches!(self, Self::Log { .. })
    }
}

/// Queue into the client's execution context.
///
/// Sending never blocks; a closed queue drops the notification.
#[derive(Debug, Clone)]
pub struct ClientSender {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl ClientSender {
    /// Create a sender together with the receiving end.
    ///
    /// Whoever drains the receiver is the client's execution context.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue an arbitrary notification.
    pub fn send(&self, event: ClientEvent) {
        if self.tx.send(event).is_err() {
            trace!("Client queue closed, dropping notification");
        }
    }

    /// Queue an open result.
    pub fn open_result(&self, ok: bool) {
        self.send(ClientEvent::OpenResult(ok));
    }

    /// Queue a scan result.
    pub fn scan_result(&self, device: DeviceRef) {
        self.send(ClientEvent::ScanResult(device));
    }

    /// Queue a connect result.
    pub fn connect_result(&self, ok: bool) {
        self.send(ClientEvent::ConnectResult(ok));
    }

    /// Queue a disconnect result.
    pub fn disconnect_result(&self, ok: bool) {
        self.send(ClientEvent::DisconnectResult(ok));
    }

    /// Queue a close result.
    pub fn close_result(&self, ok: bool) {
        self.send(ClientEvent::CloseResult(ok));
    }

    /// Queue a log line.
    pub fn log(&self, source: &str, message: impl Into<String>) {
        self.send(ClientEvent::Log {
            source: source.to_string(),
            message: message.into(),
        });
    }

    /// Check if the receiving end is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Task that delivers queued notifications to a client, one at a time.
pub struct ClientDispatcher {
    handle: JoinHandle<()>,
}

impl ClientDispatcher {
    /// Spawn the delivery task and return the sender feeding it.
    ///
    /// The task ends once every clone of the sender has been dropped.
    pub fn spawn(client: Arc<dyn ProviderClient>) -> (ClientSender, Self) {
        let (sender, mut rx) = ClientSender::channel();

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                event.deliver(client.as_ref());
            }
            trace!("Client dispatcher stopped");
        });

        (sender, Self { handle })
    }

    /// Wait for every queued notification to be delivered.
    ///
    /// Only returns after all senders have been dropped.
    pub async fn join(self) {
        let _ = self.handle.await;
    }

    /// Stop delivering immediately.
    pub fn abort(&self) {
        self.handle.abort();
    }
}
