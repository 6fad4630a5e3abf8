//! Connectivity sources and the monitor that turns their signals into
//! [`ConnectionStatus`] transitions.

use std::time::Duration;

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use log::{debug, info};

use crate::client::ChatClient;
use crate::models::ConnectionStatus;
use crate::runtime::Runtime;

/// Channel end a source reports status changes into.
pub type StatusSink = UnboundedSender<ConnectionStatus>;

/// A platform's way of learning about connectivity.
pub trait ConnectivitySource {
    /// Wait between going online and draining the offline queue.
    fn drain_debounce(&self) -> Duration;

    /// Starts observing and reports every observed status into `sink`.
    fn start(self: Box<Self>, runtime: &dyn Runtime, sink: StatusSink);
}

/// Network state as reported by a push-based platform subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkState {
    pub is_connected: bool,
    /// `None` while the platform has not determined reachability yet.
    pub is_internet_reachable: Option<bool>,
}

impl NetworkState {
    pub fn status(self) -> ConnectionStatus {
        match (self.is_connected, self.is_internet_reachable) {
            (false, _) => ConnectionStatus::Offline,
            (true, Some(false)) => ConnectionStatus::Reconnecting,
            (true, _) => ConnectionStatus::Online,
        }
    }
}

/// Source fed by a push subscription, as on mobile platforms.
///
/// Radios flap, so draining waits longer than on the web.
pub struct PushConnectivitySource {
    updates: UnboundedReceiver<NetworkState>,
}

impl PushConnectivitySource {
    pub const DRAIN_DEBOUNCE: Duration = Duration::from_secs(3);

    /// Returns the sender the platform subscription pushes into, and the source.
    pub fn channel() -> (UnboundedSender<NetworkState>, Self) {
        let (tx, rx) = mpsc::unbounded();
        (tx, Self { updates: rx })
    }
}

impl ConnectivitySource for PushConnectivitySource {
    fn drain_debounce(&self) -> Duration {
        Self::DRAIN_DEBOUNCE
    }

    fn start(self: Box<Self>, runtime: &dyn Runtime, sink: StatusSink) {
        let mut updates = self.updates;
        runtime.spawn(Box::pin(async move {
            while let Some(state) = updates.next().await {
                debug!("Network state {state:?}");
                if sink.unbounded_send(state.status()).is_err() {
                    break;
                }
            }
        }));
    }
}

/// Single consumer of connectivity events for one client.
pub struct ConnectivityMonitor {
    client: ChatClient,
    events: UnboundedReceiver<ConnectionStatus>,
}

impl ConnectivityMonitor {
    /// Starts `source` and adopts its drain debounce.
    pub fn attach(client: &ChatClient, source: Box<dyn ConnectivitySource>) -> Self {
        client.inner.drain_debounce.set(source.drain_debounce());
        let (sink, events) = mpsc::unbounded();
        source.start(client.inner.runtime.as_ref(), sink);
        Self { client: client.clone(), events }
    }

    /// Applies events until the source goes away.
    pub async fn run(mut self) {
        while let Some(status) = self.events.next().await {
            self.client.set_connection_status(status);
        }
        debug!("Connectivity source closed");
    }

    pub fn spawn(self) {
        let runtime = self.client.runtime();
        runtime.spawn(Box::pin(self.run()));
    }
}

impl ChatClient {
    /// Applies a status transition.
    ///
    /// Going online with queued messages schedules a debounced drain; going
    /// offline cancels any pending drain.
    pub fn set_connection_status(&self, status: ConnectionStatus) {
        let previous = std::mem::replace(&mut self.inner.state.borrow_mut().status, status);
        if previous == status {
            return;
        }
        info!("Connection status {previous:?} -> {status:?}");

        match status {
            ConnectionStatus::Online => {
                if !self.inner.queue.borrow().is_empty() {
                    self.schedule_drain(self.inner.drain_debounce.get());
                }
            }
            ConnectionStatus::Offline => self.cancel_scheduled_drains(),
            ConnectionStatus::Reconnecting => {}
        }
        self.emit();
    }
}
