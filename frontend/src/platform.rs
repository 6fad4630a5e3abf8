//! Browser implementations of the client core's collaborators.

use std::time::Duration;

use chat_client::connectivity::StatusSink;
use chat_client::{ConnectionStatus, ConnectivitySource, KeyValueStore, Runtime, StoreError};
use futures::future::LocalBoxFuture;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::Storage;

use crate::api::probe_health;

const PROBE_INTERVAL: Duration = Duration::from_secs(30);

// ── Runtime ──────────────────────────────────────────────────────────────────

pub struct WebRuntime;

impl Runtime for WebRuntime {
    fn now_ms(&self) -> i64 {
        js_sys::Date::now() as i64
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        Box::pin(gloo_timers::future::sleep(duration))
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }
}

// ── Storage ──────────────────────────────────────────────────────────────────

/// `KeyValueStore` backed by `window.localStorage`.
pub struct LocalStorageStore;

impl LocalStorageStore {
    fn storage() -> Result<Storage, StoreError> {
        web_sys::window()
            .ok_or_else(|| StoreError::Backend("no window".to_string()))?
            .local_storage()
            .map_err(|e| StoreError::Backend(format!("{e:?}")))?
            .ok_or_else(|| StoreError::Backend("localStorage unavailable".to_string()))
    }
}

impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Self::storage()?
            .get_item(key)
            .map_err(|e| StoreError::Backend(format!("{e:?}")))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|e| StoreError::Backend(format!("{e:?}")))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        Self::storage()?
            .remove_item(key)
            .map_err(|e| StoreError::Backend(format!("{e:?}")))
    }
}

// ── Connectivity ─────────────────────────────────────────────────────────────

/// Browser `online`/`offline` events plus periodic active probes.
pub struct BrowserConnectivitySource;

impl BrowserConnectivitySource {
    pub const DRAIN_DEBOUNCE: Duration = Duration::from_secs(1);
}

fn report_probe(sink: StatusSink) {
    wasm_bindgen_futures::spawn_local(async move {
        let status = if probe_health().await {
            ConnectionStatus::Online
        } else {
            ConnectionStatus::Offline
        };
        let _ = sink.unbounded_send(status);
    });
}

impl ConnectivitySource for BrowserConnectivitySource {
    fn drain_debounce(&self) -> Duration {
        Self::DRAIN_DEBOUNCE
    }

    fn start(self: Box<Self>, runtime: &dyn Runtime, sink: StatusSink) {
        let Some(window) = web_sys::window() else {
            log::error!("No window; connectivity events unavailable");
            return;
        };

        if !window.navigator().on_line() {
            let _ = sink.unbounded_send(ConnectionStatus::Offline);
        }

        // --- online: reconnecting until the probe confirms ---
        let online_sink = sink.clone();
        let on_online = Closure::<dyn Fn()>::new(move || {
            let _ = online_sink.unbounded_send(ConnectionStatus::Reconnecting);
            report_probe(online_sink.clone());
        });
        let _ = window
            .add_event_listener_with_callback("online", on_online.as_ref().unchecked_ref());
        on_online.forget();

        // --- offline ---
        let offline_sink = sink.clone();
        let on_offline = Closure::<dyn Fn()>::new(move || {
            let _ = offline_sink.unbounded_send(ConnectionStatus::Offline);
        });
        let _ = window
            .add_event_listener_with_callback("offline", on_offline.as_ref().unchecked_ref());
        on_offline.forget();

        // --- periodic probe ---
        runtime.spawn(Box::pin(async move {
            loop {
                gloo_timers::future::sleep(PROBE_INTERVAL).await;
                if sink.is_closed() {
                    break;
                }
                report_probe(sink.clone());
            }
        }));
    }
}
