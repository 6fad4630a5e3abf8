//! Platform-neutral chat client core.
//!
//! Owns the send pipeline, the persistent offline queue and connectivity handling.
//! The host platform supplies the collaborators: a [`ChatApi`] transport, a
//! [`KeyValueStore`], a [`Runtime`] for timers and tasks, a [`ChatView`] to render
//! into and a [`ConnectivitySource`].

pub mod api;
pub mod client;
pub mod connectivity;
pub mod conversations;
pub mod models;
pub mod offline_queue;
pub mod pipeline;
pub mod runtime;
pub mod store;
pub mod view;

#[cfg(test)]
mod testing;

pub use api::{ApiError, ChatApi};
pub use client::{ChatClient, ClientConfig, ClientDeps};
pub use connectivity::{ConnectivityMonitor, ConnectivitySource, NetworkState, PushConnectivitySource};
pub use models::{ConnectionStatus, Conversation, Message, Role};
pub use offline_queue::{DrainReport, OfflineQueue, QueuedMessage};
pub use pipeline::{SendError, SendFailureKind, SendOutcome, SendPhase};
pub use runtime::Runtime;
pub use store::{KeyValueStore, MemoryStore, StoreError};
pub use view::{ChatSnapshot, ChatView};
