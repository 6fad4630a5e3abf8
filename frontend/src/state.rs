use std::rc::Rc;

use chat_client::{
    ChatClient, ChatSnapshot, ChatView, ClientConfig, ClientDeps, ConnectivityMonitor, Conversation,
};
use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::api::HttpChatApi;
use crate::platform::{BrowserConnectivitySource, LocalStorageStore, WebRuntime};

/// Shared application state, provided via Leptos context.
///
/// Components read the client's latest [`ChatSnapshot`] and the conversation
/// list; every action goes through the client.
#[derive(Clone, Copy)]
pub struct AppState {
    pub snapshot: ReadSignal<ChatSnapshot>,
    pub conversations: ReadSignal<Vec<Conversation>>,
    client: StoredValue<ChatClient, LocalStorage>,
}

/// Mirrors client output into signals.
struct SignalView {
    snapshot: WriteSignal<ChatSnapshot>,
    conversations: WriteSignal<Vec<Conversation>>,
}

impl ChatView for SignalView {
    fn render(&self, snapshot: &ChatSnapshot) {
        self.snapshot.set(snapshot.clone());
    }

    fn conversations_changed(&self, conversations: &[Conversation]) {
        self.conversations.set(conversations.to_vec());
    }
}

impl AppState {
    /// Start the chat client against the browser and provide the state in the
    /// current Leptos context.
    pub fn provide() -> Self {
        let (snapshot, set_snapshot) = signal(ChatSnapshot::default());
        let (conversations, set_conversations) = signal(Vec::<Conversation>::new());

        let client = ChatClient::new(
            ClientDeps {
                api: Rc::new(HttpChatApi),
                store: Rc::new(LocalStorageStore),
                runtime: Rc::new(WebRuntime),
                view: Rc::new(SignalView { snapshot: set_snapshot, conversations: set_conversations }),
            },
            ClientConfig::default(),
        );
        ConnectivityMonitor::attach(&client, Box::new(BrowserConnectivitySource)).spawn();

        let state = Self { snapshot, conversations, client: StoredValue::new_local(client) };
        provide_context(state);
        state
    }

    fn client(&self) -> ChatClient {
        self.client.get_value()
    }

    pub fn new_chat(&self) {
        self.client().new_conversation();
    }

    pub fn select_conversation(&self, id: String) {
        self.client().open_conversation(&id);
    }

    pub fn dismiss_error(&self) {
        self.client().dismiss_error();
    }

    /// Send a message through the client pipeline. Rollbacks surface in the
    /// snapshot's `error`.
    pub fn send_message(&self, text: String) {
        let client = self.client();
        spawn_local(async move {
            if let Err(e) = client.send_message(&text).await {
                log::warn!("Send rolled back: {e}");
            }
        });
    }
}
