//! In-memory collaborators for unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::LocalBoxFuture;

use crate::api::{ApiError, ChatApi};
use crate::client::{ChatClient, ClientConfig, ClientDeps};
use crate::models::{Conversation, Message, ResponseMetadata, SendMessageRequest, SendMessageResponse};
use crate::runtime::Runtime;
use crate::store::MemoryStore;
use crate::view::{ChatSnapshot, ChatView};

/// Server replies are stamped later than anything the client creates.
pub const REPLY_TIMESTAMP: i64 = 9_000_000_000_000;

pub fn reply(text: &str) -> SendMessageResponse {
    SendMessageResponse {
        success: true,
        message: Message::assistant(text, REPLY_TIMESTAMP),
        conversation_id: String::new(),
        metadata: ResponseMetadata {
            processing_time: 1,
            model: "test-model".to_string(),
            tokens_used: 1,
            cached: false,
            endpoint: "test".to_string(),
            error: None,
        },
    }
}

/// Runs `future` inside a `LocalSet` so `spawn_local` works.
pub async fn run_local<F: Future>(future: F) -> F::Output {
    tokio::task::LocalSet::new().run_until(future).await
}

pub struct TestRuntime {
    origin: tokio::time::Instant,
}

impl Runtime for TestRuntime {
    fn now_ms(&self) -> i64 {
        1_700_000_000_000 + self.origin.elapsed().as_millis() as i64
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        tokio::task::spawn_local(task);
    }
}

/// Replays scripted results, then answers `re: <message>`.
#[derive(Default)]
pub struct ScriptedApi {
    script: RefCell<VecDeque<Result<SendMessageResponse, ApiError>>>,
    requests: RefCell<Vec<SendMessageRequest>>,
}

impl ScriptedApi {
    pub fn push(&self, result: Result<SendMessageResponse, ApiError>) {
        self.script.borrow_mut().push_back(result);
    }

    pub fn requests(&self) -> Vec<SendMessageRequest> {
        self.requests.borrow().clone()
    }
}

#[async_trait(?Send)]
impl ChatApi for ScriptedApi {
    async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<SendMessageResponse, ApiError> {
        self.requests.borrow_mut().push(request.clone());
        let next = self.script.borrow_mut().pop_front();
        next.unwrap_or_else(|| Ok(reply(&format!("re: {}", request.message))))
    }
}

#[derive(Default)]
pub struct RecordingView {
    snapshots: RefCell<Vec<ChatSnapshot>>,
    conversations: RefCell<Vec<Conversation>>,
}

impl RecordingView {
    pub fn snapshots(&self) -> Vec<ChatSnapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn last(&self) -> Option<ChatSnapshot> {
        self.snapshots.borrow().last().cloned()
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.conversations.borrow().clone()
    }
}

impl ChatView for RecordingView {
    fn render(&self, snapshot: &ChatSnapshot) {
        self.snapshots.borrow_mut().push(snapshot.clone());
    }

    fn conversations_changed(&self, conversations: &[Conversation]) {
        *self.conversations.borrow_mut() = conversations.to_vec();
    }
}

pub struct Harness {
    pub api: Rc<ScriptedApi>,
    pub store: Rc<MemoryStore>,
    pub view: Rc<RecordingView>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            api: Rc::new(ScriptedApi::default()),
            store: Rc::new(MemoryStore::new()),
            view: Rc::new(RecordingView::default()),
        }
    }

    pub fn client(&self) -> ChatClient {
        let deps = ClientDeps {
            api: self.api.clone(),
            store: self.store.clone(),
            runtime: Rc::new(TestRuntime { origin: tokio::time::Instant::now() }),
            view: self.view.clone(),
        };
        ChatClient::new(deps, ClientConfig::default())
    }
}
