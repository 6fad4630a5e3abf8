use chat_client::Conversation;
use leptos::prelude::*;

use crate::state::AppState;

/// Conversation list, newest first, with a "New Chat" action.
#[component]
pub fn Sidebar() -> impl IntoView {
    let state = expect_context::<AppState>();
    let conversations = state.conversations;

    view! {
        <aside class="sidebar">
            <div class="sidebar-header">
                <h2>"Chat Relay"</h2>
                <button class="new-chat-btn" on:click=move |_| state.new_chat()>
                    "+ New Chat"
                </button>
            </div>
            <nav class="conversation-list">
                <Show
                    when=move || conversations.with(|c| !c.is_empty())
                    fallback=|| view! { <p class="conversation-empty">"No conversations yet"</p> }
                >
                    <For
                        each=move || conversations.get()
                        key=|c| (c.id.clone(), c.timestamp)
                        let:conversation
                    >
                        <ConversationEntry conversation=conversation />
                    </For>
                </Show>
            </nav>
        </aside>
    }
}

#[component]
fn ConversationEntry(conversation: Conversation) -> impl IntoView {
    let state = expect_context::<AppState>();
    let Conversation { id, title, last_message, .. } = conversation;

    let active_id = id.clone();
    let is_active = move || {
        state.snapshot.with(|s| s.conversation_id.as_deref() == Some(active_id.as_str()))
    };

    view! {
        <button
            class="conversation-item"
            class:active=is_active
            on:click=move |_| state.select_conversation(id.clone())
        >
            <span class="conversation-title">{title}</span>
            <span class="conversation-preview">{last_message}</span>
        </button>
    }
}
