use chat_client::{ChatSnapshot, Message, Role};
use leptos::ev;
use leptos::prelude::*;

use crate::state::AppState;

/// The open conversation: notices, transcript and composer.
#[component]
pub fn ChatArea() -> impl IntoView {
    let state = expect_context::<AppState>();
    let snapshot = state.snapshot;

    let heading = move || {
        snapshot.with(|s| match s.conversation_id.as_deref() {
            Some(id) => format!("Conversation {id}"),
            None => "New conversation".to_string(),
        })
    };

    view! {
        <main class="chat-area">
            <ConnectionNotice snapshot=snapshot />
            <ErrorNotice />
            <header class="chat-header">{heading}</header>
            <Transcript snapshot=snapshot />
            <Composer />
        </main>
    }
}

#[component]
fn ConnectionNotice(snapshot: ReadSignal<ChatSnapshot>) -> impl IntoView {
    view! {
        {move || {
            snapshot
                .with(ChatSnapshot::connection_notice)
                .map(|notice| view! { <div class="status-banner">{notice}</div> })
        }}
    }
}

/// Rollback message with a dismiss button.
#[component]
fn ErrorNotice() -> impl IntoView {
    let state = expect_context::<AppState>();

    view! {
        {move || {
            state.snapshot.with(|s| s.error.clone()).map(|error| {
                view! {
                    <div class="error-banner" role="alert">
                        <span>{error}</span>
                        <button class="dismiss-btn" on:click=move |_| state.dismiss_error()>
                            "Dismiss"
                        </button>
                    </div>
                }
            })
        }}
    }
}

/// Committed messages followed by the reply being revealed, if any.
#[component]
fn Transcript(snapshot: ReadSignal<ChatSnapshot>) -> impl IntoView {
    let messages = Memo::new(move |_| snapshot.with(|s| s.messages.clone()));
    let streaming = Memo::new(move |_| snapshot.with(|s| s.streaming_text.clone()));
    let has_content = move || !messages.with(Vec::is_empty) || streaming.with(Option::is_some);

    view! {
        <section class="messages-container">
            <Show
                when=has_content
                fallback=|| view! { <p class="empty-state">"Send a message to start chatting"</p> }
            >
                <For each=move || messages.get() key=|m| (m.timestamp, m.role) let:message>
                    <Bubble message=message />
                </For>
                {move || {
                    streaming.get().map(|text| {
                        view! {
                            <article class="message assistant">
                                <span class="role-label">"assistant"</span>
                                <p class="streaming-cursor">{text}</p>
                            </article>
                        }
                    })
                }}
            </Show>
        </section>
    }
}

#[component]
fn Bubble(message: Message) -> impl IntoView {
    let (class, label) = match message.role {
        Role::User => ("message user", "you"),
        Role::Assistant => ("message assistant", "assistant"),
    };

    view! {
        <article class=class>
            <span class="role-label">{label}</span>
            <p>{message.content}</p>
        </article>
    }
}

/// Draft box. Enter submits, Shift+Enter inserts a newline.
#[component]
fn Composer() -> impl IntoView {
    let state = expect_context::<AppState>();
    let draft = RwSignal::new(String::new());
    let busy = move || state.snapshot.with(ChatSnapshot::is_sending);

    let submit = move || {
        let text = draft.get_untracked();
        if text.trim().is_empty() || busy() {
            return;
        }
        draft.set(String::new());
        state.send_message(text);
    };

    view! {
        <form
            class="input-area"
            on:submit=move |ev: ev::SubmitEvent| {
                ev.prevent_default();
                submit();
            }
        >
            <textarea
                rows="1"
                placeholder="Message the assistant"
                prop:value=move || draft.get()
                on:input=move |ev| draft.set(event_target_value(&ev))
                on:keydown=move |ev: ev::KeyboardEvent| {
                    if ev.key() == "Enter" && !ev.shift_key() {
                        ev.prevent_default();
                        submit();
                    }
                }
                disabled=busy
            />
            <button
                type="submit"
                class="send-btn"
                disabled=move || busy() || draft.with(|d| d.trim().is_empty())
            >
                {move || if busy() { "Sending…" } else { "Send" }}
            </button>
        </form>
    }
}
