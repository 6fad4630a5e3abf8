use crate::models::{ConnectionStatus, Conversation, Message};
use crate::pipeline::SendPhase;

/// Everything the UI needs to draw the chat panel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatSnapshot {
    pub conversation_id: Option<String>,
    pub messages: Vec<Message>,
    /// Partially revealed assistant reply while streaming.
    pub streaming_text: Option<String>,
    pub phase: SendPhase,
    pub status: ConnectionStatus,
    /// Messages waiting in the offline queue.
    pub queued: usize,
    pub error: Option<String>,
}

impl ChatSnapshot {
    pub fn is_sending(&self) -> bool {
        self.phase.is_in_flight()
    }

    /// Banner text for the connection state, `None` when there is nothing to say.
    pub fn connection_notice(&self) -> Option<String> {
        let queued = self.queued;
        let notice = match self.status {
            ConnectionStatus::Online if queued == 0 => return None,
            ConnectionStatus::Online => format!("Sending {queued} queued message(s)…"),
            ConnectionStatus::Reconnecting => "Reconnecting…".to_string(),
            ConnectionStatus::Offline if queued == 0 => "You are offline".to_string(),
            ConnectionStatus::Offline => {
                format!("You are offline. {queued} message(s) will be sent when you reconnect.")
            }
        };
        Some(notice)
    }
}

/// Receives state changes from the client core.
pub trait ChatView {
    fn render(&self, snapshot: &ChatSnapshot);

    fn conversations_changed(&self, conversations: &[Conversation]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_notice() {
        let mut snapshot = ChatSnapshot::default();
        assert_eq!(snapshot.connection_notice(), None);

        snapshot.queued = 2;
        assert_eq!(snapshot.connection_notice().as_deref(), Some("Sending 2 queued message(s)…"));

        snapshot.status = ConnectionStatus::Offline;
        assert!(snapshot.connection_notice().unwrap().contains("2 message(s) will be sent"));

        snapshot.queued = 0;
        assert_eq!(snapshot.connection_notice().as_deref(), Some("You are offline"));

        snapshot.status = ConnectionStatus::Reconnecting;
        assert_eq!(snapshot.connection_notice().as_deref(), Some("Reconnecting…"));
    }
}
