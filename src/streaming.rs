//! Best-effort presentation channel for agent output.
//!
//! The agent loop reports model tokens, tool-call announcements and tool results to a
//! [`StreamSink`] while it runs. Sinks never influence the loop: delivery failures are
//! swallowed and nothing is read back.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// An event emitted while an agent task is running
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    /// A fragment of model output
    Content { text: String },
    /// The model selected a tool
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },
    /// A tool finished and produced text
    ToolResult { id: String, content: String },
    /// The task turn ended
    Finished,
}

/// Receiver of streamed agent output
pub trait StreamSink: Send + Sync {
    fn emit(&self, event: AgentStreamEvent);

    fn content(&self, text: &str) {
        self.emit(AgentStreamEvent::Content {
            text: text.to_string(),
        });
    }

    fn tool_call(&self, id: &str, name: &str, arguments: &str) {
        self.emit(AgentStreamEvent::ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        });
    }

    fn tool_result(&self, id: &str, content: &str) {
        self.emit(AgentStreamEvent::ToolResult {
            id: id.to_string(),
            content: content.to_string(),
        });
    }

    fn finish(&self) {
        self.emit(AgentStreamEvent::Finished);
    }
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl StreamSink for NullSink {
    fn emit(&self, _event: AgentStreamEvent) {}
}

/// Sink forwarding events over an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: UnboundedSender<AgentStreamEvent>,
}

impl ChannelSink {
    /// Create a sink together with the receiving half of its channel
    pub fn new() -> (Self, UnboundedReceiver<AgentStreamEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl StreamSink for ChannelSink {
    fn emit(&self, event: AgentStreamEvent) {
        // Receiver may be gone (client disconnected); output is presentation only
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_forwards_events_in_order() {
        let (sink, mut rx) = ChannelSink::new();

        sink.content("Hel");
        sink.content("lo");
        sink.tool_call("0-action", "maptool", "{}");
        sink.tool_result("0-action", "Room 52-18 is on floor 5");
        sink.finish();

        assert_eq!(rx.recv().await, Some(AgentStreamEvent::Content { text: "Hel".to_string() }));
        assert_eq!(rx.recv().await, Some(AgentStreamEvent::Content { text: "lo".to_string() }));
        assert!(matches!(rx.recv().await, Some(AgentStreamEvent::ToolCall { ref name, .. }) if name == "maptool"));
        assert!(matches!(rx.recv().await, Some(AgentStreamEvent::ToolResult { .. })));
        assert_eq!(rx.recv().await, Some(AgentStreamEvent::Finished));
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);

        sink.content("nobody listening");
    }

    #[test]
    fn test_stream_event_serialization() {
        let json = serde_json::to_string(&AgentStreamEvent::Content { text: "hi".to_string() }).unwrap();
        assert_eq!(json, r#"{"type":"content","text":"hi"}"#);
    }
}
