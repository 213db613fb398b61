//! Closed message-type vocabulary.

use std::fmt;

/// Which side is allowed to originate a message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

/// Every `type` string the stream channel understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    // client -> server
    StreamBegin,
    StreamCancel,
    McpConsentResponse,
    AgentConsentResponse,
    // server -> client, responses
    StreamStarted,
    StreamChunk,
    StreamEnd,
    StreamError,
    StreamCancelled,
    // server -> client, push notifications
    McpConsentRequest,
    AgentConsentRequest,
    AgentTodosUpdate,
    AgentProblemsUpdate,
    TelemetryEvent,
}

impl MessageKind {
    pub const ALL: [MessageKind; 14] = [
        MessageKind::StreamBegin,
        MessageKind::StreamCancel,
        MessageKind::McpConsentResponse,
        MessageKind::AgentConsentResponse,
        MessageKind::StreamStarted,
        MessageKind::StreamChunk,
        MessageKind::StreamEnd,
        MessageKind::StreamError,
        MessageKind::StreamCancelled,
        MessageKind::McpConsentRequest,
        MessageKind::AgentConsentRequest,
        MessageKind::AgentTodosUpdate,
        MessageKind::AgentProblemsUpdate,
        MessageKind::TelemetryEvent,
    ];

    /// Wire name (the envelope `type` field).
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::StreamBegin => "stream:begin",
            MessageKind::StreamCancel => "stream:cancel",
            MessageKind::McpConsentResponse => "mcp:tool-consent-response",
            MessageKind::AgentConsentResponse => "agent-tool:consent-response",
            MessageKind::StreamStarted => "stream:started",
            MessageKind::StreamChunk => "stream:chunk",
            MessageKind::StreamEnd => "stream:end",
            MessageKind::StreamError => "stream:error",
            MessageKind::StreamCancelled => "stream:cancelled",
            MessageKind::McpConsentRequest => "mcp:tool-consent-request",
            MessageKind::AgentConsentRequest => "agent-tool:consent-request",
            MessageKind::AgentTodosUpdate => "agent-tool:todos-update",
            MessageKind::AgentProblemsUpdate => "agent-tool:problems-update",
            MessageKind::TelemetryEvent => "telemetry:event",
        }
    }

    /// Resolve a wire name. `None` means the type is outside the vocabulary.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    pub fn direction(self) -> Direction {
        match self {
            MessageKind::StreamBegin
            | MessageKind::StreamCancel
            | MessageKind::McpConsentResponse
            | MessageKind::AgentConsentResponse => Direction::ClientToServer,
            _ => Direction::ServerToClient,
        }
    }

    /// `end`, `error` and `cancelled` close a session.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MessageKind::StreamEnd | MessageKind::StreamError | MessageKind::StreamCancelled
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
