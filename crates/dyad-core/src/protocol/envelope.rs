//! Envelope (JSON text frame): `{ "type": ..., "payload": ... }`.
//!
//! Decoding is two-phase. The frame is first parsed with the payload kept as a
//! `RawValue`; the `type` is resolved against [`MessageKind`]; only then is the
//! payload parsed into the kind's struct. An unknown type and a bad payload for
//! a known type are therefore distinct errors.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{DyadError, Result};

use super::kind::MessageKind;
use super::payload::{
    AgentConsentRequest, BeginStream, ConsentResponse, McpConsentRequest, ProblemsUpdate,
    SessionRef, StreamChunk, StreamError, TelemetryEvent, TodosUpdate,
};

/// One unit of transmission on the stream channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum Envelope {
    #[serde(rename = "stream:begin")]
    StreamBegin(BeginStream),
    #[serde(rename = "stream:cancel")]
    StreamCancel(SessionRef),
    #[serde(rename = "mcp:tool-consent-response")]
    McpConsentResponse(ConsentResponse),
    #[serde(rename = "agent-tool:consent-response")]
    AgentConsentResponse(ConsentResponse),
    #[serde(rename = "stream:started")]
    StreamStarted(SessionRef),
    #[serde(rename = "stream:chunk")]
    StreamChunk(StreamChunk),
    #[serde(rename = "stream:end")]
    StreamEnd(SessionRef),
    #[serde(rename = "stream:error")]
    StreamError(StreamError),
    #[serde(rename = "stream:cancelled")]
    StreamCancelled(SessionRef),
    #[serde(rename = "mcp:tool-consent-request")]
    McpConsentRequest(McpConsentRequest),
    #[serde(rename = "agent-tool:consent-request")]
    AgentConsentRequest(AgentConsentRequest),
    #[serde(rename = "agent-tool:todos-update")]
    AgentTodosUpdate(TodosUpdate),
    #[serde(rename = "agent-tool:problems-update")]
    AgentProblemsUpdate(ProblemsUpdate),
    #[serde(rename = "telemetry:event")]
    TelemetryEvent(TelemetryEvent),
}

/// First decode phase: header only, payload left raw.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEnvelope {
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(default)]
    payload: Option<Box<RawValue>>,
}

impl Envelope {
    pub fn kind(&self) -> MessageKind {
        match self {
            Envelope::StreamBegin(_) => MessageKind::StreamBegin,
            Envelope::StreamCancel(_) => MessageKind::StreamCancel,
            Envelope::McpConsentResponse(_) => MessageKind::McpConsentResponse,
            Envelope::AgentConsentResponse(_) => MessageKind::AgentConsentResponse,
            Envelope::StreamStarted(_) => MessageKind::StreamStarted,
            Envelope::StreamChunk(_) => MessageKind::StreamChunk,
            Envelope::StreamEnd(_) => MessageKind::StreamEnd,
            Envelope::StreamError(_) => MessageKind::StreamError,
            Envelope::StreamCancelled(_) => MessageKind::StreamCancelled,
            Envelope::McpConsentRequest(_) => MessageKind::McpConsentRequest,
            Envelope::AgentConsentRequest(_) => MessageKind::AgentConsentRequest,
            Envelope::AgentTodosUpdate(_) => MessageKind::AgentTodosUpdate,
            Envelope::AgentProblemsUpdate(_) => MessageKind::AgentProblemsUpdate,
            Envelope::TelemetryEvent(_) => MessageKind::TelemetryEvent,
        }
    }

    /// Correlation token carried in the payload, if this kind has one.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Envelope::StreamBegin(p) => Some(&p.session_id),
            Envelope::StreamCancel(p)
            | Envelope::StreamStarted(p)
            | Envelope::StreamEnd(p)
            | Envelope::StreamCancelled(p) => Some(&p.session_id),
            Envelope::StreamChunk(p) => Some(&p.session_id),
            Envelope::StreamError(p) => p.session_id.as_deref(),
            Envelope::AgentConsentRequest(p) => p.session_id.as_deref(),
            Envelope::AgentTodosUpdate(p) => p.session_id.as_deref(),
            Envelope::McpConsentResponse(_)
            | Envelope::AgentConsentResponse(_)
            | Envelope::McpConsentRequest(_)
            | Envelope::AgentProblemsUpdate(_)
            | Envelope::TelemetryEvent(_) => None,
        }
    }

    pub fn started(session_id: &str) -> Self {
        Envelope::StreamStarted(SessionRef { session_id: session_id.to_owned() })
    }

    pub fn chunk(session_id: &str, chunk: impl Into<String>) -> Self {
        Envelope::StreamChunk(StreamChunk {
            session_id: session_id.to_owned(),
            chunk: chunk.into(),
        })
    }

    pub fn end(session_id: &str) -> Self {
        Envelope::StreamEnd(SessionRef { session_id: session_id.to_owned() })
    }

    pub fn cancelled(session_id: &str) -> Self {
        Envelope::StreamCancelled(SessionRef { session_id: session_id.to_owned() })
    }

    /// `stream:error` describing `err`, optionally correlated to a session.
    pub fn error(session_id: Option<&str>, err: &DyadError) -> Self {
        Envelope::StreamError(StreamError {
            session_id: session_id.map(str::to_owned),
            error: err.to_string(),
            code: Some(err.client_code().as_str().to_owned()),
        })
    }

    /// Serialize to one JSON text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| DyadError::Internal(format!("json encode failed: {e}")))
    }

    /// Parse one JSON text frame.
    pub fn decode(text: &str) -> Result<Self> {
        let raw: RawEnvelope = serde_json::from_str(text)
            .map_err(|e| DyadError::BadRequest(format!("invalid envelope json: {e}")))?;

        let kind = MessageKind::parse(&raw.msg_type)
            .ok_or(DyadError::UnknownMessageType(raw.msg_type))?;

        // Missing payload is parsed as `null` so kinds with required fields fail
        // as malformed rather than as bad envelopes.
        let payload = raw.payload.as_deref().map(RawValue::get).unwrap_or("null");

        Ok(match kind {
            MessageKind::StreamBegin => Envelope::StreamBegin(parse_payload(kind, payload)?),
            MessageKind::StreamCancel => Envelope::StreamCancel(parse_payload(kind, payload)?),
            MessageKind::McpConsentResponse => {
                Envelope::McpConsentResponse(parse_payload(kind, payload)?)
            }
            MessageKind::AgentConsentResponse => {
                Envelope::AgentConsentResponse(parse_payload(kind, payload)?)
            }
            MessageKind::StreamStarted => Envelope::StreamStarted(parse_payload(kind, payload)?),
            MessageKind::StreamChunk => Envelope::StreamChunk(parse_payload(kind, payload)?),
            MessageKind::StreamEnd => Envelope::StreamEnd(parse_payload(kind, payload)?),
            MessageKind::StreamError => Envelope::StreamError(parse_payload(kind, payload)?),
            MessageKind::StreamCancelled => {
                Envelope::StreamCancelled(parse_payload(kind, payload)?)
            }
            MessageKind::McpConsentRequest => {
                Envelope::McpConsentRequest(parse_payload(kind, payload)?)
            }
            MessageKind::AgentConsentRequest => {
                Envelope::AgentConsentRequest(parse_payload(kind, payload)?)
            }
            MessageKind::AgentTodosUpdate => {
                Envelope::AgentTodosUpdate(parse_payload(kind, payload)?)
            }
            MessageKind::AgentProblemsUpdate => {
                Envelope::AgentProblemsUpdate(parse_payload(kind, payload)?)
            }
            MessageKind::TelemetryEvent => Envelope::TelemetryEvent(parse_payload(kind, payload)?),
        })
    }
}

fn parse_payload<T: DeserializeOwned>(kind: MessageKind, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| DyadError::MalformedPayload {
        kind: kind.as_str(),
        reason: e.to_string(),
    })
}
