//! Decode-once codec for the transport layer.
//!
//! - Text frames => `Envelope` (two-phase, see `dyad_core::protocol::envelope`)
//! - Binary frames are not part of the protocol and fail to decode
//! - Ping/Pong/Close are surfaced for lifecycle management

use axum::extract::ws::Message;
use dyad_core::error::{DyadError, Result};
use dyad_core::Envelope;

#[derive(Debug)]
pub enum Inbound {
    Envelope(Envelope),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

pub fn decode(msg: Message) -> Result<Inbound> {
    match msg {
        Message::Text(s) => Ok(Inbound::Envelope(Envelope::decode(&s)?)),
        Message::Binary(b) => Err(DyadError::BadRequest(format!(
            "binary frames are not supported ({} bytes)",
            b.len()
        ))),
        Message::Ping(v) => Ok(Inbound::Ping(v)),
        Message::Pong(v) => Ok(Inbound::Pong(v)),
        Message::Close(_) => Ok(Inbound::Close),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn text_frame_decodes_to_envelope() {
        let msg = Message::Text(r#"{"type":"stream:cancel","payload":{"sessionId":"abc"}}"#.into());
        let Inbound::Envelope(env) = decode(msg).unwrap() else {
            panic!("expected envelope");
        };
        assert_eq!(env.session_id(), Some("abc"));
    }

    #[test]
    fn binary_frame_is_bad_request() {
        let err = decode(Message::Binary(vec![1, 2, 3])).unwrap_err();
        assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
    }
}
