//! Chorus wire protocol.
//!
//! Envelopes are JSON objects carried as whole frames on two one-way
//! channels: commands and messages flow from clients to the provider, events
//! and messages flow back. There is no request/response correlation; every
//! command's effect is observed later as an independent event.
//!
//! # Boundary normalisation
//!
//! [`decode`] is the single place where provider input is interpreted:
//!
//! - Frames larger than [`MAX_FRAME_SIZE`] are rejected
//! - Commands and messages must name a non-empty sender
//! - Messages must name a recipient or a group
//! - Events that only carry a free-text description get a structured
//!   [`Lifecycle`] derived from it

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod envelope;
mod error;
mod lifecycle;

use bytes::Bytes;
pub use envelope::{Action, Command, Destination, Envelope, Event, GroupMap, Message};
pub use error::ProtoError;
pub use lifecycle::Lifecycle;

/// Maximum encoded envelope size in bytes.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Placeholder shown when no groups exist.
///
/// Never a valid group name: providers naming a group with it are ignored
/// and clients refuse to create it.
pub const RESERVED_GROUP_NAME: &str = "(no groups)";

/// Whether `name` collides with [`RESERVED_GROUP_NAME`].
pub fn is_reserved_group_name(name: &str) -> bool {
    name == RESERVED_GROUP_NAME
}

/// Decode one frame into an envelope.
pub fn decode(frame: &[u8]) -> Result<Envelope, ProtoError> {
    if frame.len() > MAX_FRAME_SIZE {
        return Err(ProtoError::FrameTooLarge { size: frame.len(), max: MAX_FRAME_SIZE });
    }

    let mut envelope: Envelope = serde_json::from_slice(frame)?;

    match &mut envelope {
        Envelope::Command(command) => {
            if command.from.is_empty() {
                return Err(ProtoError::Invalid { reason: "command without sender" });
            }
        },
        Envelope::Message(message) => {
            if message.from.is_empty() {
                return Err(ProtoError::Invalid { reason: "message without sender" });
            }
            if message.destination().is_none() {
                return Err(ProtoError::Invalid { reason: "message without recipient or group" });
            }
        },
        Envelope::Event(event) => {
            if event.lifecycle.is_none() {
                event.lifecycle = event.data.as_deref().and_then(Lifecycle::from_legacy_text);
            }
        },
    }

    Ok(envelope)
}

/// Encode an envelope into one frame.
pub fn encode(envelope: &Envelope) -> Result<Bytes, ProtoError> {
    let bytes = serde_json::to_vec(envelope)?;

    if bytes.len() > MAX_FRAME_SIZE {
        return Err(ProtoError::FrameTooLarge { size: bytes.len(), max: MAX_FRAME_SIZE });
    }

    Ok(Bytes::from(bytes))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn decode_legacy_join_text() {
        let frame = br#"{"type":"event","data":"alice joined group dev."}"#;
        let Envelope::Event(event) = decode(frame).unwrap() else {
            panic!("expected event");
        };
        assert_eq!(
            event.lifecycle,
            Some(Lifecycle::Joined { group: "dev".to_string(), actor: "alice".to_string() })
        );
        assert_eq!(event.data.as_deref(), Some("alice joined group dev."));
    }

    #[test]
    fn structured_lifecycle_wins_over_text() {
        let frame = br#"{"type":"event","data":"alice joined group dev.",
            "lifecycle":{"action":"left","group":"ops","actor":"bob"}}"#;
        let Envelope::Event(event) = decode(frame).unwrap() else {
            panic!("expected event");
        };
        assert_eq!(
            event.lifecycle,
            Some(Lifecycle::Left { group: "ops".to_string(), actor: "bob".to_string() })
        );
    }

    #[test]
    fn decode_rejects_malformed_json() {
        assert!(matches!(decode(b"{not json"), Err(ProtoError::Json(_))));
        assert!(matches!(decode(br#"{"type":"bogus"}"#), Err(ProtoError::Json(_))));
        assert!(matches!(decode(br#"{"from":"alice"}"#), Err(ProtoError::Json(_))));
    }

    #[test]
    fn decode_rejects_message_without_destination() {
        let frame = br#"{"type":"message","from":"alice","data":"hi"}"#;
        assert!(matches!(decode(frame), Err(ProtoError::Invalid { .. })));
    }

    #[test]
    fn decode_rejects_anonymous_message() {
        let frame = br#"{"type":"message","from":"","group":"dev","data":"hi"}"#;
        assert!(matches!(decode(frame), Err(ProtoError::Invalid { .. })));
    }

    #[test]
    fn decode_rejects_oversized_frame() {
        let frame = vec![b' '; MAX_FRAME_SIZE + 1];
        assert!(matches!(decode(&frame), Err(ProtoError::FrameTooLarge { .. })));
    }

    #[test]
    fn encode_then_decode_group_message() {
        let envelope = Envelope::group_message("alice", "dev", "hello", Some("00ff".to_string()));
        let frame = encode(&envelope).unwrap();
        assert_eq!(decode(&frame).unwrap(), envelope);
    }

    #[test]
    fn reserved_name_is_exact() {
        assert!(is_reserved_group_name(RESERVED_GROUP_NAME));
        assert!(!is_reserved_group_name("(No Groups)"));
        assert!(!is_reserved_group_name("dev"));
    }

    proptest! {
        #[test]
        fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
            let _ = decode(&bytes);
        }

        #[test]
        fn decode_never_panics_on_event_text(text in ".{0,80}") {
            let frame = serde_json::json!({"type": "event", "data": text}).to_string();
            prop_assert!(decode(frame.as_bytes()).is_ok());
        }
    }
}
