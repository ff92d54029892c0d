//! Protocol error types.

use thiserror::Error;

/// Errors from encoding or decoding envelopes.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Frame exceeds [`crate::MAX_FRAME_SIZE`].
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Size of the rejected frame.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Frame is not valid JSON or does not match the envelope shape.
    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame parsed but violates an envelope rule.
    #[error("invalid envelope: {reason}")]
    Invalid {
        /// Which rule was violated.
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProtoError::FrameTooLarge { size: 70_000, max: 65_536 };
        assert_eq!(err.to_string(), "frame too large: 70000 bytes (max 65536)");

        let err = ProtoError::Invalid { reason: "empty sender" };
        assert_eq!(err.to_string(), "invalid envelope: empty sender");
    }
}
