//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples the client state machine from system
//! resources (wall clock, randomness). The runtime supplies a system backed
//! implementation; tests and the simulation harness supply deterministic ones.
//!
//! # Invariants
//!
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use std::time::SystemTime;

/// Abstract environment providing time and randomness.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Wall-clock time used to stamp chat lines.
    fn now(&self) -> SystemTime;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a message correlation id (16 lowercase hex digits).
    fn message_id(&self) -> String {
        format!("{:016x}", self.random_u64())
    }
}
