//! Production Environment implementation using system time and RNG.
//!
//! This module provides `SystemEnv`, the production implementation of the
//! `Environment` trait that uses the wall clock and OS randomness.

use std::time::SystemTime;

use chorus_client::Environment;

/// Production environment using system time and OS randomness.
///
/// This implementation:
/// - Uses `SystemTime::now()` to stamp chat lines
/// - Uses `getrandom` for message correlation ids
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).unwrap_or_else(|e| {
            // Ids only need to be distinct, so fall back to the clock.
            tracing::error!("getrandom failed: {}", e);
            let nanos = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map_or(0, |d| d.as_nanos())
                .to_be_bytes();
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = nanos[i % nanos.len()];
            }
        });
    }
}
