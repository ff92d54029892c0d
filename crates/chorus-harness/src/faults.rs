//! Seeded delivery fault injection.
//!
//! Models the provider's at-most-once, unordered broadcast: each envelope
//! headed for a client inbox may be dropped, delivered twice in a row, or
//! swapped with the envelope queued just before it.

use std::collections::VecDeque;

use chorus_proto::Envelope;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Fault probabilities, each in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FaultConfig {
    /// Probability an envelope is lost.
    pub drop_rate: f64,
    /// Probability an envelope is delivered twice.
    pub duplicate_rate: f64,
    /// Probability an envelope overtakes the previous one.
    pub reorder_rate: f64,
}

impl FaultConfig {
    /// Perfect delivery.
    pub const NONE: Self = Self { drop_rate: 0.0, duplicate_rate: 0.0, reorder_rate: 0.0 };

    /// Duplicates only.
    pub fn duplicating(rate: f64) -> Self {
        Self { duplicate_rate: rate, ..Self::NONE }
    }

    /// Every fault at once.
    pub fn chaotic(rate: f64) -> Self {
        Self { drop_rate: rate, duplicate_rate: rate, reorder_rate: rate }
    }
}

/// Counters for injected faults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultStats {
    /// Envelopes dropped.
    pub dropped: u64,
    /// Envelopes duplicated.
    pub duplicated: u64,
    /// Envelopes reordered.
    pub reordered: u64,
}

/// Applies [`FaultConfig`] to inbox insertions.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    rng: ChaCha8Rng,
    config: FaultConfig,
    enabled: bool,
    stats: FaultStats,
}

impl FaultInjector {
    /// Create an injector with its own seeded stream.
    pub fn new(seed: u64, config: FaultConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(seed);
        Self { rng, config, enabled: true, stats: FaultStats::default() }
    }

    /// Turn injection on or off. Disabled injectors deliver perfectly.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Faults injected so far.
    pub fn stats(&self) -> FaultStats {
        self.stats
    }

    /// Queue `envelope` on `inbox`, possibly faulted.
    pub fn deliver(&mut self, inbox: &mut VecDeque<Envelope>, envelope: Envelope) {
        if !self.enabled {
            inbox.push_back(envelope);
            return;
        }

        if self.roll(self.config.drop_rate) {
            self.stats.dropped += 1;
            return;
        }

        let duplicate = self.roll(self.config.duplicate_rate);
        let at = if !inbox.is_empty() && self.roll(self.config.reorder_rate) {
            self.stats.reordered += 1;
            inbox.len() - 1
        } else {
            inbox.len()
        };

        if duplicate {
            self.stats.duplicated += 1;
            inbox.insert(at, envelope.clone());
        }
        inbox.insert(at, envelope);
    }

    fn roll(&mut self, rate: f64) -> bool {
        rate > 0.0 && self.rng.gen_bool(rate.clamp(0.0, 1.0))
    }
}
