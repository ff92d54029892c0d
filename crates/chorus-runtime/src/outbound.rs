//! Outbound queue and writer task.
//!
//! Any number of producers enqueue envelopes; one writer task owns the
//! outbound channel and publishes them in enqueue order. The queue is
//! bounded and never blocks a producer: when it is full the new envelope is
//! rejected, so a stalled provider cannot wedge the driver.

use chorus_proto::Envelope;
use tokio::{io::AsyncWrite, sync::mpsc};

use crate::{error::RuntimeError, transport::OutboundChannel};

/// Producer side of the outbound queue.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    tx: mpsc::Sender<Envelope>,
}

impl OutboundQueue {
    /// Create a queue holding at most `capacity` envelopes.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Enqueue without waiting.
    ///
    /// # Errors
    ///
    /// - `OutboundFull` when the queue is at capacity; the envelope is dropped.
    /// - `Stopped` when the writer has exited.
    pub fn enqueue(&self, envelope: Envelope) -> Result<(), RuntimeError> {
        self.tx.try_send(envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(envelope) => {
                RuntimeError::OutboundFull { kind: envelope.kind() }
            },
            mpsc::error::TrySendError::Closed(_) => RuntimeError::Stopped,
        })
    }
}

/// Counters reported when the writer stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Envelopes published.
    pub sent: u64,
    /// Envelopes that failed to publish.
    pub failed: u64,
}

/// Publish queued envelopes until every producer is gone, then close.
///
/// A failed publish ends the writer; remaining envelopes are counted as
/// failed and dropped.
pub async fn run_writer<W>(
    mut channel: OutboundChannel<W>,
    mut rx: mpsc::Receiver<Envelope>,
) -> WriterStats
where
    W: AsyncWrite + Unpin,
{
    let mut stats = WriterStats::default();

    while let Some(envelope) = rx.recv().await {
        match channel.send(&envelope).await {
            Ok(()) => stats.sent += 1,
            Err(e) => {
                stats.failed += 1;
                tracing::error!(kind = envelope.kind(), "publish failed: {}", e);
                rx.close();
                while rx.recv().await.is_some() {
                    stats.failed += 1;
                }
                return stats;
            },
        }
    }

    if let Err(e) = channel.close().await {
        tracing::warn!("closing outbound channel failed: {}", e);
    }
    tracing::debug!(sent = stats.sent, "writer stopped");

    stats
}
