//! Inbound delivery pump.
//!
//! Runs on its own task, blocking on the inbound channel and forwarding
//! decoded envelopes to the driver queue in receive order. A bad frame is
//! logged and skipped; only a closed channel, cancellation, or a vanished
//! driver ends the loop. The inbound channel is dropped exactly once, when
//! the pump returns.

use tokio::{io::AsyncRead, sync::mpsc};
use tokio_util::sync::CancellationToken;

use crate::{
    driver::DriverInput,
    transport::{InboundChannel, Received},
};

/// Why the pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// Stop signal received.
    Cancelled,
    /// The inbound channel closed.
    ChannelClosed,
    /// The driver queue was dropped.
    DriverGone,
}

/// Counters reported when the pump stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpStats {
    /// Envelopes handed to the driver.
    pub forwarded: u64,
    /// Frames dropped because they did not decode.
    pub decode_errors: u64,
    /// Why the loop ended.
    pub exit: PumpExit,
}

/// Receive, decode and forward until stopped.
pub async fn run_pump<R>(
    mut inbound: InboundChannel<R>,
    queue: mpsc::Sender<DriverInput>,
    cancel: CancellationToken,
) -> PumpStats
where
    R: AsyncRead + Unpin,
{
    let mut forwarded = 0;
    let mut decode_errors = 0;

    let exit = loop {
        let received = tokio::select! {
            biased;
            () = cancel.cancelled() => break PumpExit::Cancelled,
            received = inbound.recv() => received,
        };

        match received {
            Received::Envelope(envelope) => {
                tracing::trace!(kind = envelope.kind(), "inbound envelope");
                if queue.send(DriverInput::Inbound(envelope)).await.is_err() {
                    break PumpExit::DriverGone;
                }
                forwarded += 1;
            },
            Received::DecodeError(e) => {
                decode_errors += 1;
                tracing::warn!("dropping malformed frame: {}", e);
            },
            Received::Closed(err) => {
                match err {
                    Some(e) => tracing::error!("inbound channel failed: {}", e),
                    None => tracing::info!("inbound channel closed"),
                }
                let _ = queue.send(DriverInput::InboundClosed).await;
                break PumpExit::ChannelClosed;
            },
        }
    };

    tracing::debug!(forwarded, decode_errors, ?exit, "pump stopped");
    drop(inbound);

    PumpStats { forwarded, decode_errors, exit }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chorus_proto::{Action, Envelope};
    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::transport::OutboundChannel;

    #[tokio::test]
    async fn forwards_in_order_and_skips_bad_frames() {
        let (mut writer, reader) = tokio::io::duplex(4096);
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let pump = tokio::spawn(run_pump(InboundChannel::new(reader), tx, cancel));

        writer.write_all(&3u32.to_be_bytes()).await.unwrap();
        writer.write_all(b"bad").await.unwrap();
        let mut outbound = OutboundChannel::new(writer);
        for group in ["a", "b"] {
            let envelope = Envelope::command("x", Action::Join, Some(group.to_string()));
            outbound.send(&envelope).await.unwrap();
        }
        outbound.close().await.unwrap();

        let mut groups = Vec::new();
        while let Some(input) = rx.recv().await {
            match input {
                DriverInput::Inbound(Envelope::Command(c)) => groups.push(c.group.unwrap()),
                DriverInput::InboundClosed => break,
                other => panic!("unexpected input {other:?}"),
            }
        }

        assert_eq!(groups, ["a", "b"]);
        let stats = pump.await.unwrap();
        let expected = PumpStats { forwarded: 2, decode_errors: 1, exit: PumpExit::ChannelClosed };
        assert_eq!(stats, expected);
    }

    #[tokio::test]
    async fn oversized_frame_does_not_stop_the_pump() {
        let (mut writer, reader) = tokio::io::duplex(4096);
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let pump = tokio::spawn(run_pump(InboundChannel::new(reader), tx, cancel));

        let size = chorus_proto::MAX_FRAME_SIZE + 10;
        writer.write_all(&(size as u32).to_be_bytes()).await.unwrap();
        writer.write_all(&vec![b'{'; size]).await.unwrap();
        let mut outbound = OutboundChannel::new(writer);
        let refresh = Envelope::command("x", Action::Refresh, None);
        outbound.send(&refresh).await.unwrap();
        outbound.close().await.unwrap();

        assert!(matches!(rx.recv().await, Some(DriverInput::Inbound(e)) if e == refresh));
        assert!(matches!(rx.recv().await, Some(DriverInput::InboundClosed)));

        let stats = pump.await.unwrap();
        let expected = PumpStats { forwarded: 1, decode_errors: 1, exit: PumpExit::ChannelClosed };
        assert_eq!(stats, expected);
    }

    #[tokio::test]
    async fn cancel_unblocks_idle_pump() {
        let (_writer, reader) = tokio::io::duplex(64);
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let pump = tokio::spawn(run_pump(InboundChannel::new(reader), tx, cancel.clone()));

        cancel.cancel();

        let stats = pump.await.unwrap();
        assert_eq!(stats.exit, PumpExit::Cancelled);
        assert_eq!(stats.forwarded, 0);
    }
}
