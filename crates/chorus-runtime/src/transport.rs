//! Transport channel pair.
//!
//! Two independent one-way channels: frames are published on one connection
//! and received on the other. Each frame is a length-delimited UTF-8 JSON
//! envelope, so message boundaries never depend on newlines in the text.
//!
//! Channels are generic over `AsyncRead`/`AsyncWrite`; production uses TCP,
//! tests use in-memory duplex pipes.

use std::{io, time::Duration};

use bytes::{Buf, Bytes, BytesMut};
use chorus_proto::{Envelope, MAX_FRAME_SIZE, ProtoError};
use futures::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tokio_util::codec::{Decoder, FramedRead, FramedWrite, LengthDelimitedCodec};

use crate::{config::RuntimeConfig, error::RuntimeError};

const LENGTH_PREFIX: usize = 4;

fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder().max_frame_length(MAX_FRAME_SIZE).new_codec()
}

/// One length-delimited frame as read off the wire.
#[derive(Debug)]
enum Frame {
    Body(BytesMut),
    /// Body exceeded [`MAX_FRAME_SIZE`] and was skipped without buffering.
    Oversized { size: usize },
}

/// Length-delimited decoder that skips oversized bodies instead of failing.
///
/// `LengthDelimitedCodec` reports an oversized frame as an I/O error, which
/// ends the stream. Here the body is discarded as it arrives and the frame is
/// surfaced as [`Frame::Oversized`], leaving the stream positioned at the
/// next length prefix.
#[derive(Debug, Default)]
struct InboundCodec {
    skipping: Option<Skip>,
}

#[derive(Debug, Clone, Copy)]
struct Skip {
    size: usize,
    remaining: usize,
}

impl Decoder for InboundCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Frame>> {
        if let Some(mut skip) = self.skipping.take() {
            let n = skip.remaining.min(src.len());
            src.advance(n);
            skip.remaining -= n;
            if skip.remaining > 0 {
                self.skipping = Some(skip);
                return Ok(None);
            }
            return Ok(Some(Frame::Oversized { size: skip.size }));
        }

        if src.len() < LENGTH_PREFIX {
            src.reserve(LENGTH_PREFIX - src.len());
            return Ok(None);
        }

        let size = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if size > MAX_FRAME_SIZE {
            src.advance(LENGTH_PREFIX);
            self.skipping = Some(Skip { size, remaining: size });
            return self.decode(src);
        }

        if src.len() < LENGTH_PREFIX + size {
            src.reserve(LENGTH_PREFIX + size - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX);
        Ok(Some(Frame::Body(src.split_to(size))))
    }
}

/// Result of one receive attempt.
#[derive(Debug)]
pub enum Received {
    /// A well-formed envelope.
    Envelope(Envelope),
    /// A frame arrived but did not decode; the channel is still usable.
    DecodeError(ProtoError),
    /// The channel is closed; no further frames will arrive.
    Closed(Option<std::io::Error>),
}

/// Receiving half of the channel pair.
pub struct InboundChannel<R> {
    frames: FramedRead<R, InboundCodec>,
}

impl<R: AsyncRead + Unpin> InboundChannel<R> {
    /// Wrap a byte stream.
    pub fn new(reader: R) -> Self {
        Self { frames: FramedRead::new(reader, InboundCodec::default()) }
    }

    /// Wait for the next frame.
    pub async fn recv(&mut self) -> Received {
        match self.frames.next().await {
            Some(Ok(Frame::Body(frame))) => match chorus_proto::decode(&frame) {
                Ok(envelope) => Received::Envelope(envelope),
                Err(e) => Received::DecodeError(e),
            },
            Some(Ok(Frame::Oversized { size })) => {
                Received::DecodeError(ProtoError::FrameTooLarge { size, max: MAX_FRAME_SIZE })
            },
            Some(Err(e)) => Received::Closed(Some(e)),
            None => Received::Closed(None),
        }
    }
}

/// Publishing half of the channel pair.
pub struct OutboundChannel<W> {
    frames: FramedWrite<W, LengthDelimitedCodec>,
}

impl<W: AsyncWrite + Unpin> OutboundChannel<W> {
    /// Wrap a byte sink.
    pub fn new(writer: W) -> Self {
        Self { frames: FramedWrite::new(writer, codec()) }
    }

    /// Encode and publish one envelope.
    pub async fn send(&mut self, envelope: &Envelope) -> Result<(), RuntimeError> {
        let frame: Bytes = chorus_proto::encode(envelope)?;
        self.frames.send(frame).await?;
        Ok(())
    }

    /// Flush and close the underlying sink.
    pub async fn close(mut self) -> Result<(), RuntimeError> {
        SinkExt::<Bytes>::close(&mut self.frames).await?;
        Ok(())
    }
}

/// Connect both channels over TCP.
pub async fn connect(
    config: &RuntimeConfig,
) -> Result<(OutboundChannel<TcpStream>, InboundChannel<TcpStream>), RuntimeError> {
    let publish = connect_tcp(&config.publish_addr, config.connect_timeout).await?;
    let subscribe = connect_tcp(&config.subscribe_addr, config.connect_timeout).await?;

    tracing::info!(
        publish = %config.publish_addr,
        subscribe = %config.subscribe_addr,
        "channels connected"
    );

    Ok((OutboundChannel::new(publish), InboundChannel::new(subscribe)))
}

async fn connect_tcp(addr: &str, timeout: Duration) -> Result<TcpStream, RuntimeError> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| RuntimeError::ConnectTimeout { addr: addr.to_string() })??;
    stream.set_nodelay(true)?;
    Ok(stream)
}
