//! Chorus client runtime.
//!
//! Wires the sans-IO [`chorus_client::Client`] to real channels using:
//! - Tokio tasks for the delivery pump, the driver and the writer
//! - Length-delimited JSON frames over TCP
//! - System time and OS randomness
//!
//! ## Architecture
//!
//! ```text
//! InboundChannel ─▶ pump ──┐
//!                          ├─▶ driver queue ─▶ Driver (owns Client)
//! ChatHandle (clones) ─────┘                    ├─▶ Notification channel
//!                                               └─▶ OutboundQueue ─▶ writer
//!                                                                      └─▶ OutboundChannel
//! ```
//!
//! The driver is the only task that touches client state. Stopping cancels
//! the pump and closes the outbound queue; each channel is released once,
//! by the task that owns it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod console;
mod driver;
mod error;
mod handle;
mod outbound;
mod pump;
mod system_env;
pub mod transport;

use chorus_client::{Client, ClientIdentity, Environment};
pub use config::RuntimeConfig;
pub use driver::{Driver, DriverInput, GroupsView, Notification};
pub use error::RuntimeError;
pub use handle::ChatHandle;
pub use outbound::{OutboundQueue, WriterStats, run_writer};
pub use pump::{PumpExit, PumpStats, run_pump};
pub use system_env::SystemEnv;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use transport::{InboundChannel, OutboundChannel};

/// Outcome of a stopped runtime.
pub struct RuntimeReport<E: Environment> {
    /// Final client state.
    pub client: Client<E>,
    /// Pump counters.
    pub pump: PumpStats,
    /// Writer counters.
    pub writer: WriterStats,
}

/// A running client: pump, driver and writer tasks.
pub struct ChatRuntime<E: Environment> {
    handle: ChatHandle,
    driver: JoinHandle<Client<E>>,
    pump: JoinHandle<PumpStats>,
    writer: JoinHandle<WriterStats>,
}

impl ChatRuntime<SystemEnv> {
    /// Connect both TCP channels and start the tasks.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or either channel
    /// cannot be opened. Nothing is spawned in that case.
    pub async fn connect(
        config: &RuntimeConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Notification>), RuntimeError> {
        config.validate()?;
        let (outbound, inbound) = transport::connect(config).await?;
        Self::start(SystemEnv::new(), config, outbound, inbound)
    }
}

impl<E: Environment> ChatRuntime<E> {
    /// Start the tasks over already-open channels.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<W, R>(
        env: E,
        config: &RuntimeConfig,
        outbound: OutboundChannel<W>,
        inbound: InboundChannel<R>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Notification>), RuntimeError>
    where
        W: AsyncWrite + Unpin + Send + 'static,
        R: AsyncRead + Unpin + Send + 'static,
    {
        config.validate()?;
        let identity = ClientIdentity::new(config.identity.trim())?;

        let (queue, outbound_rx) = OutboundQueue::new(config.outbound_capacity);
        let (input_tx, input_rx) = mpsc::channel(config.inbound_capacity);
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let writer = tokio::spawn(run_writer(outbound, outbound_rx));
        let pump = tokio::spawn(run_pump(inbound, input_tx.clone(), cancel.clone()));

        let client = Client::new(env, identity);
        let driver = Driver::new(client, queue, notify_tx, cancel);
        let driver = tokio::spawn(driver.run(input_rx, config.refresh_on_start));

        tracing::info!(identity = %config.identity.trim(), "client runtime started");

        Ok((Self { handle: ChatHandle::new(input_tx), driver, pump, writer }, notify_rx))
    }

    /// A new handle onto the driver queue.
    pub fn handle(&self) -> ChatHandle {
        self.handle.clone()
    }

    /// Leave every joined group, stop all tasks and wait for them.
    pub async fn shutdown(self) -> Result<RuntimeReport<E>, RuntimeError> {
        self.handle.shutdown().await;
        self.join().await
    }

    /// Wait for the tasks to finish.
    ///
    /// Returns once the driver has stopped, either because a handle asked it
    /// to or because every handle and the pump are gone.
    pub async fn join(self) -> Result<RuntimeReport<E>, RuntimeError> {
        drop(self.handle);

        let client = self.driver.await.map_err(|e| RuntimeError::Internal(e.to_string()))?;
        let pump = self.pump.await.map_err(|e| RuntimeError::Internal(e.to_string()))?;
        let writer = self.writer.await.map_err(|e| RuntimeError::Internal(e.to_string()))?;

        tracing::info!(
            forwarded = pump.forwarded,
            decode_errors = pump.decode_errors,
            sent = writer.sent,
            "client runtime stopped"
        );

        Ok(RuntimeReport { client, pump, writer })
    }
}
