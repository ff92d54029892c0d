//! Single-writer driver.
//!
//! The driver task is the only code that touches [`Client`] state. Inbound
//! envelopes from the pump, user intents from every [`crate::ChatHandle`],
//! and the stop request all arrive on one FIFO queue, so mutations are
//! serialized without locks. Client actions are executed here: sends go to
//! the outbound queue, deliveries become [`Notification`]s, and logs go to
//! `tracing`.

use std::{collections::BTreeSet, ops::ControlFlow};

use chorus_client::{
    Client, ClientAction, ClientEvent, Environment, Intent, LogLevel, LogLine, Snapshot,
};
use chorus_proto::Envelope;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::{error::RuntimeError, outbound::OutboundQueue};

/// Inputs consumed by the driver, in arrival order.
#[derive(Debug)]
pub enum DriverInput {
    /// Envelope forwarded by the pump.
    Inbound(Envelope),
    /// User intent; the outcome is sent back on `reply`.
    Intent {
        /// Requested operation.
        intent: Intent,
        /// Refusal or enqueue failure, if any.
        reply: oneshot::Sender<Result<(), RuntimeError>>,
    },
    /// Read-only view of the current state.
    Inspect {
        /// Receives the view.
        reply: oneshot::Sender<GroupsView>,
    },
    /// The inbound channel is gone; no more envelopes will arrive.
    InboundClosed,
    /// Leave every joined group and stop.
    Shutdown,
}

/// Read-only copy of the client's view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupsView {
    /// Last applied group snapshot.
    pub groups: Snapshot,
    /// Groups the local identity has joined.
    pub joined: BTreeSet<String>,
    /// Peers with an open private session.
    pub sessions: Vec<String>,
}

/// Updates for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Group list or joined set changed.
    GroupsChanged {
        /// New snapshot.
        groups: Snapshot,
        /// New joined set.
        joined: BTreeSet<String>,
    },
    /// Line appended to a group log.
    GroupMessage {
        /// Group.
        group: String,
        /// Appended line.
        line: LogLine,
    },
    /// Line appended to a private session.
    PrivateMessage {
        /// Peer.
        peer: String,
        /// Appended line.
        line: LogLine,
    },
    /// A private session was opened.
    SessionOpened {
        /// Peer.
        peer: String,
    },
    /// The inbound channel closed.
    Disconnected,
    /// The driver has stopped.
    Stopped,
}

/// Owns the client and executes its actions.
pub struct Driver<E: Environment> {
    client: Client<E>,
    outbound: Option<OutboundQueue>,
    notifications: mpsc::UnboundedSender<Notification>,
    pump_cancel: CancellationToken,
    stopped: bool,
}

impl<E: Environment> Driver<E> {
    /// Create a driver around a fresh client.
    pub fn new(
        client: Client<E>,
        outbound: OutboundQueue,
        notifications: mpsc::UnboundedSender<Notification>,
        pump_cancel: CancellationToken,
    ) -> Self {
        Self { client, outbound: Some(outbound), notifications, pump_cancel, stopped: false }
    }

    /// Consume inputs until shutdown, then hand the client back.
    ///
    /// If every producer disappears without a stop request, the driver runs
    /// the shutdown sequence itself.
    pub async fn run(
        mut self,
        mut inputs: mpsc::Receiver<DriverInput>,
        refresh: bool,
    ) -> Client<E> {
        if refresh && let Err(e) = self.submit(Intent::Refresh) {
            tracing::warn!("initial refresh failed: {}", e);
        }

        while let Some(input) = inputs.recv().await {
            if self.step(input).is_break() {
                break;
            }
        }

        if !self.stopped {
            tracing::debug!("driver queue closed without stop request");
            self.shutdown();
        }

        self.client
    }

    /// Process one input.
    pub fn step(&mut self, input: DriverInput) -> ControlFlow<()> {
        match input {
            DriverInput::Inbound(envelope) => {
                match self.client.handle(ClientEvent::Inbound(envelope)) {
                    Ok(actions) => {
                        if let Err(e) = self.execute(actions) {
                            tracing::warn!("inbound side effect failed: {}", e);
                        }
                    },
                    Err(e) => tracing::warn!("inbound envelope rejected: {}", e),
                }
            },
            DriverInput::Intent { intent, reply } => {
                let result = self.submit(intent);
                if let Err(e) = &result {
                    tracing::debug!("intent refused: {}", e);
                }
                let _ = reply.send(result);
            },
            DriverInput::Inspect { reply } => {
                let _ = reply.send(self.view());
            },
            DriverInput::InboundClosed => {
                tracing::warn!("inbound channel closed; no further updates will arrive");
                self.notify(Notification::Disconnected);
            },
            DriverInput::Shutdown => self.shutdown(),
        }

        if self.stopped { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
    }

    /// Current view of groups and sessions.
    pub fn view(&self) -> GroupsView {
        GroupsView {
            groups: self.client.groups().clone(),
            joined: self.client.joined().clone(),
            sessions: self.client.sessions().peers().into_iter().map(str::to_string).collect(),
        }
    }

    /// The client owned by this driver.
    pub fn client(&self) -> &Client<E> {
        &self.client
    }

    fn submit(&mut self, intent: Intent) -> Result<(), RuntimeError> {
        let actions = self.client.handle(ClientEvent::Intent(intent))?;
        self.execute(actions)
    }

    fn shutdown(&mut self) {
        match self.client.handle(ClientEvent::Shutdown) {
            Ok(actions) => {
                if let Err(e) = self.execute(actions) {
                    tracing::warn!("shutdown side effect failed: {}", e);
                }
            },
            Err(e) => tracing::error!("shutdown failed: {}", e),
        }
        // A repeated stop yields no actions; make sure the loop still ends.
        self.finish();
    }

    fn finish(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.outbound = None;
        self.pump_cancel.cancel();
        self.notify(Notification::Stopped);
        tracing::info!("driver stopped");
    }

    /// Execute actions in order. Every action runs; the first send failure is
    /// returned.
    fn execute(&mut self, actions: Vec<ClientAction>) -> Result<(), RuntimeError> {
        let mut first_error = None;

        for action in actions {
            match action {
                ClientAction::Send(envelope) => {
                    if let Err(e) = self.enqueue(envelope) {
                        tracing::warn!("outbound envelope dropped: {}", e);
                        first_error.get_or_insert(e);
                    }
                },
                ClientAction::GroupsChanged => {
                    self.notify(Notification::GroupsChanged {
                        groups: self.client.groups().clone(),
                        joined: self.client.joined().clone(),
                    });
                },
                ClientAction::DeliverGroupMessage { group, line } => {
                    self.notify(Notification::GroupMessage { group, line });
                },
                ClientAction::DeliverPrivateMessage { peer, line } => {
                    self.notify(Notification::PrivateMessage { peer, line });
                },
                ClientAction::SessionOpened { peer } => {
                    self.notify(Notification::SessionOpened { peer });
                },
                ClientAction::Log { level, message } => match level {
                    LogLevel::Debug => tracing::debug!("{}", message),
                    LogLevel::Info => tracing::info!("{}", message),
                    LogLevel::Warn => tracing::warn!("{}", message),
                    LogLevel::Error => tracing::error!("{}", message),
                },
                ClientAction::Shutdown => self.finish(),
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn enqueue(&self, envelope: Envelope) -> Result<(), RuntimeError> {
        match &self.outbound {
            Some(queue) => queue.enqueue(envelope),
            None => Err(RuntimeError::Stopped),
        }
    }

    fn notify(&self, notification: Notification) {
        // The renderer may already be gone during teardown.
        let _ = self.notifications.send(notification);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
        time::{Duration, SystemTime},
    };

    use chorus_client::{ClientError, ClientIdentity};
    use chorus_proto::{Action, Command, Lifecycle};

    use super::*;

    #[derive(Clone, Default)]
    struct CountingEnv(Arc<AtomicU64>);

    impl Environment for CountingEnv {
        fn now(&self) -> SystemTime {
            SystemTime::UNIX_EPOCH + Duration::from_secs(1_000)
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            let n = self.0.fetch_add(1, Ordering::Relaxed).to_be_bytes();
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = n[i % n.len()];
            }
        }
    }

    struct Fixture {
        driver: Driver<CountingEnv>,
        sent: mpsc::Receiver<Envelope>,
        notes: mpsc::UnboundedReceiver<Notification>,
        cancel: CancellationToken,
    }

    fn fixture(capacity: usize) -> Fixture {
        let identity = ClientIdentity::new("alice").unwrap();
        let client = Client::new(CountingEnv::default(), identity);
        let (queue, sent) = OutboundQueue::new(capacity);
        let (tx, notes) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let driver = Driver::new(client, queue, tx, cancel.clone());
        Fixture { driver, sent, notes, cancel }
    }

    fn intent(driver: &mut Driver<CountingEnv>, intent: Intent) -> Result<(), RuntimeError> {
        let (reply, mut rx) = oneshot::channel();
        let _ = driver.step(DriverInput::Intent { intent, reply });
        rx.try_recv().unwrap()
    }

    fn snapshot(groups: &[(&str, &[&str])]) -> Envelope {
        Envelope::snapshot(
            groups
                .iter()
                .map(|(g, m)| (g.to_string(), m.iter().map(|s| s.to_string()).collect()))
                .collect(),
        )
    }

    #[test]
    fn snapshot_notifies_groups_changed() {
        let mut f = fixture(8);

        let flow = f.driver.step(DriverInput::Inbound(snapshot(&[("dev", &[])])));

        assert!(flow.is_continue());
        match f.notes.try_recv().unwrap() {
            Notification::GroupsChanged { groups, joined } => {
                assert!(groups.contains_key("dev"));
                assert!(joined.is_empty());
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn refused_intent_reports_client_error() {
        let mut f = fixture(8);

        let result = intent(&mut f.driver, Intent::JoinGroup { group: "nope".to_string() });

        assert!(matches!(
            result,
            Err(RuntimeError::Refused(ClientError::UnknownGroup { .. }))
        ));
        assert!(f.sent.try_recv().is_err());
    }

    #[test]
    fn full_outbound_queue_is_reported_to_caller() {
        let mut f = fixture(1);

        intent(&mut f.driver, Intent::Refresh).unwrap();
        let result = intent(&mut f.driver, Intent::Refresh);

        assert!(matches!(result, Err(RuntimeError::OutboundFull { kind: "command" })));
    }

    #[test]
    fn shutdown_leaves_joined_groups_then_stops() {
        let mut f = fixture(8);
        let joined = Lifecycle::Joined { group: "dev".to_string(), actor: "alice".to_string() };
        let _ = f.driver.step(DriverInput::Inbound(snapshot(&[("dev", &[])])));
        let _ = f.driver.step(DriverInput::Inbound(Envelope::lifecycle(joined)));
        assert!(f.driver.client().is_joined("dev"));

        let flow = f.driver.step(DriverInput::Shutdown);

        assert!(flow.is_break());
        assert!(f.cancel.is_cancelled());
        match f.sent.try_recv().unwrap() {
            Envelope::Command(Command { action, group, .. }) => {
                assert_eq!(action, Action::Leave);
                assert_eq!(group.as_deref(), Some("dev"));
            },
            other => panic!("unexpected {other:?}"),
        }
        let notes: Vec<_> = std::iter::from_fn(|| f.notes.try_recv().ok()).collect();
        assert_eq!(notes.last(), Some(&Notification::Stopped));
    }

    #[test]
    fn intents_after_shutdown_are_refused() {
        let mut f = fixture(8);
        let _ = f.driver.step(DriverInput::Shutdown);

        let result = intent(&mut f.driver, Intent::Refresh);

        assert!(matches!(result, Err(RuntimeError::Refused(ClientError::ShuttingDown))));
    }

    #[tokio::test]
    async fn run_stops_itself_when_producers_vanish() {
        let f = fixture(8);
        let (tx, rx) = mpsc::channel(4);
        drop(tx);

        let client = f.driver.run(rx, false).await;

        assert!(client.is_shutting_down());
        assert!(f.cancel.is_cancelled());
    }
}
