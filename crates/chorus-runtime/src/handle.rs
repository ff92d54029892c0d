//! Clonable façade over the driver queue.

use chorus_client::Intent;
use tokio::sync::{mpsc, oneshot};

use crate::{
    driver::{DriverInput, GroupsView},
    error::RuntimeError,
};

/// Handle for issuing intents to a running client.
///
/// Every clone feeds the same driver queue, so intents from any task are
/// applied in the order they are enqueued. Each call waits for the driver's
/// verdict but never for the provider.
#[derive(Debug, Clone)]
pub struct ChatHandle {
    tx: mpsc::Sender<DriverInput>,
}

impl ChatHandle {
    pub(crate) fn new(tx: mpsc::Sender<DriverInput>) -> Self {
        Self { tx }
    }

    /// Submit an intent.
    ///
    /// # Errors
    ///
    /// - `Refused` when the client rejects the input
    /// - `OutboundFull` when the envelope could not be queued
    /// - `Stopped` when the driver has exited
    pub async fn intent(&self, intent: Intent) -> Result<(), RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(DriverInput::Intent { intent, reply })
            .await
            .map_err(|_| RuntimeError::Stopped)?;
        rx.await.map_err(|_| RuntimeError::Stopped)?
    }

    /// Ask the provider to create `group`.
    pub async fn create_group(&self, group: impl Into<String>) -> Result<(), RuntimeError> {
        self.intent(Intent::CreateGroup { group: group.into() }).await
    }

    /// Ask the provider to remove `group`.
    pub async fn remove_group(&self, group: impl Into<String>) -> Result<(), RuntimeError> {
        self.intent(Intent::RemoveGroup { group: group.into() }).await
    }

    /// Join `group`.
    pub async fn join_group(&self, group: impl Into<String>) -> Result<(), RuntimeError> {
        self.intent(Intent::JoinGroup { group: group.into() }).await
    }

    /// Leave `group`.
    pub async fn leave_group(&self, group: impl Into<String>) -> Result<(), RuntimeError> {
        self.intent(Intent::LeaveGroup { group: group.into() }).await
    }

    /// Request a fresh group snapshot.
    pub async fn refresh(&self) -> Result<(), RuntimeError> {
        self.intent(Intent::Refresh).await
    }

    /// Send `text` to a joined group.
    pub async fn send_group_message(
        &self,
        group: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<(), RuntimeError> {
        self.intent(Intent::SendGroupMessage { group: group.into(), text: text.into() }).await
    }

    /// Send `text` privately to `peer`.
    pub async fn send_private_message(
        &self,
        peer: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<(), RuntimeError> {
        self.intent(Intent::SendPrivateMessage { peer: peer.into(), text: text.into() }).await
    }

    /// Open the conversation with `peer` without sending anything.
    pub async fn open_session(&self, peer: impl Into<String>) -> Result<(), RuntimeError> {
        self.intent(Intent::OpenSession { peer: peer.into() }).await
    }

    /// Current groups, joined set and sessions.
    pub async fn groups(&self) -> Result<GroupsView, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(DriverInput::Inspect { reply }).await.map_err(|_| RuntimeError::Stopped)?;
        rx.await.map_err(|_| RuntimeError::Stopped)
    }

    /// Request a clean stop. Safe to call any number of times.
    pub async fn shutdown(&self) {
        if self.tx.send(DriverInput::Shutdown).await.is_err() {
            tracing::debug!("shutdown requested after driver exit");
        }
    }

    /// Returns true once the driver has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
