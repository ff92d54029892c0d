//! Command emitter.
//!
//! Pure builders for outbound envelopes. They validate user input and
//! reference nothing but the local identity; state dependent checks (joined,
//! known group) live in [`crate::Client`].

use chorus_proto::{Action, Envelope, is_reserved_group_name};

use crate::{client::ClientIdentity, error::ClientError};

/// Build a command envelope.
///
/// `group` is required for every action except [`Action::Refresh`], which
/// ignores it.
pub fn command(
    identity: &ClientIdentity,
    action: Action,
    group: Option<&str>,
) -> Result<Envelope, ClientError> {
    let group = if action.targets_group() {
        Some(validate_group(group.unwrap_or_default())?.to_string())
    } else {
        None
    };

    Ok(Envelope::command(identity.name(), action, group))
}

/// Build a group chat message. Text is trimmed.
pub fn group_message(
    identity: &ClientIdentity,
    group: &str,
    text: &str,
    id: Option<String>,
) -> Result<Envelope, ClientError> {
    let group = validate_group(group)?;
    let text = validate_text(text)?;

    Ok(Envelope::group_message(identity.name(), group, text, id))
}

/// Build a private message. Text is trimmed; the peer is used verbatim.
pub fn private_message(
    identity: &ClientIdentity,
    peer: &str,
    text: &str,
    id: Option<String>,
) -> Result<Envelope, ClientError> {
    let peer = validate_peer(peer)?;
    let text = validate_text(text)?;

    Ok(Envelope::private_message(identity.name(), peer, text, id))
}

pub(crate) fn validate_group(group: &str) -> Result<&str, ClientError> {
    if group.trim().is_empty() {
        return Err(ClientError::EmptyGroupName);
    }
    if is_reserved_group_name(group) {
        return Err(ClientError::ReservedGroupName { group: group.to_string() });
    }
    Ok(group)
}

pub(crate) fn validate_peer(peer: &str) -> Result<&str, ClientError> {
    if peer.trim().is_empty() {
        return Err(ClientError::EmptyPeer);
    }
    Ok(peer)
}

pub(crate) fn validate_text(text: &str) -> Result<&str, ClientError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ClientError::EmptyMessage);
    }
    Ok(text)
}
