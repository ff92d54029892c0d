//! Line-oriented terminal front end.
//!
//! Parses `/command` lines into intents and renders notifications as plain
//! text. Kept free of I/O so the binary stays a thin loop.

use std::{
    fmt::Write as _,
    time::{SystemTime, UNIX_EPOCH},
};

use chorus_client::{Intent, LogLine};
use chorus_proto::RESERVED_GROUP_NAME;
use thiserror::Error;

use crate::driver::{GroupsView, Notification};

/// Help text printed by `/help` and after an unknown command.
pub const HELP: &str = "\
commands:
  /create <group>       create a group
  /remove <group>       remove a group
  /join <group>         join a group
  /leave <group>        leave a group
  /refresh              request the group list
  /groups               show groups, joined set and sessions
  /say <group> <text>   send to a joined group
  /msg <peer> <text>    send a private message
  /open <peer>          open a private session
  /quit                 leave all groups and exit";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Forward to the client.
    Intent(Intent),
    /// Print the current view.
    ShowGroups,
    /// Print the help text.
    Help,
    /// Stop the runtime.
    Quit,
}

/// Console input errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    /// Line did not start with `/`.
    #[error("commands start with '/', try /help")]
    NotACommand,

    /// Unrecognized command word.
    #[error("unknown command /{0}, try /help")]
    Unknown(String),

    /// A required argument was missing.
    #[error("/{command} needs <{argument}>")]
    MissingArgument {
        /// Command word.
        command: &'static str,
        /// Missing argument name.
        argument: &'static str,
    },
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, ConsoleError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Err(ConsoleError::NotACommand);
    };

    let (word, args) = split_word(rest);
    let command = match word {
        "create" => Intent::CreateGroup { group: arg("create", "group", args)? },
        "remove" => Intent::RemoveGroup { group: arg("remove", "group", args)? },
        "join" => Intent::JoinGroup { group: arg("join", "group", args)? },
        "leave" => Intent::LeaveGroup { group: arg("leave", "group", args)? },
        "refresh" => Intent::Refresh,
        "open" => Intent::OpenSession { peer: arg("open", "peer", args)? },
        "say" => {
            let (group, text) = split_word(args);
            Intent::SendGroupMessage {
                group: arg("say", "group", group)?,
                text: arg("say", "text", text)?,
            }
        },
        "msg" => {
            let (peer, text) = split_word(args);
            Intent::SendPrivateMessage {
                peer: arg("msg", "peer", peer)?,
                text: arg("msg", "text", text)?,
            }
        },
        "groups" => return Ok(Some(ConsoleCommand::ShowGroups)),
        "help" => return Ok(Some(ConsoleCommand::Help)),
        "quit" | "exit" => return Ok(Some(ConsoleCommand::Quit)),
        other => return Err(ConsoleError::Unknown(other.to_string())),
    };

    Ok(Some(ConsoleCommand::Intent(command)))
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (s, ""),
    }
}

fn arg(
    command: &'static str,
    argument: &'static str,
    value: &str,
) -> Result<String, ConsoleError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConsoleError::MissingArgument { command, argument });
    }
    Ok(value.to_string())
}

/// Render a notification, or `None` for ones the console does not show.
pub fn render_notification(notification: &Notification) -> Option<String> {
    match notification {
        Notification::GroupsChanged { groups, joined } => {
            let names: Vec<String> = groups
                .keys()
                .map(|g| if joined.contains(g) { format!("*{g}") } else { g.clone() })
                .collect();
            let list =
                if names.is_empty() { RESERVED_GROUP_NAME.to_string() } else { names.join(" ") };
            Some(format!("-- groups: {list}"))
        },
        Notification::GroupMessage { group, line } => {
            Some(format!("[#{group}] {}", line_text(line)))
        },
        Notification::PrivateMessage { peer, line } => {
            Some(format!("[@{peer}] {}", line_text(line)))
        },
        Notification::SessionOpened { peer } => Some(format!("-- private session with {peer}")),
        Notification::Disconnected => Some("-- disconnected from provider".to_string()),
        Notification::Stopped => None,
    }
}

/// Render the full view printed by `/groups`.
pub fn render_view(view: &GroupsView) -> String {
    let mut out = String::new();
    if view.groups.is_empty() {
        let _ = writeln!(out, "  {RESERVED_GROUP_NAME}");
    }
    for (group, members) in &view.groups {
        let marker = if view.joined.contains(group) { '*' } else { ' ' };
        let members = members.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
        let _ = writeln!(out, "{marker} {group} [{members}]");
    }
    if !view.sessions.is_empty() {
        let _ = writeln!(out, "sessions: {}", view.sessions.join(", "));
    }
    out.truncate(out.trim_end().len());
    out
}

fn line_text(line: &LogLine) -> String {
    format!("{} <{}> {}", clock(line.at), line.sender, line.text)
}

/// `HH:MM:SS` in UTC.
fn clock(at: SystemTime) -> String {
    let secs = at.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs()) % 86_400;
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}
