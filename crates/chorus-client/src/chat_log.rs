//! Append-only conversation log.

use std::collections::HashSet;

use crate::event::LogLine;

/// Ordered lines of one conversation.
///
/// Lines carrying a correlation id are appended at most once. Lines without
/// one are always appended: the provider contract has no id field, so a
/// duplicated id-less message cannot be told apart from the sender repeating
/// the same text, and it shows up twice.
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    lines: Vec<LogLine>,
    seen_ids: HashSet<String>,
}

impl ChatLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line. Returns `false` if its id was already appended.
    pub fn append(&mut self, line: LogLine) -> bool {
        if let Some(id) = &line.id
            && !self.seen_ids.insert(id.clone())
        {
            return false;
        }

        self.lines.push(line);
        true
    }

    /// Lines in append order.
    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the log has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn line(text: &str, id: Option<&str>) -> LogLine {
        LogLine {
            sender: "alice".to_string(),
            text: text.to_string(),
            at: SystemTime::UNIX_EPOCH,
            id: id.map(str::to_string),
        }
    }

    #[test]
    fn duplicate_id_is_dropped() {
        let mut log = ChatLog::new();
        assert!(log.append(line("hi", Some("01"))));
        assert!(!log.append(line("hi", Some("01"))));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn lines_without_id_always_append() {
        let mut log = ChatLog::new();
        assert!(log.append(line("hi", None)));
        assert!(log.append(line("hi", None)));
        assert_eq!(log.len(), 2);
    }
}
