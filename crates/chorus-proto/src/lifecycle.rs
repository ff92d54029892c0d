//! Structured group lifecycle events.
//!
//! Providers describe group transitions with a human readable sentence such as
//! `"alice joined group dev."`. Chorus carries the transition as a tagged
//! [`Lifecycle`] value instead. Frames that only carry the sentence are
//! converted once, at decode time, by [`Lifecycle::from_legacy_text`]; nothing
//! past the protocol boundary inspects the text again.

use serde::{Deserialize, Serialize};

const JOINED_MARKER: &str = " joined group ";
const LEFT_MARKER: &str = " left group ";

/// A group lifecycle transition reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Lifecycle {
    /// A group was created.
    Created {
        /// Group name, when the provider reported one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<String>,
        /// Identity that created the group.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actor: Option<String>,
    },

    /// A group was removed.
    Removed {
        /// Group name, when the provider reported one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<String>,
        /// Identity that removed the group.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actor: Option<String>,
    },

    /// `actor` joined `group`.
    Joined {
        /// Group that was joined.
        group: String,
        /// Identity that joined.
        actor: String,
    },

    /// `actor` left `group`.
    Left {
        /// Group that was left.
        group: String,
        /// Identity that left.
        actor: String,
    },
}

impl Lifecycle {
    /// Parse a provider sentence into a lifecycle transition.
    ///
    /// Recognised shapes:
    ///
    /// - `"<actor> joined group <group>."`
    /// - `"<actor> left group <group>."`
    /// - any sentence containing the word `created` or `removed`; the group is
    ///   taken from the word following `group` when present
    ///
    /// Returns `None` for anything else.
    pub fn from_legacy_text(text: &str) -> Option<Self> {
        let text = text.trim();

        if let Some((actor, group)) = split_membership(text, JOINED_MARKER) {
            return Some(Self::Joined { group, actor });
        }
        if let Some((actor, group)) = split_membership(text, LEFT_MARKER) {
            return Some(Self::Left { group, actor });
        }

        let words: Vec<&str> = text.split_whitespace().map(strip_punctuation).collect();
        let group = words
            .windows(2)
            .find(|pair| pair[0].eq_ignore_ascii_case("group"))
            .map(|pair| pair[1].to_string())
            .filter(|g| !g.is_empty());

        if words.iter().any(|w| w.eq_ignore_ascii_case("created")) {
            return Some(Self::Created { group, actor: None });
        }
        if words.iter().any(|w| w.eq_ignore_ascii_case("removed")) {
            return Some(Self::Removed { group, actor: None });
        }

        None
    }

    /// Human readable sentence for display.
    ///
    /// Membership transitions render in the same shape that
    /// [`Self::from_legacy_text`] accepts.
    pub fn describe(&self) -> String {
        match self {
            Self::Created { group, .. } => match group {
                Some(group) => format!("Group {group} created."),
                None => "A group was created.".to_string(),
            },
            Self::Removed { group, .. } => match group {
                Some(group) => format!("Group {group} removed."),
                None => "A group was removed.".to_string(),
            },
            Self::Joined { group, actor } => format!("{actor}{JOINED_MARKER}{group}."),
            Self::Left { group, actor } => format!("{actor}{LEFT_MARKER}{group}."),
        }
    }

    /// Group named by the transition, if any.
    pub fn group(&self) -> Option<&str> {
        match self {
            Self::Created { group, .. } | Self::Removed { group, .. } => group.as_deref(),
            Self::Joined { group, .. } | Self::Left { group, .. } => Some(group),
        }
    }
}

/// Split `"<actor><marker><group>."` into `(actor, group)`.
fn split_membership(text: &str, marker: &str) -> Option<(String, String)> {
    let (actor, rest) = text.split_once(marker)?;
    let group = rest.strip_suffix('.').unwrap_or(rest);

    if actor.is_empty() || group.is_empty() || group.contains(char::is_whitespace) {
        return None;
    }

    Some((actor.to_string(), group.to_string()))
}

fn strip_punctuation(word: &str) -> &str {
    word.trim_matches(|c: char| c.is_ascii_punctuation())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_joined_sentence() {
        let parsed = Lifecycle::from_legacy_text("alice joined group dev.");
        assert_eq!(
            parsed,
            Some(Lifecycle::Joined { group: "dev".to_string(), actor: "alice".to_string() })
        );
    }

    #[test]
    fn parses_left_sentence_without_period() {
        let parsed = Lifecycle::from_legacy_text("bob left group ops");
        assert_eq!(
            parsed,
            Some(Lifecycle::Left { group: "ops".to_string(), actor: "bob".to_string() })
        );
    }

    #[test]
    fn parses_created_and_removed_keywords() {
        assert_eq!(
            Lifecycle::from_legacy_text("Group dev created."),
            Some(Lifecycle::Created { group: Some("dev".to_string()), actor: None })
        );
        assert_eq!(
            Lifecycle::from_legacy_text("something was removed"),
            Some(Lifecycle::Removed { group: None, actor: None })
        );
    }

    #[test]
    fn group_named_like_a_keyword_still_joins() {
        let parsed = Lifecycle::from_legacy_text("carol joined group created.");
        assert_eq!(
            parsed,
            Some(Lifecycle::Joined { group: "created".to_string(), actor: "carol".to_string() })
        );
    }

    #[test]
    fn unknown_text_is_ignored() {
        assert_eq!(Lifecycle::from_legacy_text("hello world"), None);
        assert_eq!(Lifecycle::from_legacy_text(""), None);
        assert_eq!(Lifecycle::from_legacy_text(" joined group dev."), None);
        assert_eq!(Lifecycle::from_legacy_text("alice joined group ."), None);
    }

    #[test]
    fn describe_matches_parser() {
        let joined = Lifecycle::Joined { group: "dev".to_string(), actor: "alice".to_string() };
        assert_eq!(joined.describe(), "alice joined group dev.");
        assert_eq!(Lifecycle::from_legacy_text(&joined.describe()), Some(joined));

        let left = Lifecycle::Left { group: "dev".to_string(), actor: "alice".to_string() };
        assert_eq!(Lifecycle::from_legacy_text(&left.describe()), Some(left));
    }

    #[test]
    fn structured_json_shape() {
        let joined = Lifecycle::Joined { group: "dev".to_string(), actor: "alice".to_string() };
        let json = serde_json::to_value(&joined).unwrap();
        assert_eq!(json, serde_json::json!({"action": "joined", "group": "dev", "actor": "alice"}));
    }
}
