use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scope key shared by every one-on-one chat with the bot.
pub const PRIVATE_SCOPE: &str = "private";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// The group, room, or private chat a nickname record belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeId(pub String);

impl ScopeId {
    pub fn private() -> Self {
        Self(PRIVATE_SCOPE.to_owned())
    }

    pub fn is_private(&self) -> bool {
        self.0 == PRIVATE_SCOPE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One registration, keyed by `(user_id, scope_id)`.
///
/// Writing a record for an existing key replaces every other field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NicknameRecord {
    pub user_id: UserId,
    pub scope_id: ScopeId,
    pub nickname: String,
    pub server: String,
    pub note: String,
    pub display_name: String,
    pub updated_at: DateTime<Utc>,
}

impl NicknameRecord {
    /// Note text for display; empty notes render as `無`.
    pub fn note_or_placeholder(&self) -> &str {
        if self.note.is_empty() {
            "無"
        } else {
            &self.note
        }
    }

    /// Case-insensitive substring match over the searchable fields.
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let needle = keyword.to_lowercase();
        [&self.nickname, &self.server, &self.note, &self.display_name]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{NicknameRecord, ScopeId, UserId};

    fn record(note: &str) -> NicknameRecord {
        NicknameRecord {
            user_id: UserId("U1".to_owned()),
            scope_id: ScopeId("C1".to_owned()),
            nickname: "Tank".to_owned(),
            server: "Asgard".to_owned(),
            note: note.to_owned(),
            display_name: "Alice".to_owned(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_note_renders_placeholder() {
        assert_eq!(record("").note_or_placeholder(), "無");
        assert_eq!(record("raid lead").note_or_placeholder(), "raid lead");
    }

    #[test]
    fn keyword_match_ignores_case_across_fields() {
        let record = record("raid lead");
        assert!(record.matches_keyword("asg"));
        assert!(record.matches_keyword("TANK"));
        assert!(record.matches_keyword("Raid"));
        assert!(record.matches_keyword("ali"));
        assert!(!record.matches_keyword("healer"));
    }

    #[test]
    fn private_scope_sentinel() {
        assert!(ScopeId::private().is_private());
        assert!(!ScopeId("C1".to_owned()).is_private());
    }
}
