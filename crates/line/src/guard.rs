use std::collections::HashSet;

use nickbook_core::config::GuardConfig;

use crate::events::EventSource;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    /// Room and direct sources are never guarded.
    NotApplicable,
    Allowed,
    Rejected { group_id: String },
}

/// Static allow-list of groups the bot may stay in.
#[derive(Clone, Debug, Default)]
pub struct MembershipGuard {
    allowed_groups: HashSet<String>,
    welcome_on_join: bool,
}

impl MembershipGuard {
    pub fn new<I, S>(allowed_groups: I, welcome_on_join: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_groups: allowed_groups.into_iter().map(Into::into).collect(),
            welcome_on_join,
        }
    }

    pub fn from_config(config: &GuardConfig) -> Self {
        Self::new(config.allowed_groups.iter().cloned(), config.welcome_on_join)
    }

    pub fn check(&self, source: &EventSource) -> GuardDecision {
        match source.group_id() {
            None => GuardDecision::NotApplicable,
            Some(group_id) if self.allowed_groups.contains(group_id) => GuardDecision::Allowed,
            Some(group_id) => GuardDecision::Rejected { group_id: group_id.to_owned() },
        }
    }

    pub fn welcome_on_join(&self) -> bool {
        self.welcome_on_join
    }
}
