//! Append-only audit trail entries
//!
//! One `FinanceAction` row is written per successful transition, in the same
//! store transaction as the status update. Rows are never edited or deleted;
//! the canonical replay order is ascending, display order is the reverse.
use std::fmt;

use chrono::Utc;

use crate::registry::Role;
use crate::request::TimeStamp;
use crate::utils;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    #[n(0)]
    Submit,
    #[n(1)]
    Update,
    #[n(2)]
    Approve,
    #[n(3)]
    Return,
    #[n(4)]
    Withdraw,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Submit => "submit",
            ActionKind::Update => "update",
            ActionKind::Approve => "approve",
            ActionKind::Return => "return",
            ActionKind::Withdraw => "withdraw",
        };
        f.write_str(name)
    }
}

/// A single audit entry. `actor_role` is `None` for applicant actions
/// (submit/update/withdraw); `revision` ties the entry to the request
/// revision it produced.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct FinanceAction {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub request_id: String,
    #[n(2)]
    pub action: ActionKind,
    #[n(3)]
    pub actor_role: Option<Role>,
    #[n(4)]
    pub actor_name: String,
    #[n(5)]
    pub actor_note: Option<String>,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
    #[n(7)]
    pub revision: u64,
}

impl FinanceAction {
    /// `created_at` and `revision` here are placeholders; the store stamps
    /// both when the transition is persisted.
    pub fn new(
        request_id: &str,
        action: ActionKind,
        actor_role: Option<Role>,
        actor_name: &str,
        actor_note: Option<String>,
    ) -> Self {
        Self {
            id: utils::mint_id("act_"),
            request_id: request_id.to_string(),
            action,
            actor_role,
            actor_name: actor_name.to_string(),
            actor_note,
            created_at: TimeStamp::new(),
            revision: 0,
        }
    }
}

/// Canonical replay order: ascending revision (equivalently `created_at`).
pub fn replay_order(mut actions: Vec<FinanceAction>) -> Vec<FinanceAction> {
    actions.sort_by_key(|action| action.revision);
    actions
}

/// Display order: newest first.
pub fn display_order(actions: Vec<FinanceAction>) -> Vec<FinanceAction> {
    let mut actions = replay_order(actions);
    actions.reverse();
    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action_at(revision: u64) -> FinanceAction {
        let mut action = FinanceAction::new("req_t", ActionKind::Approve, Some(Role::Rep), "Rin", None);
        action.revision = revision;
        action
    }

    #[test]
    fn replay_and_display_are_reverses() {
        let actions = vec![action_at(3), action_at(1), action_at(2)];

        let replay: Vec<u64> = replay_order(actions.clone())
            .iter()
            .map(|a| a.revision)
            .collect();
        let display: Vec<u64> = display_order(actions).iter().map(|a| a.revision).collect();

        assert_eq!(replay, vec![1, 2, 3]);
        assert_eq!(display, vec![3, 2, 1]);
    }

    #[test]
    fn action_encoding_roundtrip() {
        let original = action_at(5);

        let encoding = minicbor::to_vec(&original).unwrap();
        let decode: FinanceAction = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }
}
