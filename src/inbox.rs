//! Inbox composer
//!
//! Partitions the flat request list into three views for one actor:
//! actionable-now, in-progress-elsewhere, and completed. Pure function over
//! the store's data; actionability comes from the authorization resolver and
//! is never widened by mere visibility.
use crate::authz::ActorAuthority;
use crate::registry::{RequestStatus, Role};
use crate::request::FinanceRequest;

#[derive(Debug, Clone, Default)]
pub struct InboxOptions {
    /// Show every closed request instead of only the relevant ones.
    pub include_all_closed: bool,
    /// Group whose plain members get the broader-visibility carve-out.
    pub privileged_group: Option<String>,
}

#[derive(Debug, Default)]
pub struct Inbox {
    pub actionable: Vec<FinanceRequest>,
    pub in_progress: Vec<FinanceRequest>,
    pub completed: Vec<FinanceRequest>,
}

pub fn compose(
    requests: Vec<FinanceRequest>,
    authority: &ActorAuthority,
    options: &InboxOptions,
) -> Inbox {
    // carve-out: in the privileged group with no individual authority at
    // all -> every pending request is visible, none actionable
    if let Some(group) = &options.privileged_group {
        if authority.is_group_privileged(group) {
            let mut in_progress: Vec<FinanceRequest> = requests
                .into_iter()
                .filter(|request| request.status.is_pending())
                .collect();
            newest_first(&mut in_progress);
            return Inbox {
                in_progress,
                ..Inbox::default()
            };
        }
    }

    let mut inbox = Inbox::default();
    for request in requests {
        match request.status {
            // drafts are not yet visible to approvers, withdrawn ones are gone
            RequestStatus::Draft | RequestStatus::Withdrawn => continue,
            RequestStatus::Closed => {
                if options.include_all_closed || is_relevant(authority, &request) {
                    inbox.completed.push(request);
                }
            }
            _ => {
                if authority.actionable_role(&request).is_some() {
                    inbox.actionable.push(request);
                } else if is_relevant(authority, &request) {
                    inbox.in_progress.push(request);
                }
            }
        }
    }

    newest_first(&mut inbox.actionable);
    newest_first(&mut inbox.in_progress);
    newest_first(&mut inbox.completed);
    inbox
}

/// Would any of the actor's roles ever have to act on this request?
/// A non-lead stage role touches every request; lead authority only touches
/// its scoped departments; auditors see everything.
fn is_relevant(authority: &ActorAuthority, request: &FinanceRequest) -> bool {
    if authority.can_view_all() {
        return true;
    }
    if authority
        .roles
        .iter()
        .any(|role| role.is_stage() && *role != Role::Lead)
    {
        return true;
    }
    authority.leads_group(&request.applicant_department)
}

fn newest_first(requests: &mut [FinanceRequest]) {
    requests.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}
