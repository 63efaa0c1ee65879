//! Service layer API for the approval workflow
//!
//! One entry point per use case. Every mutating call follows the same shape:
//! load the current request, resolve the actor's authority, validate the
//! transition, then hand the previously-read status and revision to the
//! store. A stale read surfaces as `Conflict`; nothing is ever written on a
//! failed validation or authorization check.
use tracing::{info, warn};

use crate::audit::{self, ActionKind, FinanceAction};
use crate::authz::{ActorAuthority, ActorIdentity, AuthorityResolver};
use crate::error::{ValidationError, WorkflowError};
use crate::inbox::{self, Inbox, InboxOptions};
use crate::registry::{RequestStatus, Role};
use crate::request::{FinanceRequest, RequestDraft};
use crate::store::RequestStore;

pub struct WorkflowService<S: RequestStore> {
    store: S,
}

impl<S: RequestStore> WorkflowService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn authority_for(&self, person_id: &str) -> Result<ActorAuthority, WorkflowError> {
        let resolver = AuthorityResolver::new(
            self.store.list_role_assignments()?,
            self.store.list_group_memberships()?,
        );
        Ok(resolver.resolve(person_id))
    }

    fn unauthorized(person_id: &str, request: &FinanceRequest) -> WorkflowError {
        WorkflowError::Authorization {
            person_id: person_id.to_string(),
            request_id: request.id.clone(),
            status: request.status,
        }
    }

    /// Create a new request in `draft` status. Not a workflow action, so no
    /// audit row is written; the trail starts at first submit.
    pub fn create_draft(
        &self,
        draft: RequestDraft,
        actor: &ActorIdentity,
    ) -> Result<FinanceRequest, WorkflowError> {
        let request = self.store.create_request(draft, actor)?;
        info!(request_id = %request.id, applicant = %actor.person_id, "draft created");
        Ok(request)
    }

    /// `draft/returned -> pending_lead`, applicant only. Re-submission after
    /// a return restarts at the head of the queue, never at the stage that
    /// returned it.
    pub fn submit(
        &self,
        id: &str,
        actor: &ActorIdentity,
        note: Option<String>,
    ) -> Result<FinanceRequest, WorkflowError> {
        self.submit_inner(id, None, actor, note, ActionKind::Submit)
    }

    /// Apply field edits and resubmit in one step. Only the applicant may
    /// edit, and only while the request is in `draft` or `returned`.
    pub fn update(
        &self,
        id: &str,
        edits: RequestDraft,
        actor: &ActorIdentity,
        note: Option<String>,
    ) -> Result<FinanceRequest, WorkflowError> {
        self.submit_inner(id, Some(edits), actor, note, ActionKind::Update)
    }

    fn submit_inner(
        &self,
        id: &str,
        edits: Option<RequestDraft>,
        actor: &ActorIdentity,
        note: Option<String>,
        kind: ActionKind,
    ) -> Result<FinanceRequest, WorkflowError> {
        let request = self.store.get_request(id)?;

        if request.status.is_terminal() {
            return Err(WorkflowError::TerminalState {
                id: request.id,
                status: request.status,
            });
        }
        if request.applicant_id != actor.person_id {
            warn!(request_id = %id, person = %actor.person_id, "submit by non-applicant rejected");
            return Err(Self::unauthorized(&actor.person_id, &request));
        }
        if !matches!(request.status, RequestStatus::Draft | RequestStatus::Returned) {
            // mutation ownership sits with the awaited approver while pending
            return Err(Self::unauthorized(&actor.person_id, &request));
        }

        let mut updated = request.clone();
        if let Some(edits) = edits {
            // the type is frozen once the request has ever been submitted
            if updated.revision > 0 {
                if let Some(new_type) = edits.request_type() {
                    if new_type != updated.request_type {
                        return Err(ValidationError::TypeChange.into());
                    }
                }
            }
            edits.apply_to(&mut updated);
        }
        updated.validate_for_submit()?;
        updated.status = RequestStatus::PendingLead;
        updated.revision += 1;

        let action = FinanceAction::new(id, kind, None, &actor.name, note);
        info!(request_id = %id, from = %request.status, to = %updated.status, action = %kind, "request submitted");
        self.store.persist_transition(updated, request.status, action)
    }

    /// Advance one stage. `acting_role` is the actor's explicitly chosen
    /// lens; it must be exactly the role the current status awaits.
    pub fn approve(
        &self,
        id: &str,
        actor: &ActorIdentity,
        acting_role: Role,
        note: Option<String>,
    ) -> Result<FinanceRequest, WorkflowError> {
        let (request, next) = self.gate_stage_action(id, actor, acting_role)?;
        let next_status = match next {
            Some(status) => status,
            None => return Err(Self::unauthorized(&actor.person_id, &request)),
        };

        let mut updated = request.clone();
        updated.status = next_status;
        updated.revision += 1;

        let action = FinanceAction::new(id, ActionKind::Approve, Some(acting_role), &actor.name, note);
        info!(request_id = %id, from = %request.status, to = %next_status, role = %acting_role, "approved");
        self.store.persist_transition(updated, request.status, action)
    }

    /// Send the request back to the applicant. Resets to `returned` rather
    /// than one step back; the originating stage is recorded in the audit
    /// note so the reset is diagnosable.
    pub fn return_to_applicant(
        &self,
        id: &str,
        actor: &ActorIdentity,
        acting_role: Role,
        note: Option<String>,
    ) -> Result<FinanceRequest, WorkflowError> {
        let (request, _) = self.gate_stage_action(id, actor, acting_role)?;

        let mut updated = request.clone();
        updated.status = RequestStatus::Returned;
        updated.revision += 1;

        let stage_note = match note {
            Some(text) => format!("{text} (returned from {})", request.status),
            None => format!("returned from {}", request.status),
        };
        let action = FinanceAction::new(
            id,
            ActionKind::Return,
            Some(acting_role),
            &actor.name,
            Some(stage_note),
        );
        info!(request_id = %id, from = %request.status, role = %acting_role, "returned to applicant");
        self.store.persist_transition(updated, request.status, action)
    }

    /// Shared gate for approve/return: terminal check, awaited-role lookup,
    /// and group-scoped authorization of the chosen active role.
    fn gate_stage_action(
        &self,
        id: &str,
        actor: &ActorIdentity,
        acting_role: Role,
    ) -> Result<(FinanceRequest, Option<RequestStatus>), WorkflowError> {
        let request = self.store.get_request(id)?;

        if request.status.is_terminal() {
            return Err(WorkflowError::TerminalState {
                id: request.id,
                status: request.status,
            });
        }
        let awaited = match request.status.awaited_role() {
            Some(role) => role,
            None => return Err(Self::unauthorized(&actor.person_id, &request)),
        };
        if acting_role != awaited {
            warn!(request_id = %id, person = %actor.person_id, acting = %acting_role, awaited = %awaited,
                "active role does not match awaited role");
            return Err(Self::unauthorized(&actor.person_id, &request));
        }

        let authority = self.authority_for(&actor.person_id)?;
        if !authority.may_act_as(acting_role, &request) {
            warn!(request_id = %id, person = %actor.person_id, acting = %acting_role,
                "actor lacks authority for awaited role");
            return Err(Self::unauthorized(&actor.person_id, &request));
        }

        let next = request.status.next_on_approve();
        Ok((request, next))
    }

    /// `pending_* -> withdrawn`, applicant only. Not available from `draft`
    /// or `returned` (nothing is in flight) nor from terminal statuses.
    pub fn withdraw(
        &self,
        id: &str,
        actor: &ActorIdentity,
        note: Option<String>,
    ) -> Result<FinanceRequest, WorkflowError> {
        let request = self.store.get_request(id)?;

        if request.status.is_terminal() {
            return Err(WorkflowError::TerminalState {
                id: request.id,
                status: request.status,
            });
        }
        if request.applicant_id != actor.person_id {
            return Err(Self::unauthorized(&actor.person_id, &request));
        }
        if !request.status.is_pending() {
            return Err(Self::unauthorized(&actor.person_id, &request));
        }

        let mut updated = request.clone();
        updated.status = RequestStatus::Withdrawn;
        updated.revision += 1;

        let action = FinanceAction::new(id, ActionKind::Withdraw, None, &actor.name, note);
        info!(request_id = %id, from = %request.status, "withdrawn");
        self.store.persist_transition(updated, request.status, action)
    }

    /// Partition the full request list into the actor's inbox views.
    pub fn compute_inbox(
        &self,
        actor: &ActorIdentity,
        options: &InboxOptions,
    ) -> Result<Inbox, WorkflowError> {
        let authority = self.authority_for(&actor.person_id)?;
        let requests = self.store.list_requests()?;
        Ok(inbox::compose(requests, &authority, options))
    }

    /// Full audit trail for a request, newest first.
    pub fn history(&self, id: &str) -> Result<Vec<FinanceAction>, WorkflowError> {
        // surface NotFound for unknown ids rather than an empty trail
        self.store.get_request(id)?;
        Ok(audit::display_order(self.store.list_actions(id)?))
    }
}
