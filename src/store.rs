//! Request store adapter
//!
//! The workflow performs no locking of its own; it hands the previously-read
//! status and revision to `persist_transition`, and the store serializes
//! racing writers inside one sled transaction so exactly one wins and the
//! loser gets a stale-state `Conflict` back.
use std::sync::Arc;

use sled::Db;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError, Transactional,
};

use crate::audit::FinanceAction;
use crate::authz::{ActorIdentity, GroupMembership, RoleAssignment};
use crate::error::WorkflowError;
use crate::registry::RequestStatus;
use crate::request::{FinanceRequest, RequestDraft, TimeStamp};
use crate::utils;

/// Boundary to durable storage. Everything the transition engine and inbox
/// composer need, and nothing about how it is kept.
pub trait RequestStore {
    fn list_requests(&self) -> Result<Vec<FinanceRequest>, WorkflowError>;
    fn get_request(&self, id: &str) -> Result<FinanceRequest, WorkflowError>;
    fn create_request(
        &self,
        draft: RequestDraft,
        applicant: &ActorIdentity,
    ) -> Result<FinanceRequest, WorkflowError>;
    /// Atomically write the updated request and append its audit action.
    /// Fails with `Conflict` (and writes nothing) when the stored status or
    /// revision no longer matches what the caller read.
    fn persist_transition(
        &self,
        updated: FinanceRequest,
        expected_status: RequestStatus,
        action: FinanceAction,
    ) -> Result<FinanceRequest, WorkflowError>;
    /// Actions for one request in canonical replay order (ascending).
    fn list_actions(&self, request_id: &str) -> Result<Vec<FinanceAction>, WorkflowError>;
    fn list_role_assignments(&self) -> Result<Vec<RoleAssignment>, WorkflowError>;
    fn list_group_memberships(&self) -> Result<Vec<GroupMembership>, WorkflowError>;
    fn put_role_assignment(&self, assignment: &RoleAssignment) -> Result<(), WorkflowError>;
    fn put_group_membership(&self, membership: &GroupMembership) -> Result<(), WorkflowError>;
}

/// sled-backed store: one tree per record family. Requests are keyed by id;
/// actions by `"{request_id}:{revision:010}"` so a prefix scan yields replay
/// order without a sort.
pub struct SledStore {
    requests: sled::Tree,
    actions: sled::Tree,
    assignments: sled::Tree,
    memberships: sled::Tree,
}

impl SledStore {
    pub fn new(db: Arc<Db>) -> Result<Self, WorkflowError> {
        Ok(Self {
            requests: db.open_tree("requests")?,
            actions: db.open_tree("actions")?,
            assignments: db.open_tree("assignments")?,
            memberships: db.open_tree("memberships")?,
        })
    }

    fn action_key(request_id: &str, revision: u64) -> String {
        format!("{request_id}:{revision:010}")
    }
}

fn encode_record<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, WorkflowError> {
    minicbor::to_vec(value).map_err(|e| WorkflowError::Codec(e.to_string()))
}

fn decode_record<'b, T: minicbor::Decode<'b, ()>>(bytes: &'b [u8]) -> Result<T, WorkflowError> {
    minicbor::decode(bytes).map_err(|e| WorkflowError::Codec(e.to_string()))
}

impl RequestStore for SledStore {
    fn list_requests(&self) -> Result<Vec<FinanceRequest>, WorkflowError> {
        let mut requests = Vec::new();
        for entry in self.requests.iter() {
            let (_, value) = entry?;
            requests.push(decode_record(&value)?);
        }
        Ok(requests)
    }

    fn get_request(&self, id: &str) -> Result<FinanceRequest, WorkflowError> {
        match self.requests.get(id.as_bytes())? {
            Some(value) => decode_record(&value),
            None => Err(WorkflowError::NotFound { id: id.to_string() }),
        }
    }

    fn create_request(
        &self,
        draft: RequestDraft,
        applicant: &ActorIdentity,
    ) -> Result<FinanceRequest, WorkflowError> {
        let id = utils::mint_id("req_");
        let request = draft.into_request(
            id,
            &applicant.person_id,
            &applicant.name,
            &applicant.email,
        )?;

        self.requests
            .insert(request.id.as_bytes(), encode_record(&request)?)?;

        Ok(request)
    }

    fn persist_transition(
        &self,
        updated: FinanceRequest,
        expected_status: RequestStatus,
        action: FinanceAction,
    ) -> Result<FinanceRequest, WorkflowError> {
        // the store owns both timestamps and the action/revision linkage
        let now = TimeStamp::new();
        let mut updated = updated;
        updated.updated_at = now.clone();
        let mut action = action;
        action.created_at = now;
        action.revision = updated.revision;

        let request_bytes = encode_record(&updated)?;
        let action_bytes = encode_record(&action)?;
        let action_key = Self::action_key(&updated.id, updated.revision);

        let result = (&self.requests, &self.actions).transaction(
            |(requests, actions)| -> ConflictableTransactionResult<FinanceRequest, WorkflowError> {
                let stored_bytes = requests.get(updated.id.as_bytes())?.ok_or_else(|| {
                    ConflictableTransactionError::Abort(WorkflowError::NotFound {
                        id: updated.id.clone(),
                    })
                })?;
                let stored: FinanceRequest =
                    decode_record(&stored_bytes).map_err(ConflictableTransactionError::Abort)?;

                // update-if-unchanged: a mismatch is a loss, never a retry-and-overwrite
                if stored.status != expected_status || stored.revision + 1 != updated.revision {
                    return Err(ConflictableTransactionError::Abort(WorkflowError::Conflict {
                        id: updated.id.clone(),
                        expected: expected_status,
                        found: stored.status,
                    }));
                }

                requests.insert(updated.id.as_bytes(), request_bytes.as_slice())?;
                actions.insert(action_key.as_bytes(), action_bytes.as_slice())?;

                Ok(updated.clone())
            },
        );

        result.map_err(|err| match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => WorkflowError::Store(e),
        })
    }

    fn list_actions(&self, request_id: &str) -> Result<Vec<FinanceAction>, WorkflowError> {
        let prefix = format!("{request_id}:");
        let mut actions = Vec::new();
        for entry in self.actions.scan_prefix(prefix.as_bytes()) {
            let (_, value) = entry?;
            actions.push(decode_record(&value)?);
        }
        Ok(actions)
    }

    fn list_role_assignments(&self) -> Result<Vec<RoleAssignment>, WorkflowError> {
        let mut assignments = Vec::new();
        for entry in self.assignments.iter() {
            let (_, value) = entry?;
            assignments.push(decode_record(&value)?);
        }
        Ok(assignments)
    }

    fn list_group_memberships(&self) -> Result<Vec<GroupMembership>, WorkflowError> {
        let mut memberships = Vec::new();
        for entry in self.memberships.iter() {
            let (_, value) = entry?;
            memberships.push(decode_record(&value)?);
        }
        Ok(memberships)
    }

    fn put_role_assignment(&self, assignment: &RoleAssignment) -> Result<(), WorkflowError> {
        self.assignments
            .insert(assignment.id.as_bytes(), encode_record(assignment)?)?;
        Ok(())
    }

    fn put_group_membership(&self, membership: &GroupMembership) -> Result<(), WorkflowError> {
        let key = format!("{}:{}", membership.person_id, membership.group_id);
        self.memberships
            .insert(key.as_bytes(), encode_record(membership)?)?;
        Ok(())
    }
}
