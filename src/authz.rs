//! Authorization resolver
//!
//! A person's authority is the union of two sources that are kept distinct:
//! the explicit role-assignment table (rep, committee, accounting, cashier,
//! auditor) and group-structural lead authority (a lead/deputy membership in
//! group G authorizes acting as `lead` for requests whose applicant
//! department is G). Lead is never granted through the assignment table.
use std::collections::BTreeSet;

use crate::registry::Role;
use crate::request::FinanceRequest;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRole {
    #[n(0)]
    Lead,
    #[n(1)]
    Deputy,
    #[n(2)]
    Member,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub person_id: String,
    #[n(2)]
    pub person_name: String,
    #[n(3)]
    pub person_email: String,
    #[n(4)]
    pub role: Role,
    #[n(5)]
    pub notes: Option<String>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct GroupMembership {
    #[n(0)]
    pub person_id: String,
    #[n(1)]
    pub group_id: String,
    #[n(2)]
    pub role_in_group: GroupRole,
}

/// Already-resolved identity of the person driving a call. Identity
/// resolution itself (sign-in) happens outside the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorIdentity {
    pub person_id: String,
    pub name: String,
    pub email: String,
}

impl ActorIdentity {
    pub fn new(person_id: &str, name: &str, email: &str) -> Self {
        Self {
            person_id: person_id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
        }
    }
}

/// The resolved authority of one person: which roles they may act through
/// and which groups scope their lead authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorAuthority {
    pub person_id: String,
    pub roles: BTreeSet<Role>,
    pub lead_groups: BTreeSet<String>,
    pub member_groups: BTreeSet<String>,
    pub has_assignment: bool,
}

impl ActorAuthority {
    pub fn holds(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn leads_group(&self, group_id: &str) -> bool {
        self.lead_groups.contains(group_id)
    }

    /// The role through which this person may act on the request right now,
    /// if any. Auditor never comes back here: visibility is not
    /// actionability.
    pub fn actionable_role(&self, request: &FinanceRequest) -> Option<Role> {
        let awaited = request.status.awaited_role()?;
        if !self.holds(awaited) {
            return None;
        }
        if awaited == Role::Lead && !self.leads_group(&request.applicant_department) {
            return None;
        }

        Some(awaited)
    }

    /// Whether acting through `role` on this request is allowed. The active
    /// role is always an explicit caller choice, never ambient state.
    pub fn may_act_as(&self, role: Role, request: &FinanceRequest) -> bool {
        self.actionable_role(request) == Some(role)
    }

    /// Auditors see everything, read-only.
    pub fn can_view_all(&self) -> bool {
        self.holds(Role::Auditor)
    }

    /// The broader-visibility carve-out: a person inside the privileged
    /// group who holds no individual authority at all sees every pending
    /// request, read-only.
    pub fn is_group_privileged(&self, privileged_group: &str) -> bool {
        !self.has_assignment
            && self.lead_groups.is_empty()
            && self.member_groups.contains(privileged_group)
    }
}

/// Pure resolver over the two grant sources. Built once per call from the
/// store's current assignment and membership lists.
#[derive(Debug, Clone, Default)]
pub struct AuthorityResolver {
    assignments: Vec<RoleAssignment>,
    memberships: Vec<GroupMembership>,
}

impl AuthorityResolver {
    pub fn new(assignments: Vec<RoleAssignment>, memberships: Vec<GroupMembership>) -> Self {
        Self {
            assignments,
            memberships,
        }
    }

    pub fn resolve(&self, person_id: &str) -> ActorAuthority {
        let mut roles = BTreeSet::new();
        let mut has_assignment = false;

        for assignment in &self.assignments {
            if assignment.person_id != person_id {
                continue;
            }
            has_assignment = true;
            // lead authority only ever derives from group structure
            if assignment.role != Role::Lead {
                roles.insert(assignment.role);
            }
        }

        let mut lead_groups = BTreeSet::new();
        let mut member_groups = BTreeSet::new();
        for membership in &self.memberships {
            if membership.person_id != person_id {
                continue;
            }
            member_groups.insert(membership.group_id.clone());
            if matches!(membership.role_in_group, GroupRole::Lead | GroupRole::Deputy) {
                lead_groups.insert(membership.group_id.clone());
            }
        }
        if !lead_groups.is_empty() {
            roles.insert(Role::Lead);
        }

        ActorAuthority {
            person_id: person_id.to_string(),
            roles,
            lead_groups,
            member_groups,
            has_assignment,
        }
    }
}
