//! Role/status registry: the canonical approval order and the bijection
//! between approval roles and the pending status each role acts on.
//!
//! Every caller answers "who must act next?" with a single lookup here.
//! Both enums are closed so an added stage is a compile-time-checked change.

use std::fmt;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    #[n(0)]
    Lead,
    #[n(1)]
    Rep,
    #[n(2)]
    Committee,
    #[n(3)]
    Accounting,
    #[n(4)]
    Cashier,
    #[n(5)]
    Auditor,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequestStatus {
    #[n(0)]
    Draft,
    #[n(1)]
    PendingLead,
    #[n(2)]
    PendingRep,
    #[n(3)]
    PendingCommittee,
    #[n(4)]
    PendingAccounting,
    #[n(5)]
    PendingCashier,
    #[n(6)]
    Returned,
    #[n(7)]
    Withdrawn,
    #[n(8)]
    Closed,
}

/// The five approval stages in the order a request walks through them.
pub const APPROVAL_ORDER: [Role; 5] = [
    Role::Lead,
    Role::Rep,
    Role::Committee,
    Role::Accounting,
    Role::Cashier,
];

impl Role {
    /// The status this role acts on. `Auditor` is read-only and awaits nothing.
    pub fn awaiting_status(self) -> Option<RequestStatus> {
        match self {
            Role::Lead => Some(RequestStatus::PendingLead),
            Role::Rep => Some(RequestStatus::PendingRep),
            Role::Committee => Some(RequestStatus::PendingCommittee),
            Role::Accounting => Some(RequestStatus::PendingAccounting),
            Role::Cashier => Some(RequestStatus::PendingCashier),
            Role::Auditor => None,
        }
    }

    /// Whether this role is one of the five sequential approval stages.
    pub fn is_stage(self) -> bool {
        !matches!(self, Role::Auditor)
    }
}

impl RequestStatus {
    /// The role that must act next, if any. `Draft`/`Returned` belong to the
    /// applicant and terminal statuses belong to nobody.
    pub fn awaited_role(self) -> Option<Role> {
        match self {
            RequestStatus::PendingLead => Some(Role::Lead),
            RequestStatus::PendingRep => Some(Role::Rep),
            RequestStatus::PendingCommittee => Some(Role::Committee),
            RequestStatus::PendingAccounting => Some(Role::Accounting),
            RequestStatus::PendingCashier => Some(Role::Cashier),
            RequestStatus::Draft
            | RequestStatus::Returned
            | RequestStatus::Withdrawn
            | RequestStatus::Closed => None,
        }
    }

    /// The status an approval at this stage advances to. `None` when no
    /// approve transition is defined here.
    pub fn next_on_approve(self) -> Option<RequestStatus> {
        match self {
            RequestStatus::PendingLead => Some(RequestStatus::PendingRep),
            RequestStatus::PendingRep => Some(RequestStatus::PendingCommittee),
            RequestStatus::PendingCommittee => Some(RequestStatus::PendingAccounting),
            RequestStatus::PendingAccounting => Some(RequestStatus::PendingCashier),
            RequestStatus::PendingCashier => Some(RequestStatus::Closed),
            RequestStatus::Draft
            | RequestStatus::Returned
            | RequestStatus::Withdrawn
            | RequestStatus::Closed => None,
        }
    }

    pub fn is_pending(self) -> bool {
        self.awaited_role().is_some()
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Closed | RequestStatus::Withdrawn)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Lead => "lead",
            Role::Rep => "rep",
            Role::Committee => "committee",
            Role::Accounting => "accounting",
            Role::Cashier => "cashier",
            Role::Auditor => "auditor",
        };
        f.write_str(name)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestStatus::Draft => "draft",
            RequestStatus::PendingLead => "pending_lead",
            RequestStatus::PendingRep => "pending_rep",
            RequestStatus::PendingCommittee => "pending_committee",
            RequestStatus::PendingAccounting => "pending_accounting",
            RequestStatus::PendingCashier => "pending_cashier",
            RequestStatus::Returned => "returned",
            RequestStatus::Withdrawn => "withdrawn",
            RequestStatus::Closed => "closed",
        };
        f.write_str(name)
    }
}
