use crate::registry::RequestStatus;

/// Submit-precondition failures. Recoverable: the applicant edits the
/// offending field and resubmits.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("request type must be chosen before a draft is created")]
    MissingType,
    #[error("title is required")]
    MissingTitle,
    #[error("description is required")]
    MissingDescription,
    #[error("category type is required")]
    MissingCategory,
    #[error("applicant department is required")]
    MissingDepartment,
    #[error("the authoritative amount must be positive")]
    NonPositiveAmount,
    #[error("payment requests need a related purchase id or a no-purchase reason")]
    MissingPaymentLink,
    #[error("request type cannot change after first submission")]
    TypeChange,
}

#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{person_id} may not act on request {request_id} at status {status}")]
    Authorization {
        person_id: String,
        request_id: String,
        status: RequestStatus,
    },
    #[error("request {id} is in terminal status {status}")]
    TerminalState { id: String, status: RequestStatus },
    #[error("stale status for request {id}: expected {expected}, found {found}")]
    Conflict {
        id: String,
        expected: RequestStatus,
        found: RequestStatus,
    },
    #[error("request {id} not found")]
    NotFound { id: String },
    #[error("store failure: {0}")]
    Store(#[from] sled::Error),
    #[error("codec failure: {0}")]
    Codec(String),
}
