//! Financial request approval workflow: a multi-stage, role-gated state
//! machine that walks a reimbursement/purchase/petty-cash request from draft
//! to closure through `lead -> rep -> committee -> accounting -> cashier`,
//! recording every action in an append-only audit trail.

pub mod audit;
pub mod authz;
pub mod error;
pub mod inbox;
pub mod registry;
pub mod request;
pub mod service;
pub mod store;
pub mod utils;
