//! End-to-end workflow scenarios against a real sled store

use std::sync::Arc;

use finance_approval::{
    audit::{ActionKind, FinanceAction},
    authz::{ActorIdentity, GroupMembership, GroupRole, RoleAssignment},
    error::WorkflowError,
    inbox::InboxOptions,
    registry::{RequestStatus, Role},
    request::{Amount, RequestDraft, RequestType},
    service::WorkflowService,
    store::{RequestStore, SledStore},
    utils,
};

use tempfile::tempdir; // Use for test db cleanup.

/// The people involved in a full approval chain.
struct Cast {
    applicant: ActorIdentity,
    lead: ActorIdentity,
    rep: ActorIdentity,
    committee: ActorIdentity,
    accounting: ActorIdentity,
    cashier: ActorIdentity,
}

/// Sled uses file-based locking to prevent concurrent access, so only one
/// test can hold the lock at a time. As is good practice in testing create
/// separate databases for each test, on temp for simplified cleanup.
fn open_service(db_path: std::path::PathBuf) -> anyhow::Result<WorkflowService<SledStore>> {
    let db = sled::open(db_path)?;
    let store = SledStore::new(Arc::new(db))?;
    Ok(WorkflowService::new(store))
}

fn person(name: &str) -> anyhow::Result<ActorIdentity> {
    let id = utils::new_uuid_to_bech32("user_")?;
    Ok(ActorIdentity::new(&id, name, &format!("{name}@example.org")))
}

fn assign(store: &SledStore, who: &ActorIdentity, role: Role) -> anyhow::Result<()> {
    store.put_role_assignment(&RoleAssignment {
        id: utils::new_uuid_to_bech32("fra_")?,
        person_id: who.person_id.clone(),
        person_name: who.name.clone(),
        person_email: who.email.clone(),
        role,
        notes: None,
    })?;
    Ok(())
}

fn enroll(
    store: &SledStore,
    who: &ActorIdentity,
    group_id: &str,
    role_in_group: GroupRole,
) -> anyhow::Result<()> {
    store.put_group_membership(&GroupMembership {
        person_id: who.person_id.clone(),
        group_id: group_id.to_string(),
        role_in_group,
    })?;
    Ok(())
}

/// One applicant in `grp_it`, its lead, and one holder of each table role.
fn seed_cast(store: &SledStore) -> anyhow::Result<Cast> {
    let applicant = person("aki")?;
    let lead = person("mori")?;
    let rep = person("rin")?;
    let committee = person("sou")?;
    let accounting = person("noor")?;
    let cashier = person("kei")?;

    enroll(store, &applicant, "grp_it", GroupRole::Member)?;
    enroll(store, &lead, "grp_it", GroupRole::Lead)?;
    assign(store, &rep, Role::Rep)?;
    assign(store, &committee, Role::Committee)?;
    assign(store, &accounting, Role::Accounting)?;
    assign(store, &cashier, Role::Cashier)?;

    Ok(Cast {
        applicant,
        lead,
        rep,
        committee,
        accounting,
        cashier,
    })
}

fn purchase_draft() -> RequestDraft {
    RequestDraft::new()
        .set_type(RequestType::Purchase)
        .set_title("projector replacement")
        .set_description("the common room projector died mid-event")
        .set_category("equipment")
        .set_amount_estimated(Amount::from_major(1500))
        .set_department("grp_it")
        .add_attachment("quote.pdf", "https://files.example.org/quote.pdf")
}

#[test]
fn full_purchase_chain_closes() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let service = open_service(temp_dir.path().join("full_chain.db"))?;
    let cast = seed_cast(service.store())?;

    let request = service.create_draft(purchase_draft(), &cast.applicant)?;
    assert_eq!(request.status, RequestStatus::Draft);

    let request = service.submit(&request.id, &cast.applicant, None)?;
    assert_eq!(request.status, RequestStatus::PendingLead);

    let request = service.approve(&request.id, &cast.lead, Role::Lead, None)?;
    assert_eq!(request.status, RequestStatus::PendingRep);

    let request = service.approve(&request.id, &cast.rep, Role::Rep, None)?;
    assert_eq!(request.status, RequestStatus::PendingCommittee);

    let request = service.approve(&request.id, &cast.committee, Role::Committee, None)?;
    assert_eq!(request.status, RequestStatus::PendingAccounting);

    let request = service.approve(&request.id, &cast.accounting, Role::Accounting, None)?;
    assert_eq!(request.status, RequestStatus::PendingCashier);

    let request = service.approve(&request.id, &cast.cashier, Role::Cashier, Some("paid out".into()))?;
    assert_eq!(request.status, RequestStatus::Closed);

    // audit trail: submit + 5 approvals, in replay order, revisions 1..=6
    let trail = service.store().list_actions(&request.id)?;
    assert_eq!(trail.len(), 6);
    assert_eq!(trail[0].action, ActionKind::Submit);
    assert!(trail[1..].iter().all(|a| a.action == ActionKind::Approve));
    let revisions: Vec<u64> = trail.iter().map(|a| a.revision).collect();
    assert_eq!(revisions, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(trail[1].actor_role, Some(Role::Lead));
    assert_eq!(trail[5].actor_role, Some(Role::Cashier));

    // display order is the reverse
    let history = service.history(&request.id)?;
    assert_eq!(history[0].action, ActionKind::Approve);
    assert_eq!(history[5].action, ActionKind::Submit);

    Ok(())
}

#[test]
fn payment_draft_requires_purchase_link() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let service = open_service(temp_dir.path().join("payment_link.db"))?;
    let cast = seed_cast(service.store())?;

    let draft = RequestDraft::new()
        .set_type(RequestType::Payment)
        .set_title("venue deposit")
        .set_description("deposit for the spring social venue")
        .set_category("events")
        .set_amount_actual(Amount::from_major(300))
        .set_department("grp_it");
    let request = service.create_draft(draft, &cast.applicant)?;

    let err = service.submit(&request.id, &cast.applicant, None).unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
    assert_eq!(
        service.store().get_request(&request.id)?.status,
        RequestStatus::Draft
    );

    // supplying a no-purchase reason unblocks submission
    let edits = RequestDraft::new().set_no_purchase_reason("venue invoices directly");
    let request = service.update(&request.id, edits, &cast.applicant, None)?;
    assert_eq!(request.status, RequestStatus::PendingLead);

    Ok(())
}

#[test]
fn return_resets_to_pending_lead() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let service = open_service(temp_dir.path().join("return_reset.db"))?;
    let cast = seed_cast(service.store())?;

    let request = service.create_draft(purchase_draft(), &cast.applicant)?;
    let request = service.submit(&request.id, &cast.applicant, None)?;
    let request = service.approve(&request.id, &cast.lead, Role::Lead, None)?;
    let request = service.approve(&request.id, &cast.rep, Role::Rep, None)?;
    assert_eq!(request.status, RequestStatus::PendingCommittee);

    let request = service.return_to_applicant(
        &request.id,
        &cast.committee,
        Role::Committee,
        Some("needs an itemised quote".into()),
    )?;
    assert_eq!(request.status, RequestStatus::Returned);

    // the returning stage is preserved in the audit note
    let trail = service.store().list_actions(&request.id)?;
    let returned = trail.iter().find(|a| a.action == ActionKind::Return).unwrap();
    let note = returned.actor_note.as_deref().unwrap();
    assert!(note.contains("returned from pending_committee"), "note: {note}");

    // resubmission restarts at the head of the queue, not at committee
    let edits = purchase_draft().set_amount_estimated(Amount::from_major(1400));
    let request = service.update(&request.id, edits, &cast.applicant, None)?;
    assert_eq!(request.status, RequestStatus::PendingLead);

    Ok(())
}

#[test]
fn withdraw_only_from_pending() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let service = open_service(temp_dir.path().join("withdraw.db"))?;
    let cast = seed_cast(service.store())?;

    // not from draft
    let request = service.create_draft(purchase_draft(), &cast.applicant)?;
    let err = service.withdraw(&request.id, &cast.applicant, None).unwrap_err();
    assert!(matches!(err, WorkflowError::Authorization { .. }));

    // from any pending stage
    let request = service.submit(&request.id, &cast.applicant, None)?;
    let request = service.approve(&request.id, &cast.lead, Role::Lead, None)?;
    let request = service.withdraw(&request.id, &cast.applicant, Some("found a donor".into()))?;
    assert_eq!(request.status, RequestStatus::Withdrawn);

    // withdrawn is terminal for every action
    let err = service
        .approve(&request.id, &cast.rep, Role::Rep, None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::TerminalState { .. }));
    let err = service.withdraw(&request.id, &cast.applicant, None).unwrap_err();
    assert!(matches!(err, WorkflowError::TerminalState { .. }));

    // not from returned either
    let second = service.create_draft(purchase_draft(), &cast.applicant)?;
    service.submit(&second.id, &cast.applicant, None)?;
    service.return_to_applicant(&second.id, &cast.lead, Role::Lead, None)?;
    let err = service.withdraw(&second.id, &cast.applicant, None).unwrap_err();
    assert!(matches!(err, WorkflowError::Authorization { .. }));

    Ok(())
}

#[test]
fn unauthorized_actors_cannot_advance() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let service = open_service(temp_dir.path().join("unauthorized.db"))?;
    let cast = seed_cast(service.store())?;

    let other_lead = person("toma")?;
    enroll(service.store(), &other_lead, "grp_pr", GroupRole::Lead)?;

    let request = service.create_draft(purchase_draft(), &cast.applicant)?;
    let request = service.submit(&request.id, &cast.applicant, None)?;

    // a cashier has no business at pending_lead
    let err = service
        .approve(&request.id, &cast.cashier, Role::Cashier, None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Authorization { .. }));

    // nor does a lead of a different department
    let err = service
        .approve(&request.id, &other_lead, Role::Lead, None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Authorization { .. }));

    // no status change, no audit rows for rejected attempts
    assert_eq!(
        service.store().get_request(&request.id)?.status,
        RequestStatus::PendingLead
    );
    assert_eq!(service.store().list_actions(&request.id)?.len(), 1);

    // a non-applicant cannot withdraw someone else's request
    let err = service.withdraw(&request.id, &cast.rep, None).unwrap_err();
    assert!(matches!(err, WorkflowError::Authorization { .. }));

    Ok(())
}

#[test]
fn stale_status_loses_the_race() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let service = open_service(temp_dir.path().join("stale_race.db"))?;
    let cast = seed_cast(service.store())?;

    let request = service.create_draft(purchase_draft(), &cast.applicant)?;
    let request = service.submit(&request.id, &cast.applicant, None)?;

    // two actors read the same pending_lead snapshot and race their writes
    let store = service.store();
    let snapshot = store.get_request(&request.id)?;

    let mut first = snapshot.clone();
    first.status = RequestStatus::PendingRep;
    first.revision += 1;
    let mut second = first.clone();

    let won = store.persist_transition(
        first,
        snapshot.status,
        FinanceAction::new(&snapshot.id, ActionKind::Approve, Some(Role::Lead), "mori", None),
    )?;
    assert_eq!(won.status, RequestStatus::PendingRep);

    second.revision = snapshot.revision + 1;
    let err = store
        .persist_transition(
            second,
            snapshot.status,
            FinanceAction::new(&snapshot.id, ActionKind::Approve, Some(Role::Lead), "mori", None),
        )
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Conflict { .. }));

    // exactly one advance happened
    let current = store.get_request(&request.id)?;
    assert_eq!(current.status, RequestStatus::PendingRep);
    assert_eq!(current.revision, snapshot.revision + 1);
    assert_eq!(store.list_actions(&request.id)?.len(), 2); // submit + one approve

    Ok(())
}

#[test]
fn inbox_views_follow_roles() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let service = open_service(temp_dir.path().join("inbox.db"))?;
    let cast = seed_cast(service.store())?;

    // one request waiting on accounting, one still with the lead, one closed
    let at_accounting = service.create_draft(purchase_draft(), &cast.applicant)?;
    service.submit(&at_accounting.id, &cast.applicant, None)?;
    service.approve(&at_accounting.id, &cast.lead, Role::Lead, None)?;
    service.approve(&at_accounting.id, &cast.rep, Role::Rep, None)?;
    service.approve(&at_accounting.id, &cast.committee, Role::Committee, None)?;

    let at_lead = service.create_draft(purchase_draft(), &cast.applicant)?;
    service.submit(&at_lead.id, &cast.applicant, None)?;

    let closed = service.create_draft(purchase_draft(), &cast.applicant)?;
    service.submit(&closed.id, &cast.applicant, None)?;
    service.approve(&closed.id, &cast.lead, Role::Lead, None)?;
    service.approve(&closed.id, &cast.rep, Role::Rep, None)?;
    service.approve(&closed.id, &cast.committee, Role::Committee, None)?;
    service.approve(&closed.id, &cast.accounting, Role::Accounting, None)?;
    service.approve(&closed.id, &cast.cashier, Role::Cashier, None)?;

    let inbox = service.compute_inbox(&cast.accounting, &InboxOptions::default())?;
    assert_eq!(inbox.actionable.len(), 1);
    assert_eq!(inbox.actionable[0].id, at_accounting.id);
    assert_eq!(inbox.in_progress.len(), 1);
    assert_eq!(inbox.in_progress[0].id, at_lead.id);
    assert_eq!(inbox.completed.len(), 1);
    assert_eq!(inbox.completed[0].id, closed.id);

    // a plain member of the privileged group sees both pending requests,
    // none of them actionable
    let observer = person("yuna")?;
    enroll(service.store(), &observer, "grp_board", GroupRole::Member)?;
    let options = InboxOptions {
        privileged_group: Some("grp_board".into()),
        ..InboxOptions::default()
    };
    let inbox = service.compute_inbox(&observer, &options)?;
    assert!(inbox.actionable.is_empty());
    assert_eq!(inbox.in_progress.len(), 2);

    Ok(())
}
