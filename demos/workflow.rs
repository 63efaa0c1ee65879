//! Walks one purchase request through the whole approval chain against a
//! local sled database and prints the audit trail.
//!
//! Run with: cargo run --example workflow

use std::sync::Arc;

use finance_approval::{
    authz::{ActorIdentity, GroupMembership, GroupRole, RoleAssignment},
    inbox::InboxOptions,
    registry::Role,
    request::{Amount, RequestDraft, RequestType},
    service::WorkflowService,
    store::{RequestStore, SledStore},
    utils,
};

fn person(name: &str) -> anyhow::Result<ActorIdentity> {
    let id = utils::new_uuid_to_bech32("user_")?;
    Ok(ActorIdentity::new(&id, name, &format!("{name}@example.org")))
}

fn main() -> anyhow::Result<()> {
    let db = sled::open("sled")?;
    if !db.is_empty() {
        db.clear()?;
    }
    let store = SledStore::new(Arc::new(db))?;

    // the cast: an applicant in grp_it, the group lead, and the table roles
    let applicant = person("aki")?;
    let lead = person("mori")?;
    let rep = person("rin")?;
    let committee = person("sou")?;
    let accounting = person("noor")?;
    let cashier = person("kei")?;

    store.put_group_membership(&GroupMembership {
        person_id: lead.person_id.clone(),
        group_id: "grp_it".into(),
        role_in_group: GroupRole::Lead,
    })?;
    for (who, role) in [
        (&rep, Role::Rep),
        (&committee, Role::Committee),
        (&accounting, Role::Accounting),
        (&cashier, Role::Cashier),
    ] {
        store.put_role_assignment(&RoleAssignment {
            id: utils::new_uuid_to_bech32("fra_")?,
            person_id: who.person_id.clone(),
            person_name: who.name.clone(),
            person_email: who.email.clone(),
            role,
            notes: None,
        })?;
    }

    let service = WorkflowService::new(store);

    let draft = RequestDraft::new()
        .set_type(RequestType::Purchase)
        .set_title("projector replacement")
        .set_description("the common room projector died mid-event")
        .set_category("equipment")
        .set_amount_estimated(Amount::from_major(1500))
        .set_department("grp_it")
        .add_attachment("quote.pdf", "https://files.example.org/quote.pdf");

    let request = service.create_draft(draft, &applicant)?;
    let request = service.submit(&request.id, &applicant, Some("spring budget".into()))?;
    println!("submitted: {} -> {}", request.id, request.status);

    let inbox = service.compute_inbox(&lead, &InboxOptions::default())?;
    println!("lead inbox: {} actionable", inbox.actionable.len());

    let request = service.approve(&request.id, &lead, Role::Lead, None)?;
    let request = service.approve(&request.id, &rep, Role::Rep, None)?;
    let request = service.approve(&request.id, &committee, Role::Committee, None)?;
    let request = service.approve(&request.id, &accounting, Role::Accounting, None)?;
    let request = service.approve(&request.id, &cashier, Role::Cashier, Some("paid out".into()))?;
    println!("final status: {}", request.status);

    for action in service.history(&request.id)? {
        println!(
            "rev {:>2}  {:<8}  {}",
            action.revision,
            action.action.to_string(),
            action.actor_name
        );
    }

    Ok(())
}
