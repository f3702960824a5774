use basekit_core::{
    Action, Actor, AllowAll, CrudController, CrudService, DenyAll, EntitySchema, FieldKind,
    FnCheck, IsActive, IsOwnerOrPrivileged, IsPrivileged, MemoryRepository, MemoryStore,
    OutputShape, Payload, PermissionGate, RequestContext, ServiceOptions,
};
use serde_json::json;
use std::cell::Cell;
use std::rc::Rc;

fn accounts_schema() -> EntitySchema {
    EntitySchema::builder("accounts")
        .required("name", FieldKind::Text)
        .required("email", FieldKind::Text)
        .optional("secret", FieldKind::Text)
        .build()
        .unwrap()
}

fn controller<'a>(store: &'a MemoryStore, gate: PermissionGate) -> CrudController<'a, MemoryRepository<'a>> {
    let service = CrudService::try_new(
        MemoryRepository::new(store, accounts_schema()),
        ServiceOptions::new().unique(&["email"]),
    )
    .unwrap();
    CrudController::new(service, gate)
}

fn account(name: &str, email: &str) -> Payload {
    Payload::new().with("name", name).with("email", email)
}

fn active(id: &str) -> Actor {
    Actor::new(id).with_attribute("is_active", true)
}

#[test]
fn first_denial_short_circuits_remaining_checks() {
    let store = MemoryStore::new();
    let evaluated = Rc::new(Cell::new(0_u32));
    let counter = Rc::clone(&evaluated);
    let counting_allow = FnCheck::new("counting_allow", "never shown", move |_, _, _| {
        counter.set(counter.get() + 1);
        true
    });
    let gate = PermissionGate::new()
        .require(Action::List, DenyAll)
        .require(Action::List, counting_allow);
    let accounts = controller(&store, gate);

    let (status, envelope) = accounts.handle(Action::List, &RequestContext::anonymous(), None);
    assert_eq!(status, 403);
    assert_eq!(envelope.to_json()["status"], json!("error"));
    assert_eq!(envelope.message, "Permission denied");
    assert_eq!(evaluated.get(), 0);
}

#[test]
fn all_checks_must_pass() {
    let store = MemoryStore::new();
    let gate = PermissionGate::new()
        .require(Action::Create, AllowAll)
        .require(Action::Create, IsActive);
    let accounts = controller(&store, gate);

    let inactive = RequestContext::anonymous().with_actor(Actor::new("u1"));
    let (status, _) = accounts.handle(Action::Create, &inactive, Some(&account("A", "a@x.io")));
    assert_eq!(status, 403);
    assert_eq!(store.len("accounts"), 0);

    let allowed = RequestContext::anonymous().with_actor(active("u1"));
    let (status, envelope) = accounts.handle(Action::Create, &allowed, Some(&account("A", "a@x.io")));
    assert_eq!(status, 201);
    assert_eq!(envelope.message, "Created successfully");
    assert_eq!(store.len("accounts"), 1);
}

#[test]
fn owner_or_privileged_gates_single_record_actions() {
    let store = MemoryStore::new();
    let seed = controller(&store, PermissionGate::new());
    let (_, created) = seed.handle(
        Action::Create,
        &RequestContext::anonymous(),
        Some(&account("Owner", "owner@x.io")),
    );
    let id = created.data["id"].as_str().unwrap().to_string();

    let gate = PermissionGate::new()
        .require(Action::Update, IsOwnerOrPrivileged::new())
        .require(Action::Delete, IsPrivileged);
    let accounts = controller(&store, gate);

    let owner = RequestContext::anonymous()
        .with_actor(Actor::new(id.clone()))
        .with_path_param("id", id.clone());
    let stranger = RequestContext::anonymous()
        .with_actor(Actor::new("someone-else"))
        .with_path_param("id", id.clone());
    let rename = Payload::new().with("name", "Renamed");

    let (status, _) = accounts.handle(Action::Update, &stranger, Some(&rename));
    assert_eq!(status, 403);

    let (status, envelope) = accounts.handle(Action::Update, &owner, Some(&rename));
    assert_eq!(status, 200);
    assert_eq!(envelope.message, "Updated successfully");
    assert_eq!(envelope.data["name"], json!("Renamed"));

    let (status, _) = accounts.handle(Action::Delete, &owner, None);
    assert_eq!(status, 403);

    let admin = RequestContext::anonymous()
        .with_actor(Actor::new("root").with_attribute("is_admin", true))
        .with_path_param("id", id);
    let (status, envelope) = accounts.handle(Action::Delete, &admin, None);
    assert_eq!(status, 200);
    assert_eq!(envelope.to_json()["data"], json!(null));
    assert_eq!(envelope.message, "Deleted successfully");
}

#[test]
fn errors_map_to_status_codes_and_envelopes() {
    let store = MemoryStore::new();
    let accounts = controller(&store, PermissionGate::new());
    let request = RequestContext::anonymous();

    accounts.handle(Action::Create, &request, Some(&account("A", "a@x.io")));
    let (status, envelope) = accounts.handle(Action::Create, &request, Some(&account("B", "a@x.io")));
    assert_eq!(status, 409);
    assert_eq!(envelope.data, json!({"email": "a@x.io"}));

    let (status, envelope) = accounts.handle(Action::Create, &request, Some(&Payload::new()));
    assert_eq!(status, 422);
    assert!(envelope.data.as_array().is_some_and(|issues| issues.len() == 2));

    let missing = request.clone().with_path_param("id", uuid::Uuid::new_v4().to_string());
    let (status, _) = accounts.handle(Action::Retrieve, &missing, None);
    assert_eq!(status, 404);

    let bad_page = request.clone().with_query_param("page", "zero");
    let (status, _) = accounts.handle(Action::List, &bad_page, None);
    assert_eq!(status, 422);

    let (status, _) = accounts.handle(Action::Retrieve, &request, None);
    assert_eq!(status, 422);
}

#[test]
fn output_shape_hides_fields_in_envelopes() {
    let store = MemoryStore::new();
    let accounts = controller(&store, PermissionGate::new())
        .with_shape(OutputShape::all().hiding(&["secret"]));
    let request = RequestContext::anonymous();

    let (_, envelope) = accounts.handle(
        Action::Create,
        &request,
        Some(&account("A", "a@x.io").with("secret", "hunter2")),
    );
    assert!(envelope.data.get("secret").is_none());

    let (status, envelope) = accounts.handle(Action::List, &request, None);
    assert_eq!(status, 200);
    let body = envelope.to_json();
    assert_eq!(body["pagination"]["total_items"], json!(1));
    assert!(body["data"][0].get("secret").is_none());
    assert_eq!(body["data"][0]["email"], json!("a@x.io"));
}
