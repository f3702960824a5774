//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `basekit_core` linkage.
//! - Run a small roles/users walkthrough over in-memory SQLite and print the
//!   response envelopes.

use basekit_core::db::{ensure_tables, open_db_in_memory};
use basekit_core::{
    Action, ActionRelations, Actor, CrudController, CrudService, EntitySchema, FieldKind,
    IsActive, IsPrivileged, Payload, PermissionGate, RequestContext, ServiceOptions,
    SqliteRepository,
};
use std::error::Error;

fn main() {
    println!("basekit_core ping={}", basekit_core::ping());
    println!("basekit_core version={}", basekit_core::core_version());

    if let Err(err) = run_demo() {
        eprintln!("demo failed: {err}");
        std::process::exit(1);
    }
}

fn run_demo() -> Result<(), Box<dyn Error>> {
    let roles_schema = EntitySchema::builder("roles")
        .required("name", FieldKind::Text)
        .dependent("users", "role_id")
        .build()?;
    let users_schema = EntitySchema::builder("users")
        .required("name", FieldKind::Text)
        .required("email", FieldKind::Text)
        .optional("role_id", FieldKind::Reference)
        .relation("role", "role_id", "roles")
        .build()?;

    let mut conn = open_db_in_memory()?;
    ensure_tables(&mut conn, &[&roles_schema, &users_schema])?;

    let roles = SqliteRepository::try_new(&conn, roles_schema.clone())?;
    let roles_service = CrudService::try_new(
        SqliteRepository::try_new(&conn, roles_schema)?,
        ServiceOptions::new().unique(&["name"]),
    )?;
    let admin_role = roles_service.create(&Payload::new().with("name", "admin"))?;

    let users_service = CrudService::try_new(
        SqliteRepository::try_new(&conn, users_schema)?,
        ServiceOptions::new()
            .search_fields(&["name", "email"])
            .unique(&["email"])
            .foreign_key("role_id", &roles)
            .relation_hook(ActionRelations::new().on(Action::Retrieve, &["role"])),
    )?;
    let gate = PermissionGate::new()
        .require_all(IsActive)
        .require(Action::Delete, IsPrivileged);
    let users = CrudController::new(users_service, gate);

    let admin = Actor::new("demo-admin")
        .with_attribute("is_active", true)
        .with_attribute("is_admin", true);
    let request = RequestContext::anonymous().with_actor(admin);

    let mut first_id = String::new();
    let seed = [
        ("Joan", "joan@example.com"),
        ("Jordan", "jordan@example.com"),
        ("Ann", "ann@example.com"),
    ];
    for (name, email) in seed {
        let payload = Payload::new()
            .with("name", name)
            .with("email", email)
            .with("role_id", admin_role.id.to_string());
        let (status, envelope) = users.handle(Action::Create, &request, Some(&payload));
        if first_id.is_empty() {
            first_id = envelope.data["id"].as_str().unwrap_or_default().to_string();
        }
        print_envelope("create", status, &envelope.to_json());
    }

    let list_request = request
        .clone()
        .with_query_param("search", "jo")
        .with_query_param("count", "1")
        .with_query_param("page", "2");
    let (status, envelope) = users.handle(Action::List, &list_request, None);
    print_envelope("list", status, &envelope.to_json());

    let retrieve_request = request.clone().with_path_param("id", first_id);
    let (status, envelope) = users.handle(Action::Retrieve, &retrieve_request, None);
    print_envelope("retrieve", status, &envelope.to_json());

    let duplicate = Payload::new()
        .with("name", "Joan Again")
        .with("email", "joan@example.com");
    let (status, envelope) = users.handle(Action::Create, &request, Some(&duplicate));
    print_envelope("create_duplicate", status, &envelope.to_json());

    let anonymous = RequestContext::anonymous();
    let (status, envelope) = users.handle(Action::List, &anonymous, None);
    print_envelope("list_anonymous", status, &envelope.to_json());

    Ok(())
}

fn print_envelope(label: &str, status: u16, body: &serde_json::Value) {
    println!("{label} status={status} body={body}");
}
