use basekit_core::db::{ensure_tables, open_db_in_memory};
use basekit_core::{
    Action, ActionRelations, CrudConfig, CrudError, CrudService, DefaultFilters, DeleteRule,
    EntitySchema, FieldKind, FieldValue, ListRequest, MemoryRepository, MemoryStore, Payload,
    Repository, ServiceOptions, SqliteRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

fn roles_schema() -> EntitySchema {
    EntitySchema::builder("roles")
        .required("name", FieldKind::Text)
        .dependent("users", "role_id")
        .build()
        .unwrap()
}

fn users_schema() -> EntitySchema {
    EntitySchema::builder("users")
        .required("name", FieldKind::Text)
        .required("email", FieldKind::Text)
        .optional("age", FieldKind::Integer)
        .optional("is_active", FieldKind::Bool)
        .optional("role_id", FieldKind::Reference)
        .relation("role", "role_id", "roles")
        .build()
        .unwrap()
}

fn setup() -> Connection {
    let mut conn = open_db_in_memory().unwrap();
    ensure_tables(&mut conn, &[&roles_schema(), &users_schema()]).unwrap();
    conn
}

fn user(name: &str, email: &str) -> Payload {
    Payload::new().with("name", name).with("email", email)
}

#[test]
fn create_fails_with_duplicate_naming_the_field() {
    let conn = setup();
    let service = CrudService::try_new(
        SqliteRepository::try_new(&conn, users_schema()).unwrap(),
        ServiceOptions::new().unique(&["email"]),
    )
    .unwrap();

    service.create(&user("Ann", "ann@example.com")).unwrap();
    let err = service
        .create(&user("Other Ann", "ann@example.com"))
        .unwrap_err();

    match err {
        CrudError::Duplicate { entity, fields } => {
            assert_eq!(entity, "users");
            assert_eq!(
                fields,
                vec![("email".to_string(), FieldValue::from("ann@example.com"))]
            );
        }
        other => panic!("expected duplicate, got {other}"),
    }

    service.create(&user("Bob", "bob@example.com")).unwrap();
    assert_eq!(service.list_all().unwrap().len(), 2);
}

#[test]
fn create_with_overrides_configured_unique_fields() {
    let conn = setup();
    let service = CrudService::try_new(
        SqliteRepository::try_new(&conn, users_schema()).unwrap(),
        ServiceOptions::new(),
    )
    .unwrap();

    service.create(&user("Ann", "ann@example.com")).unwrap();
    service.create(&user("Ann", "second@example.com")).unwrap();
    let err = service
        .create_with(&user("Ann", "third@example.com"), &["name"])
        .unwrap_err();
    assert_eq!(err.status_code(), 409);
}

#[test]
fn create_validates_foreign_keys_before_writing() {
    let conn = setup();
    let roles = SqliteRepository::try_new(&conn, roles_schema()).unwrap();
    let admin = roles
        .create(basekit_core::FieldMap::from([(
            "name".to_string(),
            FieldValue::from("admin"),
        )]))
        .unwrap();
    let service = CrudService::try_new(
        SqliteRepository::try_new(&conn, users_schema()).unwrap(),
        ServiceOptions::new().foreign_key("role_id", &roles),
    )
    .unwrap();

    let missing = Uuid::new_v4();
    let err = service
        .create(&user("Ann", "ann@example.com").with("role_id", missing.to_string()))
        .unwrap_err();
    match err {
        CrudError::NotFound { entity, id } => {
            assert_eq!(entity, "roles");
            assert_eq!(id, missing.to_string());
        }
        other => panic!("expected not found, got {other}"),
    }
    assert!(service.list_all().unwrap().is_empty());

    let created = service
        .create(&user("Ann", "ann@example.com").with("role_id", admin.id.to_string()))
        .unwrap();
    assert_eq!(
        created.get("role_id"),
        Some(&FieldValue::from(admin.id.to_string()))
    );
}

#[test]
fn duplicate_check_runs_before_foreign_key_check() {
    let conn = setup();
    let roles = SqliteRepository::try_new(&conn, roles_schema()).unwrap();
    let service = CrudService::try_new(
        SqliteRepository::try_new(&conn, users_schema()).unwrap(),
        ServiceOptions::new()
            .unique(&["email"])
            .foreign_key("role_id", &roles),
    )
    .unwrap();
    service.create(&user("Ann", "ann@example.com")).unwrap();

    let err = service
        .create(&user("Ann", "ann@example.com").with("role_id", Uuid::new_v4().to_string()))
        .unwrap_err();
    assert!(matches!(err, CrudError::Duplicate { .. }));
}

#[test]
fn create_rejects_invalid_payloads_with_validation_error() {
    let conn = setup();
    let service = CrudService::try_new(
        SqliteRepository::try_new(&conn, users_schema()).unwrap(),
        ServiceOptions::new(),
    )
    .unwrap();

    let err = service
        .create(&Payload::new().with("name", "Ann"))
        .unwrap_err();
    assert_eq!(err.status_code(), 422);

    let err = service
        .create(&user("Ann", "a@example.com").with("age", "old"))
        .unwrap_err();
    assert!(matches!(err, CrudError::Validation(ref validation) if validation.mentions("age")));
}

#[test]
fn update_is_partial() {
    let conn = setup();
    let service = CrudService::try_new(
        SqliteRepository::try_new(&conn, users_schema()).unwrap(),
        ServiceOptions::new(),
    )
    .unwrap();
    let created = service
        .create(&user("A", "a@example.com").with("age", 30_i64))
        .unwrap();

    let updated = service
        .update(&created.id.to_string(), &Payload::new().with("age", 31_i64))
        .unwrap();
    assert_eq!(updated.get("name"), Some(&FieldValue::from("A")));
    assert_eq!(updated.get("age"), Some(&FieldValue::Integer(31)));
    assert_eq!(updated.get("email"), Some(&FieldValue::from("a@example.com")));
}

#[test]
fn update_duplicate_check_excludes_the_record_itself() {
    let conn = setup();
    let service = CrudService::try_new(
        SqliteRepository::try_new(&conn, users_schema()).unwrap(),
        ServiceOptions::new().unique(&["email"]),
    )
    .unwrap();
    let ann = service.create(&user("Ann", "ann@example.com")).unwrap();
    service.create(&user("Bob", "bob@example.com")).unwrap();

    service
        .update(
            &ann.id.to_string(),
            &Payload::new().with("email", "ann@example.com"),
        )
        .unwrap();
    let err = service
        .update(
            &ann.id.to_string(),
            &Payload::new().with("email", "bob@example.com"),
        )
        .unwrap_err();
    assert!(matches!(err, CrudError::Duplicate { .. }));
}

#[test]
fn missing_ids_fail_not_found_without_mutation() {
    let conn = setup();
    let service = CrudService::try_new(
        SqliteRepository::try_new(&conn, users_schema()).unwrap(),
        ServiceOptions::new(),
    )
    .unwrap();
    service.create(&user("Ann", "ann@example.com")).unwrap();

    let absent = Uuid::new_v4().to_string();
    assert!(matches!(service.retrieve(&absent), Err(CrudError::NotFound { .. })));
    assert!(matches!(service.delete(&absent), Err(CrudError::NotFound { .. })));
    assert!(matches!(
        service.update(&absent, &Payload::new().with("age", 1_i64)),
        Err(CrudError::NotFound { .. })
    ));
    assert!(matches!(service.retrieve("not-a-uuid"), Err(CrudError::NotFound { .. })));
    assert_eq!(service.list_all().unwrap().len(), 1);
}

#[test]
fn relation_hook_selects_includes_per_action() {
    let conn = setup();
    let roles = SqliteRepository::try_new(&conn, roles_schema()).unwrap();
    let admin = roles
        .create(basekit_core::FieldMap::from([(
            "name".to_string(),
            FieldValue::from("admin"),
        )]))
        .unwrap();
    let service = CrudService::try_new(
        SqliteRepository::try_new(&conn, users_schema()).unwrap(),
        ServiceOptions::new().relation_hook(ActionRelations::new().on(Action::Retrieve, &["role"])),
    )
    .unwrap();
    let ann = service
        .create(&user("Ann", "ann@example.com").with("role_id", admin.id.to_string()))
        .unwrap();
    assert!(ann.relations.is_empty());

    let listed = service.list(&ListRequest::new(1, 10)).unwrap();
    assert!(listed.items[0].relations.is_empty());

    let retrieved = service.retrieve(&ann.id.to_string()).unwrap();
    let role = retrieved.relations["role"].as_ref().expect("role included");
    assert_eq!(role.id, admin.id);
}

#[test]
fn filter_hook_adds_default_filters() {
    let store = MemoryStore::new();
    let service = CrudService::try_new(
        MemoryRepository::new(&store, users_schema()),
        ServiceOptions::new().filter_hook(DefaultFilters::new().with("is_active", true)),
    )
    .unwrap();
    service
        .create(&user("Ann", "ann@example.com").with("is_active", true))
        .unwrap();
    service
        .create(&user("Bob", "bob@example.com").with("is_active", false))
        .unwrap();

    let page = service.list(&ListRequest::new(1, 10)).unwrap();
    assert_eq!(page.pagination.total_items, 1);
    assert_eq!(page.items[0].get("name"), Some(&FieldValue::from("Ann")));

    let page = service
        .list(&ListRequest::new(1, 10).filter("is_active", "false"))
        .unwrap();
    assert_eq!(page.items[0].get("name"), Some(&FieldValue::from("Bob")));
}

#[test]
fn delete_uses_configured_rule_unless_overridden() {
    let conn = setup();
    let users = SqliteRepository::try_new(&conn, users_schema()).unwrap();
    let roles_service = CrudService::try_new(
        SqliteRepository::try_new(&conn, roles_schema()).unwrap(),
        ServiceOptions::new().config(CrudConfig {
            delete_rule: DeleteRule::Cascade,
            ..CrudConfig::default()
        }),
    )
    .unwrap();

    let admin = roles_service
        .create(&Payload::new().with("name", "admin"))
        .unwrap();
    let staff = roles_service
        .create(&Payload::new().with("name", "staff"))
        .unwrap();
    for (name, role) in [("a", &admin), ("b", &staff)] {
        users
            .create(basekit_core::FieldMap::from([
                ("name".to_string(), FieldValue::from(name)),
                ("email".to_string(), FieldValue::from(format!("{name}@example.com"))),
                ("role_id".to_string(), FieldValue::from(role.id.to_string())),
            ]))
            .unwrap();
    }

    roles_service.delete(&admin.id.to_string()).unwrap();
    roles_service
        .delete_with_rule(&staff.id.to_string(), DeleteRule::KeepLinks)
        .unwrap();

    let remaining = users.list_all(&Default::default()).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].get("name"), Some(&FieldValue::from("b")));
}

#[test]
fn try_new_rejects_non_reference_foreign_keys() {
    let conn = setup();
    let roles = SqliteRepository::try_new(&conn, roles_schema()).unwrap();
    let result = CrudService::try_new(
        SqliteRepository::try_new(&conn, users_schema()).unwrap(),
        ServiceOptions::new().foreign_key("email", &roles),
    );
    assert!(matches!(result, Err(CrudError::InvalidField(_))));
}

#[test]
fn update_checks_compound_unique_key_against_merged_record() {
    let store = MemoryStore::new();
    let people = EntitySchema::builder("people")
        .required("first", FieldKind::Text)
        .required("last", FieldKind::Text)
        .build()
        .unwrap();
    let service = CrudService::try_new(
        MemoryRepository::new(&store, people),
        ServiceOptions::new().unique(&["first", "last"]),
    )
    .unwrap();
    service
        .create(&Payload::new().with("first", "Ann").with("last", "Lee"))
        .unwrap();
    let bob = service
        .create(&Payload::new().with("first", "Bob").with("last", "Kim"))
        .unwrap();

    let renamed = service
        .update(&bob.id.to_string(), &Payload::new().with("first", "Ann"))
        .unwrap();
    assert_eq!(renamed.get("first"), Some(&FieldValue::from("Ann")));
    assert_eq!(renamed.get("last"), Some(&FieldValue::from("Kim")));

    let err = service
        .update(&bob.id.to_string(), &Payload::new().with("last", "Lee"))
        .unwrap_err();
    match err {
        CrudError::Duplicate { fields, .. } => assert_eq!(
            fields,
            vec![
                ("first".to_string(), FieldValue::from("Ann")),
                ("last".to_string(), FieldValue::from("Lee")),
            ]
        ),
        other => panic!("expected duplicate, got {other}"),
    }
}
