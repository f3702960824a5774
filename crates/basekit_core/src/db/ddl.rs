//! Table creation from entity schemas.
//!
//! # Invariants
//! - DDL is idempotent (`IF NOT EXISTS`) and applied in one transaction.
//! - No unique indexes or foreign-key constraints are emitted: uniqueness
//!   and parent existence are checked by the service before writes.

use super::DbResult;
use crate::model::schema::{EntitySchema, FieldKind};
use log::info;
use rusqlite::Connection;

/// Returns the `CREATE TABLE` statement for one schema.
pub fn create_table_sql(schema: &EntitySchema) -> String {
    let mut columns = vec![
        "id TEXT PRIMARY KEY NOT NULL".to_string(),
        "created_at INTEGER NOT NULL".to_string(),
        "updated_at INTEGER NOT NULL".to_string(),
    ];
    for field in schema.fields() {
        let null_rule = if field.required { " NOT NULL" } else { "" };
        columns.push(format!(
            "\"{}\" {}{}",
            field.name,
            column_type(field.kind),
            null_rule
        ));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (\n    {}\n);",
        schema.name(),
        columns.join(",\n    ")
    )
}

/// Creates missing tables for every schema in one transaction.
pub fn ensure_tables(conn: &mut Connection, schemas: &[&EntitySchema]) -> DbResult<()> {
    let tx = conn.transaction()?;
    for schema in schemas {
        tx.execute_batch(&create_table_sql(schema))?;
        tx.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS \"idx_{0}_created_at\" ON \"{0}\" (created_at);",
            schema.name()
        ))?;
    }
    tx.commit()?;

    info!(
        "event=ddl_apply module=db status=ok tables={}",
        schemas
            .iter()
            .map(|schema| schema.name())
            .collect::<Vec<_>>()
            .join(",")
    );
    Ok(())
}

fn column_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text | FieldKind::Reference => "TEXT",
        FieldKind::Integer | FieldKind::Bool => "INTEGER",
        FieldKind::Real => "REAL",
    }
}
