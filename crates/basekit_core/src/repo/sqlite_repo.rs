//! SQLite-backed relational repository.
//!
//! # Responsibility
//! - Translate query descriptors into parameterized SQL over one table.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Identifiers are interpolated only after schema validation
//!   (identifier-safe names); every value is bound as a parameter.
//! - Search uses `LIKE '%text%'` with escaped wildcards over text fields;
//!   case folding is ASCII only.
//! - Rows are ordered by `created_at ASC, rowid ASC` (insertion order).

use crate::model::record::{now_epoch_ms, Record, RecordId, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD};
use crate::model::schema::{EntitySchema, FieldDef, FieldKind, RelationDef};
use crate::model::value::{FieldMap, FieldValue};
use crate::query::descriptor::QueryDescriptor;
use crate::query::pagination::page_offset;
use crate::repo::{
    check_descriptor, require_declared_fields, DeleteRule, RepoError, RepoResult, Repository,
};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, Row};
use std::collections::BTreeSet;
use uuid::Uuid;

const ORDER_BY_SQL: &str = " ORDER BY created_at ASC, rowid ASC";

/// Compiled SQL predicate for one list query.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    /// Boolean SQL expression placed after `WHERE`.
    pub where_sql: String,
    pub binds: Vec<Value>,
    pub includes: BTreeSet<String>,
}

/// SQLite repository over the table named by its schema.
pub struct SqliteRepository<'conn> {
    conn: &'conn Connection,
    schema: EntitySchema,
}

impl<'conn> SqliteRepository<'conn> {
    /// Constructs a repository after checking the table matches the schema.
    pub fn try_new(conn: &'conn Connection, schema: EntitySchema) -> RepoResult<Self> {
        ensure_table_ready(conn, &schema)?;
        Ok(Self { conn, schema })
    }

    fn select_sql(&self) -> String {
        let mut columns = vec![
            ID_FIELD.to_string(),
            CREATED_AT_FIELD.to_string(),
            UPDATED_AT_FIELD.to_string(),
        ];
        columns.extend(self.schema.fields().iter().map(|field| quote(&field.name)));
        format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            quote(self.schema.name())
        )
    }

    fn query_records(&self, sql: &str, binds: &[Value]) -> RepoResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(binds.iter()))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row, self.schema.fields())?);
        }
        Ok(records)
    }

    fn attach_relations(&self, record: &mut Record, includes: &BTreeSet<String>) -> RepoResult<()> {
        for include in includes {
            let Some(relation) = self.schema.relation(include) else {
                continue;
            };
            let related = match record.get(&relation.field).and_then(FieldValue::as_text) {
                Some(id_text) => load_related(self.conn, relation, id_text)?,
                None => None,
            };
            record.relations.insert(relation.name.clone(), related);
        }
        Ok(())
    }

    fn equality_clause(&self, fields: &FieldMap) -> (String, Vec<Value>) {
        let mut sql = String::from("1 = 1");
        let mut binds = Vec::new();
        for (name, value) in fields {
            if value.is_null() {
                sql.push_str(&format!(" AND {} IS NULL", quote(name)));
            } else {
                sql.push_str(&format!(" AND {} = ?", quote(name)));
                binds.push(to_sql_value(value));
            }
        }
        (sql, binds)
    }
}

impl Repository for SqliteRepository<'_> {
    type Query = SqlQuery;

    fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    fn build_filter_query(&self, descriptor: &QueryDescriptor) -> RepoResult<SqlQuery> {
        let filters = check_descriptor(&self.schema, descriptor)?;
        let (mut where_sql, mut binds) = self.equality_clause(&filters);

        if let Some(text) = descriptor.active_search() {
            let pattern = format!("%{}%", escape_like(text));
            let clauses = descriptor
                .search_fields
                .iter()
                .map(|field| {
                    binds.push(Value::Text(pattern.clone()));
                    format!("{} LIKE ? ESCAPE '\\'", quote(field))
                })
                .collect::<Vec<_>>();
            where_sql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
        }

        Ok(SqlQuery {
            where_sql,
            binds,
            includes: descriptor.includes.clone(),
        })
    }

    fn paginate(&self, query: &SqlQuery, page: u64, count: u64) -> RepoResult<(Vec<Record>, u64)> {
        let total = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE {};",
                quote(self.schema.name()),
                query.where_sql
            ),
            params_from_iter(query.binds.iter()),
            |row| row.get::<_, i64>(0),
        )?;
        let total = row_count(total)?;

        let sql = format!(
            "{} WHERE {}{ORDER_BY_SQL} LIMIT ? OFFSET ?;",
            self.select_sql(),
            query.where_sql
        );
        let mut binds = query.binds.clone();
        binds.push(Value::Integer(to_sql_int(count)));
        binds.push(Value::Integer(to_sql_int(page_offset(page, count))));

        let mut items = self.query_records(&sql, &binds)?;
        for item in &mut items {
            self.attach_relations(item, &query.includes)?;
        }

        Ok((items, total))
    }

    fn list_all(&self, includes: &BTreeSet<String>) -> RepoResult<Vec<Record>> {
        self.schema.require_relations(includes)?;
        let sql = format!("{}{ORDER_BY_SQL};", self.select_sql());
        let mut records = self.query_records(&sql, &[])?;
        for record in &mut records {
            self.attach_relations(record, includes)?;
        }
        Ok(records)
    }

    fn get_by_id(&self, id: RecordId, includes: &BTreeSet<String>) -> RepoResult<Option<Record>> {
        self.schema.require_relations(includes)?;
        let sql = format!("{} WHERE id = ?;", self.select_sql());
        let mut records = self.query_records(&sql, &[Value::Text(id.to_string())])?;
        match records.pop() {
            Some(mut record) => {
                self.attach_relations(&mut record, includes)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn get_by_fields(&self, fields: &FieldMap) -> RepoResult<Option<Record>> {
        for name in fields.keys() {
            self.schema.require_field(name)?;
        }
        let coerced = self.schema.coerce_filters(fields)?;
        let (where_sql, binds) = self.equality_clause(&coerced);
        let sql = format!("{} WHERE {where_sql}{ORDER_BY_SQL} LIMIT 1;", self.select_sql());
        Ok(self.query_records(&sql, &binds)?.pop())
    }

    fn create(&self, data: FieldMap) -> RepoResult<Record> {
        require_declared_fields(&self.schema, &data)?;
        let record = Record::new(data);

        let mut columns = vec![
            ID_FIELD.to_string(),
            CREATED_AT_FIELD.to_string(),
            UPDATED_AT_FIELD.to_string(),
        ];
        let mut binds = vec![
            Value::Text(record.id.to_string()),
            Value::Integer(record.created_at),
            Value::Integer(record.updated_at),
        ];
        for (name, value) in &record.fields {
            columns.push(quote(name));
            binds.push(to_sql_value(value));
        }
        let placeholders = vec!["?"; columns.len()].join(", ");

        self.conn.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES ({placeholders});",
                quote(self.schema.name()),
                columns.join(", ")
            ),
            params_from_iter(binds.iter()),
        )?;

        self.get_by_id(record.id, &BTreeSet::new())?
            .ok_or_else(|| RepoError::InvalidData("created record missing on read-back".to_string()))
    }

    fn update(&self, existing: &Record, data: FieldMap) -> RepoResult<Record> {
        require_declared_fields(&self.schema, &data)?;

        let mut assignments = Vec::new();
        let mut binds = Vec::new();
        for (name, value) in &data {
            assignments.push(format!("{} = ?", quote(name)));
            binds.push(to_sql_value(value));
        }
        assignments.push(format!("{UPDATED_AT_FIELD} = ?"));
        binds.push(Value::Integer(now_epoch_ms().max(existing.created_at)));
        binds.push(Value::Text(existing.id.to_string()));

        let changed = self.conn.execute(
            &format!(
                "UPDATE {} SET {} WHERE id = ?;",
                quote(self.schema.name()),
                assignments.join(", ")
            ),
            params_from_iter(binds.iter()),
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: self.schema.name().to_string(),
                id: existing.id,
            });
        }

        let includes = existing.relations.keys().cloned().collect();
        self.get_by_id(existing.id, &includes)?
            .ok_or_else(|| RepoError::InvalidData("updated record missing on read-back".to_string()))
    }

    fn delete(&self, record: &Record, rule: DeleteRule) -> RepoResult<()> {
        let id_text = record.id.to_string();
        let tx = self.conn.unchecked_transaction()?;

        if rule == DeleteRule::Cascade {
            for dependent in self.schema.dependents() {
                tx.execute(
                    &format!(
                        "DELETE FROM {} WHERE {} = ?1;",
                        quote(&dependent.collection),
                        quote(&dependent.field)
                    ),
                    [id_text.as_str()],
                )?;
            }
        }

        let changed = tx.execute(
            &format!("DELETE FROM {} WHERE id = ?1;", quote(self.schema.name())),
            [id_text.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: self.schema.name().to_string(),
                id: record.id,
            });
        }

        tx.commit()?;
        Ok(())
    }
}

fn parse_record_row(row: &Row<'_>, fields: &[FieldDef]) -> RepoResult<Record> {
    let id_text: String = row.get(0)?;
    let mut record = Record {
        id: parse_id(&id_text)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        fields: FieldMap::new(),
        relations: Default::default(),
    };

    for (offset, field) in fields.iter().enumerate() {
        let value = read_typed(row, offset + 3, field)?;
        record.fields.insert(field.name.clone(), value);
    }

    Ok(record)
}

fn read_typed(row: &Row<'_>, index: usize, field: &FieldDef) -> RepoResult<FieldValue> {
    let value = match field.kind {
        FieldKind::Text | FieldKind::Reference => {
            row.get::<_, Option<String>>(index)?.map(FieldValue::Text)
        }
        FieldKind::Integer => row.get::<_, Option<i64>>(index)?.map(FieldValue::Integer),
        FieldKind::Real => row.get::<_, Option<f64>>(index)?.map(FieldValue::Real),
        FieldKind::Bool => match row.get::<_, Option<i64>>(index)? {
            None => None,
            Some(0) => Some(FieldValue::Bool(false)),
            Some(1) => Some(FieldValue::Bool(true)),
            Some(other) => {
                return Err(RepoError::InvalidData(format!(
                    "invalid bool value `{other}` in column {}",
                    field.name
                )));
            }
        },
    };
    Ok(value.unwrap_or(FieldValue::Null))
}

/// Loads one related row without its schema; values keep SQLite storage
/// classes (bools surface as integers).
fn load_related(
    conn: &Connection,
    relation: &RelationDef,
    id_text: &str,
) -> RepoResult<Option<Record>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT * FROM {} WHERE id = ?1;",
        quote(&relation.target)
    ))?;
    let names = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();
    let mut rows = stmt.query([id_text])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };

    let mut record = Record {
        id: Uuid::nil(),
        created_at: 0,
        updated_at: 0,
        fields: FieldMap::new(),
        relations: Default::default(),
    };
    for (index, name) in names.iter().enumerate() {
        let value = dynamic_value(row.get_ref(index)?, name)?;
        match (name.as_str(), &value) {
            (ID_FIELD, FieldValue::Text(text)) => record.id = parse_id(text)?,
            (CREATED_AT_FIELD, FieldValue::Integer(at)) => record.created_at = *at,
            (UPDATED_AT_FIELD, FieldValue::Integer(at)) => record.updated_at = *at,
            _ => {
                record.fields.insert(name.clone(), value);
            }
        }
    }
    Ok(Some(record))
}

fn dynamic_value(value: ValueRef<'_>, column: &str) -> RepoResult<FieldValue> {
    match value {
        ValueRef::Null => Ok(FieldValue::Null),
        ValueRef::Integer(number) => Ok(FieldValue::Integer(number)),
        ValueRef::Real(number) => Ok(FieldValue::Real(number)),
        ValueRef::Text(bytes) => String::from_utf8(bytes.to_vec())
            .map(FieldValue::Text)
            .map_err(|_| RepoError::InvalidData(format!("non-utf8 text in column {column}"))),
        ValueRef::Blob(_) => Err(RepoError::InvalidData(format!(
            "unsupported blob value in column {column}"
        ))),
    }
}

fn parse_id(value: &str) -> RepoResult<RecordId> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid id value `{value}`")))
}

fn to_sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(flag) => Value::Integer(i64::from(*flag)),
        FieldValue::Integer(number) => Value::Integer(*number),
        FieldValue::Real(number) => Value::Real(*number),
        FieldValue::Text(text) => Value::Text(text.clone()),
    }
}

fn row_count(raw: i64) -> RepoResult<u64> {
    u64::try_from(raw).map_err(|_| RepoError::InvalidData(format!("negative row count {raw}")))
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn ensure_table_ready(conn: &Connection, schema: &EntitySchema) -> RepoResult<()> {
    if !table_exists(conn, schema.name())? {
        return Err(RepoError::MissingRequiredTable(schema.name().to_string()));
    }

    let columns = table_columns(conn, schema.name())?;
    let required = [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD]
        .into_iter()
        .chain(schema.fields().iter().map(|field| field.name.as_str()));
    for column in required {
        if !columns.contains(column) {
            return Err(RepoError::MissingRequiredColumn {
                table: schema.name().to_string(),
                column: column.to_string(),
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> RepoResult<BTreeSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", quote(table)))?;
    let mut rows = stmt.query([])?;
    let mut columns = BTreeSet::new();
    while let Some(row) = rows.next()? {
        columns.insert(row.get::<_, String>(1)?);
    }
    Ok(columns)
}
