use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension};

use crate::entity::{Entity, FieldValue, Filter, FilterOp, SortOrder};
use crate::error::StoreError;
use crate::traits::{EntityStore, TableSpec};

/// SqliteStore is an EntityStore implementation backed by rusqlite
/// (bundled SQLite).
///
/// Each entity table is one SQL table `(partition_key, row_key, version,
/// data)` where `data` is a JSON document; fields are read through
/// `json_extract` and merged through `json_set`, so a field update is a
/// single statement and the version bump rides along atomically.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        // Enable WAL mode for better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn update_inner(
        &self,
        table: &str,
        partition: &str,
        row: &str,
        expected_version: Option<i64>,
        fields: &[(&str, FieldValue)],
    ) -> Result<bool, StoreError> {
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        let set_sql = if fields.is_empty() {
            "version = version + 1".to_string()
        } else {
            let mut pairs = Vec::new();
            for (name, value) in fields {
                let idx = params.len() + 1;
                pairs.push(format!("'$.{name}', json(?{idx})"));
                let json = serde_json::to_string(&value.to_json())
                    .map_err(|e| StoreError::Encoding(e.to_string()))?;
                params.push(Box::new(json));
            }
            format!(
                "data = json_set(data, {}), version = version + 1",
                pairs.join(", ")
            )
        };

        let mut sql = format!(
            "UPDATE {table} SET {set_sql} WHERE partition_key = ?{} AND row_key = ?{}",
            params.len() + 1,
            params.len() + 2,
        );
        params.push(Box::new(partition.to_string()));
        params.push(Box::new(row.to_string()));

        if let Some(expected) = expected_version {
            sql.push_str(&format!(" AND version = ?{}", params.len() + 1));
            params.push(Box::new(expected));
        }

        let conn = self.lock()?;
        let refs: Vec<&dyn ToSql> = params.iter().map(|b| b.as_ref()).collect();
        let affected = conn.execute(&sql, refs.as_slice()).map_err(map_write_err)?;
        Ok(affected > 0)
    }

    fn query_inner(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<&SortOrder>,
        limit_offset: Option<(u32, u32)>,
    ) -> Result<Vec<Entity>, StoreError> {
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        let where_sql = filter_sql(filters, &mut params)?;
        let order_sql = order_clause(order);

        let mut sql = format!(
            "SELECT partition_key, row_key, version, data FROM {table}{where_sql}{order_sql}"
        );
        if let Some((limit, offset)) = limit_offset {
            sql.push_str(&format!(
                " LIMIT ?{} OFFSET ?{}",
                params.len() + 1,
                params.len() + 2
            ));
            params.push(Box::new(limit as i64));
            params.push(Box::new(offset as i64));
        }

        let conn = self.lock()?;
        let refs: Vec<&dyn ToSql> = params.iter().map(|b| b.as_ref()).collect();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let rows = stmt
            .query_map(refs.as_slice(), |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, i64>(2)?,
                    r.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut entities = Vec::new();
        for row in rows {
            let (pk, rk, version, data) =
                row.map_err(|e| StoreError::Backend(e.to_string()))?;
            entities.push(parse_entity(pk, rk, version, &data)?);
        }
        Ok(entities)
    }
}

impl EntityStore for SqliteStore {
    fn ensure_table(&self, spec: &TableSpec) -> Result<(), StoreError> {
        let mut ddl = format!(
            "CREATE TABLE IF NOT EXISTS {t} (
                partition_key TEXT NOT NULL,
                row_key       TEXT NOT NULL,
                version       INTEGER NOT NULL DEFAULT 1,
                data          TEXT NOT NULL,
                PRIMARY KEY (partition_key, row_key)
            );\n",
            t = spec.name
        );
        for field in spec.unique_fields {
            ddl.push_str(&format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_{t}_{f} \
                 ON {t} (json_extract(data, '$.{f}'));\n",
                t = spec.name,
                f = field
            ));
        }

        let conn = self.lock()?;
        conn.execute_batch(&ddl)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        tracing::debug!(table = spec.name, "ensured entity table");
        Ok(())
    }

    fn insert(&self, table: &str, entity: &Entity) -> Result<(), StoreError> {
        let data = encode_fields(entity)?;
        let sql = format!(
            "INSERT INTO {table} (partition_key, row_key, version, data) VALUES (?1, ?2, 1, ?3)"
        );

        let conn = self.lock()?;
        conn.execute(
            &sql,
            rusqlite::params![entity.partition_key, entity.row_key, data],
        )
        .map_err(map_write_err)?;
        Ok(())
    }

    fn get(&self, table: &str, partition: &str, row: &str) -> Result<Option<Entity>, StoreError> {
        let sql = format!(
            "SELECT version, data FROM {table} WHERE partition_key = ?1 AND row_key = ?2"
        );

        let conn = self.lock()?;
        let found = conn
            .query_row(&sql, rusqlite::params![partition, row], |r| {
                Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?))
            })
            .optional()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        drop(conn);

        match found {
            Some((version, data)) => Ok(Some(parse_entity(
                partition.to_string(),
                row.to_string(),
                version,
                &data,
            )?)),
            None => Ok(None),
        }
    }

    fn get_by_field(
        &self,
        table: &str,
        field: &str,
        value: &FieldValue,
    ) -> Result<Option<Entity>, StoreError> {
        let sql = format!(
            "SELECT partition_key, row_key, version, data FROM {table} \
             WHERE json_extract(data, '$.{field}') = ?1 LIMIT 1"
        );
        let bound = bind_field(value);

        let conn = self.lock()?;
        let found = conn
            .query_row(&sql, [bound.as_ref()], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, i64>(2)?,
                    r.get::<_, String>(3)?,
                ))
            })
            .optional()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        drop(conn);

        match found {
            Some((pk, rk, version, data)) => Ok(Some(parse_entity(pk, rk, version, &data)?)),
            None => Ok(None),
        }
    }

    fn update_fields(
        &self,
        table: &str,
        partition: &str,
        row: &str,
        fields: &[(&str, FieldValue)],
    ) -> Result<bool, StoreError> {
        self.update_inner(table, partition, row, None, fields)
    }

    fn update_fields_checked(
        &self,
        table: &str,
        partition: &str,
        row: &str,
        expected_version: i64,
        fields: &[(&str, FieldValue)],
    ) -> Result<bool, StoreError> {
        self.update_inner(table, partition, row, Some(expected_version), fields)
    }

    fn delete(&self, table: &str, partition: &str, row: &str) -> Result<bool, StoreError> {
        let sql = format!("DELETE FROM {table} WHERE partition_key = ?1 AND row_key = ?2");

        let conn = self.lock()?;
        let affected = conn
            .execute(&sql, rusqlite::params![partition, row])
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(affected > 0)
    }

    fn query(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<&SortOrder>,
    ) -> Result<Vec<Entity>, StoreError> {
        self.query_inner(table, filters, order, None)
    }

    fn list_paginated(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<&SortOrder>,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<Entity>, usize), StoreError> {
        let mut count_params: Vec<Box<dyn ToSql>> = Vec::new();
        let where_sql = filter_sql(filters, &mut count_params)?;
        let count_sql = format!("SELECT COUNT(*) FROM {table}{where_sql}");

        let conn = self.lock()?;
        let refs: Vec<&dyn ToSql> = count_params.iter().map(|b| b.as_ref()).collect();
        let total: i64 = conn
            .query_row(&count_sql, refs.as_slice(), |r| r.get(0))
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        drop(conn);

        let page = page.max(1);
        let offset = (page - 1).saturating_mul(page_size);
        let items = self.query_inner(table, filters, order, Some((page_size, offset)))?;

        Ok((items, total as usize))
    }

    fn next_id_for_partition(&self, table: &str) -> Result<i64, StoreError> {
        let sql = format!(
            "SELECT COALESCE(MAX(CAST(partition_key AS INTEGER)), 0) + 1 FROM {table}"
        );

        let conn = self.lock()?;
        conn.query_row(&sql, [], |r| r.get(0))
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Serialize an entity's field map into the JSON document column.
fn encode_fields(entity: &Entity) -> Result<String, StoreError> {
    let mut map = serde_json::Map::new();
    for (name, value) in &entity.fields {
        map.insert(name.clone(), value.to_json());
    }
    serde_json::to_string(&serde_json::Value::Object(map))
        .map_err(|e| StoreError::Encoding(e.to_string()))
}

/// Parse the JSON document column back into an entity.
fn parse_entity(
    partition_key: String,
    row_key: String,
    version: i64,
    data: &str,
) -> Result<Entity, StoreError> {
    let value: serde_json::Value =
        serde_json::from_str(data).map_err(|e| StoreError::Encoding(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| StoreError::Encoding("data column is not a JSON object".into()))?;

    let mut entity = Entity::new(partition_key, row_key);
    entity.version = version;
    for (name, raw) in object {
        if let Some(field) = FieldValue::from_json(raw) {
            entity.fields.insert(name.clone(), field);
        }
    }
    Ok(entity)
}

/// Convert a FieldValue into a bindable SQL parameter.
fn bind_field(value: &FieldValue) -> Box<dyn ToSql> {
    match value {
        FieldValue::Text(s) => Box::new(s.clone()),
        FieldValue::Int(i) => Box::new(*i),
        FieldValue::Real(f) => Box::new(*f),
        FieldValue::Bool(b) => Box::new(*b as i64),
    }
}

/// Numeric coercion for range predicates. Range comparisons always run
/// on REAL values so that decimal amounts stored as text compare by
/// magnitude, not lexically.
fn numeric_param(value: &FieldValue) -> Result<f64, StoreError> {
    match value {
        FieldValue::Int(i) => Ok(*i as f64),
        FieldValue::Real(f) => Ok(*f),
        FieldValue::Text(s) => s
            .parse::<f64>()
            .map_err(|_| StoreError::Encoding(format!("non-numeric range bound: {s:?}"))),
        FieldValue::Bool(_) => {
            Err(StoreError::Encoding("boolean is not a valid range bound".into()))
        }
    }
}

/// Build the conjunction WHERE clause, pushing bound parameters.
fn filter_sql(
    filters: &[Filter],
    params: &mut Vec<Box<dyn ToSql>>,
) -> Result<String, StoreError> {
    if filters.is_empty() {
        return Ok(String::new());
    }

    let mut clauses = Vec::new();
    for filter in filters {
        let idx = params.len() + 1;
        match filter.op {
            FilterOp::Eq => {
                clauses.push(format!(
                    "json_extract(data, '$.{}') = ?{idx}",
                    filter.field
                ));
                params.push(bind_field(&filter.value));
            }
            FilterOp::Ge => {
                clauses.push(format!(
                    "CAST(json_extract(data, '$.{}') AS REAL) >= ?{idx}",
                    filter.field
                ));
                params.push(Box::new(numeric_param(&filter.value)?));
            }
            FilterOp::Le => {
                clauses.push(format!(
                    "CAST(json_extract(data, '$.{}') AS REAL) <= ?{idx}",
                    filter.field
                ));
                params.push(Box::new(numeric_param(&filter.value)?));
            }
        }
    }
    Ok(format!(" WHERE {}", clauses.join(" AND ")))
}

fn order_clause(order: Option<&SortOrder>) -> String {
    match order {
        Some(o) => format!(
            " ORDER BY json_extract(data, '$.{}') {}",
            o.field,
            if o.descending { "DESC" } else { "ASC" }
        ),
        None => String::new(),
    }
}

fn map_write_err(e: rusqlite::Error) -> StoreError {
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint") {
        StoreError::Duplicate(msg)
    } else {
        StoreError::Backend(msg)
    }
}
