use crate::entity::{Entity, FieldValue, Filter, SortOrder};
use crate::error::StoreError;

/// Declarative table definition passed to [`EntityStore::ensure_table`].
///
/// `unique_fields` become unique indexes: a second insert (or an update)
/// carrying an already-taken value fails with [`StoreError::Duplicate`].
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub unique_fields: &'static [&'static str],
}

/// EntityStore provides partition-key / row-key addressed persistence
/// with field-level updates and version-stamped conditional writes.
///
/// Every row carries a version that is bumped on each write;
/// `update_fields_checked` is the compare-and-swap primitive the
/// lifecycle engine and the ledger build their races on.
pub trait EntityStore: Send + Sync {
    /// Create the table and its unique-field indexes (idempotent).
    fn ensure_table(&self, spec: &TableSpec) -> Result<(), StoreError>;

    /// Insert a new entity. Fails with `Duplicate` if the key or a
    /// unique field is already taken.
    fn insert(&self, table: &str, entity: &Entity) -> Result<(), StoreError>;

    /// Fetch one entity by key.
    fn get(&self, table: &str, partition: &str, row: &str) -> Result<Option<Entity>, StoreError>;

    /// Fetch the first entity whose field equals the given value.
    fn get_by_field(
        &self,
        table: &str,
        field: &str,
        value: &FieldValue,
    ) -> Result<Option<Entity>, StoreError>;

    /// Merge fields into an entity (last writer wins), bumping the
    /// version. Returns `false` when the row does not exist.
    fn update_fields(
        &self,
        table: &str,
        partition: &str,
        row: &str,
        fields: &[(&str, FieldValue)],
    ) -> Result<bool, StoreError>;

    /// Conditional field merge: applies only if the stored version still
    /// equals `expected_version`, bumping it on success. Returns `false`
    /// when the row is missing or the version moved.
    fn update_fields_checked(
        &self,
        table: &str,
        partition: &str,
        row: &str,
        expected_version: i64,
        fields: &[(&str, FieldValue)],
    ) -> Result<bool, StoreError>;

    /// Delete an entity. Returns `false` when the row does not exist.
    fn delete(&self, table: &str, partition: &str, row: &str) -> Result<bool, StoreError>;

    /// Unpaginated filtered scan.
    fn query(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<&SortOrder>,
    ) -> Result<Vec<Entity>, StoreError>;

    /// Filtered scan with 1-indexed pagination. Returns the page plus
    /// the total count of the unpaginated filtered set.
    fn list_paginated(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<&SortOrder>,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<Entity>, usize), StoreError>;

    /// Next sequential id for a table keyed by numeric partition keys:
    /// max(partition_key as integer) + 1, or 1 for an empty table.
    fn next_id_for_partition(&self, table: &str) -> Result<i64, StoreError>;
}
