use std::collections::BTreeMap;

/// A dynamically-typed entity field value.
///
/// Domain enums, timestamps and decimal amounts cross this boundary as
/// `Text`; the typed module stores own the conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Real(f64),
    Bool(bool),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    /// JSON representation used inside the `data` document column.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
            FieldValue::Int(i) => serde_json::Value::from(*i),
            FieldValue::Real(f) => serde_json::Value::from(*f),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
        }
    }

    /// Map a JSON document value back to a field value.
    ///
    /// `null` yields `None` (the field is treated as absent). Nested
    /// arrays/objects cannot be produced through this API; if one is
    /// encountered it round-trips as its raw JSON text.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(FieldValue::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(FieldValue::Int(i))
                } else {
                    n.as_f64().map(FieldValue::Real)
                }
            }
            serde_json::Value::String(s) => Some(FieldValue::Text(s.clone())),
            other => Some(FieldValue::Text(other.to_string())),
        }
    }
}

/// A stored entity: partition key + row key addressing, a version stamp
/// for optimistic concurrency, and a flat field map.
///
/// `version` is 0 on entities built for insert; reads return the stored
/// version, which conditional updates check against.
#[derive(Debug, Clone)]
pub struct Entity {
    pub partition_key: String,
    pub row_key: String,
    pub version: i64,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Entity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            version: 0,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter for insert paths.
    pub fn with_field(mut self, name: &str, value: FieldValue) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn set(&mut self, name: &str, value: FieldValue) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Get a text field by name.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(FieldValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get an integer field by name.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(FieldValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Get a real field by name.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            Some(FieldValue::Real(f)) => Some(*f),
            Some(FieldValue::Int(i)) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get a boolean field by name.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name) {
            Some(FieldValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }
}

// ── Filters & ordering ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ge,
    Le,
}

/// A single `field op value` predicate. Multiple filters are combined
/// as a conjunction (AND).
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: FieldValue,
}

impl Filter {
    pub fn eq(field: &str, value: FieldValue) -> Self {
        Self { field: field.to_string(), op: FilterOp::Eq, value }
    }

    pub fn ge(field: &str, value: FieldValue) -> Self {
        Self { field: field.to_string(), op: FilterOp::Ge, value }
    }

    pub fn le(field: &str, value: FieldValue) -> Self {
        Self { field: field.to_string(), op: FilterOp::Le, value }
    }
}

/// Sort order for scans. Fields are compared by their JSON value;
/// RFC 3339 timestamps sort correctly as text.
#[derive(Debug, Clone)]
pub struct SortOrder {
    pub field: String,
    pub descending: bool,
}

impl SortOrder {
    pub fn asc(field: &str) -> Self {
        Self { field: field.to_string(), descending: false }
    }

    pub fn desc(field: &str) -> Self {
        Self { field: field.to_string(), descending: true }
    }
}
