pub mod entity;
pub mod error;
pub mod sqlite;
pub mod traits;

pub use entity::{Entity, FieldValue, Filter, FilterOp, SortOrder};
pub use error::StoreError;
pub use sqlite::SqliteStore;
pub use traits::{EntityStore, TableSpec};
