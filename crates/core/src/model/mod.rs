//! Rows, selections and the entity schema model.

mod convert;
mod query;
mod row;
mod schema;

pub use convert::RowConverter;
pub use query::{Select, SelectItem, expanded_mut, selects_all, selects_column};
pub use row::{AttachmentFields, EntityKey, Field, KeyValue, Row, Value, rows_at, rows_at_mut};
pub use schema::{
    Catalog, ElementDefinition, ElementKind, EntityDefinition, ScalarType, SchemaModel, names,
};
