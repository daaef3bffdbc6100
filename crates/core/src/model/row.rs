//! Payload rows.
//!
//! A row carries the known attachment fields as typed slots and everything
//! else (keys, host scalars, nested compositions) in an open extension map.

use std::collections::BTreeMap;

use attachments_shared::ContentId;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::attachment::{ReadonlyFields, ScanStatus};
use crate::content::Content;

/// Tri-state payload slot: absent, explicitly null, or set.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    /// Not part of the payload.
    Missing,
    /// Explicitly set to null.
    Null,
    /// Set to a value.
    Value(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Missing
    }
}

impl<T> Field<T> {
    /// Build from an optional value: `None` becomes `Null`.
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(Self::Null, Self::Value)
    }

    /// Whether the slot is absent from the payload.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Whether the slot is explicitly null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow the value, if set.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Missing | Self::Null => None,
        }
    }

    /// Convert into the value, if set.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Missing | Self::Null => None,
        }
    }

    /// Take the slot, leaving `Missing` behind.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

impl<T: Clone> Field<&T> {
    /// Clone the borrowed value.
    pub fn cloned(self) -> Field<T> {
        match self {
            Self::Missing => Field::Missing,
            Self::Null => Field::Null,
            Self::Value(v) => Field::Value(v.clone()),
        }
    }
}

impl<T> Field<T> {
    /// Borrow the slot.
    pub fn as_ref(&self) -> Field<&T> {
        match self {
            Self::Missing => Field::Missing,
            Self::Null => Field::Null,
            Self::Value(v) => Field::Value(v),
        }
    }
}

/// Key component value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyValue {
    /// UUID key.
    Uuid(Uuid),
    /// String key.
    Text(String),
    /// Integer key.
    Integer(i64),
}

impl KeyValue {
    /// Extract a key component from a payload value.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Uuid(u) => Some(Self::Uuid(*u)),
            Value::Text(s) => Some(Self::Text(s.clone())),
            Value::Integer(i) => Some(Self::Integer(*i)),
            _ => None,
        }
    }

    /// Convert into a payload value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Uuid(u) => Value::Uuid(*u),
            Self::Text(s) => Value::Text(s.clone()),
            Self::Integer(i) => Value::Integer(*i),
        }
    }
}

impl From<Uuid> for KeyValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl std::fmt::Display for KeyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uuid(u) => write!(f, "{u}"),
            Self::Text(s) => write!(f, "'{s}'"),
            Self::Integer(i) => write!(f, "{i}"),
        }
    }
}

/// Primary key of one entity row, ordered by key element name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntityKey(BTreeMap<String, KeyValue>);

impl EntityKey {
    /// Empty key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key component.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<KeyValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Insert a key component.
    pub fn insert(&mut self, name: impl Into<String>, value: KeyValue) {
        self.0.insert(name.into(), value);
    }

    /// Get a key component.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&KeyValue> {
        self.0.get(name)
    }

    /// Whether no key component is present (placeholder rows).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the key components.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &KeyValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (name, value) in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

/// Payload value stored in the extension map.
#[derive(Debug)]
pub enum Value {
    /// Null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Integer(i64),
    /// String.
    Text(String),
    /// UUID.
    Uuid(Uuid),
    /// Timestamp.
    Timestamp(DateTime<Utc>),
    /// Unstructured host value kept as JSON.
    Json(serde_json::Value),
    /// To-one composition or association.
    Row(Box<Row>),
    /// To-many composition or association.
    Rows(Vec<Row>),
}

/// Known attachment fields of a row.
#[derive(Debug, Default)]
pub struct AttachmentFields {
    /// Content bytes.
    pub content: Field<Content>,
    /// Store-issued content id.
    pub content_id: Field<ContentId>,
    /// Original file name.
    pub file_name: Field<String>,
    /// Media type.
    pub mime_type: Field<String>,
    /// Scan status.
    pub status: Field<ScanStatus>,
    /// Time of the last finished scan.
    pub scanned_at: Field<DateTime<Utc>>,
}

/// One payload or result row.
#[derive(Debug, Default)]
pub struct Row {
    /// Host fields, keys and nested rows.
    pub values: BTreeMap<String, Value>,
    /// Typed attachment fields.
    pub attachment: AttachmentFields,
    /// Read-only values parked during a draft edit.
    pub readonly_stash: Option<ReadonlyFields>,
}

impl Row {
    /// Empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an extension value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Set a to-many composition.
    #[must_use]
    pub fn with_children(self, association: impl Into<String>, rows: Vec<Row>) -> Self {
        self.with(association, Value::Rows(rows))
    }

    /// Set the content bytes.
    #[must_use]
    pub fn with_content(mut self, content: Content) -> Self {
        self.attachment.content = Field::Value(content);
        self
    }

    /// Set the file name.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.attachment.file_name = Field::Value(file_name.into());
        self
    }

    /// Get an extension value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Insert an extension value.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Collect the present key components named by `key_names`.
    #[must_use]
    pub fn key(&self, key_names: &[String]) -> EntityKey {
        let mut key = EntityKey::new();
        for name in key_names {
            if let Some(value) = self.values.get(name).and_then(KeyValue::from_value) {
                key.insert(name.clone(), value);
            }
        }
        key
    }

    /// Child rows under `association`, if the association is in the payload.
    ///
    /// An explicit null counts as an empty composition.
    #[must_use]
    pub fn children(&self, association: &str) -> Option<&[Row]> {
        match self.values.get(association)? {
            Value::Rows(rows) => Some(rows.as_slice()),
            Value::Row(row) => Some(std::slice::from_ref(row.as_ref())),
            Value::Null => Some(&[]),
            _ => None,
        }
    }

    /// Mutable child rows under `association`.
    pub fn children_mut(&mut self, association: &str) -> Option<&mut [Row]> {
        match self.values.get_mut(association)? {
            Value::Rows(rows) => Some(rows.as_mut_slice()),
            Value::Row(row) => Some(std::slice::from_mut(row.as_mut())),
            Value::Null => Some(&mut []),
            _ => None,
        }
    }
}

/// Rows reached by following `associations` from `rows`.
#[must_use]
pub fn rows_at<'r>(rows: &'r [Row], associations: &[&str]) -> Vec<&'r Row> {
    let mut out = Vec::new();
    collect_rows(rows, associations, &mut out);
    out
}

fn collect_rows<'r>(rows: &'r [Row], associations: &[&str], out: &mut Vec<&'r Row>) {
    match associations.split_first() {
        None => out.extend(rows.iter()),
        Some((first, rest)) => {
            for row in rows {
                if let Some(children) = row.children(first) {
                    collect_rows(children, rest, out);
                }
            }
        }
    }
}

/// Mutable rows reached by following `associations` from `rows`.
pub fn rows_at_mut<'r>(rows: &'r mut [Row], associations: &[&str]) -> Vec<&'r mut Row> {
    let mut out = Vec::new();
    collect_rows_mut(rows, associations, &mut out);
    out
}

fn collect_rows_mut<'r>(rows: &'r mut [Row], associations: &[&str], out: &mut Vec<&'r mut Row>) {
    match associations.split_first() {
        None => out.extend(rows.iter_mut()),
        Some((first, rest)) => {
            for row in rows.iter_mut() {
                if let Some(children) = row.children_mut(first) {
                    collect_rows_mut(children, rest, out);
                }
            }
        }
    }
}
