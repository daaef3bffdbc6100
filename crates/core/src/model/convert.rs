//! Conversion of JSON payloads into rows.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value as Json};
use uuid::Uuid;

use super::row::{Field, Row, Value};
use super::schema::{ElementKind, EntityDefinition, ScalarType, SchemaModel, names};
use crate::attachment::{AttachmentError, ScanStatus};
use crate::content::Content;

/// Builds rows from JSON payloads using the schema.
///
/// Content is given as a base64 string. Attachment fields of attachment
/// entities land in the typed slots; everything else stays in the extension
/// map, nested compositions converted recursively.
pub struct RowConverter<'a> {
    schema: &'a dyn SchemaModel,
}

impl<'a> RowConverter<'a> {
    /// Create a converter over `schema`.
    #[must_use]
    pub fn new(schema: &'a dyn SchemaModel) -> Self {
        Self { schema }
    }

    /// Convert a single object or an array of objects of `entity`.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for unknown entities, non-object rows and
    /// malformed attachment fields.
    pub fn from_json(&self, entity: &str, payload: Json) -> Result<Vec<Row>, AttachmentError> {
        let definition = self.definition(entity)?;
        match payload {
            Json::Array(items) => items
                .into_iter()
                .map(|item| self.object(definition, item))
                .collect(),
            other => Ok(vec![self.object(definition, other)?]),
        }
    }

    fn definition(&self, entity: &str) -> Result<&'a EntityDefinition, AttachmentError> {
        self.schema
            .entity(entity)
            .ok_or_else(|| AttachmentError::bad_request(format!("unknown entity '{entity}'")))
    }

    fn object(&self, entity: &EntityDefinition, payload: Json) -> Result<Row, AttachmentError> {
        let Json::Object(map) = payload else {
            return Err(AttachmentError::bad_request(format!(
                "expected an object for entity '{}'",
                entity.name
            )));
        };
        self.fields(entity, map)
    }

    fn fields(
        &self,
        entity: &EntityDefinition,
        map: Map<String, Json>,
    ) -> Result<Row, AttachmentError> {
        let mut row = Row::new();
        for (name, value) in map {
            if entity.attachment && self.attachment_field(&mut row, &name, &value)? {
                continue;
            }
            let converted = match entity.element(&name).map(|e| &e.kind) {
                Some(ElementKind::Association { target, .. }) => {
                    let target = self.definition(target)?;
                    match value {
                        Json::Null => Value::Null,
                        Json::Array(items) => Value::Rows(
                            items
                                .into_iter()
                                .map(|item| self.object(target, item))
                                .collect::<Result<_, _>>()?,
                        ),
                        other => Value::Row(Box::new(self.object(target, other)?)),
                    }
                }
                Some(ElementKind::Scalar { ty }) => scalar(*ty, value),
                Some(ElementKind::Content { .. }) | None => json_value(value),
            };
            row.insert(name, converted);
        }
        Ok(row)
    }

    /// Fill a typed attachment slot; `false` when `name` is not one.
    fn attachment_field(
        &self,
        row: &mut Row,
        name: &str,
        value: &Json,
    ) -> Result<bool, AttachmentError> {
        let fields = &mut row.attachment;
        match name {
            names::CONTENT => {
                fields.content = text_field(name, value)?
                    .map_or(Ok(Field::Null), |encoded| {
                        STANDARD
                            .decode(encoded)
                            .map(|bytes| Field::Value(Content::from_bytes(bytes)))
                            .map_err(|e| {
                                AttachmentError::bad_request(format!("invalid base64 content: {e}"))
                            })
                    })?;
            }
            names::CONTENT_ID => {
                fields.content_id = Field::from_option(text_field(name, value)?.map(Into::into));
            }
            names::FILE_NAME => {
                fields.file_name = Field::from_option(text_field(name, value)?.map(String::from));
            }
            names::MIME_TYPE => {
                fields.mime_type = Field::from_option(text_field(name, value)?.map(String::from));
            }
            names::STATUS => {
                let status = text_field(name, value)?
                    .map(|s| {
                        ScanStatus::parse(s).ok_or_else(|| {
                            AttachmentError::bad_request(format!("unknown scan status '{s}'"))
                        })
                    })
                    .transpose()?;
                fields.status = Field::from_option(status);
            }
            names::SCANNED_AT => {
                let scanned_at = text_field(name, value)?
                    .map(|s| {
                        DateTime::parse_from_rfc3339(s)
                            .map(|t| t.with_timezone(&Utc))
                            .map_err(|e| {
                                AttachmentError::bad_request(format!("invalid timestamp '{s}': {e}"))
                            })
                    })
                    .transpose()?;
                fields.scanned_at = Field::from_option(scanned_at);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// A string or null attachment field; any other JSON type is rejected.
fn text_field<'v>(name: &str, value: &'v Json) -> Result<Option<&'v str>, AttachmentError> {
    match value {
        Json::Null => Ok(None),
        Json::String(s) => Ok(Some(s.as_str())),
        other => Err(AttachmentError::bad_request(format!(
            "field '{name}' must be a string, got {other}"
        ))),
    }
}

fn scalar(ty: ScalarType, value: Json) -> Value {
    match (ty, value) {
        (_, Json::Null) => Value::Null,
        (ScalarType::Uuid, Json::String(s)) => {
            Uuid::parse_str(&s).map_or(Value::Text(s), Value::Uuid)
        }
        (ScalarType::Timestamp, Json::String(s)) => DateTime::parse_from_rfc3339(&s)
            .map_or(Value::Text(s), |t| Value::Timestamp(t.with_timezone(&Utc))),
        (_, other) => json_value(other),
    }
}

fn json_value(value: Json) -> Value {
    match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::String(s) => Value::Text(s),
        Json::Number(n) => n.as_i64().map_or(Value::Json(Json::Number(n)), Value::Integer),
        other => Value::Json(other),
    }
}
