//! Cheap detection of attachment data in a payload.

use std::collections::BTreeMap;

use tracing::debug;

use super::walker::SchemaPath;
use crate::model::{Row, SchemaModel, names, rows_at};

/// Field names of one attachment entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFieldNames {
    /// Name of the content element.
    pub content: String,
    /// Name of the content id element.
    pub content_id: String,
}

/// What a payload carries in terms of attachment data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentFields {
    /// Whether any attachment data is present.
    pub present: bool,
    /// Field names per qualified path name, for well-formed attachment paths.
    pub fields: BTreeMap<String, ContentFieldNames>,
}

impl ContentFields {
    /// Field names for `path`, if it is a well-formed attachment path.
    #[must_use]
    pub fn get(&self, path: &SchemaPath) -> Option<&ContentFieldNames> {
        self.fields.get(&path.qualified_name())
    }
}

/// What counts as attachment data when locating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateMode {
    /// Only content fields with a value or explicit null.
    Content,
    /// Content fields, or any attachment composition in the payload.
    ContentOrComposition,
}

/// Finds content fields in nested payloads.
pub struct ContentFieldLocator<'a> {
    schema: &'a dyn SchemaModel,
}

impl<'a> ContentFieldLocator<'a> {
    /// Create a locator over `schema`.
    #[must_use]
    pub fn new(schema: &'a dyn SchemaModel) -> Self {
        Self { schema }
    }

    /// Field names of the attachment entity at the end of `path`.
    ///
    /// Entities lacking a content or a content id element are not usable
    /// attachments and yield `None`.
    #[must_use]
    pub fn field_names(&self, path: &SchemaPath) -> Option<ContentFieldNames> {
        let entity = self.schema.entity(path.target())?;
        let Some(content) = entity.content_element() else {
            debug!(entity = %entity.name, "attachment entity without content element, excluded");
            return None;
        };
        if entity.element(names::CONTENT_ID).is_none() {
            debug!(entity = %entity.name, "attachment entity without content id element, excluded");
            return None;
        }
        Some(ContentFieldNames {
            content: content.name.clone(),
            content_id: names::CONTENT_ID.to_string(),
        })
    }

    /// Scan `rows` along every path.
    #[must_use]
    pub fn locate(&self, paths: &[SchemaPath], rows: &[Row], mode: LocateMode) -> ContentFields {
        let mut result = ContentFields::default();
        for path in paths {
            let Some(names) = self.field_names(path) else {
                continue;
            };
            let associations = path.associations();
            let has_content = rows_at(rows, &associations)
                .iter()
                .any(|row| !row.attachment.content.is_missing());
            let has_composition = mode == LocateMode::ContentOrComposition
                && path.is_cascading()
                && composition_present(rows, &associations);

            result.present |= has_content || has_composition;
            result.fields.insert(path.qualified_name(), names);
        }
        result
    }
}

/// Whether any composition along `associations` appears in the payload.
fn composition_present(rows: &[Row], associations: &[&str]) -> bool {
    (0..associations.len()).any(|depth| {
        rows_at(rows, &associations[..depth])
            .iter()
            .any(|row| row.children(associations[depth]).is_some())
    })
}
