//! Entity schema model consumed by the walker and the interceptors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Well-known element names of the attachment aspect.
pub mod names {
    /// Content bytes.
    pub const CONTENT: &str = "content";
    /// Store-issued content id.
    pub const CONTENT_ID: &str = "contentId";
    /// Original file name.
    pub const FILE_NAME: &str = "fileName";
    /// Media type.
    pub const MIME_TYPE: &str = "mimeType";
    /// Scan status.
    pub const STATUS: &str = "status";
    /// Time of the last finished scan.
    pub const SCANNED_AT: &str = "scannedAt";
    /// Primary key.
    pub const ID: &str = "ID";
    /// Foreign key to the owning row.
    pub const UP_ID: &str = "up__ID";
    /// Draft back-reference to the active sibling; never walked.
    pub const SIBLING_ENTITY: &str = "SiblingEntity";
}

/// Host schema introspection.
pub trait SchemaModel: Send + Sync {
    /// Look up an entity definition by name.
    fn entity(&self, name: &str) -> Option<&EntityDefinition>;
}

/// Scalar element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    /// UUID, generated for missing keys.
    Uuid,
    /// String.
    String,
    /// Integer.
    Integer,
    /// Boolean.
    Boolean,
    /// Timestamp.
    Timestamp,
}

/// Kind of an entity element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementKind {
    /// Plain column.
    Scalar {
        /// Column type.
        #[serde(rename = "type")]
        ty: ScalarType,
    },
    /// Media-typed large binary.
    Content {
        /// Size limit annotation, e.g. `"10MB"`.
        #[serde(default)]
        max_size: Option<String>,
        /// Accepted media type patterns; `None` accepts everything.
        #[serde(default)]
        acceptable_media_types: Option<Vec<String>>,
    },
    /// Association or composition to another entity.
    Association {
        /// Target entity name.
        target: String,
        /// Whether children are owned (cascade on delete).
        #[serde(default)]
        composition: bool,
        /// Minimum number of items.
        #[serde(default)]
        min_items: Option<u64>,
        /// Maximum number of items.
        #[serde(default)]
        max_items: Option<u64>,
    },
}

/// One element of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDefinition {
    /// Element name.
    pub name: String,
    /// Element kind.
    #[serde(flatten)]
    pub kind: ElementKind,
}

impl ElementDefinition {
    /// Scalar element.
    #[must_use]
    pub fn scalar(name: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            name: name.into(),
            kind: ElementKind::Scalar { ty },
        }
    }

    /// Content element without restrictions.
    #[must_use]
    pub fn content(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ElementKind::Content {
                max_size: None,
                acceptable_media_types: None,
            },
        }
    }

    /// Composition to `target`.
    #[must_use]
    pub fn composition(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ElementKind::Association {
                target: target.into(),
                composition: true,
                min_items: None,
                max_items: None,
            },
        }
    }

    /// Non-owning association to `target`.
    #[must_use]
    pub fn association(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ElementKind::Association {
                target: target.into(),
                composition: false,
                min_items: None,
                max_items: None,
            },
        }
    }

    /// Set item bounds on an association element; no-op for other kinds.
    #[must_use]
    pub fn with_bounds(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        if let ElementKind::Association {
            min_items,
            max_items,
            ..
        } = &mut self.kind
        {
            *min_items = min;
            *max_items = max;
        }
        self
    }

    /// Association target and composition flag, if this is an association.
    #[must_use]
    pub fn association_target(&self) -> Option<(&str, bool)> {
        match &self.kind {
            ElementKind::Association {
                target,
                composition,
                ..
            } => Some((target.as_str(), *composition)),
            _ => None,
        }
    }

    /// Whether this element holds content bytes.
    #[must_use]
    pub fn is_content(&self) -> bool {
        matches!(self.kind, ElementKind::Content { .. })
    }
}

/// One entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDefinition {
    /// Qualified entity name.
    pub name: String,
    /// Key element names.
    #[serde(default)]
    pub keys: Vec<String>,
    /// Elements, including keys.
    #[serde(default)]
    pub elements: Vec<ElementDefinition>,
    /// Whether the entity holds attachment content.
    #[serde(default)]
    pub attachment: bool,
}

impl EntityDefinition {
    /// Entity with a generated `ID` key.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: vec![names::ID.to_string()],
            elements: vec![ElementDefinition::scalar(names::ID, ScalarType::Uuid)],
            attachment: false,
        }
    }

    /// Attachment entity with the standard aspect elements.
    #[must_use]
    pub fn attachment(name: impl Into<String>) -> Self {
        let mut entity = Self::new(name);
        entity.attachment = true;
        entity.elements.extend([
            ElementDefinition::scalar(names::UP_ID, ScalarType::Uuid),
            ElementDefinition::content(names::CONTENT),
            ElementDefinition::scalar(names::CONTENT_ID, ScalarType::String),
            ElementDefinition::scalar(names::FILE_NAME, ScalarType::String),
            ElementDefinition::scalar(names::MIME_TYPE, ScalarType::String),
            ElementDefinition::scalar(names::STATUS, ScalarType::String),
            ElementDefinition::scalar(names::SCANNED_AT, ScalarType::Timestamp),
        ]);
        entity
    }

    /// Replace the key elements.
    #[must_use]
    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Add or replace an element.
    #[must_use]
    pub fn with_element(mut self, element: ElementDefinition) -> Self {
        self.elements.retain(|e| e.name != element.name);
        self.elements.push(element);
        self
    }

    /// Drop an element.
    #[must_use]
    pub fn without_element(mut self, name: &str) -> Self {
        self.elements.retain(|e| e.name != name);
        self
    }

    /// Set the size limit annotation of the content elements.
    #[must_use]
    pub fn with_max_size(mut self, limit: impl Into<String>) -> Self {
        let limit = limit.into();
        for element in &mut self.elements {
            if let ElementKind::Content { max_size, .. } = &mut element.kind {
                *max_size = Some(limit.clone());
            }
        }
        self
    }

    /// Set the accepted media types of the content elements.
    #[must_use]
    pub fn with_media_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let types: Vec<String> = types.into_iter().map(Into::into).collect();
        for element in &mut self.elements {
            if let ElementKind::Content {
                acceptable_media_types,
                ..
            } = &mut element.kind
            {
                *acceptable_media_types = Some(types.clone());
            }
        }
        self
    }

    /// Look up an element.
    #[must_use]
    pub fn element(&self, name: &str) -> Option<&ElementDefinition> {
        self.elements.iter().find(|e| e.name == name)
    }

    /// Association and composition elements.
    pub fn associations(&self) -> impl Iterator<Item = &ElementDefinition> {
        self.elements
            .iter()
            .filter(|e| matches!(e.kind, ElementKind::Association { .. }))
    }

    /// The content element, if any.
    #[must_use]
    pub fn content_element(&self) -> Option<&ElementDefinition> {
        self.elements.iter().find(|e| e.is_content())
    }

    /// Key elements typed as UUID.
    pub fn uuid_keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str).filter(|key| {
            matches!(
                self.element(key).map(|e| &e.kind),
                Some(ElementKind::Scalar {
                    ty: ScalarType::Uuid
                })
            )
        })
    }
}

/// In-memory schema model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<EntityDefinition>", into = "Vec<EntityDefinition>")]
pub struct Catalog {
    entities: BTreeMap<String, EntityDefinition>,
}

impl Catalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity.
    #[must_use]
    pub fn with(mut self, entity: EntityDefinition) -> Self {
        self.insert(entity);
        self
    }

    /// Add or replace an entity.
    pub fn insert(&mut self, entity: EntityDefinition) {
        self.entities.insert(entity.name.clone(), entity);
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl From<Vec<EntityDefinition>> for Catalog {
    fn from(entities: Vec<EntityDefinition>) -> Self {
        let mut catalog = Self::new();
        for entity in entities {
            catalog.insert(entity);
        }
        catalog
    }
}

impl From<Catalog> for Vec<EntityDefinition> {
    fn from(catalog: Catalog) -> Self {
        catalog.entities.into_values().collect()
    }
}

impl SchemaModel for Catalog {
    fn entity(&self, name: &str) -> Option<&EntityDefinition> {
        self.entities.get(name)
    }
}
