//! Item-count bounds of compositions.

use crate::attachment::{AttachmentError, DraftMode};
use crate::model::{ElementKind, EntityDefinition, Row, SchemaModel};

/// Which bounds apply to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountMode {
    /// Only the maximum (creates and intermediate draft edits).
    MaxOnly,
    /// Minimum and maximum.
    Both,
}

impl CountMode {
    /// Bounds for a create request.
    #[must_use]
    pub fn for_create(draft: DraftMode) -> Self {
        match draft {
            DraftMode::Activate => Self::Both,
            DraftMode::Inactive | DraftMode::Edit => Self::MaxOnly,
        }
    }

    /// Bounds for an update request.
    #[must_use]
    pub fn for_update(draft: DraftMode) -> Self {
        match draft {
            DraftMode::Edit => Self::MaxOnly,
            DraftMode::Inactive | DraftMode::Activate => Self::Both,
        }
    }
}

/// Check one composition count against its inclusive bounds.
///
/// # Errors
///
/// Returns `MaximumAmountExceeded` or, when `mode` includes it,
/// `MinimumAmountNotFulfilled`.
pub fn check_bounds(
    composition: &str,
    actual: u64,
    min: Option<u64>,
    max: Option<u64>,
    mode: CountMode,
) -> Result<(), AttachmentError> {
    if let Some(max) = max
        && actual > max
    {
        return Err(AttachmentError::MaximumAmountExceeded {
            composition: composition.to_string(),
            max,
            actual,
        });
    }
    if mode == CountMode::Both
        && let Some(min) = min
        && actual < min
    {
        return Err(AttachmentError::MinimumAmountNotFulfilled {
            composition: composition.to_string(),
            min,
            actual,
        });
    }
    Ok(())
}

/// Validates declared item counts of every composition present in a payload.
pub struct CountValidator<'a> {
    schema: &'a dyn SchemaModel,
}

impl<'a> CountValidator<'a> {
    /// Create a validator over `schema`.
    #[must_use]
    pub fn new(schema: &'a dyn SchemaModel) -> Self {
        Self { schema }
    }

    /// Validate `rows` of `entity` and their nested compositions.
    ///
    /// Compositions absent from the payload are not validated.
    ///
    /// # Errors
    ///
    /// Returns the first bound violation found.
    pub fn validate(&self, entity: &str, rows: &[Row], mode: CountMode) -> Result<(), AttachmentError> {
        match self.schema.entity(entity) {
            Some(definition) => self.validate_rows(definition, rows, mode),
            None => Ok(()),
        }
    }

    fn validate_rows(
        &self,
        entity: &EntityDefinition,
        rows: &[Row],
        mode: CountMode,
    ) -> Result<(), AttachmentError> {
        for element in entity.associations() {
            let ElementKind::Association {
                target,
                composition: true,
                min_items,
                max_items,
            } = &element.kind
            else {
                continue;
            };
            let Some(target) = self.schema.entity(target) else {
                continue;
            };
            let qualified = format!("{}.{}", entity.name, element.name);
            for row in rows {
                let Some(children) = row.children(&element.name) else {
                    continue;
                };
                check_bounds(&qualified, children.len() as u64, *min_items, *max_items, mode)?;
                // Self-referencing compositions end where the payload ends.
                self.validate_rows(target, children, mode)?;
            }
        }
        Ok(())
    }
}
