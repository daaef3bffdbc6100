//! Column selection of a read request.

/// One item of a selection list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectItem {
    /// All columns of the current entity.
    Star,
    /// One column.
    Column(String),
    /// Nested selection along an association.
    Expand {
        /// Association name.
        association: String,
        /// Columns selected on the target.
        items: Vec<SelectItem>,
    },
}

/// Selection tree of a read request, rooted at the queried entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Select {
    /// Selected items; empty selects everything.
    pub items: Vec<SelectItem>,
}

impl Select {
    /// Selection of all columns.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Selection of the given columns.
    #[must_use]
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: columns
                .into_iter()
                .map(|c| SelectItem::Column(c.into()))
                .collect(),
        }
    }

    /// Add a nested selection.
    #[must_use]
    pub fn expand(mut self, association: impl Into<String>, nested: Select) -> Self {
        self.items.push(SelectItem::Expand {
            association: association.into(),
            items: nested.items,
        });
        self
    }
}

/// Whether a selection level reads every column.
#[must_use]
pub fn selects_all(items: &[SelectItem]) -> bool {
    items.is_empty() || items.iter().any(|i| matches!(i, SelectItem::Star))
}

/// Whether a selection level names `column`.
#[must_use]
pub fn selects_column(items: &[SelectItem], column: &str) -> bool {
    items
        .iter()
        .any(|i| matches!(i, SelectItem::Column(c) if c == column))
}

/// Nested selection items along one association, if expanded.
pub fn expanded_mut<'s>(
    items: &'s mut [SelectItem],
    association: &str,
) -> Option<&'s mut Vec<SelectItem>> {
    items.iter_mut().find_map(|item| match item {
        SelectItem::Expand {
            association: name,
            items,
        } if name == association => Some(items),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selects_all() {
        assert!(selects_all(&[]));
        assert!(selects_all(&[SelectItem::Column("a".into()), SelectItem::Star]));
        assert!(!selects_all(&[SelectItem::Column("a".into())]));
    }

    #[test]
    fn test_expanded_mut_finds_association() {
        let mut select = Select::columns(["ID"]).expand("attachments", Select::columns(["content"]));
        let nested = expanded_mut(&mut select.items, "attachments").unwrap();
        nested.push(SelectItem::Column("contentId".into()));
        assert!(expanded_mut(&mut select.items, "items").is_none());
        assert_eq!(
            select.items[1],
            SelectItem::Expand {
                association: "attachments".into(),
                items: vec![
                    SelectItem::Column("content".into()),
                    SelectItem::Column("contentId".into())
                ],
            }
        );
    }
}
