//! Attachment path discovery over the entity graph.

use std::collections::HashSet;

use tracing::debug;

use crate::model::{EntityDefinition, SchemaModel, names};

/// One step of a schema path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
    /// Association followed to reach this step; empty for the root.
    pub association: String,
    /// Entity reached.
    pub target: String,
    /// Whether the reached entity holds attachment content.
    pub is_attachment: bool,
    /// Whether the association is a composition (always true for the root).
    pub composition: bool,
}

/// Route from a root entity to an attachment entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaPath {
    segments: Vec<PathSegment>,
}

impl SchemaPath {
    /// Path from its segments; the first is the root.
    #[must_use]
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Path consisting of the root only.
    #[must_use]
    pub fn root(entity: &EntityDefinition) -> Self {
        Self::new(vec![PathSegment {
            association: String::new(),
            target: entity.name.clone(),
            is_attachment: entity.attachment,
            composition: true,
        }])
    }

    /// All segments, root first.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Root entity name.
    #[must_use]
    pub fn root_entity(&self) -> &str {
        self.segments.first().map_or("", |s| s.target.as_str())
    }

    /// Entity at the end of the path.
    #[must_use]
    pub fn target(&self) -> &str {
        self.segments.last().map_or("", |s| s.target.as_str())
    }

    /// Association names below the root.
    #[must_use]
    pub fn associations(&self) -> Vec<&str> {
        self.segments
            .iter()
            .skip(1)
            .map(|s| s.association.as_str())
            .collect()
    }

    /// Number of associations below the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }

    /// Root name followed by the association names, dot separated.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        let mut name = self.root_entity().to_string();
        for association in self.associations() {
            name.push('.');
            name.push_str(association);
        }
        name
    }

    /// Whether every association below the root is a composition, so the
    /// attachments are owned by (and deleted with) the root row.
    #[must_use]
    pub fn is_cascading(&self) -> bool {
        self.segments.iter().skip(1).all(|s| s.composition)
    }
}

impl std::fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

/// Depth-first walk from a root entity to every reachable attachment entity.
///
/// Every association (keyed by declaring entity and association name) is
/// followed at most once per walk. An entity claims all of its unvisited
/// associations before descending, so the shortest route through an
/// association wins and the number of paths never exceeds the number of
/// associations. Attachment entities reached under different association
/// names are all reported.
pub struct SchemaGraphWalker<'a> {
    schema: &'a dyn SchemaModel,
}

impl<'a> SchemaGraphWalker<'a> {
    /// Create a walker over `schema`.
    #[must_use]
    pub fn new(schema: &'a dyn SchemaModel) -> Self {
        Self { schema }
    }

    /// Every path from `root` to an attachment entity.
    #[must_use]
    pub fn walk(&self, root: &str) -> Vec<SchemaPath> {
        let Some(entity) = self.schema.entity(root) else {
            debug!(entity = root, "unknown root entity, no attachment paths");
            return Vec::new();
        };

        let mut found = Vec::new();
        let mut route = SchemaPath::root(entity).segments;
        if entity.attachment {
            found.push(SchemaPath::new(route.clone()));
        }
        let mut visited = HashSet::new();
        self.visit(entity, &mut route, &mut visited, &mut found);

        debug!(entity = root, paths = found.len(), "attachment paths discovered");
        found
    }

    fn visit(
        &self,
        entity: &EntityDefinition,
        route: &mut Vec<PathSegment>,
        visited: &mut HashSet<String>,
        found: &mut Vec<SchemaPath>,
    ) {
        let mut claimed = Vec::new();
        for element in entity.associations() {
            if element.name == names::SIBLING_ENTITY {
                continue;
            }
            let Some((target, composition)) = element.association_target() else {
                continue;
            };
            let edge = format!("{}.{}", entity.name, element.name);
            if !visited.insert(edge.clone()) {
                continue;
            }
            let Some(target) = self.schema.entity(target) else {
                debug!(association = %edge, target, "association target not in schema, skipped");
                continue;
            };
            claimed.push((element.name.clone(), target, composition));
        }

        for (association, target, composition) in claimed {
            route.push(PathSegment {
                association,
                target: target.name.clone(),
                is_attachment: target.attachment,
                composition,
            });
            if target.attachment {
                found.push(SchemaPath::new(route.clone()));
            }
            self.visit(target, route, visited, found);
            route.pop();
        }
    }
}
