//! Property-based tests for attachment path discovery.

use std::collections::HashSet;

use proptest::prelude::*;

use super::walker::SchemaGraphWalker;
use crate::model::{Catalog, ElementDefinition, EntityDefinition};

const ENTITIES: usize = 5;

fn catalog(edges: &[(usize, usize, bool)], attachments: &[bool]) -> Catalog {
    let mut entities: Vec<EntityDefinition> = (0..ENTITIES)
        .map(|i| {
            if attachments[i] {
                EntityDefinition::attachment(format!("E{i}"))
            } else {
                EntityDefinition::new(format!("E{i}"))
            }
        })
        .collect();
    for (n, (from, to, composition)) in edges.iter().enumerate() {
        let name = format!("a{n}");
        let target = format!("E{to}");
        let element = if *composition {
            ElementDefinition::composition(name, target)
        } else {
            ElementDefinition::association(name, target)
        };
        let entity = entities[*from].clone().with_element(element);
        entities[*from] = entity;
    }
    Catalog::from(entities)
}

// The walk terminates on arbitrary graphs, including self references and
// mutual references, never reports the same route twice and reports at most
// one path per association.
proptest! {
    #[test]
    fn prop_walk_is_bounded_without_duplicates(
        edges in prop::collection::vec((0..ENTITIES, 0..ENTITIES, any::<bool>()), 0..7),
        attachments in prop::collection::vec(any::<bool>(), ENTITIES),
    ) {
        let catalog = catalog(&edges, &attachments);
        let paths = SchemaGraphWalker::new(&catalog).walk("E0");

        let unique: HashSet<_> = paths.iter().collect();
        prop_assert_eq!(unique.len(), paths.len());

        // Each path ends in an association of its own, or is the root.
        prop_assert!(paths.len() <= edges.len() + 1);
        for path in &paths {
            prop_assert!(path.segments().last().is_some_and(|s| s.is_attachment));
            prop_assert!(path.depth() <= edges.len());
        }
    }
}
