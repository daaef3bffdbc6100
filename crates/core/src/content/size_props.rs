//! Property-based tests for size parsing and the streaming byte counter.

use bytes::Bytes;
use proptest::prelude::*;

use super::size::{SizeGuard, parse_size};
use super::stream::Content;

// Whole byte counts in every unit round-trip through the parser.
proptest! {
    #[test]
    fn prop_whole_sizes_parse_exactly(n in 0u64..1_000_000, unit in 0usize..9) {
        let (suffix, scale) = [
            ("B", 1u64),
            ("KB", 1_000),
            ("MB", 1_000_000),
            ("GB", 1_000_000_000),
            ("TB", 1_000_000_000_000),
            ("KiB", 1 << 10),
            ("MiB", 1 << 20),
            ("GiB", 1 << 30),
            ("TiB", 1 << 40),
        ][unit];
        prop_assert_eq!(parse_size(&format!("{n}{suffix}")).unwrap(), n * scale);
        prop_assert_eq!(parse_size(&format!("{n} {}", suffix.to_lowercase())).unwrap(), n * scale);
    }

    #[test]
    fn prop_counting_never_passes_the_limit(
        chunks in prop::collection::vec(1usize..64, 0..16),
        limit in 0u64..512,
    ) {
        let total: u64 = chunks.iter().map(|c| *c as u64).sum();
        let guard = SizeGuard::new(limit);
        let content = guard.wrap(Content::new(futures::stream::iter(
            chunks.into_iter().map(|n| Ok(Bytes::from(vec![0u8; n]))).collect::<Vec<_>>(),
        )));
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let result = runtime.block_on(content.into_bytes());

        prop_assert_eq!(result.is_ok(), total <= limit);
        prop_assert_eq!(guard.exceeded(), total > limit);
    }
}
