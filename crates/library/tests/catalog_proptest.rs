//! Property-based tests for catalog ordering.
//! Verifies the bound, sort and shuffle invariants for arbitrary path sets.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use library::{path_arena, TrackCatalog};
use proptest::collection::vec;
use rand::rngs::SmallRng;
use rand::SeedableRng;

const CAPACITY: usize = 24;

fn fill<'a>(arena: &'a mut [library::TrackPath], paths: &[String]) -> TrackCatalog<'a> {
    let mut catalog = TrackCatalog::new(arena);
    for path in paths {
        if catalog.push(path).is_err() {
            break;
        }
    }
    catalog
}

fn sorted(mut paths: Vec<String>) -> Vec<String> {
    paths.sort();
    paths
}

proptest::proptest! {
    /// Pushing never grows the catalog past its arena.
    #[test]
    fn length_never_exceeds_capacity(paths in vec("/[a-z]{1,12}\\.wav", 0..64)) {
        let mut arena = path_arena::<CAPACITY>();
        let catalog = fill(&mut arena, &paths);
        assert!(catalog.len() <= catalog.capacity());
        assert_eq!(catalog.len(), paths.len().min(CAPACITY));
    }

    /// Sorting a sorted catalog changes nothing.
    #[test]
    fn sort_is_idempotent(paths in vec("/[a-zA-Z0-9/]{1,20}\\.wav", 0..CAPACITY)) {
        let mut arena = path_arena::<CAPACITY>();
        let mut catalog = fill(&mut arena, &paths);
        catalog.sort();
        let once: Vec<String> = catalog.iter().map(str::to_string).collect();
        catalog.sort();
        assert!(catalog.iter().eq(once.iter().map(String::as_str)));
        assert_eq!(once, sorted(paths));
    }

    /// A shuffle is a permutation, and sorting afterwards restores lexical order.
    #[test]
    fn shuffle_then_sort_is_lexical(
        paths in vec("/[a-z]{1,10}\\.wav", 0..CAPACITY),
        seed in 0u64..=u64::MAX,
    ) {
        let mut arena = path_arena::<CAPACITY>();
        let mut catalog = fill(&mut arena, &paths);
        catalog.shuffle(&mut SmallRng::seed_from_u64(seed));

        let shuffled: Vec<String> = catalog.iter().map(str::to_string).collect();
        assert_eq!(sorted(shuffled), sorted(paths.clone()));

        catalog.sort();
        assert!(catalog.iter().eq(sorted(paths).iter().map(String::as_str)));
    }

    /// The same seed always yields the same order.
    #[test]
    fn shuffle_is_deterministic_per_seed(
        paths in vec("/[a-z]{1,10}\\.wav", 0..CAPACITY),
        seed in 0u64..=u64::MAX,
    ) {
        let mut first_arena = path_arena::<CAPACITY>();
        let mut second_arena = path_arena::<CAPACITY>();
        let mut first = fill(&mut first_arena, &paths);
        let mut second = fill(&mut second_arena, &paths);
        first.shuffle(&mut SmallRng::seed_from_u64(seed));
        second.shuffle(&mut SmallRng::seed_from_u64(seed));
        assert!(first.iter().eq(second.iter()));
    }
}
