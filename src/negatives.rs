//! Sampled negatives for evaluation against a reduced candidate set.
//!
//! Ranking every evaluation triple against the whole entity vocabulary is
//! expensive for large graphs. Sampled evaluation instead ranks the true
//! answer against a fixed number of entities that are known *not* to be true
//! answers for the triple's grouping key.
//!
//! For each target (head, tail) independently:
//! 1. Group evaluation triples by their grouping key.
//! 2. The candidate pool of a key is every entity id minus the answers known
//!    for that key across all supplied triples.
//! 3. Pools smaller than the sample count are repeated until large enough
//!    (with a warning), so sampling may return duplicates.
//! 4. Every triple in the group draws its own sample without replacement.
//!
//! Sampling is reproducible for a fixed seed.

use std::collections::{BTreeMap, HashSet};

use ndarray::Array2;
use rand::prelude::*;
use rand_xorshift::XorShiftRng;
use tracing::warn;

use crate::error::{Error, Result};
use crate::filter::{KnownTriples, MappedTriple};
use crate::key::Target;

/// Negative entity ids per evaluation triple, one table per target.
///
/// Both tables have shape `(num_triples, num_negatives)`; row `i` belongs to
/// the `i`-th evaluation triple.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledNegatives {
    pub head: Array2<usize>,
    pub tail: Array2<usize>,
}

impl SampledNegatives {
    pub fn new(head: Array2<usize>, tail: Array2<usize>) -> Self {
        Self { head, tail }
    }

    /// Table for `target`.
    pub fn get(&self, target: Target) -> &Array2<usize> {
        match target {
            Target::Head => &self.head,
            Target::Tail => &self.tail,
        }
    }

    /// Check both tables have one row per evaluation triple.
    pub fn validate(&self, num_triples: usize) -> Result<()> {
        for target in Target::ALL {
            let table = self.get(target);
            if table.nrows() != num_triples {
                return Err(Error::Shape(format!(
                    "negatives for {target} have shape {:?}, expected {num_triples} rows",
                    table.dim()
                )));
            }
        }
        Ok(())
    }
}

/// Sample `num_samples` true negatives per evaluation triple and target.
///
/// # Arguments
/// * `evaluation_triples` - The triples to be evaluated
/// * `additional_filter_triples` - Further known triples (e.g. training and
///   validation splits) whose answers must not be sampled
/// * `num_samples` - Negatives per triple
/// * `num_entities` - Entity count; inferred from the largest id if `None`
/// * `seed` - Random seed for reproducibility
///
/// # Errors
/// [`Error::Validation`] if `num_samples` exceeds the entity count, or if a
/// key has no candidates at all.
pub fn sample_negatives(
    evaluation_triples: &[MappedTriple],
    additional_filter_triples: &[MappedTriple],
    num_samples: usize,
    num_entities: Option<usize>,
    seed: u64,
) -> Result<SampledNegatives> {
    let known = KnownTriples::from_triples(evaluation_triples.iter().chain(additional_filter_triples));
    let num_entities = num_entities
        .or_else(|| known.max_entity_id().map(|id| id + 1))
        .unwrap_or(0);
    if num_samples > num_entities {
        return Err(Error::Validation(format!(
            "cannot use {num_samples} negative samples with only {num_entities} entities"
        )));
    }

    let mut rng = XorShiftRng::seed_from_u64(seed);
    let num_triples = evaluation_triples.len();
    let mut tables = Target::ALL.map(|_| Array2::zeros((num_triples, num_samples)));

    for target in Target::ALL {
        // BTreeMap keeps the draw order, and thus the result, seed-deterministic.
        let mut groups: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
        for (i, triple) in evaluation_triples.iter().enumerate() {
            groups.entry(triple.key(target)).or_default().push(i);
        }

        let table = &mut tables[target.index()];
        for (key, indices) in groups {
            let mut pool = candidate_pool(num_entities, known.answers(target, key));
            if pool.len() < num_samples {
                warn!(
                    "There are less than num_samples={} candidates for side={}, key={:?} (pool size {})",
                    num_samples,
                    target,
                    key,
                    pool.len()
                );
                pool = tile_pool(pool, num_samples)?;
            }
            for i in indices {
                for (j, &entity) in pool.choose_multiple(&mut rng, num_samples).enumerate() {
                    table[[i, j]] = entity;
                }
            }
        }
    }

    let [head, tail] = tables;
    Ok(SampledNegatives { head, tail })
}

/// Entity ids in `0..num_entities` that are not known answers.
pub fn candidate_pool(num_entities: usize, known_answers: Option<&HashSet<usize>>) -> Vec<usize> {
    (0..num_entities)
        .filter(|id| known_answers.map_or(true, |answers| !answers.contains(id)))
        .collect()
}

/// Repeat `pool` until it holds at least `num_samples` entries.
///
/// # Errors
/// [`Error::Validation`] if the pool is empty.
pub fn tile_pool(pool: Vec<usize>, num_samples: usize) -> Result<Vec<usize>> {
    if pool.len() >= num_samples {
        return Ok(pool);
    }
    if pool.is_empty() {
        return Err(Error::Validation(
            "no candidate entities left after removing known answers".to_string(),
        ));
    }
    let repeats = num_samples.div_ceil(pool.len());
    Ok(pool.repeat(repeats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    /// Log sink collecting formatted events in memory.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, logs.contents())
    }

    fn star(num_tails: usize) -> Vec<MappedTriple> {
        (1..=num_tails).map(|t| MappedTriple::new(0, 0, t)).collect()
    }

    #[test]
    fn test_too_many_samples() {
        let triples = star(3);
        let result = sample_negatives(&triples, &[], 50, Some(40), 42);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_tile_small_pool() {
        let tiled = tile_pool(vec![7, 8, 9], 5).unwrap();
        assert!(tiled.len() >= 5);
        assert_eq!(&tiled[..3], &[7, 8, 9]);
        assert!(tiled.iter().all(|e| [7, 8, 9].contains(e)));
        assert!(tile_pool(Vec::new(), 1).is_err());
    }

    #[test]
    fn test_negatives_exclude_known_answers() {
        let triples = star(4);
        let negatives = sample_negatives(&triples, &[], 3, Some(10), 7).unwrap();
        assert_eq!(negatives.tail.dim(), (4, 3));
        assert_eq!(negatives.head.dim(), (4, 3));

        // Tails 1..=4 are all true answers for key (0, 0).
        for &entity in negatives.tail.iter() {
            assert!(!(1..=4).contains(&entity), "sampled true answer {entity}");
        }
        // Without tiling every row is drawn without replacement.
        for row in negatives.tail.rows() {
            let unique: HashSet<_> = row.iter().collect();
            assert_eq!(unique.len(), 3);
        }
    }

    #[test]
    fn test_small_pool_is_tiled() {
        // 6 entities, tails 0, 1, 2, 5 known for (0, 0): tail pool is {3, 4}.
        let triples = star(2);
        let extra = [MappedTriple::new(0, 0, 0), MappedTriple::new(0, 0, 5)];
        let (negatives, logs) = with_captured_logs(|| sample_negatives(&triples, &extra, 5, Some(6), 1));
        for &entity in negatives.unwrap().tail.iter() {
            assert!([3, 4].contains(&entity));
        }
        assert!(logs.contains("WARN"), "no warning in {logs:?}");
        assert!(logs.contains("num_samples=5"));
        assert!(logs.contains("pool size 2"));
    }

    #[test]
    fn test_large_pool_logs_nothing() {
        let triples = star(2);
        let (negatives, logs) = with_captured_logs(|| sample_negatives(&triples, &[], 3, Some(10), 1));
        assert!(negatives.is_ok());
        assert!(!logs.contains("WARN"), "unexpected warning in {logs:?}");
    }

    #[test]
    fn test_seed_reproducible() {
        let triples = star(5);
        let a = sample_negatives(&triples, &[], 4, Some(30), 11).unwrap();
        let b = sample_negatives(&triples, &[], 4, Some(30), 11).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_validate_rows() {
        let negatives = SampledNegatives::new(Array2::zeros((2, 3)), Array2::zeros((3, 3)));
        assert!(matches!(negatives.validate(2), Err(Error::Shape(_))));
        assert!(negatives.validate(3).is_err());
    }

    #[test]
    fn test_infers_entity_count() {
        let triples = star(4);
        let negatives = sample_negatives(&triples, &[], 1, None, 3).unwrap();
        for &entity in negatives.head.iter() {
            assert!(entity < 5);
            assert_ne!(entity, 0);
        }
    }
}
