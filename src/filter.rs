//! Known-triple index for the filtered evaluation protocol.
//!
//! # Filtered vs Raw Ranking
//!
//! | Setting | Description | Use Case |
//! |---------|-------------|----------|
//! | Raw | All entities as negatives | Pessimistic estimate |
//! | Filtered | Remove known true triples | Standard benchmark |
//!
//! Raw ranking penalizes a model for scoring *another* true answer above the
//! one under evaluation. Filtering masks every other known answer (from the
//! training, validation and test splits) with `NaN` before ranks are computed.

use std::collections::{HashMap, HashSet};

use ndarray::ArrayViewMut2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::key::Target;

/// A triple of entity / relation ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MappedTriple {
    /// Head entity id.
    pub head: usize,
    /// Relation id.
    pub relation: usize,
    /// Tail entity id.
    pub tail: usize,
}

impl MappedTriple {
    /// Create a new triple.
    pub fn new(head: usize, relation: usize, tail: usize) -> Self {
        Self { head, relation, tail }
    }

    /// The entity at the predicted position.
    pub fn entity(&self, target: Target) -> usize {
        match target {
            Target::Head => self.head,
            Target::Tail => self.tail,
        }
    }

    /// The two positions that are *not* predicted, in triple order.
    ///
    /// `(relation, tail)` for head prediction, `(head, relation)` for tail
    /// prediction.
    pub fn key(&self, target: Target) -> (usize, usize) {
        match target {
            Target::Head => (self.relation, self.tail),
            Target::Tail => (self.head, self.relation),
        }
    }
}

impl From<(usize, usize, usize)> for MappedTriple {
    fn from((head, relation, tail): (usize, usize, usize)) -> Self {
        Self::new(head, relation, tail)
    }
}

/// All known true answers, indexed per target by the grouping key.
#[derive(Debug, Clone, Default)]
pub struct KnownTriples {
    answers: [HashMap<(usize, usize), HashSet<usize>>; 2],
    len: usize,
}

impl KnownTriples {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from any number of triple collections.
    pub fn from_triples<'a>(triples: impl IntoIterator<Item = &'a MappedTriple>) -> Self {
        let mut known = Self::new();
        known.add_triples(triples.into_iter().copied());
        known
    }

    /// Add a known triple.
    pub fn add_triple(&mut self, triple: MappedTriple) {
        let mut inserted = false;
        for target in Target::ALL {
            inserted |= self.answers[target.index()]
                .entry(triple.key(target))
                .or_default()
                .insert(triple.entity(target));
        }
        if inserted {
            self.len += 1;
        }
    }

    /// Add multiple known triples.
    pub fn add_triples(&mut self, triples: impl IntoIterator<Item = MappedTriple>) {
        for triple in triples {
            self.add_triple(triple);
        }
    }

    /// Check if a triple is known.
    pub fn contains(&self, triple: &MappedTriple) -> bool {
        self.answers[Target::Tail.index()]
            .get(&triple.key(Target::Tail))
            .is_some_and(|tails| tails.contains(&triple.tail))
    }

    /// Number of distinct known triples.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Known answers for `key` when predicting `target`.
    pub fn answers(&self, target: Target, key: (usize, usize)) -> Option<&HashSet<usize>> {
        self.answers[target.index()].get(&key)
    }

    /// Largest entity id seen at a head or tail position.
    pub fn max_entity_id(&self) -> Option<usize> {
        self.answers
            .iter()
            .flat_map(|index| index.values())
            .flat_map(|answers| answers.iter().copied())
            .max()
    }

    /// Mask every known answer except the evaluated one with `NaN`.
    ///
    /// Row `i` of `scores` holds candidate scores for `batch[i]`.
    pub fn filter_scores(
        &self,
        batch: &[MappedTriple],
        target: Target,
        mut scores: ArrayViewMut2<'_, f64>,
    ) -> Result<()> {
        if batch.len() != scores.nrows() {
            return Err(Error::Shape(format!(
                "{} triples for a score matrix with {} rows",
                batch.len(),
                scores.nrows()
            )));
        }
        let num_candidates = scores.ncols();
        for (i, triple) in batch.iter().enumerate() {
            let Some(answers) = self.answers(target, triple.key(target)) else {
                continue;
            };
            let own = triple.entity(target);
            for &entity in answers {
                if entity == own {
                    continue;
                }
                if entity >= num_candidates {
                    return Err(Error::Shape(format!(
                        "known entity {entity} outside of {num_candidates} candidates"
                    )));
                }
                scores[[i, entity]] = f64::NAN;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_known_triples() {
        let mut known = KnownTriples::new();
        known.add_triple(MappedTriple::new(0, 0, 1));
        known.add_triple(MappedTriple::new(0, 0, 1));

        assert!(known.contains(&MappedTriple::new(0, 0, 1)));
        assert!(!known.contains(&MappedTriple::new(0, 0, 2)));
        assert_eq!(known.len(), 1);
    }

    #[test]
    fn test_keys() {
        let t = MappedTriple::new(3, 1, 7);
        assert_eq!(t.key(Target::Head), (1, 7));
        assert_eq!(t.key(Target::Tail), (3, 1));
        assert_eq!(t.entity(Target::Head), 3);
    }

    #[test]
    fn test_filter_scores_keeps_own_answer() {
        let known = KnownTriples::from_triples(&[
            MappedTriple::new(0, 0, 1),
            MappedTriple::new(0, 0, 2),
            MappedTriple::new(3, 0, 2),
        ]);
        let batch = [MappedTriple::new(0, 0, 1)];
        let mut scores = Array2::from_elem((1, 4), 1.0);
        known.filter_scores(&batch, Target::Tail, scores.view_mut()).unwrap();

        assert_eq!(scores[[0, 1]], 1.0);
        assert!(scores[[0, 2]].is_nan());
        assert_eq!(scores[[0, 0]], 1.0);

        let mut scores = Array2::from_elem((1, 4), 1.0);
        known
            .filter_scores(&[MappedTriple::new(0, 0, 2)], Target::Head, scores.view_mut())
            .unwrap();
        assert!(scores[[0, 3]].is_nan());
        assert_eq!(scores[[0, 0]], 1.0);
    }

    #[test]
    fn test_max_entity_id() {
        let known = KnownTriples::from_triples(&[MappedTriple::new(4, 9, 2)]);
        assert_eq!(known.max_entity_id(), Some(4));
    }
}
