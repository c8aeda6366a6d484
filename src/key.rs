//! Metric keys: sides, rank types, and the metric-name grammar.
//!
//! A metric is addressed by a dotted specification
//!
//! ```text
//! <name>[.<side>][.<rank_type>][.<k>]
//! ```
//!
//! which [`MetricKey::lookup`] normalizes into a canonical 4-tuple. Lookup is
//! case-insensitive, folds spaces in the name to underscores, resolves
//! synonyms (`mrr`, `mr`, `amri`, `hits@5`, ...) and fills in defaults
//! (`both`, `realistic`, `k = 10`).
//!
//! | Input | Canonical |
//! |-------|-----------|
//! | `mrr` | `inverse_harmonic_mean_rank.both.realistic` |
//! | `hits@5` | `hits_at_k.both.realistic.5` |
//! | `mr.head.best` | `arithmetic_mean_rank.head.optimistic` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Canonical name of the hits@k metric.
pub const HITS_AT_K: &str = "hits_at_k";

/// `k` used when a hits@k specification does not name one.
pub const DEFAULT_HITS_K: usize = 10;

const ARITHMETIC_MEAN_RANK: &str = "arithmetic_mean_rank";
const INVERSE_ARITHMETIC_MEAN_RANK: &str = "inverse_arithmetic_mean_rank";
const INVERSE_GEOMETRIC_MEAN_RANK: &str = "inverse_geometric_mean_rank";
const INVERSE_HARMONIC_MEAN_RANK: &str = "inverse_harmonic_mean_rank";
const ADJUSTED_ARITHMETIC_MEAN_RANK: &str = "adjusted_arithmetic_mean_rank";
const ADJUSTED_ARITHMETIC_MEAN_RANK_INDEX: &str = "adjusted_arithmetic_mean_rank_index";

const HITS_PREFIXES: [&str; 3] = ["hits_at_", "hits@", "h@"];

const METRIC_SYNONYMS: [(&str, &str); 12] = [
    ("adjusted_mean_rank", ADJUSTED_ARITHMETIC_MEAN_RANK),
    ("adjusted_mean_rank_index", ADJUSTED_ARITHMETIC_MEAN_RANK_INDEX),
    ("amr", ADJUSTED_ARITHMETIC_MEAN_RANK),
    ("aamr", ADJUSTED_ARITHMETIC_MEAN_RANK),
    ("amri", ADJUSTED_ARITHMETIC_MEAN_RANK_INDEX),
    ("aamri", ADJUSTED_ARITHMETIC_MEAN_RANK_INDEX),
    ("igmr", INVERSE_GEOMETRIC_MEAN_RANK),
    ("iamr", INVERSE_ARITHMETIC_MEAN_RANK),
    ("mr", ARITHMETIC_MEAN_RANK),
    ("mean_rank", ARITHMETIC_MEAN_RANK),
    ("mrr", INVERSE_HARMONIC_MEAN_RANK),
    ("mean_reciprocal_rank", INVERSE_HARMONIC_MEAN_RANK),
];

/// Metrics whose expectation under random ordering only exists for realistic ranks.
const REALISTIC_ONLY: [&str; 2] = [ADJUSTED_ARITHMETIC_MEAN_RANK, ADJUSTED_ARITHMETIC_MEAN_RANK_INDEX];

/// The triple position being predicted for one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Predict the head: (?, r, t).
    Head,
    /// Predict the tail: (h, r, ?).
    Tail,
}

impl Target {
    /// Both targets, head first.
    pub const ALL: [Target; 2] = [Target::Head, Target::Tail];

    /// Lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Head => "head",
            Self::Tail => "tail",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Head => 0,
            Self::Tail => 1,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side of a result: a single target or the pooled `both` view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Head prediction only.
    Head,
    /// Tail prediction only.
    Tail,
    /// Head and tail observations pooled.
    Both,
}

impl Side {
    /// All sides in reporting order.
    pub const ALL: [Side; 3] = [Side::Head, Side::Tail, Side::Both];

    /// Lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Head => "head",
            Self::Tail => "tail",
            Self::Both => "both",
        }
    }

    /// Stored targets making up this side, head before tail.
    pub fn targets(self) -> &'static [Target] {
        match self {
            Self::Head => &[Target::Head],
            Self::Tail => &[Target::Tail],
            Self::Both => &Target::ALL,
        }
    }
}

impl From<Target> for Side {
    fn from(target: Target) -> Self {
        match target {
            Target::Head => Side::Head,
            Target::Tail => Side::Tail,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "head" => Ok(Self::Head),
            "tail" => Ok(Self::Tail),
            "both" => Ok(Self::Both),
            other => Err(Error::InvalidSpecification(format!(
                "invalid side {other:?}, allowed are head, tail, both"
            ))),
        }
    }
}

/// How ties between the true answer and other candidates are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankType {
    /// Ties broken in favor of the true answer.
    Optimistic,
    /// Ties broken against the true answer.
    Pessimistic,
    /// Mean of optimistic and pessimistic.
    Realistic,
    /// Realistic rank expected under a uniformly random ordering.
    ExpectedRealistic,
}

impl RankType {
    /// Rank types that metrics are reported for.
    pub const BASE: [RankType; 3] = [RankType::Optimistic, RankType::Pessimistic, RankType::Realistic];

    /// Every rank type an evaluator buffers.
    pub const ALL: [RankType; 4] = [
        RankType::Optimistic,
        RankType::Pessimistic,
        RankType::Realistic,
        RankType::ExpectedRealistic,
    ];

    /// Lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Optimistic => "optimistic",
            Self::Pessimistic => "pessimistic",
            Self::Realistic => "realistic",
            Self::ExpectedRealistic => "expected_realistic",
        }
    }

    /// The chance baseline for this rank type, if one is defined.
    pub fn expected(self) -> Option<RankType> {
        match self {
            Self::Realistic => Some(Self::ExpectedRealistic),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Optimistic => 0,
            Self::Pessimistic => 1,
            Self::Realistic => 2,
            Self::ExpectedRealistic => 3,
        }
    }

    /// Resolve a user-facing rank type name or synonym to a base rank type.
    fn from_synonym(s: &str) -> Option<Self> {
        match s {
            "optimistic" | "best" => Some(Self::Optimistic),
            "pessimistic" | "worst" => Some(Self::Pessimistic),
            "realistic" | "avg" | "average" => Some(Self::Realistic),
            _ => None,
        }
    }
}

impl fmt::Display for RankType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical address of one metric value.
///
/// `k` is set exactly when `name == "hits_at_k"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricKey {
    /// Canonical metric name.
    pub name: String,
    /// Side the metric is computed over.
    pub side: Side,
    /// Rank semantics.
    pub rank_type: RankType,
    /// Cutoff for hits@k.
    pub k: Option<usize>,
}

impl MetricKey {
    /// Build a key from already-canonical parts.
    pub fn new(name: impl Into<String>, side: Side, rank_type: RankType, k: Option<usize>) -> Self {
        Self {
            name: name.into(),
            side,
            rank_type,
            k,
        }
    }

    /// Parse and normalize a metric specification.
    ///
    /// Validation runs in order: name, hits@k rewriting, synonyms, side,
    /// rank type.
    pub fn lookup(spec: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidSpecification(format!("{spec:?}: {reason}"));

        let mut parts = spec.split('.');
        let mut name = parts
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase()
            .replace(' ', "_");
        if name.is_empty() {
            return Err(invalid("a metric name must be provided"));
        }

        // Optional components must appear in order: side, rank type, k.
        let mut side = None;
        let mut rank_type = None;
        let mut k_token: Option<String> = None;
        let mut position = 0;
        for raw in parts {
            let token = raw.trim().to_lowercase();
            if position < 1 {
                if let Ok(parsed) = token.parse::<Side>() {
                    side = Some(parsed);
                    position = 1;
                    continue;
                }
            }
            if position < 2 {
                if let Some(parsed) = RankType::from_synonym(&token) {
                    rank_type = Some(parsed);
                    position = 2;
                    continue;
                }
            }
            if position < 3 {
                k_token = Some(token);
                position = 3;
                continue;
            }
            return Err(invalid("too many components"));
        }

        let mut k = None;
        if let Some(suffix) = HITS_PREFIXES.iter().find_map(|p| name.strip_prefix(p)) {
            let embedded = (suffix != "k").then(|| suffix.to_string());
            k = match k_token.take().or(embedded) {
                Some(token) => Some(parse_k(&token)?),
                None => Some(DEFAULT_HITS_K),
            };
            name = HITS_AT_K.to_string();
        } else if let Some(token) = k_token {
            return Err(if token.chars().all(|c| c.is_ascii_digit()) {
                invalid("k is only valid for hits_at_k")
            } else {
                invalid(&format!("unrecognized component {token:?}"))
            });
        }

        if !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '@') {
            return Err(invalid("metric names may only contain word characters and '@'"));
        }

        if let Some((_, canonical)) = METRIC_SYNONYMS.iter().find(|(alias, _)| *alias == name) {
            name = (*canonical).to_string();
        }

        let side = side.unwrap_or(Side::Both);
        let rank_type = rank_type.unwrap_or(RankType::Realistic);
        if rank_type != RankType::Realistic && REALISTIC_ONLY.contains(&name.as_str()) {
            return Err(Error::Validation(format!(
                "invalid rank type for {name}: {rank_type}, only realistic is allowed"
            )));
        }

        Ok(Self {
            name,
            side,
            rank_type,
            k,
        })
    }

    /// Canonical string form of `spec`.
    pub fn normalize(spec: &str) -> Result<String> {
        Ok(Self::lookup(spec)?.to_string())
    }
}

fn parse_k(token: &str) -> Result<usize> {
    let value: i64 = token
        .parse()
        .map_err(|_| Error::InvalidK(format!("{token:?} is not an integer")))?;
    usize::try_from(value).map_err(|_| Error::InvalidK(format!("k must be non-negative, found {value}")))
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.name, self.side, self.rank_type)?;
        if let Some(k) = self.k {
            write!(f, ".{k}")?;
        }
        Ok(())
    }
}

impl FromStr for MetricKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::lookup(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let key = MetricKey::lookup("arithmetic_mean_rank").unwrap();
        assert_eq!(key.side, Side::Both);
        assert_eq!(key.rank_type, RankType::Realistic);
        assert_eq!(key.k, None);
        assert_eq!(key.to_string(), "arithmetic_mean_rank.both.realistic");
    }

    #[test]
    fn test_synonyms() {
        assert_eq!(
            MetricKey::lookup("mrr").unwrap(),
            MetricKey::lookup("inverse_harmonic_mean_rank.both.realistic").unwrap()
        );
        assert_eq!(
            MetricKey::normalize("MR.head.best").unwrap(),
            "arithmetic_mean_rank.head.optimistic"
        );
        assert_eq!(
            MetricKey::normalize("amri").unwrap(),
            "adjusted_arithmetic_mean_rank_index.both.realistic"
        );
        assert_eq!(
            MetricKey::normalize("mean rank.tail.worst").unwrap(),
            "arithmetic_mean_rank.tail.pessimistic"
        );
    }

    #[test]
    fn test_hits_aliases() {
        let expected = MetricKey::new(HITS_AT_K, Side::Both, RankType::Realistic, Some(5));
        assert_eq!(MetricKey::lookup("hits@5").unwrap(), expected);
        assert_eq!(MetricKey::lookup("h@5").unwrap(), expected);
        assert_eq!(MetricKey::lookup("hits_at_5").unwrap(), expected);
        assert_eq!(MetricKey::lookup("hits_at_k.5").unwrap(), expected);
        assert_eq!(MetricKey::lookup("hits_at_k").unwrap().k, Some(10));
        assert_eq!(
            MetricKey::normalize("Hits@3.tail.optimistic").unwrap(),
            "hits_at_k.tail.optimistic.3"
        );
    }

    #[test]
    fn test_explicit_k_wins_over_embedded() {
        let key = MetricKey::lookup("hits@5.head.realistic.3").unwrap();
        assert_eq!(key.k, Some(3));
    }

    #[test]
    fn test_invalid_k() {
        assert!(matches!(MetricKey::lookup("hits@-3"), Err(Error::InvalidK(_))));
        assert!(matches!(MetricKey::lookup("hits_at_k.-1"), Err(Error::InvalidK(_))));
        assert!(matches!(MetricKey::lookup("hits_at_ten"), Err(Error::InvalidK(_))));
    }

    #[test]
    fn test_realistic_only() {
        assert!(matches!(MetricKey::lookup("amri.optimistic"), Err(Error::Validation(_))));
        assert!(matches!(MetricKey::lookup("amr.tail.pessimistic"), Err(Error::Validation(_))));
        assert!(MetricKey::lookup("amr.tail.realistic").is_ok());
    }

    #[test]
    fn test_invalid_specifications() {
        for spec in ["", ".head", "mr.sideways", "mr.realistic.head", "mr.head.realistic.5", "m-r", "mr.head.realistic.5.6"] {
            assert!(
                matches!(MetricKey::lookup(spec), Err(Error::InvalidSpecification(_))),
                "{spec:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_normalize_idempotent() {
        for spec in ["mrr", "hits@1", "h@3.head", "amr", "igmr.tail.best", "rank_count.both.average"] {
            let once = MetricKey::normalize(spec).unwrap();
            assert_eq!(MetricKey::normalize(&once).unwrap(), once);
        }
    }

    #[test]
    fn test_side_targets() {
        assert_eq!(Side::Both.targets(), &[Target::Head, Target::Tail]);
        assert_eq!(Side::from(Target::Tail), Side::Tail);
    }
}
