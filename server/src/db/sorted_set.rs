//! A score-ordered set: the container backing every `Z*` command.
//!
//! Kept as a `BTreeSet<(Score, Bytes)>` ordered first by score then by member
//! (lexicographic tie-break, matching the spec's ordering rule for equal
//! scores) plus a reverse `HashMap<Bytes, Score>` for O(1) `ZSCORE`-style
//! lookups — the pair is the standard way to get both "ranked iteration" and
//! "point lookup" out of a single ordered structure without paying for a
//! linear rescan on every score change.

use std::collections::{BTreeSet, HashMap};

use bytes::Bytes;

/// A finite `f64` with a total order, so it can live in a `BTreeSet`. NaN is
/// rejected at every insertion point upstream — this type never has to
/// represent it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score(pub f64);

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(std::cmp::Ordering::Equal)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    ordered: BTreeSet<(Score, Bytes)>,
    scores: HashMap<Bytes, Score>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).map(|s| s.0)
    }

    /// Inserts or updates `member`'s score, returning `true` if the member
    /// was newly added (the `ZADD` "added count" semantics).
    pub fn insert(&mut self, member: Bytes, score: f64) -> bool {
        let score = Score(score);
        if let Some(old) = self.scores.insert(member.clone(), score) {
            self.ordered.remove(&(old, member.clone()));
            self.ordered.insert((score, member));
            false
        } else {
            self.ordered.insert((score, member));
            true
        }
    }

    pub fn remove(&mut self, member: &[u8]) -> Option<f64> {
        if let Some(score) = self.scores.remove(member) {
            self.ordered.remove(&(score, Bytes::copy_from_slice(member)));
            Some(score.0)
        } else {
            None
        }
    }

    /// 0-based rank in ascending score order, or `None` if absent.
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let score = *self.scores.get(member)?;
        let key = (score, Bytes::copy_from_slice(member));
        Some(self.ordered.range(..key).count())
    }

    pub fn iter_ascending(&self) -> impl DoubleEndedIterator<Item = (&Bytes, f64)> {
        self.ordered.iter().map(|(s, m)| (m, s.0))
    }

    pub fn range_by_rank(&self, start: usize, stop: usize) -> Vec<(Bytes, f64)> {
        self.ordered
            .iter()
            .skip(start)
            .take(stop.saturating_sub(start) + 1)
            .map(|(s, m)| (m.clone(), s.0))
            .collect()
    }

    pub fn range_by_score(&self, min: f64, min_excl: bool, max: f64, max_excl: bool) -> Vec<(Bytes, f64)> {
        self.ordered
            .iter()
            .filter(|(s, _)| {
                let above_min = if min_excl { s.0 > min } else { s.0 >= min };
                let below_max = if max_excl { s.0 < max } else { s.0 <= max };
                above_min && below_max
            })
            .map(|(s, m)| (m.clone(), s.0))
            .collect()
    }

    /// `ZRANGEBYLEX`-style range over members, assuming (as real clients
    /// do) that every member in the set shares the same score — iteration
    /// order then degenerates to plain byte-lexicographic member order,
    /// which is exactly `self.ordered`'s tie-break rule.
    pub fn range_by_lex(&self, min: &LexBound, max: &LexBound) -> Vec<Bytes> {
        self.ordered
            .iter()
            .map(|(_, m)| m)
            .filter(|m| min.satisfied_below(m) && max.satisfied_above(m))
            .cloned()
            .collect()
    }
}

/// One endpoint of a `ZRANGEBYLEX`/`ZREVRANGEBYLEX` range: `-`/`+` for the
/// unbounded ends, or an inclusive/exclusive member bound (`[member` /
/// `(member`).
#[derive(Debug, Clone)]
pub enum LexBound {
    NegInf,
    PosInf,
    Incl(Bytes),
    Excl(Bytes),
}

impl LexBound {
    /// True if `m` is allowed by this bound acting as a *minimum*.
    fn satisfied_below(&self, m: &Bytes) -> bool {
        match self {
            LexBound::NegInf => true,
            LexBound::PosInf => false,
            LexBound::Incl(b) => m.as_ref() >= b.as_ref(),
            LexBound::Excl(b) => m.as_ref() > b.as_ref(),
        }
    }

    /// True if `m` is allowed by this bound acting as a *maximum*.
    fn satisfied_above(&self, m: &Bytes) -> bool {
        match self {
            LexBound::PosInf => true,
            LexBound::NegInf => false,
            LexBound::Incl(b) => m.as_ref() <= b.as_ref(),
            LexBound::Excl(b) => m.as_ref() < b.as_ref(),
        }
    }

    pub fn parse(token: &[u8]) -> Result<Self, crate::util::error::ServerError> {
        match token.first() {
            Some(b'-') if token.len() == 1 => Ok(LexBound::NegInf),
            Some(b'+') if token.len() == 1 => Ok(LexBound::PosInf),
            Some(b'[') => Ok(LexBound::Incl(Bytes::copy_from_slice(&token[1..]))),
            Some(b'(') => Ok(LexBound::Excl(Bytes::copy_from_slice(&token[1..]))),
            _ => Err(crate::util::error::ServerError::generic(
                "min or max not valid string range item",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reports_new_vs_updated() {
        let mut z = SortedSet::new();
        assert!(z.insert(Bytes::from_static(b"a"), 1.0));
        assert!(!z.insert(Bytes::from_static(b"a"), 2.0));
        assert_eq!(z.score(b"a"), Some(2.0));
    }

    #[test]
    fn ties_break_lexicographically() {
        let mut z = SortedSet::new();
        z.insert(Bytes::from_static(b"b"), 1.0);
        z.insert(Bytes::from_static(b"a"), 1.0);
        let members: Vec<_> = z.iter_ascending().map(|(m, _)| m.clone()).collect();
        assert_eq!(members, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
    }

    #[test]
    fn rank_is_ascending_by_score() {
        let mut z = SortedSet::new();
        z.insert(Bytes::from_static(b"a"), 3.0);
        z.insert(Bytes::from_static(b"b"), 1.0);
        z.insert(Bytes::from_static(b"c"), 2.0);
        assert_eq!(z.rank(b"b"), Some(0));
        assert_eq!(z.rank(b"c"), Some(1));
        assert_eq!(z.rank(b"a"), Some(2));
    }
}
