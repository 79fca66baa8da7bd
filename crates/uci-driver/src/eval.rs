//! Evaluation records and the per-search accumulator.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::parse::InfoLine;

/// The final evaluation of one principal variation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    /// Depth the score was reported at.
    pub depth: u32,
    /// Multi-PV rank, 1 = the engine's best line.
    pub rank: u32,
    /// Verbatim engine score: a centipawn integer (`"35"`) or `mate N`.
    /// Positive favors the side to move.
    pub score: String,
}

/// The evaluations of one finished search, ordered by rank ascending.
///
/// Never empty: a search that produced no scored `info` lines fails with
/// a no-evaluation error instead of yielding an empty collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationCollection {
    evaluations: Vec<Evaluation>,
}

impl EvaluationCollection {
    /// The rank-1 evaluation.
    pub fn best(&self) -> &Evaluation {
        &self.evaluations[0]
    }

    /// All evaluations, rank ascending.
    pub fn evaluations(&self) -> &[Evaluation] {
        &self.evaluations
    }

    /// Number of ranked lines.
    pub fn len(&self) -> usize {
        self.evaluations.len()
    }

    /// Always false; kept for iterator-adapter ergonomics.
    pub fn is_empty(&self) -> bool {
        self.evaluations.is_empty()
    }
}

impl<'a> IntoIterator for &'a EvaluationCollection {
    type Item = &'a Evaluation;
    type IntoIter = std::slice::Iter<'a, Evaluation>;

    fn into_iter(self) -> Self::IntoIter {
        self.evaluations.iter()
    }
}

/// Folds `info` lines observed during one search into the deepest score
/// seen per multi-PV rank.
///
/// Inactive outside a search; `begin` arms it, `snapshot` disarms it and
/// yields the collection.
#[derive(Debug, Default)]
pub(crate) struct EvalAccumulator {
    active: bool,
    per_rank: BTreeMap<u32, (u32, String)>,
}

impl EvalAccumulator {
    /// Arms the accumulator for a new search, dropping any stale state.
    pub(crate) fn begin(&mut self) {
        self.active = true;
        self.per_rank.clear();
    }

    /// Disarms the accumulator without producing a snapshot.
    pub(crate) fn cancel(&mut self) {
        self.active = false;
        self.per_rank.clear();
    }

    /// Folds one parsed `info` line.
    ///
    /// Lines without a score are ignored. A missing `multipv` means rank 1.
    /// For each rank only a strictly deeper report replaces the stored
    /// score.
    pub(crate) fn fold(&mut self, info: &InfoLine) {
        if !self.active {
            return;
        }
        let Some(score) = info.score() else {
            return;
        };
        let depth = info.depth.unwrap_or(0);
        let rank = info.multipv.unwrap_or(1);
        match self.per_rank.get(&rank) {
            Some((stored_depth, _)) if depth <= *stored_depth => {}
            _ => {
                self.per_rank.insert(rank, (depth, score));
            }
        }
    }

    /// Freezes the accumulated state into a collection, rank ascending.
    ///
    /// Returns `None` when no scored lines were observed. Either way the
    /// accumulator is disarmed and cleared.
    pub(crate) fn snapshot(&mut self) -> Option<EvaluationCollection> {
        self.active = false;
        if self.per_rank.is_empty() {
            return None;
        }
        let evaluations = std::mem::take(&mut self.per_rank)
            .into_iter()
            .map(|(rank, (depth, score))| Evaluation { depth, rank, score })
            .collect();
        Some(EvaluationCollection { evaluations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(line: &str) -> InfoLine {
        InfoLine::parse(line).unwrap()
    }

    #[test]
    fn keeps_deepest_score_per_rank() {
        let mut acc = EvalAccumulator::default();
        acc.begin();
        acc.fold(&info("info depth 1 multipv 1 score cp 10"));
        acc.fold(&info("info depth 3 multipv 1 score cp 30"));
        acc.fold(&info("info depth 2 multipv 1 score cp 20"));

        let collection = acc.snapshot().unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.best().depth, 3);
        assert_eq!(collection.best().score, "30");
    }

    #[test]
    fn equal_depth_does_not_overwrite() {
        let mut acc = EvalAccumulator::default();
        acc.begin();
        acc.fold(&info("info depth 5 score cp 10"));
        acc.fold(&info("info depth 5 score cp 99"));
        let collection = acc.snapshot().unwrap();
        assert_eq!(collection.best().score, "10");
    }

    #[test]
    fn ranks_are_kept_separately_and_sorted() {
        let mut acc = EvalAccumulator::default();
        acc.begin();
        acc.fold(&info("info depth 4 multipv 3 score cp -20"));
        acc.fold(&info("info depth 6 multipv 1 score cp 55"));
        acc.fold(&info("info depth 5 multipv 2 score mate 4"));

        let collection = acc.snapshot().unwrap();
        let ranks: Vec<u32> = collection.evaluations().iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert_eq!(collection.best().score, "55");
        assert_eq!(collection.evaluations()[1].score, "mate 4");
        assert_eq!(collection.evaluations()[2].depth, 4);
    }

    #[test]
    fn missing_multipv_means_rank_one() {
        let mut acc = EvalAccumulator::default();
        acc.begin();
        acc.fold(&info("info depth 2 score cp 7"));
        acc.fold(&info("info depth 4 multipv 1 score cp 9"));
        let collection = acc.snapshot().unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.best().depth, 4);
    }

    #[test]
    fn lines_without_score_are_ignored() {
        let mut acc = EvalAccumulator::default();
        acc.begin();
        acc.fold(&info("info depth 30 nodes 12345"));
        assert!(acc.snapshot().is_none());
    }

    #[test]
    fn inactive_accumulator_ignores_lines() {
        let mut acc = EvalAccumulator::default();
        acc.fold(&info("info depth 1 score cp 10"));
        assert!(acc.snapshot().is_none());
    }

    #[test]
    fn snapshot_clears_state_for_next_search() {
        let mut acc = EvalAccumulator::default();
        acc.begin();
        acc.fold(&info("info depth 8 score cp 1"));
        assert!(acc.snapshot().is_some());

        acc.begin();
        acc.fold(&info("info depth 2 score cp 2"));
        let collection = acc.snapshot().unwrap();
        assert_eq!(collection.best().depth, 2);
        assert_eq!(collection.best().score, "2");
    }

    #[test]
    fn cancel_discards_accumulated_state() {
        let mut acc = EvalAccumulator::default();
        acc.begin();
        acc.fold(&info("info depth 8 score cp 1"));
        acc.cancel();
        assert!(acc.snapshot().is_none());
    }
}
