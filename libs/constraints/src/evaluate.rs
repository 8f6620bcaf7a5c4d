//! Filtering and ranking of candidates against resolved conditions.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::condition::{Enforcement, Occurrence, ResolvedCondition};

/// A candidate that survived hard filtering, with its soft score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranked<T> {
    pub candidate: T,
    pub score: i32,
}

/// Caller supplied ordering among equally scored candidates.
pub type Tiebreak<'a, T> = &'a dyn Fn(&T, &T) -> Ordering;

/// Partition conditions into `(hard, soft)`.
pub fn split_conditions<L>(
    conditions: &[ResolvedCondition<L>],
) -> (Vec<&ResolvedCondition<L>>, Vec<&ResolvedCondition<L>>) {
    conditions
        .iter()
        .partition(|c| matches!(c.condition.enforcement, Enforcement::Hard))
}

fn satisfies_hard<L: Ord>(hard: &[&ResolvedCondition<L>], tags: &BTreeSet<L>) -> bool {
    hard.iter().all(|c| {
        let present = c.present_in(tags);
        match c.condition.occurrence {
            Occurrence::MustOccur => present,
            Occurrence::MustNotOccur => !present,
        }
    })
}

fn soft_score<L: Ord>(soft: &[&ResolvedCondition<L>], tags: &BTreeSet<L>) -> i32 {
    soft.iter()
        .map(|c| match (c.condition.occurrence, c.present_in(tags)) {
            (Occurrence::MustOccur, true) => 1,
            (Occurrence::MustNotOccur, true) => -1,
            (_, false) => 0,
        })
        .sum()
}

/// Drop candidates violating a hard condition and rank the rest.
///
/// Output is sorted by score descending, then by `tiebreak`; the sort is
/// stable so without a tiebreak equal scores keep input order. With no
/// conditions at all every candidate is returned with score 0 in input order.
pub fn rank_by_constraints<T, L, F>(
    conditions: &[ResolvedCondition<L>],
    candidates: impl IntoIterator<Item = T>,
    tags_of: F,
    tiebreak: Option<Tiebreak<'_, T>>,
) -> Vec<Ranked<T>>
where
    L: Ord,
    F: Fn(&T) -> &BTreeSet<L>,
{
    if conditions.is_empty() {
        return candidates
            .into_iter()
            .map(|candidate| Ranked {
                candidate,
                score: 0,
            })
            .collect();
    }

    let (hard, soft) = split_conditions(conditions);

    let mut ranked: Vec<Ranked<T>> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let score = {
                let tags = tags_of(&candidate);
                if !satisfies_hard(&hard, tags) {
                    return None;
                }
                soft_score(&soft, tags)
            };
            Some(Ranked { candidate, score })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score.cmp(&a.score).then_with(|| match tiebreak {
            Some(cmp) => cmp(&a.candidate, &b.candidate),
            None => Ordering::Equal,
        })
    });
    ranked
}

/// Like [`rank_by_constraints`], discarding the scores.
pub fn filter_by_constraints<T, L, F>(
    conditions: &[ResolvedCondition<L>],
    candidates: impl IntoIterator<Item = T>,
    tags_of: F,
    tiebreak: Option<Tiebreak<'_, T>>,
) -> Vec<T>
where
    L: Ord,
    F: Fn(&T) -> &BTreeSet<L>,
{
    rank_by_constraints(conditions, candidates, tags_of, tiebreak)
        .into_iter()
        .map(|r| r.candidate)
        .collect()
}
