//! Identity diffing between the cached and freshly fetched datasets.
//!
//! Items are matched by their natural identity (business key), not by any
//! storage-assigned id and not by full value equality: soft flags like
//! `is_read` live outside the identity and survive a refresh untouched.
//!
//! The diff has multiset semantics. Duplicate identities on either side are
//! matched occurrence-for-occurrence, so only the excess count appears in
//! the plan - a client submitting duplicate records can introduce or remove
//! an imbalance without falsely diffing unrelated neighbors.

use std::collections::HashMap;
use std::hash::Hash;

/// Exposes the natural identity of a domain record.
///
/// The identity must cover every business field and exclude soft flags, so
/// that a changed business field reads as remove+add while a flipped flag
/// reads as unchanged.
pub trait Identifiable {
    type Id: Hash + Eq;

    fn identity(&self) -> Self::Id;
}

/// Minimal add/remove set bringing the cache in line with remote data.
///
/// Computed fresh per refresh cycle, applied atomically, then discarded.
#[derive(Debug)]
pub struct ReconciliationPlan<T> {
    pub to_remove: Vec<T>,
    pub to_add: Vec<T>,
}

impl<T> ReconciliationPlan<T> {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

impl<T> Default for ReconciliationPlan<T> {
    fn default() -> Self {
        Self {
            to_remove: Vec::new(),
            to_add: Vec::new(),
        }
    }
}

/// Items of `left` not matched 1:1 by identity against `right`.
///
/// Each occurrence in `right` cancels at most one occurrence in `left`;
/// survivors keep their original order. Runs in O(|left| + |right|).
pub fn unique_subtract<T>(left: &[T], right: &[T]) -> Vec<T>
where
    T: Identifiable + Clone,
{
    let mut counts: HashMap<T::Id, usize> = HashMap::with_capacity(right.len());
    for item in right {
        *counts.entry(item.identity()).or_insert(0) += 1;
    }

    left.iter()
        .filter(|item| match counts.get_mut(&item.identity()) {
            Some(count) if *count > 0 => {
                *count -= 1;
                false
            }
            _ => true,
        })
        .cloned()
        .collect()
}

/// Compute the plan: `to_remove = old \ new`, `to_add = new \ old`.
///
/// Reconciling identical datasets yields an empty plan, so a refresh that
/// changed nothing never rewrites the store.
pub fn reconcile<T>(old: &[T], new: &[T]) -> ReconciliationPlan<T>
where
    T: Identifiable + Clone,
{
    ReconciliationPlan {
        to_remove: unique_subtract(old, new),
        to_add: unique_subtract(new, old),
    }
}

// ============================================================================
// Tests
// ============================================================================
