//! Exclusion policy: whether an original action survives the merge.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::{Excluder, ExclusionRule};

/// Outcome for one original action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Keep,
    Drop,
}

/// Ids of the inserts applied to the current workflow.
#[derive(Debug, Clone, Default)]
pub struct AppliedIds {
    ids: FxHashSet<i64>,
}

impl AppliedIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: i64) {
        self.ids.insert(id);
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<i64> for AppliedIds {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Exclusion rules indexed by original action index.
///
/// When several rules name the same index only the first is kept.
#[derive(Debug, Clone, Default)]
pub struct ExclusionTable<'a> {
    rules: FxHashMap<usize, &'a ExclusionRule>,
}

impl<'a> ExclusionTable<'a> {
    pub fn new(rules: &'a [ExclusionRule]) -> Self {
        let mut table = FxHashMap::default();
        for rule in rules {
            table.entry(rule.action).or_insert(rule);
        }
        Self { rules: table }
    }

    /// Returns the rule governing action `index`, if any.
    pub fn rule_for(&self, index: usize) -> Option<&'a ExclusionRule> {
        self.rules.get(&index).copied()
    }
}

/// Decides whether an action is kept.
///
/// An action with no rule is kept. A rule carrying the always sentinel drops it.
/// Otherwise it is dropped only if one of its excluders was applied.
pub fn decide(rule: Option<&ExclusionRule>, applied: &AppliedIds) -> Decision {
    let Some(rule) = rule else {
        return Decision::Keep;
    };
    if rule.excluded_by.contains(&Excluder::Always) {
        return Decision::Drop;
    }
    let fired = rule.excluded_by.iter().any(|excluder| match excluder {
        Excluder::Insert(id) => applied.contains(*id),
        Excluder::Always => false,
    });
    if fired { Decision::Drop } else { Decision::Keep }
}
