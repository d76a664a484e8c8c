//! Workflow identifiers: group and variable UUID sets, the per-batch registry, and
//! fresh identifier generation.
//!
//! Identifiers are opaque strings. Workflows use uppercase hyphenated UUIDs for
//! control-flow groups (`GroupingIdentifier`) and action outputs (`UUID`).

use rustc_hash::FxHashSet;
use uuid::Uuid;

/// Identifiers defined by a workflow or a snippet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdSets {
    /// Control-flow grouping identifiers.
    pub groups: Vec<String>,
    /// Action output (variable) identifiers.
    pub vars: Vec<String>,
}

impl IdSets {
    /// Creates a set pair from group and variable identifiers.
    pub fn new(
        groups: impl IntoIterator<Item = impl Into<String>>,
        vars: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
            vars: vars.into_iter().map(Into::into).collect(),
        }
    }

    /// Iterates over all identifiers, groups first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().chain(self.vars.iter()).map(String::as_str)
    }

    /// Returns true if `id` is a group or variable identifier.
    pub fn contains(&self, id: &str) -> bool {
        self.iter().any(|own| own == id)
    }

    /// Returns true when there are no identifiers at all.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.vars.is_empty()
    }
}

/// Source of candidate identifiers.
pub trait IdGenerator {
    /// Produces a new candidate. Uniqueness is checked by the caller.
    fn next_id(&mut self) -> String;
}

/// Generates uppercase random (v4) UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&mut self) -> String {
        Uuid::new_v4().hyphenated().to_string().to_ascii_uppercase()
    }
}

impl<F: FnMut() -> String> IdGenerator for F {
    fn next_id(&mut self) -> String {
        self()
    }
}

/// Every identifier known within one workflow's merge.
///
/// Scoped to a single merge call; it is never shared across workflows or batches.
#[derive(Debug, Clone, Default)]
pub struct IdRegistry {
    ids: FxHashSet<String>,
}

impl IdRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds all identifiers of `sets`.
    pub fn seed(&mut self, sets: &IdSets) {
        self.ids.extend(sets.iter().map(str::to_string));
    }

    /// Creates a registry holding every identifier a workflow merge can see: the
    /// workflow's own and those of all its inserts.
    pub fn seed_batch<'a>(owned: &IdSets, inserts: impl IntoIterator<Item = &'a IdSets>) -> Self {
        let mut registry = Self::new();
        registry.seed(owned);
        for sets in inserts {
            registry.seed(sets);
        }
        registry
    }

    /// Adds a single identifier. Returns false if it was already known.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    /// Returns true if `id` is known.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns the number of known identifiers.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if no identifier is known.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Draws candidates until one is unknown, registers it and returns it.
    pub fn fresh<G: IdGenerator + ?Sized>(&mut self, generator: &mut G) -> String {
        loop {
            let candidate = generator.next_id();
            if !self.ids.contains(&candidate) {
                self.ids.insert(candidate.clone());
                return candidate;
            }
        }
    }
}
