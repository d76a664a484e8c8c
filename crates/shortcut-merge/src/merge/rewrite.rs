//! Identifier collision rewriting for snippet fragments.
//!
//! A snippet may define identifiers the target workflow already uses. Each such
//! identifier gets a fresh replacement, and every value in the fragment that is
//! exactly the old identifier is replaced: strings, data blobs holding the
//! identifier's bytes, and dict keys. Values that merely contain it are left alone.

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::{IdGenerator, IdRegistry, IdSets, ObjectRef, Plist, Value};

/// One identifier replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

/// Identifiers of `insert` that `owned` also defines, groups first, each once.
pub fn collisions<'a>(insert: &'a IdSets, owned: &IdSets) -> Vec<&'a str> {
    let owned: FxHashSet<&str> = owned.iter().collect();
    let mut seen = FxHashSet::default();
    insert
        .iter()
        .filter(|id| owned.contains(id) && seen.insert(*id))
        .collect()
}

/// Rewrites colliding identifiers, drawing replacements from a generator and
/// recording them in the registry.
pub struct IdRewriter<'g, G: IdGenerator + ?Sized> {
    registry: IdRegistry,
    generator: &'g mut G,
}

impl<'g, G: IdGenerator + ?Sized> IdRewriter<'g, G> {
    /// Creates a rewriter over an already seeded registry.
    pub fn new(registry: IdRegistry, generator: &'g mut G) -> Self {
        Self { registry, generator }
    }

    pub fn registry(&self) -> &IdRegistry {
        &self.registry
    }

    /// Renames every identifier shared by `insert` and `owned` throughout `fragment`.
    pub fn rewrite(&mut self, insert: &IdSets, owned: &IdSets, fragment: &mut Plist) -> Vec<Rename> {
        let renames: Vec<Rename> = collisions(insert, owned)
            .into_iter()
            .map(|from| Rename {
                from: from.to_string(),
                to: self.registry.fresh(&mut *self.generator),
            })
            .collect();
        if !renames.is_empty() {
            apply(fragment, &renames);
        }
        renames
    }
}

fn apply(fragment: &mut Plist, renames: &[Rename]) {
    let table: FxHashMap<&str, &str> = renames
        .iter()
        .map(|r| (r.from.as_str(), r.to.as_str()))
        .collect();

    for value in fragment.values_mut() {
        match value {
            Value::String(s) => {
                if let Some(to) = table.get(s.as_str()) {
                    *s = to.to_string();
                }
            }
            Value::Data(bytes) => {
                let renamed = std::str::from_utf8(bytes).ok().and_then(|s| table.get(s));
                if let Some(to) = renamed {
                    *bytes = to.as_bytes().to_vec();
                }
            }
            Value::Dict(map) => {
                if map.keys().any(|k| table.contains_key(k.as_str())) {
                    *map = rename_keys(std::mem::take(map), &table);
                }
            }
            _ => {}
        }
    }
}

fn rename_keys(
    map: IndexMap<String, ObjectRef>,
    table: &FxHashMap<&str, &str>,
) -> IndexMap<String, ObjectRef> {
    map.into_iter()
        .map(|(k, v)| match table.get(k.as_str()) {
            Some(to) => (to.to_string(), v),
            None => (k, v),
        })
        .collect()
}
