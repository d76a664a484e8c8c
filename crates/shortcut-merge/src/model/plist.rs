//! Arena-backed property list graph.
//!
//! Every object lives once in a flat arena and containers refer to their children by
//! [`ObjectRef`]. Shared sub-values and reference cycles are therefore representable,
//! and all traversals here are iterative with an explicit visited set.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::GraphError;
use crate::model::{ObjectRef, Value};

/// A decoded (or hand-built) property list: an arena of objects plus a root.
#[derive(Debug, Clone)]
pub struct Plist {
    objects: Vec<Value>,
    root: ObjectRef,
}

impl Plist {
    /// Creates a graph whose root is the given value.
    pub fn new(root: Value) -> Self {
        Self {
            objects: vec![root],
            root: ObjectRef::from_index(0),
        }
    }

    /// Assembles a graph from raw parts. The caller guarantees `root` is in bounds.
    pub(crate) fn from_parts(objects: Vec<Value>, root: ObjectRef) -> Self {
        Self { objects, root }
    }

    /// Returns the root reference.
    pub fn root(&self) -> ObjectRef {
        self.root
    }

    /// Returns the root value.
    pub fn root_value(&self) -> Option<&Value> {
        self.get(self.root)
    }

    /// Returns the number of objects in the arena (reachable or not).
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if the arena holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Appends a value to the arena and returns its reference.
    pub fn push(&mut self, value: Value) -> ObjectRef {
        let r = ObjectRef::from_index(self.objects.len());
        self.objects.push(value);
        r
    }

    /// Returns the value behind a reference.
    pub fn get(&self, r: ObjectRef) -> Option<&Value> {
        self.objects.get(r.index())
    }

    /// Returns the value behind a reference, mutably.
    pub fn get_mut(&mut self, r: ObjectRef) -> Option<&mut Value> {
        self.objects.get_mut(r.index())
    }

    /// Replaces the value behind a reference, returning the previous one.
    pub fn replace(&mut self, r: ObjectRef, value: Value) -> Result<Value, GraphError> {
        self.check(r)?;
        Ok(std::mem::replace(&mut self.objects[r.index()], value))
    }

    /// Looks up `key` in the dict at `r`.
    pub fn dict_get(&self, r: ObjectRef, key: &str) -> Option<ObjectRef> {
        self.get(r)?.as_dict()?.get(key).copied()
    }

    /// Iterates mutably over every object in the arena.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.objects.iter_mut()
    }

    fn check(&self, r: ObjectRef) -> Result<(), GraphError> {
        if r.index() < self.objects.len() {
            Ok(())
        } else {
            Err(GraphError::DanglingReference {
                index: r.index(),
                len: self.objects.len(),
            })
        }
    }

    /// Returns every object reachable from the root, in pre-order, each exactly once.
    pub fn reachable(&self) -> Result<Vec<ObjectRef>, GraphError> {
        self.reachable_from(&[self.root])
    }

    /// Returns every object reachable from `starts`, in pre-order, each exactly once.
    pub fn reachable_from(&self, starts: &[ObjectRef]) -> Result<Vec<ObjectRef>, GraphError> {
        let mut visited = vec![false; self.objects.len()];
        let mut order = Vec::new();
        let mut stack: Vec<ObjectRef> = starts.iter().rev().copied().collect();

        while let Some(r) = stack.pop() {
            self.check(r)?;
            if visited[r.index()] {
                continue;
            }
            visited[r.index()] = true;
            order.push(r);

            let children: Vec<ObjectRef> = self.objects[r.index()].child_refs().collect();
            stack.extend(children.into_iter().rev());
        }

        Ok(order)
    }

    /// Copies the sub-graphs rooted at `roots` from `other` into this arena.
    ///
    /// Objects shared between the roots (or within them) are copied once, and cycles
    /// are preserved. Returns the new references in the same order as `roots`.
    pub fn import_all(
        &mut self,
        other: &Plist,
        roots: &[ObjectRef],
    ) -> Result<Vec<ObjectRef>, GraphError> {
        let order = other.reachable_from(roots)?;

        let mut mapping: FxHashMap<ObjectRef, ObjectRef> =
            FxHashMap::with_capacity_and_hasher(order.len(), Default::default());
        for &old in &order {
            let new = self.push(Value::Null);
            mapping.insert(old, new);
        }

        let remap = |r: &ObjectRef| mapping[r];
        for &old in &order {
            let copied = match &other.objects[old.index()] {
                Value::Array(items) => Value::Array(items.iter().map(remap).collect()),
                Value::Set(items) => Value::Set(items.iter().map(remap).collect()),
                Value::Dict(map) => {
                    Value::Dict(map.iter().map(|(k, v)| (k.clone(), remap(v))).collect())
                }
                leaf => leaf.clone(),
            };
            self.objects[mapping[&old].index()] = copied;
        }

        Ok(roots.iter().map(remap).collect())
    }

    /// Copies a single sub-graph from `other` into this arena.
    pub fn import(&mut self, other: &Plist, root: ObjectRef) -> Result<ObjectRef, GraphError> {
        let mut imported = self.import_all(other, &[root])?;
        imported.pop().ok_or(GraphError::DanglingReference {
            index: root.index(),
            len: other.len(),
        })
    }

    /// Structural equality of the graphs reachable from both roots.
    ///
    /// Two graphs are equal when a walk from both roots in lockstep never finds a
    /// mismatch. Arena layout, unreachable objects, and whether equal sub-values are
    /// shared do not matter.
    pub fn structurally_eq(&self, other: &Plist) -> bool {
        let mut seen: FxHashSet<(ObjectRef, ObjectRef)> = FxHashSet::default();
        let mut stack = vec![(self.root, other.root)];

        while let Some((a, b)) = stack.pop() {
            if !seen.insert((a, b)) {
                continue;
            }
            let (Some(va), Some(vb)) = (self.get(a), other.get(b)) else {
                return false;
            };
            if !va.shallow_eq(vb) {
                return false;
            }
            stack.extend(va.child_refs().zip(vb.child_refs()));
        }

        true
    }
}

impl PartialEq for Plist {
    fn eq(&self, other: &Self) -> bool {
        self.structurally_eq(other)
    }
}
