//! Owned tree form of a property list.
//!
//! [`Node`] is the ergonomic way to build a graph (every sub-value gets its own arena
//! slot) and to inspect one when it is known to be acyclic.
//!
//! # Example
//!
//! ```rust
//! use shortcut_merge::model::{Node, Plist};
//!
//! let plist = Plist::from_node(Node::dict([
//!     ("WFWorkflowActions", Node::array([
//!         Node::dict([("WFWorkflowActionIdentifier", Node::from("is.workflow.actions.comment"))]),
//!     ])),
//! ]));
//! assert_eq!(plist.reachable().unwrap().len(), 4);
//! ```

use indexmap::IndexMap;

use crate::error::GraphError;
use crate::limits::MAX_TREE_DEPTH;
use crate::model::{ObjectRef, Plist, Value};

/// An owned, acyclic property list value.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Integer(i128),
    Real(f64),
    Date(f64),
    Data(Vec<u8>),
    String(String),
    Uid(u64),
    Array(Vec<Node>),
    Set(Vec<Node>),
    Dict(Vec<(String, Node)>),
}

impl Node {
    /// Builds a dict node from key/value pairs, keeping their order.
    pub fn dict<K: Into<String>>(entries: impl IntoIterator<Item = (K, Node)>) -> Self {
        Node::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Builds an array node.
    pub fn array(items: impl IntoIterator<Item = Node>) -> Self {
        Node::Array(items.into_iter().collect())
    }

    /// Looks up a key in a dict node.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Dict(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Returns the string content, if this is a string node.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the items, if this is an array node.
    pub fn as_array(&self) -> Option<&[Node]> {
        match self {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::String(s.to_string())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::String(s)
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Bool(b)
    }
}

impl From<i64> for Node {
    fn from(v: i64) -> Self {
        Node::Integer(v as i128)
    }
}

impl From<f64> for Node {
    fn from(v: f64) -> Self {
        Node::Real(v)
    }
}

impl From<Vec<u8>> for Node {
    fn from(bytes: Vec<u8>) -> Self {
        Node::Data(bytes)
    }
}

impl Plist {
    /// Builds a graph from an owned tree.
    pub fn from_node(node: Node) -> Self {
        let mut plist = Plist::new(Value::Null);
        let root = plist.root();
        let value = plist.lower(node);
        if let Some(slot) = plist.get_mut(root) {
            *slot = value;
        }
        plist
    }

    /// Appends an owned tree to the arena and returns the reference of its top.
    pub fn insert_node(&mut self, node: Node) -> ObjectRef {
        let value = self.lower(node);
        self.push(value)
    }

    fn lower(&mut self, node: Node) -> Value {
        match node {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(b),
            Node::Integer(v) => Value::Integer(v),
            Node::Real(v) => Value::Real(v),
            Node::Date(v) => Value::Date(v),
            Node::Data(b) => Value::Data(b),
            Node::String(s) => Value::String(s),
            Node::Uid(v) => Value::Uid(v),
            Node::Array(items) => {
                Value::Array(items.into_iter().map(|n| self.insert_node(n)).collect())
            }
            Node::Set(items) => Value::Set(items.into_iter().map(|n| self.insert_node(n)).collect()),
            Node::Dict(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (k, v) in entries {
                    let r = self.insert_node(v);
                    map.insert(k, r);
                }
                Value::Dict(map)
            }
        }
    }

    /// Converts the graph below `r` into an owned tree.
    ///
    /// Shared sub-values are duplicated. Fails on cycles and on nesting deeper than
    /// [`MAX_TREE_DEPTH`].
    pub fn to_node(&self, r: ObjectRef) -> Result<Node, GraphError> {
        let mut on_path = vec![false; self.len()];
        self.raise(r, &mut on_path, 0)
    }

    /// Converts the whole graph into an owned tree.
    pub fn root_node(&self) -> Result<Node, GraphError> {
        self.to_node(self.root())
    }

    fn raise(&self, r: ObjectRef, on_path: &mut [bool], depth: usize) -> Result<Node, GraphError> {
        if depth > MAX_TREE_DEPTH {
            return Err(GraphError::TooDeep { max: MAX_TREE_DEPTH });
        }
        let value = self.get(r).ok_or(GraphError::DanglingReference {
            index: r.index(),
            len: self.len(),
        })?;
        if on_path[r.index()] {
            return Err(GraphError::Cycle { index: r.index() });
        }

        on_path[r.index()] = true;
        let node = match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(*b),
            Value::Integer(v) => Node::Integer(*v),
            Value::Real(v) => Node::Real(*v),
            Value::Date(v) => Node::Date(*v),
            Value::Data(b) => Node::Data(b.clone()),
            Value::String(s) => Node::String(s.clone()),
            Value::Uid(v) => Node::Uid(*v),
            Value::Array(items) => Node::Array(
                items
                    .iter()
                    .map(|&c| self.raise(c, on_path, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Set(items) => Node::Set(
                items
                    .iter()
                    .map(|&c| self.raise(c, on_path, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Dict(map) => Node::Dict(
                map.iter()
                    .map(|(k, &c)| Ok((k.clone(), self.raise(c, on_path, depth + 1)?)))
                    .collect::<Result<_, GraphError>>()?,
            ),
        };
        on_path[r.index()] = false;

        Ok(node)
    }
}
