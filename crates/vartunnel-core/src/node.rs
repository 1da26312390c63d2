//! Tree nodes backing the store.
//!
//! The store keeps its data as a tree of [`Node`]s rather than raw JSON so
//! that "descend into a mapping" and "replace a leaf with a mapping" are
//! explicit operations. JSON objects written into the tree become branches;
//! every other JSON value, arrays and `null` included, is a leaf.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Children of a branch, keyed by path segment.
pub type Branch = BTreeMap<String, Node>;

/// A single node in the store tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A non-object JSON value.
    Leaf(Value),
    /// A mapping from segment to child node.
    Branch(Branch),
}

impl Node {
    /// A branch with no children.
    pub fn empty_branch() -> Self {
        Node::Branch(Branch::new())
    }

    /// The children of this node, if it is a branch.
    pub fn as_branch(&self) -> Option<&Branch> {
        match self {
            Node::Branch(children) => Some(children),
            Node::Leaf(_) => None,
        }
    }

    /// Whether this node is a leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// Make this node addressable as a mapping and return its children.
    ///
    /// A leaf is discarded and replaced by an empty branch. This is how a
    /// write to `a.b` succeeds when `a` currently holds a plain value.
    pub fn vivify(&mut self) -> &mut Branch {
        match self {
            Node::Branch(children) => children,
            Node::Leaf(_) => {
                *self = Node::empty_branch();
                self.vivify()
            }
        }
    }

    /// Materialize this node (and everything below it) as a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Node::Leaf(value) => value.clone(),
            Node::Branch(children) => Value::Object(branch_to_map(children)),
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Node::Branch(map_to_branch(map)),
            other => Node::Leaf(other),
        }
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        match node {
            Node::Leaf(value) => value,
            Node::Branch(children) => Value::Object(
                children
                    .into_iter()
                    .map(|(key, child)| (key, Value::from(child)))
                    .collect(),
            ),
        }
    }
}

/// Convert a JSON object into branch children.
pub fn map_to_branch(map: Map<String, Value>) -> Branch {
    map.into_iter()
        .map(|(key, value)| (key, Node::from(value)))
        .collect()
}

/// Convert branch children into a JSON object.
pub fn branch_to_map(children: &Branch) -> Map<String, Value> {
    children
        .iter()
        .map(|(key, child)| (key.clone(), child.to_value()))
        .collect()
}
