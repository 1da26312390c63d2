//! Dot-notation key/value store.
//!
//! Paths are split on `.` and walked from the root. Reads never create
//! anything; writes create any missing intermediate mappings and replace plain
//! values found mid-path with mappings (see [`Node::vivify`]).
//!
//! An immutable store refuses to overwrite a key that already exists at the
//! final segment of a write. Intermediate mappings are not protected: a write
//! through an existing leaf still turns that leaf into a mapping.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};

use crate::node::{Branch, Node, branch_to_map, map_to_branch};

/// Errors from store mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Data is immutable")]
    Immutable { path: String },
}

/// In-memory nested variable store.
#[derive(Debug, Clone, Default)]
pub struct Store {
    root: Branch,
    immutable: bool,
}

impl Store {
    /// Create an empty store.
    pub fn new(immutable: bool) -> Self {
        Self {
            root: Branch::new(),
            immutable,
        }
    }

    /// Create a store pre-populated with `data`.
    pub fn with_data(data: Map<String, Value>, immutable: bool) -> Self {
        Self {
            root: map_to_branch(data),
            immutable,
        }
    }

    /// Whether existing keys are protected from overwrite.
    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    /// Resolve `path` and return the value found there.
    ///
    /// Returns `None` as soon as a segment is missing or a plain value is
    /// reached before the path is consumed.
    pub fn get(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut node = self.root.get(first)?;
        for segment in segments {
            node = node.as_branch()?.get(segment)?;
        }
        Some(node.to_value())
    }

    /// Store `value` at `path`, returning the stored value.
    ///
    /// A blank path is a no-op and returns `Ok(None)`.
    pub fn set(&mut self, path: &str, value: Value) -> Result<Option<Value>, StoreError> {
        let path = path.trim();
        if path.is_empty() {
            return Ok(None);
        }

        let (parents, key) = match path.rsplit_once('.') {
            Some((parents, key)) => (Some(parents), key),
            None => (None, path),
        };

        let mut branch = &mut self.root;
        for segment in parents.into_iter().flat_map(|p| p.split('.')) {
            branch = branch
                .entry(segment.to_string())
                .or_insert_with(Node::empty_branch)
                .vivify();
        }

        if self.immutable && branch.contains_key(key) {
            return Err(StoreError::Immutable {
                path: path.to_string(),
            });
        }

        branch.insert(key.to_string(), Node::from(value.clone()));
        Ok(Some(value))
    }

    /// The whole tree as a JSON object.
    pub fn snapshot(&self) -> Value {
        Value::Object(branch_to_map(&self.root))
    }
}

/// A [`Store`] shared between request handlers.
///
/// Every operation holds the lock for its full path walk, so concurrent
/// writes never observe a half-created path.
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<RwLock<Store>>,
}

impl SharedStore {
    pub fn new(store: Store) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.read().get(path)
    }

    pub fn set(&self, path: &str, value: Value) -> Result<Option<Value>, StoreError> {
        self.write().set(path, value)
    }

    pub fn snapshot(&self) -> Value {
        self.read().snapshot()
    }

    pub fn is_immutable(&self) -> bool {
        self.read().is_immutable()
    }

    // The store never panics mid-mutation, so a poisoned lock still guards a
    // consistent tree.
    fn read(&self) -> RwLockReadGuard<'_, Store> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Store> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<Store> for SharedStore {
    fn from(store: Store) -> Self {
        Self::new(store)
    }
}
