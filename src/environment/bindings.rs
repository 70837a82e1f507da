//! Binding store: the key/value map behind an environment.
//!
//! A store carries two kinds of lock:
//! - per-key locks, which reject reassignment of that key
//! - a whole-store seal, which rejects adding or removing keys
//!
//! Neither lock can be undone; a key lock only disappears when the binding
//! itself is removed. Package, imports and namespace environments of
//! one library share a single store, so a seal applies to all three views.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use regex::Regex;

use crate::error::EnvError;
use crate::value::Value;

/// Names starting with this character are hidden from listings by default.
pub const HIDDEN_PREFIX: char = '.';

#[derive(Debug, Clone, Default)]
pub struct BindingStore {
    bindings: HashMap<String, Value>,
    locked_keys: HashSet<String>,
    locked: bool,
}

impl BindingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with room for `capacity` bindings (`new.env(size = )`).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bindings: HashMap::with_capacity(capacity),
            locked_keys: HashSet::new(),
            locked: false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.bindings.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.bindings.contains_key(key)
    }

    /// Insert or update a binding.
    ///
    /// A sealed store still accepts updates to keys it already holds.
    pub fn put(&mut self, key: &str, value: Value) -> Result<(), EnvError> {
        if self.locked && !self.bindings.contains_key(key) {
            return Err(EnvError::LockedStore {
                key: key.to_string(),
            });
        }
        self.bindings.insert(key.to_string(), value);
        Ok(())
    }

    /// Remove a binding together with its key lock.
    /// Removing an absent key is not an error.
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, EnvError> {
        if self.locked {
            return Err(EnvError::LockedStore {
                key: key.to_string(),
            });
        }
        self.locked_keys.remove(key);
        Ok(self.bindings.remove(key))
    }

    /// Sorted binding names, hidden ones only when `include_hidden`.
    /// With a pattern, names are filtered first and then sorted.
    pub fn list_keys(&self, include_hidden: bool, pattern: Option<&Regex>) -> Vec<String> {
        self.bindings
            .keys()
            .filter(|k| include_hidden || !is_hidden(k))
            .filter(|k| pattern.map_or(true, |re| re.is_match(k)))
            .cloned()
            .sorted()
            .collect()
    }

    /// Lock an existing binding against reassignment.
    pub fn lock_key(&mut self, key: &str) -> Result<(), EnvError> {
        if !self.bindings.contains_key(key) {
            return Err(EnvError::NoBinding {
                key: key.to_string(),
            });
        }
        self.locked_keys.insert(key.to_string());
        Ok(())
    }

    /// Binding locks are permanent; this never clears one.
    pub fn unlock_key(&mut self, key: &str) {
        if self.locked_keys.contains(key) {
            tracing::debug!(target: "envchain::bindings", key, "unlock request ignored, binding locks are permanent");
        }
    }

    pub fn is_key_locked(&self, key: &str) -> bool {
        self.locked_keys.contains(key)
    }

    /// Lock every key currently present.
    pub fn lock_all_keys(&mut self) {
        self.locked_keys.extend(self.bindings.keys().cloned());
    }

    /// Seal the store against additions and removals.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl FromIterator<(String, Value)> for BindingStore {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
            locked_keys: HashSet::new(),
            locked: false,
        }
    }
}

/// Whether `name` is hidden from default listings.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with(HIDDEN_PREFIX)
}

/// Drop hidden names, keeping order.
pub fn remove_hidden_names<S: AsRef<str>>(names: &[S]) -> Vec<&str> {
    names
        .iter()
        .map(|n| n.as_ref())
        .filter(|n| !is_hidden(n))
        .collect()
}
