//! Binding operations for EnvRegistry.
//!
//! get/put/remove, environment and binding locks, listings and chain lookup.
//! Checks run before any write, so a rejected call leaves no trace.

use regex::Regex;
use tracing::trace;

use super::{EnvId, EnvKind, EnvRegistry};
use crate::error::{EnvError, Mutation};
use crate::value::Value;

impl EnvRegistry {
    // ============================================================
    // Bindings
    // ============================================================

    /// Value bound to `key` in `env` itself (no inheritance).
    pub fn get(&self, env: EnvId, key: &str) -> Option<&Value> {
        self.store(env).get(key)
    }

    /// Assign `key` in `env`.
    ///
    /// A locked environment only accepts keys it already binds; a locked
    /// binding never accepts a new value.
    pub fn put(&mut self, env: EnvId, key: &str, value: Value) -> Result<(), EnvError> {
        let node = self.node(env);
        if node.kind == EnvKind::Empty {
            return Err(EnvError::EmptyEnvironment);
        }
        let store = self.store(env);
        if node.locked && !store.contains(key) {
            return Err(EnvError::LockedEnvironment {
                env: self.print_name(env),
                op: Mutation::Add,
            });
        }
        if store.is_key_locked(key) {
            return Err(EnvError::LockedBinding {
                key: key.to_string(),
            });
        }
        self.store_mut(env).put(key, value)?;
        trace!(target: "envchain::bindings", %env, key, "put");
        Ok(())
    }

    /// Assign where failure would mean a broken bootstrap invariant.
    pub(crate) fn safe_put(&mut self, env: EnvId, key: &str, value: Value) {
        if let Err(e) = self.put(env, key, value) {
            panic!("bootstrap assignment of '{}' failed: {}", key, e);
        }
    }

    /// Remove `key` from `env`.
    ///
    /// Only the environment lock blocks removal; a binding lock does not, and
    /// the lock goes away with the binding.
    pub fn remove(&mut self, env: EnvId, key: &str) -> Result<Option<Value>, EnvError> {
        let node = self.node(env);
        if node.locked {
            return Err(EnvError::LockedEnvironment {
                env: self.print_name(env),
                op: Mutation::Remove,
            });
        }
        if matches!(node.kind, EnvKind::Base { .. }) {
            return Err(EnvError::BaseRemoval {
                key: key.to_string(),
            });
        }
        let removed = self.store_mut(env).remove(key)?;
        trace!(target: "envchain::bindings", %env, key, found = removed.is_some(), "remove");
        Ok(removed)
    }

    /// Sorted binding names of `env`, see [`BindingStore::list_keys`].
    ///
    /// [`BindingStore::list_keys`]: super::BindingStore::list_keys
    pub fn ls(&self, env: EnvId, all_names: bool, pattern: Option<&Regex>) -> Vec<String> {
        self.store(env).list_keys(all_names, pattern)
    }

    pub fn binding_count(&self, env: EnvId) -> usize {
        self.store(env).len()
    }

    /// First binding of `key` along the parent chain of `env`, with the
    /// environment that holds it.
    pub fn find_var(&self, env: EnvId, key: &str) -> Option<(EnvId, &Value)> {
        self.ancestors(env)
            .find_map(|e| self.store(e).get(key).map(|v| (e, v)))
    }

    /// `exists(key, envir = env, inherits = inherits)`
    pub fn exists(&self, env: EnvId, key: &str, inherits: bool) -> bool {
        if inherits {
            self.find_var(env, key).is_some()
        } else {
            self.store(env).contains(key)
        }
    }

    // ============================================================
    // Locks
    // ============================================================

    /// `lockEnvironment(env, bindings)`. There is no unlock.
    pub fn lock(&mut self, env: EnvId, bindings: bool) -> Result<(), EnvError> {
        if env == self.empty {
            return Err(EnvError::EmptyEnvironment);
        }
        self.node_mut(env).locked = true;
        if bindings {
            self.store_mut(env).lock_all_keys();
        }
        trace!(target: "envchain::bindings", %env, bindings, "lock environment");
        Ok(())
    }

    pub fn is_locked(&self, env: EnvId) -> bool {
        self.node(env).locked
    }

    /// `lockBinding(key, env)`. The key must already be bound in `env`.
    pub fn lock_binding(&mut self, env: EnvId, key: &str) -> Result<(), EnvError> {
        self.store_mut(env).lock_key(key)?;
        trace!(target: "envchain::bindings", %env, key, "lock binding");
        Ok(())
    }

    /// `unlockBinding(key, env)`: accepted, but binding locks are permanent.
    pub fn unlock_binding(&mut self, env: EnvId, key: &str) {
        self.store_mut(env).unlock_key(key);
    }

    /// `bindingIsLocked(key, env)`
    pub fn binding_is_locked(&self, env: EnvId, key: &str) -> bool {
        self.store(env).is_key_locked(key)
    }
}

#[cfg(test)]
mod tests {
    use crate::environment::EnvRegistry;
    use crate::error::{EnvError, Mutation};
    use crate::value::Value;
    use regex::Regex;

    fn registry() -> EnvRegistry {
        EnvRegistry::new()
    }

    #[test]
    fn test_put_then_get() {
        let mut reg = registry();
        let env = reg.new_env(None, 0);
        reg.put(env, "x", Value::Integer(1)).unwrap();
        assert_eq!(reg.get(env, "x"), Some(&Value::Integer(1)));
        assert_eq!(reg.get(env, "y"), None);
    }

    #[test]
    fn test_locked_environment_rejects_new_keys() {
        let mut reg = registry();
        let env = reg.new_env(None, 0);
        reg.put(env, "existing", Value::Integer(1)).unwrap();
        reg.lock(env, false).unwrap();

        let err = reg.put(env, "fresh", Value::Null).unwrap_err();
        assert!(matches!(
            err,
            EnvError::LockedEnvironment {
                op: Mutation::Add,
                ..
            }
        ));
        assert_eq!(reg.get(env, "fresh"), None);

        reg.put(env, "existing", Value::Integer(2)).unwrap();
        assert_eq!(reg.get(env, "existing"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_locked_environment_rejects_removal() {
        let mut reg = registry();
        let env = reg.new_env(None, 0);
        reg.put(env, "x", Value::Null).unwrap();
        reg.lock(env, false).unwrap();

        assert!(matches!(
            reg.remove(env, "x"),
            Err(EnvError::LockedEnvironment {
                op: Mutation::Remove,
                ..
            })
        ));
        assert!(reg.exists(env, "x", false));
    }

    #[test]
    fn test_lock_binding_requires_existing_binding() {
        let mut reg = registry();
        let env = reg.new_env(None, 0);

        let err = reg.lock_binding(env, "zz").unwrap_err();
        assert_eq!(err.to_string(), "no binding for \"zz\"");
        assert!(!reg.binding_is_locked(env, "zz"));
        assert_eq!(reg.remove(env, "zz").unwrap(), None);

        // the key can still be created and locked afterwards
        reg.put(env, "zz", Value::Integer(1)).unwrap();
        reg.lock_binding(env, "zz").unwrap();
        assert!(matches!(
            reg.put(env, "zz", Value::Integer(2)),
            Err(EnvError::LockedBinding { .. })
        ));
    }

    #[test]
    fn test_environment_lock_checked_before_binding_lock() {
        let mut reg = registry();
        let env = reg.new_env(None, 0);
        reg.put(env, "k", Value::Null).unwrap();
        reg.lock_binding(env, "k").unwrap();
        reg.lock(env, false).unwrap();

        // removal is refused by the environment lock, not the binding lock
        assert!(matches!(
            reg.remove(env, "k"),
            Err(EnvError::LockedEnvironment { .. })
        ));
        assert!(matches!(
            reg.put(env, "k", Value::Integer(1)),
            Err(EnvError::LockedBinding { .. })
        ));
    }

    #[test]
    fn test_locked_binding_rejects_update() {
        let mut reg = registry();
        let env = reg.new_env(None, 0);
        reg.put(env, "k", Value::Integer(1)).unwrap();
        reg.lock_binding(env, "k").unwrap();

        assert_eq!(
            reg.put(env, "k", Value::Integer(2)),
            Err(EnvError::LockedBinding {
                key: "k".to_string()
            })
        );
        assert_eq!(reg.get(env, "k"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_remove_binding_locked_key_in_unlocked_env_succeeds() {
        let mut reg = registry();
        let env = reg.new_env(None, 0);
        reg.put(env, "k", Value::Integer(1)).unwrap();
        reg.lock_binding(env, "k").unwrap();

        assert_eq!(reg.remove(env, "k").unwrap(), Some(Value::Integer(1)));
        assert!(!reg.exists(env, "k", false));
    }

    #[test]
    fn test_unlock_binding_is_ignored() {
        let mut reg = registry();
        let env = reg.new_env(None, 0);
        reg.put(env, "k", Value::Integer(1)).unwrap();
        reg.lock_binding(env, "k").unwrap();
        reg.unlock_binding(env, "k");
        assert!(reg.binding_is_locked(env, "k"));
        assert!(reg.put(env, "k", Value::Null).is_err());
    }

    #[test]
    fn test_lock_with_bindings_locks_present_keys() {
        let mut reg = registry();
        let env = reg.new_env(None, 0);
        reg.put(env, "a", Value::Null).unwrap();
        reg.put(env, "b", Value::Null).unwrap();
        reg.lock(env, true).unwrap();

        assert!(reg.binding_is_locked(env, "a"));
        assert!(reg.binding_is_locked(env, "b"));
        assert!(matches!(
            reg.put(env, "a", Value::Integer(1)),
            Err(EnvError::LockedBinding { .. })
        ));
    }

    #[test]
    fn test_lock_is_idempotent() {
        let mut reg = registry();
        let env = reg.new_env(None, 0);
        reg.put(env, "a", Value::Null).unwrap();
        reg.lock(env, false).unwrap();
        let keys_once = reg.ls(env, true, None);
        reg.lock(env, false).unwrap();

        assert!(reg.is_locked(env));
        assert_eq!(reg.ls(env, true, None), keys_once);
        assert!(!reg.binding_is_locked(env, "a"));
    }

    #[test]
    fn test_empty_env_refuses_assignment_and_lock() {
        let mut reg = registry();
        let empty = reg.empty_env();
        assert_eq!(
            reg.put(empty, "x", Value::Null),
            Err(EnvError::EmptyEnvironment)
        );
        assert_eq!(reg.lock(empty, false), Err(EnvError::EmptyEnvironment));
        assert!(!reg.is_locked(empty));
    }

    #[test]
    fn test_base_refuses_removal() {
        let mut reg = registry();
        let base = reg.base_env();
        reg.put(base, "helper", Value::Null).unwrap();
        assert!(matches!(
            reg.remove(base, "helper"),
            Err(EnvError::BaseRemoval { .. })
        ));
        assert!(reg.exists(base, "helper", false));
    }

    #[test]
    fn test_find_var_walks_parents() {
        let mut reg = registry();
        let global = reg.global_env();
        reg.put(global, "g", Value::Integer(1)).unwrap();
        let outer = reg.new_env(Some(global), 0);
        let inner = reg.new_function_env(outer, None);
        reg.put(outer, "o", Value::Integer(2)).unwrap();

        assert_eq!(reg.find_var(inner, "o"), Some((outer, &Value::Integer(2))));
        assert_eq!(reg.find_var(inner, "g"), Some((global, &Value::Integer(1))));
        assert_eq!(reg.find_var(inner, "missing"), None);

        assert!(reg.exists(inner, "g", true));
        assert!(!reg.exists(inner, "g", false));
    }

    #[test]
    fn test_ls_filters_hidden_and_pattern() {
        let mut reg = registry();
        let env = reg.new_env(None, 0);
        for key in ["b", "a", ".secret", "ab"] {
            reg.put(env, key, Value::Null).unwrap();
        }
        assert_eq!(reg.ls(env, false, None), vec!["a", "ab", "b"]);
        assert_eq!(reg.ls(env, true, None), vec![".secret", "a", "ab", "b"]);
        let re = Regex::new("^a").unwrap();
        assert_eq!(reg.ls(env, false, Some(&re)), vec!["a", "ab"]);
    }
}
