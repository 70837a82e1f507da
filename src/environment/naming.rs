//! Names and attributes for EnvRegistry.
//!
//! An environment has three names:
//! - the simple name (`environmentName`): constructor name or `"name"` attribute
//! - the print name: `<environment: base>`, `<environment: 0x...>` when unnamed
//! - the search name shown by `search()`: `.GlobalEnv`, `package:base`, ...

use tracing::trace;

use super::{Attributes, EnvId, EnvKind, EnvRegistry};
use crate::error::EnvError;
use crate::value::Value;

/// Attribute overriding the simple name.
pub const NAME_ATTR: &str = "name";
/// Attribute recording where a package was loaded from.
pub const PATH_ATTR: &str = "path";

pub const EMPTY_ENV_NAME: &str = "R_EmptyEnv";
pub const GLOBAL_ENV_NAME: &str = "R_GlobalEnv";
pub const GLOBAL_SEARCH_NAME: &str = ".GlobalEnv";
pub const BASE_NAME: &str = "base";
pub const BASE_SEARCH_NAME: &str = "package:base";
pub const AUTOLOAD_NAME: &str = "Autoloads";

/// Constructor name of unnamed environments.
pub const UNNAMED: &str = "";

impl EnvRegistry {
    /// `environmentName(env)`: the `"name"` attribute if set, else the
    /// constructor-assigned name.
    pub fn name(&self, env: EnvId) -> &str {
        self.attr(env, NAME_ATTR)
            .and_then(Value::as_str)
            .unwrap_or(self.node(env).name.as_str())
    }

    /// Whether the environment was constructed without a name.
    pub fn is_unnamed(&self, env: EnvId) -> bool {
        self.node(env).name == UNNAMED
    }

    /// What `print(env)` shows.
    pub fn print_name(&self, env: EnvId) -> String {
        format!("<environment: {}>", self.print_name_helper(env))
    }

    fn print_name_helper(&self, env: EnvId) -> String {
        if self.is_unnamed(env) {
            format!("{:#x}", env.address())
        } else if self.kind(env) == EnvKind::Namespace {
            format!("namespace:{}", self.name(env))
        } else {
            self.name(env).to_string()
        }
    }

    /// Name as listed by `search()`.
    pub fn search_name(&self, env: EnvId) -> &str {
        match self.kind(env) {
            EnvKind::Global => GLOBAL_SEARCH_NAME,
            EnvKind::Base { .. } => BASE_SEARCH_NAME,
            _ => self.name(env),
        }
    }

    // ============================================================
    // Attributes
    // ============================================================

    pub fn attr(&self, env: EnvId, key: &str) -> Option<&Value> {
        self.node(env)
            .attributes
            .as_ref()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// All attributes in insertion order.
    pub fn attributes(&self, env: EnvId) -> &[(String, Value)] {
        self.node(env)
            .attributes
            .as_deref()
            .unwrap_or(&[])
    }

    /// `attr(env, key) <- value`.
    ///
    /// `package:base` keeps its fixed identity: `"name"` and `"path"` are
    /// ignored there.
    pub fn set_attr(&mut self, env: EnvId, key: &str, value: Value) -> Result<(), EnvError> {
        match self.kind(env) {
            EnvKind::Empty => return Err(EnvError::EmptyEnvironment),
            EnvKind::Base { .. } if key == NAME_ATTR || key == PATH_ATTR => {
                trace!(target: "envchain::bindings", key, "base attribute left unchanged");
                return Ok(());
            }
            _ => {}
        }
        self.insert_attr(env, key, value);
        Ok(())
    }

    /// Set an attribute without the kind checks of `set_attr`.
    pub(crate) fn insert_attr(&mut self, env: EnvId, key: &str, value: Value) {
        let attrs = self
            .node_mut(env)
            .attributes
            .get_or_insert_with(Attributes::new);
        match attrs.iter().position(|(k, _)| k == key) {
            Some(i) => attrs[i].1 = value,
            None => attrs.push((key.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, env: EnvId, key: &str) -> Option<Value> {
        let attrs = self.node_mut(env).attributes.as_mut()?;
        let pos = attrs.iter().position(|(k, _)| k == key)?;
        Some(attrs.remove(pos).1)
    }

    /// The `"path"` a package was loaded from.
    pub fn path(&self, env: EnvId) -> Option<&str> {
        self.attr(env, PATH_ATTR).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singleton_names() {
        let reg = EnvRegistry::new();
        assert_eq!(reg.name(reg.global_env()), GLOBAL_ENV_NAME);
        assert_eq!(reg.search_name(reg.global_env()), GLOBAL_SEARCH_NAME);
        assert_eq!(reg.print_name(reg.global_env()), "<environment: R_GlobalEnv>");

        assert_eq!(reg.name(reg.base_env()), BASE_NAME);
        assert_eq!(reg.search_name(reg.base_env()), BASE_SEARCH_NAME);
        assert_eq!(reg.print_name(reg.base_env()), "<environment: base>");

        assert_eq!(reg.name(reg.empty_env()), EMPTY_ENV_NAME);
        assert_eq!(
            reg.print_name(reg.base_namespace_env()),
            "<environment: namespace:base>"
        );
    }

    #[test]
    fn test_autoload_is_unnamed_with_name_attribute() {
        let reg = EnvRegistry::new();
        let autoload = reg.autoload_env();
        assert!(reg.is_unnamed(autoload));
        assert_eq!(reg.name(autoload), AUTOLOAD_NAME);
        assert_eq!(reg.search_name(autoload), AUTOLOAD_NAME);
        assert!(reg.print_name(autoload).starts_with("<environment: 0x"));
    }

    #[test]
    fn test_unnamed_print_name_is_stable_and_distinct() {
        let mut reg = EnvRegistry::new();
        let a = reg.new_env(None, 0);
        let b = reg.new_env(None, 0);

        assert_eq!(reg.name(a), "");
        assert_eq!(reg.print_name(a), reg.print_name(a));
        assert_ne!(reg.print_name(a), reg.print_name(b));
        assert_eq!(
            reg.print_name(a),
            format!("<environment: {:#x}>", a.address())
        );
    }

    #[test]
    fn test_name_attribute_overrides_simple_name() {
        let mut reg = EnvRegistry::new();
        let env = reg.new_env(None, 0);
        reg.set_attr(env, NAME_ATTR, Value::str("scratch")).unwrap();

        assert_eq!(reg.name(env), "scratch");
        assert_eq!(reg.search_name(env), "scratch");
        // still unnamed for printing purposes
        assert!(reg.print_name(env).starts_with("<environment: 0x"));

        assert_eq!(reg.remove_attr(env, NAME_ATTR), Some(Value::str("scratch")));
        assert_eq!(reg.name(env), "");
    }

    #[test]
    fn test_attributes_keep_insertion_order() {
        let mut reg = EnvRegistry::new();
        let env = reg.new_env(None, 0);
        reg.set_attr(env, "b", Value::Integer(1)).unwrap();
        reg.set_attr(env, "a", Value::Integer(2)).unwrap();
        reg.set_attr(env, "b", Value::Integer(3)).unwrap();

        let keys: Vec<&str> = reg.attributes(env).iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(reg.attr(env, "b"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_base_ignores_name_and_path_attributes() {
        let mut reg = EnvRegistry::new();
        let base = reg.base_env();
        reg.set_attr(base, NAME_ATTR, Value::str("renamed")).unwrap();
        reg.set_attr(base, PATH_ATTR, Value::str("/tmp")).unwrap();

        assert_eq!(reg.name(base), BASE_NAME);
        assert_eq!(reg.path(base), None);
        assert_eq!(reg.search_name(base), BASE_SEARCH_NAME);

        reg.set_attr(base, "note", Value::Logical(true)).unwrap();
        assert_eq!(reg.attr(base, "note"), Some(&Value::Logical(true)));
    }

    #[test]
    fn test_global_search_name_ignores_name_attribute() {
        let mut reg = EnvRegistry::new();
        let global = reg.global_env();
        reg.set_attr(global, NAME_ATTR, Value::str("workspace")).unwrap();
        assert_eq!(reg.name(global), "workspace");
        assert_eq!(reg.search_name(global), GLOBAL_SEARCH_NAME);
    }

    #[test]
    fn test_empty_env_attributes_refused() {
        let mut reg = EnvRegistry::new();
        let empty = reg.empty_env();
        assert_eq!(
            reg.set_attr(empty, NAME_ATTR, Value::str("x")),
            Err(EnvError::EmptyEnvironment)
        );
        assert!(reg.attributes(empty).is_empty());
    }
}
