//! Environment constructors for EnvRegistry.
//!
//! Each kind has fixed construction rules:
//!
//! | kind               | parent                  | name    | attributes                 |
//! |--------------------|-------------------------|---------|----------------------------|
//! | Package            | caller (chain position) | `xxx`   | `name=package:xxx`, `path` |
//! | Imports            | `namespace:base`        | unnamed | `name=imports:xxx`         |
//! | Namespace          | its Imports             | `xxx`   |                            |
//! | Function           | enclosing environment   | unnamed |                            |
//! | FunctionDefinition | lexical scope           | unnamed |                            |
//! | Anonymous          | caller or empty         | unnamed | optional `name`            |
//!
//! Function environments get a frame when created; definition environments
//! never do. Empty, Base, Global and Autoload are built once by `bootstrap`.

use std::fmt;

use tracing::trace;

use super::naming::{NAME_ATTR, PATH_ATTR, UNNAMED};
use super::{BindingStore, EnvId, EnvKind, EnvRegistry, FrameId};
use crate::value::Value;

/// The three faces of a loaded package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    Package,
    Imports,
    Namespace,
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageKind::Package => write!(f, "package"),
            PackageKind::Imports => write!(f, "imports"),
            PackageKind::Namespace => write!(f, "namespace"),
        }
    }
}

/// `package:stats`, `imports:stats`, `namespace:stats`.
pub fn package_qual_name(kind: PackageKind, package: &str) -> String {
    format!("{}:{}", kind, package)
}

impl EnvRegistry {
    /// `new.env(parent = parent, size = size)`.
    ///
    /// Without a parent the environment hangs off the empty environment. The
    /// store is map-backed; a frame is only materialized if it gets attached.
    pub fn new_env(&mut self, parent: Option<EnvId>, size: usize) -> EnvId {
        let parent = parent.unwrap_or(self.empty);
        let store = self.alloc_store(BindingStore::with_capacity(size));
        let env = self.alloc_env(EnvKind::Anonymous, Some(parent), UNNAMED, store);
        trace!(target: "envchain::bindings", %env, %parent, size, "new environment");
        env
    }

    /// A parentless map-backed environment carrying a `"name"` attribute,
    /// the shape `attach()` uses for data it puts on the search path.
    pub fn new_named_env(&mut self, name: &str) -> EnvId {
        let env = self.new_env(None, 0);
        self.insert_attr(env, NAME_ATTR, Value::str(name));
        env
    }

    /// Environment for one function call, enclosed by `parent`.
    ///
    /// `frame` is the host's call frame; without one a fresh frame is
    /// allocated. Either way its enclosure points at `parent`'s nearest frame.
    pub fn new_function_env(&mut self, parent: EnvId, frame: Option<FrameId>) -> EnvId {
        let store = self.alloc_store(BindingStore::new());
        let env = self.alloc_env(EnvKind::Function, Some(parent), UNNAMED, store);
        match frame {
            Some(frame) => self.adopt_frame(env, frame),
            None => {
                self.materialize_frame(env);
            }
        }
        trace!(target: "envchain::bindings", %env, %parent, "new function environment");
        env
    }

    /// Scope of a function being defined, enclosed by its lexical parent.
    ///
    /// Definition environments never get a frame; call-time environments
    /// come from [`EnvRegistry::new_function_env`].
    pub fn new_definition_env(&mut self, parent: EnvId) -> EnvId {
        let store = self.alloc_store(BindingStore::new());
        let env = self.alloc_env(EnvKind::FunctionDefinition, Some(parent), UNNAMED, store);
        trace!(target: "envchain::bindings", %env, %parent, "new definition environment");
        env
    }

    /// Create the package / imports / namespace triple for `name`.
    ///
    /// The three environments share one binding store seeded with `bindings`.
    /// Returns the package environment; the other two are reachable through
    /// [`EnvRegistry::imports_of`] and [`EnvRegistry::namespace_of`].
    pub fn new_package<I>(&mut self, parent: EnvId, name: &str, path: &str, bindings: I) -> EnvId
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let store = self.alloc_store(bindings.into_iter().collect());
        let base_namespace = self.base_namespace_env();

        let imports = self.alloc_env(EnvKind::Imports, Some(base_namespace), UNNAMED, store);
        self.insert_attr(
            imports,
            NAME_ATTR,
            Value::str(package_qual_name(PackageKind::Imports, name)),
        );

        let namespace = self.alloc_env(EnvKind::Namespace, Some(imports), name, store);

        let package = self.alloc_env(
            EnvKind::Package { imports, namespace },
            Some(parent),
            name,
            store,
        );
        self.insert_attr(
            package,
            NAME_ATTR,
            Value::str(package_qual_name(PackageKind::Package, name)),
        );
        self.insert_attr(package, PATH_ATTR, Value::str(path));
        self.materialize_frame(package);

        trace!(target: "envchain::bindings", %package, name, path, "new package triple");
        package
    }

    /// The `imports:xxx` environment of a package.
    pub fn imports_of(&self, package: EnvId) -> Option<EnvId> {
        match self.kind(package) {
            EnvKind::Package { imports, .. } => Some(imports),
            _ => None,
        }
    }

    /// The `namespace:xxx` environment of a package (base included).
    pub fn namespace_of(&self, package: EnvId) -> Option<EnvId> {
        self.kind(package).namespace()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> Vec<(String, Value)> {
        vec![
            ("sd".to_string(), Value::str("fn")),
            (".hidden".to_string(), Value::Null),
        ]
    }

    #[test]
    fn test_package_qual_name() {
        assert_eq!(package_qual_name(PackageKind::Package, "stats"), "package:stats");
        assert_eq!(package_qual_name(PackageKind::Imports, "stats"), "imports:stats");
        assert_eq!(
            package_qual_name(PackageKind::Namespace, "stats"),
            "namespace:stats"
        );
    }

    #[test]
    fn test_new_env_defaults_to_empty_parent() {
        let mut reg = EnvRegistry::new();
        let env = reg.new_env(None, 16);
        assert_eq!(reg.kind(env), EnvKind::Anonymous);
        assert_eq!(reg.parent(env), Some(reg.empty_env()));
        assert_eq!(reg.frame_of(env), None);

        let child = reg.new_env(Some(env), 0);
        assert_eq!(reg.parent(child), Some(env));
        assert!(reg.terminates(child));
    }

    #[test]
    fn test_new_named_env() {
        let mut reg = EnvRegistry::new();
        let env = reg.new_named_env("mydata");
        assert_eq!(reg.name(env), "mydata");
        assert!(reg.is_unnamed(env));
        assert_eq!(reg.parent(env), Some(reg.empty_env()));
    }

    #[test]
    fn test_function_env_frame_encloses_parent_frame() {
        let mut reg = EnvRegistry::new();
        let global = reg.global_env();
        let f = reg.new_function_env(global, None);

        assert_eq!(reg.kind(f), EnvKind::Function);
        assert!(reg.is_unnamed(f));
        let frame = reg.frame_of(f).unwrap();
        assert_eq!(reg.frames().enclosing_frame(frame), reg.frame_of(global));
        assert_eq!(reg.frames().environment_of(frame), Some(f));
    }

    #[test]
    fn test_function_env_under_frameless_parent_skips_to_nearest_frame() {
        let mut reg = EnvRegistry::new();
        let global = reg.global_env();
        let map_env = reg.new_env(Some(global), 0);
        let f = reg.new_function_env(map_env, None);

        let frame = reg.frame_of(f).unwrap();
        assert_eq!(reg.frames().enclosing_frame(frame), reg.frame_of(global));
    }

    #[test]
    fn test_definition_env_is_unnamed_and_frameless() {
        let mut reg = EnvRegistry::new();
        let global = reg.global_env();
        let def = reg.new_definition_env(global);

        assert_eq!(reg.kind(def), EnvKind::FunctionDefinition);
        assert!(reg.is_unnamed(def));
        assert_eq!(reg.parent(def), Some(global));
        assert_eq!(reg.frame_of(def), None);

        // a call made inside the definition scope encloses Global's frame
        let call = reg.new_function_env(def, None);
        assert_eq!(
            reg.frames().enclosing_frame(reg.frame_of(call).unwrap()),
            reg.frame_of(global)
        );
        reg.verify_invariants().unwrap();
    }

    #[test]
    fn test_package_triple_shape() {
        let mut reg = EnvRegistry::new();
        let base = reg.base_env();
        let pkg = reg.new_package(base, "stats", "/lib/stats", seed());

        let imports = reg.imports_of(pkg).unwrap();
        let namespace = reg.namespace_of(pkg).unwrap();

        assert_eq!(reg.name(pkg), "package:stats");
        assert_eq!(reg.path(pkg), Some("/lib/stats"));
        assert_eq!(reg.parent(pkg), Some(base));

        assert_eq!(reg.kind(imports), EnvKind::Imports);
        assert!(reg.is_unnamed(imports));
        assert_eq!(reg.name(imports), "imports:stats");
        assert_eq!(reg.parent(imports), Some(reg.base_namespace_env()));

        assert_eq!(reg.kind(namespace), EnvKind::Namespace);
        assert_eq!(reg.name(namespace), "stats");
        assert_eq!(reg.parent(namespace), Some(imports));
        assert_eq!(reg.print_name(namespace), "<environment: namespace:stats>");
    }

    #[test]
    fn test_package_triple_shares_one_store() {
        let mut reg = EnvRegistry::new();
        let base = reg.base_env();
        let pkg = reg.new_package(base, "stats", "/lib/stats", seed());
        let imports = reg.imports_of(pkg).unwrap();
        let namespace = reg.namespace_of(pkg).unwrap();

        assert!(reg.shares_store(pkg, imports));
        assert!(reg.shares_store(pkg, namespace));
        assert_eq!(reg.get(namespace, "sd"), Some(&Value::str("fn")));

        reg.put(namespace, "median", Value::Integer(1)).unwrap();
        assert_eq!(reg.get(pkg, "median"), Some(&Value::Integer(1)));
        assert_eq!(reg.get(imports, "median"), Some(&Value::Integer(1)));

        // environment locks stay per identity
        reg.lock(pkg, false).unwrap();
        assert!(reg.put(pkg, "new_one", Value::Null).is_err());
        assert!(reg.put(namespace, "new_one", Value::Null).is_ok());
    }

    #[test]
    fn test_namespace_chain_terminates() {
        let mut reg = EnvRegistry::new();
        let base = reg.base_env();
        let pkg = reg.new_package(base, "stats", "/lib/stats", seed());
        let namespace = reg.namespace_of(pkg).unwrap();

        let chain: Vec<EnvId> = reg.ancestors(namespace).collect();
        assert_eq!(chain[1], reg.imports_of(pkg).unwrap());
        assert_eq!(chain[2], reg.base_namespace_env());
        assert_eq!(chain[3], reg.global_env());
        assert_eq!(chain.last(), Some(&reg.empty_env()));
    }

    #[test]
    fn test_non_package_has_no_triple() {
        let mut reg = EnvRegistry::new();
        let env = reg.new_env(None, 0);
        assert_eq!(reg.imports_of(env), None);
        assert_eq!(reg.namespace_of(env), None);
        assert_eq!(reg.namespace_of(reg.base_env()), Some(reg.base_namespace_env()));
    }
}
