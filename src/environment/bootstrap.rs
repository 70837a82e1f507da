//! Process bootstrap and test reset for EnvRegistry.
//!
//! Bootstrap builds the four singletons in a fixed order:
//!
//! 1. the empty environment
//! 2. `namespace:base` and `package:base`, sharing one store
//! 3. `Autoloads`, enclosed by base
//! 4. `.GlobalEnv`, enclosed by `Autoloads` or directly by base
//!
//! then re-points `namespace:base` at Global, attaches the configured default
//! packages and snapshots the chain below Global for `reset_for_test`.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::naming::{AUTOLOAD_NAME, BASE_NAME, EMPTY_ENV_NAME, GLOBAL_ENV_NAME, NAME_ATTR, UNNAMED};
use super::{BindingStore, EnvId, EnvKind, EnvRegistry, FrameHost, FrameIndex};
use crate::config::BootstrapConfig;
use crate::error::LoadError;
use crate::packages::PackageLoader;
use crate::value::Value;

/// Hidden bindings bootstrap places in base.
pub(crate) const GLOBAL_ENV_VAR: &str = ".GlobalEnv";
pub(crate) const BASE_NAMESPACE_VAR: &str = ".BaseNamespaceEnv";
pub(crate) const AUTOLOAD_ENV_VAR: &str = ".AutoloadEnv";

impl EnvRegistry {
    /// Registry with the default configuration and no packages beyond base.
    pub fn new() -> Self {
        let mut registry = Self::build(BootstrapConfig::default(), Box::new(FrameIndex::new()));
        registry.snapshot_bootstrap();
        registry
    }

    /// Build the singletons and attach `config.default_packages` from `loader`.
    pub fn bootstrap(config: &BootstrapConfig, loader: &dyn PackageLoader) -> Result<Self, LoadError> {
        Self::bootstrap_with_frames(config, loader, Box::new(FrameIndex::new()))
    }

    /// Like [`bootstrap`](Self::bootstrap), with a host-provided frame index.
    pub fn bootstrap_with_frames(
        config: &BootstrapConfig,
        loader: &dyn PackageLoader,
        frames: Box<dyn FrameHost>,
    ) -> Result<Self, LoadError> {
        let mut registry = Self::build(config.clone(), frames);
        for name in &config.default_packages {
            registry.library(name, 2, loader)?;
        }
        registry.snapshot_bootstrap();
        debug!(
            target: "envchain::bootstrap",
            packages = config.default_packages.len(),
            search = ?registry.search(),
            "bootstrap complete"
        );
        Ok(registry)
    }

    fn build(options: BootstrapConfig, frames: Box<dyn FrameHost>) -> Self {
        let mut reg = EnvRegistry {
            envs: Vec::new(),
            stores: Vec::new(),
            search_path: Vec::new(),
            empty: EnvId(0),
            base: EnvId(0),
            global: EnvId(0),
            autoload: EnvId(0),
            bootstrap_chain: Vec::new(),
            bootstrap_namespaces: HashSet::new(),
            namespaces: HashMap::new(),
            loading: HashSet::new(),
            options,
            frames,
        };

        let store = reg.alloc_store(BindingStore::new());
        reg.empty = reg.alloc_env(EnvKind::Empty, None, EMPTY_ENV_NAME, store);

        // namespace:base first; its parent becomes Global once that exists
        let base_store = reg.alloc_store(BindingStore::new());
        let base_namespace =
            reg.alloc_env(EnvKind::Namespace, Some(reg.empty), BASE_NAME, base_store);
        reg.base = reg.alloc_env(
            EnvKind::Base {
                namespace: base_namespace,
            },
            Some(reg.empty),
            BASE_NAME,
            base_store,
        );
        reg.materialize_frame(reg.base);

        let store = reg.alloc_store(BindingStore::new());
        reg.autoload = reg.alloc_env(EnvKind::Autoload, Some(reg.base), UNNAMED, store);
        reg.insert_attr(reg.autoload, NAME_ATTR, Value::str(AUTOLOAD_NAME));
        reg.materialize_frame(reg.autoload);

        let global_parent = if reg.options.attach_autoloads {
            reg.autoload
        } else {
            reg.base
        };
        reg.global = reg.new_global(global_parent);

        reg.link_parent(base_namespace, Some(reg.global));
        reg.rebuild_search_path();

        reg.safe_put(reg.base, BASE_NAMESPACE_VAR, Value::Env(base_namespace));
        reg.safe_put(reg.base, AUTOLOAD_ENV_VAR, Value::Env(reg.autoload));

        debug!(
            target: "envchain::bootstrap",
            attach_autoloads = reg.options.attach_autoloads,
            lock_namespaces = reg.options.lock_namespaces,
            "singletons created"
        );
        reg
    }

    /// Allocate a Global environment enclosed by `parent` and publish it as
    /// `.GlobalEnv` in base.
    fn new_global(&mut self, parent: EnvId) -> EnvId {
        let store = self.alloc_store(BindingStore::new());
        let global = self.alloc_env(EnvKind::Global, Some(parent), GLOBAL_ENV_NAME, store);
        self.materialize_frame(global);
        self.safe_put(self.base, GLOBAL_ENV_VAR, Value::Env(global));
        global
    }

    fn snapshot_bootstrap(&mut self) {
        self.bootstrap_chain = self.search_path[1..].to_vec();
        self.bootstrap_namespaces = self.namespaces.keys().cloned().collect();
    }

    /// Discard everything done since bootstrap, for test isolation.
    ///
    /// A fresh Global is built atop the post-bootstrap chain, whose parent
    /// pointers are restored. Environments attached later fall off the path
    /// and namespaces loaded later are forgotten. The old Global stays valid
    /// for anyone still holding it.
    pub fn reset_for_test(&mut self) {
        let chain = self.bootstrap_chain.clone();
        assert!(
            chain.last() == Some(&self.base),
            "reset_for_test on a registry that was never bootstrapped"
        );

        let severed: Vec<EnvId> = self.search_path[1..]
            .iter()
            .copied()
            .filter(|env| !chain.contains(env) && self.kind(*env) == EnvKind::Anonymous)
            .collect();
        for &env in &severed {
            if let Some(frame) = self.node_mut(env).frame.take() {
                self.frames.release_frame(frame);
            }
        }

        for pair in chain.windows(2) {
            self.link_parent(pair[0], Some(pair[1]));
        }
        self.link_parent(self.base, Some(self.empty));

        let old_global = self.global;
        self.global = self.new_global(chain[0]);

        let base_namespace = self.base_namespace_env();
        self.link_parent(base_namespace, Some(self.global));

        let keep = &self.bootstrap_namespaces;
        self.namespaces.retain(|name, _| keep.contains(name));
        self.loading.clear();

        self.rebuild_search_path();
        for env in severed.into_iter().chain(chain) {
            self.relink_frames_through(env);
        }
        self.relink_frames_through(base_namespace);

        debug!(
            target: "envchain::bootstrap",
            %old_global,
            new_global = %self.global,
            search = ?self.search(),
            "reset for test"
        );
    }
}

impl Default for EnvRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::{MapLoader, PackageSource};

    fn loader() -> MapLoader {
        MapLoader::new()
            .with_package("utils", PackageSource::new("/lib/utils").binding("head", "fn"))
            .with_package(
                "stats",
                PackageSource::new("/lib/stats")
                    .binding("sd", "fn")
                    .import("utils"),
            )
    }

    #[test]
    fn test_singletons_are_distinct() {
        let reg = EnvRegistry::new();
        let ids = [
            reg.empty_env(),
            reg.base_env(),
            reg.base_namespace_env(),
            reg.global_env(),
            reg.autoload_env(),
        ];
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(reg.kind(reg.empty_env()), EnvKind::Empty);
        assert_eq!(reg.parent(reg.empty_env()), None);
    }

    #[test]
    fn test_singleton_parents() {
        let reg = EnvRegistry::new();
        assert_eq!(reg.parent(reg.base_env()), Some(reg.empty_env()));
        assert_eq!(reg.parent(reg.autoload_env()), Some(reg.base_env()));
        assert_eq!(reg.parent(reg.global_env()), Some(reg.base_env()));
        assert_eq!(reg.parent(reg.base_namespace_env()), Some(reg.global_env()));
        assert!(reg.shares_store(reg.base_env(), reg.base_namespace_env()));
    }

    #[test]
    fn test_base_holds_hidden_singleton_bindings() {
        let reg = EnvRegistry::new();
        let base = reg.base_env();
        assert_eq!(reg.get(base, GLOBAL_ENV_VAR), Some(&Value::Env(reg.global_env())));
        assert_eq!(
            reg.get(base, BASE_NAMESPACE_VAR),
            Some(&Value::Env(reg.base_namespace_env()))
        );
        assert_eq!(reg.get(base, AUTOLOAD_ENV_VAR), Some(&Value::Env(reg.autoload_env())));
        assert!(reg.ls(base, false, None).is_empty());
    }

    #[test]
    fn test_attach_autoloads_puts_autoloads_above_base() {
        let config = BootstrapConfig {
            attach_autoloads: true,
            ..BootstrapConfig::default()
        };
        let reg = EnvRegistry::bootstrap(&config, &MapLoader::new()).unwrap();
        assert_eq!(reg.search(), vec![".GlobalEnv", "Autoloads", "package:base"]);
        reg.verify_invariants().unwrap();
    }

    #[test]
    fn test_default_packages_attached_in_order() {
        let config = BootstrapConfig {
            default_packages: vec!["utils".to_string(), "stats".to_string()],
            ..BootstrapConfig::default()
        };
        let reg = EnvRegistry::bootstrap(&config, &loader()).unwrap();
        assert_eq!(
            reg.search(),
            vec![".GlobalEnv", "package:stats", "package:utils", "package:base"]
        );
        reg.verify_invariants().unwrap();
    }

    #[test]
    fn test_bootstrap_fails_on_missing_default_package() {
        let config = BootstrapConfig {
            default_packages: vec!["ghost".to_string()],
            ..BootstrapConfig::default()
        };
        let err = EnvRegistry::bootstrap(&config, &MapLoader::new()).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(name) if name == "ghost"));
    }

    #[test]
    fn test_reset_restores_bootstrap_path() {
        let config = BootstrapConfig {
            default_packages: vec!["utils".to_string()],
            ..BootstrapConfig::default()
        };
        let loader = loader();
        let mut reg = EnvRegistry::bootstrap(&config, &loader).unwrap();
        let old_global = reg.global_env();
        reg.put(old_global, "x", Value::Integer(1)).unwrap();

        let data = reg.new_named_env("data");
        reg.attach(2, data).unwrap();
        reg.library("stats", 3, &loader).unwrap();
        assert_eq!(reg.search_path().len(), 5);

        reg.reset_for_test();

        assert_ne!(reg.global_env(), old_global);
        assert_eq!(reg.search(), vec![".GlobalEnv", "package:utils", "package:base"]);
        assert!(!reg.exists(reg.global_env(), "x", false));
        assert_eq!(
            reg.get(reg.base_env(), GLOBAL_ENV_VAR),
            Some(&Value::Env(reg.global_env()))
        );
        assert_eq!(reg.parent(reg.base_namespace_env()), Some(reg.global_env()));
        assert_eq!(reg.frame_of(data), None);
        assert_eq!(reg.loaded_namespaces(), vec!["utils"]);
        reg.verify_invariants().unwrap();
    }
}
