//! Namespace registry and package loading for EnvRegistry.
//!
//! Loading a package creates its package/imports/namespace triple and
//! registers the namespace under the package name. Loading does not attach;
//! `library` loads and then attaches the package environment.
//!
//! Imports are loaded first, depth-first. A name that is still being loaded
//! when it is requested again means the imports form a cycle.

use tracing::debug;

use super::kinds::{package_qual_name, PackageKind};
use super::naming::BASE_NAME;
use super::{EnvId, EnvKind, EnvRegistry, LoadedNamespace};
use crate::error::LoadError;
use crate::packages::PackageLoader;

impl EnvRegistry {
    /// `loadNamespace(name)`: the package environment of `name`, loading it
    /// (and its imports) through `loader` if it is not registered yet.
    pub fn load_namespace(&mut self, name: &str, loader: &dyn PackageLoader) -> Result<EnvId, LoadError> {
        if name == BASE_NAME {
            return Ok(self.base);
        }
        if let Some(ns) = self.namespaces.get(name) {
            return Ok(ns.package);
        }
        if !self.loading.insert(name.to_string()) {
            return Err(LoadError::CircularImport(name.to_string()));
        }
        let result = self.load_unregistered(name, loader);
        self.loading.remove(name);
        result
    }

    fn load_unregistered(&mut self, name: &str, loader: &dyn PackageLoader) -> Result<EnvId, LoadError> {
        let source = loader.load(name)?;
        for import in &source.imports {
            self.load_namespace(import, loader)?;
        }

        let package = self.new_package(self.base, name, &source.path, source.bindings);
        if self.options.lock_namespaces {
            self.store_mut(package).lock();
        }

        debug!(
            target: "envchain::loader",
            name,
            path = %source.path,
            imports = ?source.imports,
            sealed = self.options.lock_namespaces,
            "namespace loaded"
        );
        self.namespaces.insert(
            name.to_string(),
            LoadedNamespace {
                package,
                imports: source.imports,
                version: source.version,
            },
        );
        Ok(package)
    }

    /// `library(name, pos = pos)`: load `name` and attach its package
    /// environment. Returns the search path position it ends up at; a
    /// package that is already attached stays where it is.
    pub fn library(&mut self, name: &str, pos: usize, loader: &dyn PackageLoader) -> Result<usize, LoadError> {
        let package = self.load_namespace(name, loader)?;
        if let Some(i) = self.search_path.iter().position(|&env| env == package) {
            debug!(target: "envchain::loader", name, pos = i + 1, "already attached");
            return Ok(i + 1);
        }
        Ok(self.attach(pos, package)?)
    }

    /// The namespace environment registered for `name`.
    ///
    /// Falls back to the namespace behind an attached `package:name`.
    pub fn registered_namespace(&self, name: &str) -> Option<EnvId> {
        if name == BASE_NAME {
            return Some(self.base_namespace_env());
        }
        if let Some(ns) = self.namespaces.get(name) {
            return self.namespace_of(ns.package);
        }
        self.env_on_search_path(&package_qual_name(PackageKind::Package, name))
            .and_then(|env| self.namespace_of(env))
    }

    /// Package environment of a loaded namespace.
    pub fn namespace_package(&self, name: &str) -> Option<EnvId> {
        self.namespaces.get(name).map(|ns| ns.package)
    }

    pub fn namespace_version(&self, name: &str) -> Option<&semver::Version> {
        self.namespaces.get(name)?.version.as_ref()
    }

    pub fn namespace_imports(&self, name: &str) -> Option<&[String]> {
        self.namespaces.get(name).map(|ns| ns.imports.as_slice())
    }

    /// `loadedNamespaces()`, sorted. Base is always loaded and not listed.
    pub fn loaded_namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered name of a package environment.
    pub(crate) fn namespace_name_of(&self, env: EnvId) -> Option<String> {
        if !matches!(self.kind(env), EnvKind::Package { .. }) {
            return None;
        }
        self.namespaces
            .iter()
            .find(|(_, ns)| ns.package == env)
            .map(|(name, _)| name.clone())
    }

    /// Loaded namespaces importing `name`, sorted.
    pub(crate) fn namespace_dependents(&self, name: &str) -> Vec<String> {
        let mut dependents: Vec<String> = self
            .namespaces
            .iter()
            .filter(|(_, ns)| ns.imports.iter().any(|i| i == name))
            .map(|(dependent, _)| dependent.clone())
            .collect();
        dependents.sort();
        dependents
    }

    pub(crate) fn unregister_namespace(&mut self, name: &str) {
        if self.namespaces.remove(name).is_some() {
            debug!(target: "envchain::loader", name, "namespace unloaded");
        }
    }
}
