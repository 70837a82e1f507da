//! Package loaders
//!
//! A loader turns a library name into the bindings that seed a new
//! package/imports/namespace triple, plus the names of the namespaces it
//! imports. Two loaders ship with the crate:
//!
//! - `MapLoader` - packages registered in memory, for embedding and tests
//! - `DirectoryLoader` - one TOML file per package in a library directory
//!
//! ## Package file format (`<library>/<name>.toml`)
//!
//! ```toml
//! [package]
//! name = "stats"          # optional, must match the file name
//! version = "4.3.1"       # optional, semver
//! imports = ["utils"]
//!
//! [bindings]
//! sd = "function"
//! bandwidth = 2.5
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::LoadError;
use crate::value::Value;

/// Everything needed to build one package's environments.
#[derive(Debug, Clone, Default)]
pub struct PackageSource {
    /// Recorded as the package environment's `"path"` attribute.
    pub path: String,
    pub bindings: Vec<(String, Value)>,
    /// Namespaces loaded before this one.
    pub imports: Vec<String>,
    pub version: Option<semver::Version>,
}

impl PackageSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn binding(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.bindings.push((key.to_string(), value.into()));
        self
    }

    pub fn import(mut self, name: &str) -> Self {
        self.imports.push(name.to_string());
        self
    }
}

/// Source of package contents for `load_namespace` and `library`.
pub trait PackageLoader {
    fn load(&self, name: &str) -> Result<PackageSource, LoadError>;
}

/// In-memory packages.
#[derive(Debug, Clone, Default)]
pub struct MapLoader {
    packages: HashMap<String, PackageSource>,
}

impl MapLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, source: PackageSource) {
        self.packages.insert(name.to_string(), source);
    }

    pub fn with_package(mut self, name: &str, source: PackageSource) -> Self {
        self.insert(name, source);
        self
    }
}

impl PackageLoader for MapLoader {
    fn load(&self, name: &str) -> Result<PackageSource, LoadError> {
        self.packages
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(name.to_string()))
    }
}

/// `[package]` section of a package file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PackageMeta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    imports: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PackageFile {
    #[serde(default)]
    package: PackageMeta,
    #[serde(default)]
    bindings: toml::Table,
}

/// Reads `<root>/<name>.toml`.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    root: PathBuf,
}

impl DirectoryLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.toml", name))
    }

    /// Names of all package files in the library, sorted.
    pub fn available(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        names
    }

    fn parse(&self, name: &str, path: &Path, content: &str) -> Result<PackageSource, LoadError> {
        let parse_err = |msg: String| LoadError::Parse(path.to_path_buf(), msg);

        let file: PackageFile = toml::from_str(content).map_err(|e| parse_err(e.to_string()))?;

        if let Some(declared) = &file.package.name {
            if declared != name {
                return Err(parse_err(format!(
                    "file declares package '{}', expected '{}'",
                    declared, name
                )));
            }
        }

        let version = file
            .package
            .version
            .as_deref()
            .map(semver::Version::parse)
            .transpose()
            .map_err(|e| parse_err(format!("invalid version: {}", e)))?;

        let bindings = file
            .bindings
            .iter()
            .map(|(key, value)| {
                Value::from_toml(value)
                    .map(|v| (key.clone(), v))
                    .ok_or_else(|| parse_err(format!("unsupported value for binding '{}'", key)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PackageSource {
            path: path.display().to_string(),
            bindings,
            imports: file.package.imports,
            version,
        })
    }
}

impl PackageLoader for DirectoryLoader {
    fn load(&self, name: &str) -> Result<PackageSource, LoadError> {
        let path = self.path_for(name);
        if !path.exists() {
            return Err(LoadError::NotFound(name.to_string()));
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| LoadError::Io(path.clone(), e.to_string()))?;
        self.parse(name, &path, &content)
    }
}
