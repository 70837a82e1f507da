//! envchain - Lexical Environments and Search Path Library
//!
//! This library provides the scope graph of a dynamic-language runtime:
//! environments with parent chains, the ordered search path of globally
//! visible environments, and packages layered on top as
//! package/imports/namespace triples.
//!
//! # Architecture
//!
//! 1. **Environment graph** (`environment` module)
//!    - `EnvRegistry` owns every environment and binding store
//!    - Environments are `EnvId` handles; kinds are a tagged `EnvKind`
//!    - Binding and environment locks, attributes, naming rules
//!    - A frame-enclosure index re-derived from the parent chain
//!
//! 2. **Search path** (`environment` module)
//!    - `attach` / `detach` splice the path and the parent chain together
//!    - `search()`, lookup by name or position
//!
//! 3. **Packages** (`packages` module)
//!    - `PackageLoader` supplies bindings and imports for a library name
//!    - `load_namespace` / `library` build and attach package triples
//!
//! # Example
//!
//! ```rust
//! use envchain::{EnvRegistry, MapLoader, PackageSource, Value};
//!
//! let mut reg = EnvRegistry::new();
//! let loader = MapLoader::new()
//!     .with_package("stats", PackageSource::new("/lib/stats").binding("sd", "function"));
//!
//! reg.library("stats", 2, &loader).unwrap();
//! assert_eq!(reg.search(), vec![".GlobalEnv", "package:stats", "package:base"]);
//!
//! let global = reg.global_env();
//! reg.put(global, "x", Value::Integer(1)).unwrap();
//! let (found_in, _) = reg.find_var(global, "sd").unwrap();
//! assert_eq!(reg.search_name(found_in), "package:stats");
//! ```
//!
//! # Thread Safety
//!
//! Wrap the registry with `new_shared_registry` to share it; one write guard
//! covers an entire attach or detach.

pub mod config;
pub mod environment;
pub mod error;
pub mod packages;
pub mod value;

pub use config::BootstrapConfig;
pub use environment::{
    new_shared_registry, package_qual_name, EnvId, EnvKind, EnvRegistry, FrameHost, FrameId,
    FrameIndex, PackageKind, SharedEnvRegistry,
};
pub use error::{ConfigError, DetachError, EnvError, LoadError, LookupError, Mutation};
pub use packages::{DirectoryLoader, MapLoader, PackageLoader, PackageSource};
pub use value::Value;
