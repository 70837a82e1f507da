//! Package sources
//!
//! - `PackageLoader` - trait consulted by `load_namespace` and `library`
//! - `PackageSource` - path, seed bindings, imports and version of one package
//! - `MapLoader` / `DirectoryLoader` - in-memory and on-disk loaders

mod loader;

pub use loader::{DirectoryLoader, MapLoader, PackageLoader, PackageSource};
