//! Error types for environment, search path and package operations.
//!
//! Every error here is recoverable and handed back to the embedding evaluator.
//! Only bootstrap invariant violations panic.

use std::fmt;
use std::path::PathBuf;

/// The kind of binding mutation a locked environment rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Add,
    Remove,
}

/// Errors raised by binding and structural operations on environments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvError {
    /// The environment is locked: no new bindings, no removals.
    LockedEnvironment { env: String, op: Mutation },
    /// The key is binding-locked and cannot be reassigned.
    LockedBinding { key: String },
    /// The binding store shared by a package triple is sealed.
    LockedStore { key: String },
    /// The empty environment never holds bindings.
    EmptyEnvironment,
    /// Variables cannot be removed from `package:base`.
    BaseRemoval { key: String },
    /// The environment cannot be placed on the search path.
    NotAttachable { env: String, reason: &'static str },
    /// `attach` positions start at 2 (position 1 is always `.GlobalEnv`).
    InvalidAttachPosition(usize),
    /// Re-parenting a search path entry would cut `package:base` off the path.
    BrokenSearchPath { env: String },
    /// `lockBinding` on a key the environment does not bind.
    NoBinding { key: String },
    Detach(DetachError),
    Lookup(LookupError),
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvError::LockedEnvironment { env, op } => match op {
                Mutation::Add => {
                    write!(f, "cannot add bindings to a locked environment ({})", env)
                }
                Mutation::Remove => {
                    write!(f, "cannot remove bindings from a locked environment ({})", env)
                }
            },
            EnvError::LockedBinding { key } => {
                write!(f, "cannot change value of locked binding for '{}'", key)
            }
            EnvError::LockedStore { key } => {
                write!(f, "cannot add binding '{}': namespace bindings are sealed", key)
            }
            EnvError::EmptyEnvironment => {
                write!(f, "cannot assign values in the empty environment")
            }
            EnvError::BaseRemoval { key } => {
                write!(
                    f,
                    "cannot remove variables from the base environment ('{}')",
                    key
                )
            }
            EnvError::NotAttachable { env, reason } => {
                write!(f, "cannot attach {}: {}", env, reason)
            }
            EnvError::InvalidAttachPosition(pos) => {
                write!(f, "invalid 'pos' argument {}: must be at least 2", pos)
            }
            EnvError::BrokenSearchPath { env } => write!(
                f,
                "cannot set the parent of {}: the search list would no longer end with package:base",
                env
            ),
            EnvError::NoBinding { key } => write!(f, "no binding for \"{}\"", key),
            EnvError::Detach(e) => write!(f, "{}", e),
            EnvError::Lookup(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EnvError {}

impl From<DetachError> for EnvError {
    fn from(e: DetachError) -> Self {
        EnvError::Detach(e)
    }
}

impl From<LookupError> for EnvError {
    fn from(e: LookupError) -> Self {
        EnvError::Lookup(e)
    }
}

/// Illegal detach targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetachError {
    /// The last search path entry is always `package:base`.
    Base,
    /// Position 1 is `.GlobalEnv`.
    Global,
    OutOfRange { pos: usize, len: usize },
    /// Unloading a namespace other loaded namespaces import.
    RequiredBy {
        package: String,
        dependents: Vec<String>,
    },
}

impl fmt::Display for DetachError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetachError::Base => write!(f, "detaching \"package:base\" is not allowed"),
            DetachError::Global => write!(f, "detaching \".GlobalEnv\" is not allowed"),
            DetachError::OutOfRange { pos, len } => {
                write!(f, "subscript out of range (pos {} of {})", pos, len)
            }
            DetachError::RequiredBy {
                package,
                dependents,
            } => write!(
                f,
                "package '{}' is required by {} so will not be detached",
                package,
                dependents
                    .iter()
                    .map(|d| format!("'{}'", d))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

impl std::error::Error for DetachError {}

/// Search path lookups that found nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    NameNotFound(String),
    IndexOutOfRange { index: usize, len: usize },
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::NameNotFound(name) => {
                write!(f, "no item called \"{}\" on the search list", name)
            }
            LookupError::IndexOutOfRange { index, len } => {
                write!(f, "invalid 'pos' argument {} (search list has {} entries)", index, len)
            }
        }
    }
}

impl std::error::Error for LookupError {}

/// Errors that can occur while loading a package namespace.
#[derive(Debug, Clone)]
pub enum LoadError {
    /// No package with this name is known to the loader.
    NotFound(String),
    /// Package file could not be read.
    Io(PathBuf, String),
    /// Package file could not be parsed.
    Parse(PathBuf, String),
    /// Namespace imports form a cycle through this package.
    CircularImport(String),
    /// Seeding or attaching the new environments failed.
    Env(EnvError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotFound(name) => write!(f, "there is no package called '{}'", name),
            LoadError::Io(path, err) => {
                write!(f, "Failed to read '{}': {}", path.display(), err)
            }
            LoadError::Parse(path, err) => {
                write!(f, "Failed to parse '{}': {}", path.display(), err)
            }
            LoadError::CircularImport(name) => {
                write!(f, "cyclic namespace dependency detected when loading '{}'", name)
            }
            LoadError::Env(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<EnvError> for LoadError {
    fn from(e: EnvError) -> Self {
        LoadError::Env(e)
    }
}

/// Errors reading a bootstrap config file.
#[derive(Debug, Clone)]
pub enum ConfigError {
    Io(PathBuf, String),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(path, err) => {
                write!(f, "Failed to read config '{}': {}", path.display(), err)
            }
            ConfigError::Parse(err) => write!(f, "Invalid config: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}
