//! Environment graph for the runtime.
//!
//! An environment is a binding store plus a pointer to its enclosing (parent)
//! environment. All environments of a process live in one `EnvRegistry`,
//! addressed by `EnvId` handles, together with the search path and the
//! frame-enclosure index that mirrors the parent chain.
//!
//! # Architecture
//!
//! - `EnvRegistry` - arena of environments and stores, search path, namespaces
//! - `EnvKind` - tagged kind of each environment (empty, base, global, ...)
//! - `BindingStore` - per-environment map with binding locks and a seal
//! - `FrameHost` / `FrameIndex` - frame enclosure kept in step with parents
//!
//! Behaviour is split across `impl EnvRegistry` blocks by concern:
//! `binding_ops` (get/put/remove/lock), `naming` (names and attributes),
//! `kinds` (constructors), `search_path` (attach/detach/lookup),
//! `namespace_ops` (package loading) and `bootstrap`.
//!
//! # Thread Safety
//!
//! `EnvRegistry` itself is plain data. Share it as `SharedEnvRegistry`; one
//! write guard covers every pointer an operation touches, so readers never see
//! a half-spliced search path.

mod binding_ops;
mod bindings;
mod bootstrap;
mod frames;
mod kinds;
mod namespace_ops;
mod naming;
mod search_path;

pub use bindings::{is_hidden, remove_hidden_names, BindingStore, HIDDEN_PREFIX};
pub use frames::{FrameHost, FrameId, FrameIndex};
pub use kinds::{package_qual_name, PackageKind};
pub use naming::{
    AUTOLOAD_NAME, BASE_NAME, BASE_SEARCH_NAME, EMPTY_ENV_NAME, GLOBAL_ENV_NAME,
    GLOBAL_SEARCH_NAME, NAME_ATTR, PATH_ATTR, UNNAMED,
};

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::config::BootstrapConfig;
use crate::error::EnvError;
use crate::value::Value;

/// Base of the synthetic addresses printed for unnamed environments.
const ADDRESS_BASE: u64 = 0x5580_0000;

/// Handle to an environment in an `EnvRegistry`.
///
/// Handles are only meaningful for the registry that issued them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvId(pub(crate) u32);

impl EnvId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Stable opaque identity used when printing unnamed environments.
    pub fn address(self) -> u64 {
        ADDRESS_BASE + (self.0 as u64) * 0x38
    }
}

impl fmt::Display for EnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnvId({})", self.0)
    }
}

/// Handle to a binding store. Package triples share one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StoreId(pub(crate) u32);

impl StoreId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The kind of an environment, fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvKind {
    /// Terminal environment; every parent chain ends here.
    Empty,
    /// `package:base`; its namespace's parent is Global.
    Base { namespace: EnvId },
    /// The user workspace, `.GlobalEnv`.
    Global,
    /// Placeholder for the autoload mechanism.
    Autoload,
    /// `package:xxx`, created together with its imports and namespace.
    Package { imports: EnvId, namespace: EnvId },
    Imports,
    Namespace,
    /// Call-frame environment.
    Function,
    /// Lexical scope of a function while it is being defined; never framed.
    FunctionDefinition,
    /// Created explicitly by the user (`new.env`); map-backed.
    Anonymous,
}

impl EnvKind {
    /// Base and ordinary packages.
    pub fn is_package(&self) -> bool {
        matches!(self, EnvKind::Base { .. } | EnvKind::Package { .. })
    }

    pub fn namespace(&self) -> Option<EnvId> {
        match self {
            EnvKind::Base { namespace } | EnvKind::Package { namespace, .. } => Some(*namespace),
            _ => None,
        }
    }
}

/// Insertion-ordered attributes. Most environments carry at most two.
pub type Attributes = SmallVec<[(String, Value); 2]>;

#[derive(Debug, Clone)]
pub(crate) struct EnvNode {
    pub(crate) kind: EnvKind,
    /// `None` only for the empty environment
    pub(crate) parent: Option<EnvId>,
    /// Constructor-assigned simple name; `""` means unnamed
    pub(crate) name: String,
    pub(crate) store: StoreId,
    pub(crate) attributes: Option<Attributes>,
    pub(crate) locked: bool,
    pub(crate) frame: Option<FrameId>,
    /// Environments whose parent is this one
    pub(crate) children: Vec<EnvId>,
}

/// A namespace known to the registry, attached or not.
#[derive(Debug, Clone)]
pub(crate) struct LoadedNamespace {
    pub(crate) package: EnvId,
    pub(crate) imports: Vec<String>,
    pub(crate) version: Option<semver::Version>,
}

/// Process-wide environment context.
///
/// Created once by [`EnvRegistry::bootstrap`]; holds the four singleton
/// environments (empty, base, global, autoload), the search path and every
/// environment created afterwards.
pub struct EnvRegistry {
    envs: Vec<EnvNode>,
    stores: Vec<BindingStore>,

    /// Search path, Global first and Base last
    search_path: Vec<EnvId>,

    empty: EnvId,
    base: EnvId,
    global: EnvId,
    autoload: EnvId,

    /// Path entries below Global right after bootstrap, for `reset_for_test`
    bootstrap_chain: Vec<EnvId>,
    /// Namespaces registered right after bootstrap, for `reset_for_test`
    bootstrap_namespaces: HashSet<String>,

    /// Loaded namespaces by package name
    namespaces: HashMap<String, LoadedNamespace>,

    /// Namespaces currently being loaded (cycle detection)
    loading: HashSet<String>,

    options: BootstrapConfig,

    frames: Box<dyn FrameHost>,
}

impl EnvRegistry {
    // ============================================================
    // Arena
    // ============================================================

    pub(crate) fn node(&self, env: EnvId) -> &EnvNode {
        &self.envs[env.index()]
    }

    pub(crate) fn node_mut(&mut self, env: EnvId) -> &mut EnvNode {
        &mut self.envs[env.index()]
    }

    pub(crate) fn store(&self, env: EnvId) -> &BindingStore {
        &self.stores[self.node(env).store.index()]
    }

    pub(crate) fn store_mut(&mut self, env: EnvId) -> &mut BindingStore {
        let store = self.node(env).store;
        &mut self.stores[store.index()]
    }

    pub(crate) fn alloc_store(&mut self, store: BindingStore) -> StoreId {
        let id = StoreId(arena_index(self.stores.len(), "store"));
        self.stores.push(store);
        id
    }

    pub(crate) fn alloc_env(
        &mut self,
        kind: EnvKind,
        parent: Option<EnvId>,
        name: &str,
        store: StoreId,
    ) -> EnvId {
        let id = EnvId(arena_index(self.envs.len(), "environment"));
        self.envs.push(EnvNode {
            kind,
            parent,
            name: name.to_string(),
            store,
            attributes: None,
            locked: false,
            frame: None,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.node_mut(parent).children.push(id);
        }
        id
    }

    /// Point `env` at `parent`, keeping the child index in step.
    pub(crate) fn link_parent(&mut self, env: EnvId, parent: Option<EnvId>) {
        if let Some(old) = self.node(env).parent {
            self.node_mut(old).children.retain(|&c| c != env);
        }
        if let Some(new) = parent {
            self.node_mut(new).children.push(env);
        }
        self.node_mut(env).parent = parent;
    }

    /// Number of environments ever created in this registry.
    pub fn env_count(&self) -> usize {
        self.envs.len()
    }

    pub fn store_id(&self, env: EnvId) -> StoreId {
        self.node(env).store
    }

    /// Whether two environments are views of one binding store.
    pub fn shares_store(&self, a: EnvId, b: EnvId) -> bool {
        self.node(a).store == self.node(b).store
    }

    // ============================================================
    // Singletons
    // ============================================================

    /// `emptyenv()`
    pub fn empty_env(&self) -> EnvId {
        self.empty
    }

    /// `globalenv()`
    pub fn global_env(&self) -> EnvId {
        self.global
    }

    /// `baseenv()`, i.e. `package:base`
    pub fn base_env(&self) -> EnvId {
        self.base
    }

    /// `.BaseNamespaceEnv`
    pub fn base_namespace_env(&self) -> EnvId {
        match self.node(self.base).kind {
            EnvKind::Base { namespace } => namespace,
            other => unreachable!("base environment has kind {:?}", other),
        }
    }

    /// `.AutoloadEnv`
    pub fn autoload_env(&self) -> EnvId {
        self.autoload
    }

    pub fn options(&self) -> &BootstrapConfig {
        &self.options
    }

    // ============================================================
    // Kind and parent chain
    // ============================================================

    pub fn kind(&self, env: EnvId) -> EnvKind {
        self.node(env).kind
    }

    /// `parent.env(env)`. `None` only for the empty environment.
    pub fn parent(&self, env: EnvId) -> Option<EnvId> {
        self.node(env).parent
    }

    /// `parent.env(env) <- parent`.
    ///
    /// Cycles are not checked for detached environments; `ancestors` stays
    /// bounded regardless. Re-parenting a search path entry rebuilds the path
    /// from Global's new chain, which must still reach `package:base`
    /// without passing through `env`. The frame enclosure of `env` (and of
    /// frames that enclosed through it) is re-derived in the same step.
    pub fn set_parent(&mut self, env: EnvId, parent: EnvId) -> Result<(), EnvError> {
        if env == self.empty {
            return Err(EnvError::EmptyEnvironment);
        }
        let attached = self.is_attached(env);
        if attached && !self.reaches_base_avoiding(parent, env) {
            return Err(EnvError::BrokenSearchPath {
                env: self.print_name(env),
            });
        }
        self.link_parent(env, Some(parent));
        if attached {
            self.resync_search_path();
        }
        self.relink_frames_through(env);
        Ok(())
    }

    /// Walk the parent chain starting at `env` itself.
    ///
    /// The walk is capped at the number of environments in the registry, so a
    /// caller-made cycle ends the iteration instead of looping.
    pub fn ancestors(&self, env: EnvId) -> Ancestors<'_> {
        Ancestors {
            registry: self,
            next: Some(env),
            remaining: self.envs.len(),
        }
    }

    /// Whether `env`'s parent chain reaches the empty environment.
    pub fn terminates(&self, env: EnvId) -> bool {
        self.ancestors(env).any(|e| e == self.empty)
    }

    // ============================================================
    // Frame enclosure
    // ============================================================

    pub fn frame_of(&self, env: EnvId) -> Option<FrameId> {
        self.node(env).frame
    }

    pub fn frames(&self) -> &dyn FrameHost {
        self.frames.as_ref()
    }

    /// Frame of the nearest environment at or above `start` that has one.
    pub(crate) fn nearest_frame(&self, start: Option<EnvId>) -> Option<FrameId> {
        start.and_then(|s| self.ancestors(s).find_map(|e| self.node(e).frame))
    }

    /// Re-derive `env`'s frame enclosure from its parent chain.
    pub(crate) fn relink_frame(&mut self, env: EnvId) {
        if let Some(frame) = self.node(env).frame {
            let enclosing = self.nearest_frame(self.node(env).parent);
            self.frames.set_enclosing_frame(frame, enclosing);
        }
    }

    /// Re-derive the enclosure of `env` and of every framed environment whose
    /// nearest framed ancestor is reached through `env`.
    ///
    /// Walks the child index down from `env`, stopping at the first framed
    /// environment on each branch.
    pub(crate) fn relink_frames_through(&mut self, env: EnvId) {
        self.relink_frame(env);
        let mut dependents = Vec::new();
        let mut pending = self.node(env).children.clone();
        let mut seen = HashSet::new();
        while let Some(child) = pending.pop() {
            if child == env || !seen.insert(child) {
                continue;
            }
            let node = self.node(child);
            if node.frame.is_some() {
                dependents.push(child);
            } else {
                pending.extend(node.children.iter().copied());
            }
        }
        for e in dependents {
            self.relink_frame(e);
        }
    }

    /// Allocate a frame for `env` and link it into the enclosure chain.
    pub(crate) fn materialize_frame(&mut self, env: EnvId) -> FrameId {
        let frame = self.frames.new_frame();
        self.adopt_frame(env, frame);
        frame
    }

    /// Bind an existing host frame to `env`.
    pub(crate) fn adopt_frame(&mut self, env: EnvId, frame: FrameId) {
        self.frames.set_environment(frame, env);
        self.node_mut(env).frame = Some(frame);
        self.relink_frame(env);
    }
}

impl fmt::Debug for EnvRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvRegistry")
            .field("env_count", &self.envs.len())
            .field("store_count", &self.stores.len())
            .field("search_path", &self.search())
            .field("namespaces", &self.namespaces.len())
            .finish()
    }
}

/// Iterator over an environment and its parents, see [`EnvRegistry::ancestors`].
pub struct Ancestors<'a> {
    registry: &'a EnvRegistry,
    next: Option<EnvId>,
    remaining: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = EnvId;

    fn next(&mut self) -> Option<EnvId> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next?;
        self.remaining -= 1;
        self.next = self.registry.node(current).parent;
        Some(current)
    }
}

/// Next handle for an arena holding `len` entries.
fn arena_index(len: usize, arena: &str) -> u32 {
    match u32::try_from(len) {
        Ok(index) => index,
        Err(_) => panic!("{} arena exhausted at {} entries", arena, len),
    }
}

/// Thread-safe wrapper for EnvRegistry.
pub type SharedEnvRegistry = Arc<RwLock<EnvRegistry>>;

/// Wrap a bootstrapped registry for sharing across threads.
pub fn new_shared_registry(registry: EnvRegistry) -> SharedEnvRegistry {
    Arc::new(RwLock::new(registry))
}
