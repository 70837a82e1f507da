//! Search path operations for EnvRegistry.
//!
//! The search path is the ordered list of environments visible to top-level
//! name resolution. It always starts with Global, always ends with
//! `package:base`, and is always exactly the parent chain of Global:
//! `path[i + 1] == parent(path[i])`.
//!
//! `attach` and `detach` splice an environment into or out of both views at
//! once and re-derive the frame enclosures they touch in the same step.
//!
//! Positions in the public API are 1-based, as `search()` prints them.
//! `attach` clamps positions past the end; `detach` rejects them.

use regex::Regex;
use tracing::debug;

use super::{EnvId, EnvKind, EnvRegistry};
use crate::error::{DetachError, EnvError, LookupError};

impl EnvRegistry {
    /// Environments on the search path, Global first.
    pub fn search_path(&self) -> &[EnvId] {
        &self.search_path
    }

    /// `search()`: the search names in order.
    pub fn search(&self) -> Vec<String> {
        self.search_path
            .iter()
            .map(|&env| self.search_name(env).to_string())
            .collect()
    }

    /// 1-based `(position, name)` pairs whose search name matches `pattern`.
    pub fn search_matching(&self, pattern: &Regex) -> Vec<(usize, String)> {
        self.search_path
            .iter()
            .enumerate()
            .map(|(i, &env)| (i + 1, self.search_name(env)))
            .filter(|(_, name)| pattern.is_match(name))
            .map(|(i, name)| (i, name.to_string()))
            .collect()
    }

    /// 1-based position of the entry whose search name is `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.search_path
            .iter()
            .position(|&env| self.search_name(env) == name)
            .map(|i| i + 1)
    }

    /// Like [`position`](Self::position), for call sites that treat a miss
    /// as a hard failure.
    pub fn lookup_by_name(&self, name: &str) -> Result<usize, LookupError> {
        self.position(name)
            .ok_or_else(|| LookupError::NameNotFound(name.to_string()))
    }

    /// Environment at 1-based `index` (`pos.to.env`).
    pub fn lookup_env(&self, index: usize) -> Result<EnvId, LookupError> {
        let len = self.search_path.len();
        if index == 0 || index > len {
            return Err(LookupError::IndexOutOfRange { index, len });
        }
        Ok(self.search_path[index - 1])
    }

    /// Environment whose search name is `name`, if attached.
    pub fn env_on_search_path(&self, name: &str) -> Option<EnvId> {
        self.position(name).map(|i| self.search_path[i - 1])
    }

    pub fn is_attached(&self, env: EnvId) -> bool {
        self.search_path.contains(&env)
    }

    /// Insert `env` at 1-based position `pos` (`pos >= 2`).
    ///
    /// Positions past the last non-base entry are clamped to just above
    /// `package:base`. Returns the position actually used.
    pub fn attach(&mut self, pos: usize, env: EnvId) -> Result<usize, EnvError> {
        assert!(
            self.search_path.len() >= 2,
            "attach before the search path was bootstrapped"
        );
        if pos < 2 {
            return Err(EnvError::InvalidAttachPosition(pos));
        }
        let reason = match self.kind(env) {
            EnvKind::Empty => Some("the empty environment cannot be attached"),
            EnvKind::Global => Some("the global environment is always first"),
            EnvKind::Base { .. } => Some("package:base is always last"),
            _ if self.is_attached(env) => Some("already on the search path"),
            _ => None,
        };
        if let Some(reason) = reason {
            return Err(EnvError::NotAttachable {
                env: self.print_name(env),
                reason,
            });
        }

        let bpos = (pos - 1).min(self.search_path.len() - 1);
        let above = self.search_path[bpos - 1];
        let below = self.search_path[bpos];

        self.link_parent(env, Some(below));
        self.link_parent(above, Some(env));
        self.search_path.insert(bpos, env);

        // map-backed environments get a frame for as long as they are attached
        if self.node(env).frame.is_none() {
            self.materialize_frame(env);
        }
        self.relink_frames_through(env);
        self.relink_frame(above);

        debug!(
            target: "envchain::search",
            name = self.search_name(env),
            requested = pos,
            pos = bpos + 1,
            "attach"
        );
        Ok(bpos + 1)
    }

    /// Remove the entry at 1-based position `pos` and return it.
    ///
    /// With `unload`, a detached package also has its namespace unloaded,
    /// which is refused while other loaded namespaces import it unless
    /// `force`. Nothing changes when an error is returned.
    pub fn detach(&mut self, pos: usize, unload: bool, force: bool) -> Result<EnvId, DetachError> {
        let len = self.search_path.len();
        if pos == len {
            return Err(DetachError::Base);
        }
        if pos == 0 || pos > len {
            return Err(DetachError::OutOfRange { pos, len });
        }
        if pos == 1 {
            return Err(DetachError::Global);
        }

        let bpos = pos - 1;
        let removed = self.search_path[bpos];
        let unload_name = if unload {
            self.namespace_name_of(removed)
        } else {
            None
        };
        if let Some(name) = &unload_name {
            let dependents = self.namespace_dependents(name);
            if !dependents.is_empty() && !force {
                return Err(DetachError::RequiredBy {
                    package: name.clone(),
                    dependents,
                });
            }
        }

        let above = self.search_path[bpos - 1];
        let below = self.node(removed).parent;
        self.link_parent(above, below);
        self.search_path.remove(bpos);

        if self.kind(removed) == EnvKind::Anonymous {
            self.sever_frame(removed);
        }
        self.relink_frame(above);

        if let Some(name) = &unload_name {
            self.unregister_namespace(name);
        }

        debug!(
            target: "envchain::search",
            name = self.search_name(removed),
            pos,
            unload,
            force,
            "detach"
        );
        Ok(removed)
    }

    /// Release the frame of a detached map-backed environment so a later
    /// attach starts from a fresh one.
    fn sever_frame(&mut self, env: EnvId) {
        if let Some(frame) = self.node_mut(env).frame.take() {
            self.frames.release_frame(frame);
            self.relink_frames_through(env);
        }
    }

    /// Rebuild the search path from Global's parent chain.
    pub(crate) fn rebuild_search_path(&mut self) {
        self.search_path = self
            .ancestors(self.global)
            .take_while(|&env| env != self.empty)
            .collect();
    }

    /// Whether the chain from `start` reaches `package:base` before `avoid`.
    pub(crate) fn reaches_base_avoiding(&self, start: EnvId, avoid: EnvId) -> bool {
        self.ancestors(start)
            .take_while(|&env| env != avoid)
            .any(|env| env == self.base)
    }

    /// Rebuild the path after a parent pointer on it changed outside
    /// attach/detach. Newly reachable entries get a frame as `attach` would
    /// give them; map-backed entries that fell off lose theirs as on `detach`.
    pub(crate) fn resync_search_path(&mut self) {
        let previous = std::mem::take(&mut self.search_path);
        self.rebuild_search_path();

        let joined: Vec<EnvId> = self
            .search_path
            .iter()
            .copied()
            .filter(|env| !previous.contains(env))
            .collect();
        let left: Vec<EnvId> = previous
            .into_iter()
            .filter(|env| !self.search_path.contains(env))
            .collect();

        for &env in &joined {
            if self.node(env).frame.is_none() {
                self.materialize_frame(env);
                self.relink_frames_through(env);
            }
        }
        for &env in &left {
            if self.kind(env) == EnvKind::Anonymous {
                self.sever_frame(env);
            }
        }

        debug!(
            target: "envchain::search",
            joined = joined.len(),
            left = left.len(),
            search = ?self.search(),
            "search path rebuilt"
        );
    }

    /// Check the structural invariants of the graph.
    ///
    /// - the path starts at Global, ends at `package:base` and follows parents
    /// - every parent chain terminates at the empty environment
    /// - the child index agrees with the parent pointers
    /// - every live frame encloses the nearest frame of its parent chain
    pub fn verify_invariants(&self) -> Result<(), String> {
        let path = &self.search_path;
        if path.first() != Some(&self.global) {
            return Err("search path does not start with the global environment".to_string());
        }
        match path.last() {
            Some(&last) if last == self.base && self.search_name(last) == super::BASE_SEARCH_NAME => {}
            _ => return Err("search path does not end with package:base".to_string()),
        }
        for pair in path.windows(2) {
            if self.parent(pair[0]) != Some(pair[1]) {
                return Err(format!(
                    "parent of {} is not the next search path entry {}",
                    self.search_name(pair[0]),
                    self.search_name(pair[1])
                ));
            }
        }
        if self.parent(self.base) != Some(self.empty) {
            return Err("package:base is not enclosed by the empty environment".to_string());
        }

        for index in 0..self.envs.len() {
            let env = EnvId(index as u32);
            if let Some(parent) = self.parent(env) {
                let listed = self.node(parent).children.iter().filter(|&&c| c == env).count();
                if listed != 1 {
                    return Err(format!(
                        "{} is listed {} times among the children of its parent",
                        self.print_name(env),
                        listed
                    ));
                }
            }
            if let Some(&stray) = self
                .node(env)
                .children
                .iter()
                .find(|&&child| self.parent(child) != Some(env))
            {
                return Err(format!(
                    "child index of {} lists {}, whose parent is elsewhere",
                    self.print_name(env),
                    self.print_name(stray)
                ));
            }
            if !self.terminates(env) {
                return Err(format!(
                    "parent chain of {} does not reach the empty environment",
                    self.print_name(env)
                ));
            }
            if let Some(frame) = self.node(env).frame {
                let expected = self.nearest_frame(self.node(env).parent);
                let actual = self.frames.enclosing_frame(frame);
                if actual != expected {
                    return Err(format!(
                        "frame of {} encloses {:?}, parent chain says {:?}",
                        self.print_name(env),
                        actual,
                        expected
                    ));
                }
            }
        }
        Ok(())
    }
}
