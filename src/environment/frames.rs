//! Frame-enclosure index.
//!
//! The evaluator resolves unquoted variables through call frames, each of
//! which records its enclosing frame. That chain must mirror the environment
//! parent chain. The registry treats its environment graph as authoritative and
//! re-derives frame enclosures from it whenever a parent pointer changes, so
//! the two never diverge.
//!
//! `FrameHost` is the seam to the host's frame machinery; `FrameIndex` is the
//! in-memory implementation used when no host is plugged in.

use std::fmt;

use super::EnvId;

/// Handle to a call frame owned by the frame host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameId(pub u32);

impl FrameId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}

/// Host-side frame operations the registry needs.
pub trait FrameHost: Send + Sync {
    /// Allocate a fresh frame with no enclosure and no environment.
    fn new_frame(&mut self) -> FrameId;

    /// Point `frame`'s enclosing-frame slot at `enclosing`.
    fn set_enclosing_frame(&mut self, frame: FrameId, enclosing: Option<FrameId>);

    fn enclosing_frame(&self, frame: FrameId) -> Option<FrameId>;

    /// Record which environment `frame` materializes.
    fn set_environment(&mut self, frame: FrameId, env: EnvId);

    fn environment_of(&self, frame: FrameId) -> Option<EnvId>;

    /// Drop a frame that no environment may use again.
    fn release_frame(&mut self, frame: FrameId);
}

#[derive(Debug, Clone, Default)]
struct FrameSlot {
    enclosing: Option<FrameId>,
    env: Option<EnvId>,
    released: bool,
}

/// In-memory frame table.
#[derive(Debug, Default)]
pub struct FrameIndex {
    slots: Vec<FrameSlot>,
}

impl FrameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames allocated, released ones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_released(&self, frame: FrameId) -> bool {
        self.slots.get(frame.index()).map_or(true, |s| s.released)
    }

    fn slot_mut(&mut self, frame: FrameId) -> Option<&mut FrameSlot> {
        self.slots
            .get_mut(frame.index())
            .filter(|slot| !slot.released)
    }
}

impl FrameHost for FrameIndex {
    fn new_frame(&mut self) -> FrameId {
        let id = FrameId(self.slots.len() as u32);
        self.slots.push(FrameSlot::default());
        id
    }

    fn set_enclosing_frame(&mut self, frame: FrameId, enclosing: Option<FrameId>) {
        if let Some(slot) = self.slot_mut(frame) {
            slot.enclosing = enclosing;
        }
    }

    fn enclosing_frame(&self, frame: FrameId) -> Option<FrameId> {
        self.slots
            .get(frame.index())
            .filter(|slot| !slot.released)
            .and_then(|slot| slot.enclosing)
    }

    fn set_environment(&mut self, frame: FrameId, env: EnvId) {
        if let Some(slot) = self.slot_mut(frame) {
            slot.env = Some(env);
        }
    }

    fn environment_of(&self, frame: FrameId) -> Option<EnvId> {
        self.slots
            .get(frame.index())
            .filter(|slot| !slot.released)
            .and_then(|slot| slot.env)
    }

    fn release_frame(&mut self, frame: FrameId) {
        if let Some(slot) = self.slots.get_mut(frame.index()) {
            *slot = FrameSlot {
                released: true,
                ..FrameSlot::default()
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_frames_are_unlinked() {
        let mut index = FrameIndex::new();
        let a = index.new_frame();
        let b = index.new_frame();
        assert_ne!(a, b);
        assert_eq!(index.len(), 2);
        assert_eq!(index.enclosing_frame(a), None);
        assert_eq!(index.environment_of(b), None);
    }

    #[test]
    fn test_enclosure_and_back_reference() {
        let mut index = FrameIndex::new();
        let outer = index.new_frame();
        let inner = index.new_frame();

        index.set_enclosing_frame(inner, Some(outer));
        index.set_environment(inner, EnvId(7));

        assert_eq!(index.enclosing_frame(inner), Some(outer));
        assert_eq!(index.environment_of(inner), Some(EnvId(7)));
    }

    #[test]
    fn test_released_frames_ignore_updates() {
        let mut index = FrameIndex::new();
        let outer = index.new_frame();
        let inner = index.new_frame();
        index.set_enclosing_frame(inner, Some(outer));

        index.release_frame(inner);
        assert!(index.is_released(inner));
        assert_eq!(index.enclosing_frame(inner), None);

        index.set_enclosing_frame(inner, Some(outer));
        assert_eq!(index.enclosing_frame(inner), None);
        assert!(!index.is_released(outer));
    }
}
