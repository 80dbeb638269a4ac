//! Registry of long-lived external handles.
//!
//! The session, the namespace and every cached folder handle are recorded
//! here when acquired and released together when the session closes.
//! Short-lived handles (messages, item collections) are released by the
//! operation that obtained them and never enter the registry.

use log::debug;

use crate::automation::{Automation, Handle};

/// What a registered handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Session,
    Namespace,
    Folder,
}

/// Live handles owned by one adapter instance.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    live: Vec<(HandleKind, Handle)>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a handle as owned by the session.
    pub fn track(&mut self, kind: HandleKind, handle: Handle) {
        debug!("tracking {kind:?} handle {handle}");
        self.live.push((kind, handle));
    }

    /// Number of live handles of a kind.
    pub fn count(&self, kind: HandleKind) -> usize {
        self.live.iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Release every handle, most recently acquired first, so folders go
    /// before the namespace and the namespace before the session.
    pub fn release_all<A: Automation + ?Sized>(&mut self, automation: &mut A) -> usize {
        let released = self.live.len();
        while let Some((kind, handle)) = self.live.pop() {
            debug!("releasing {kind:?} handle {handle}");
            automation.release(handle);
        }
        released
    }
}
