//! Folder resolution and the folder-handle cache.
//!
//! Folders are looked up by display name. The inbox is reached directly
//! through the namespace; every other folder is found among the siblings
//! of the inbox (the children of the store root) and cached by name. Cache
//! entries live until the session closes. A folder renamed or deleted
//! behind our back surfaces as an error on the next use of its handle.

use std::collections::HashMap;

use log::debug;

use crate::automation::{Automation, Handle, Property, Variant};
use crate::error::{Error, Result};
use crate::guard::{Guarded, optional};
use crate::registry::{HandleKind, HandleRegistry};
use crate::types::FolderSummary;

/// Display name of the default inbox folder.
pub const INBOX: &str = "Inbox";

/// Whether a requested name designates the default inbox.
pub fn is_inbox(name: &str) -> bool {
    name.is_empty() || name.eq_ignore_ascii_case(INBOX)
}

/// Name to folder-handle index for one session.
#[derive(Debug, Default)]
pub struct FolderCache {
    entries: HashMap<String, Handle>,
}

impl FolderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached handle for a name, if any.
    pub fn get(&self, name: &str) -> Option<Handle> {
        self.entries.get(cache_key(name)).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every entry. The handles themselves are owned by the
    /// registry and released there.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Handle for the folder called `name`, resolving and caching it on a
    /// miss.
    ///
    /// Any casing of `Inbox`, and the empty name, mean the default inbox.
    /// A sibling folder whose name differs from `Inbox` only by case can
    /// therefore not be reached through this lookup.
    pub fn resolve<A: Automation + ?Sized>(
        &mut self,
        automation: &mut A,
        namespace: Handle,
        registry: &mut HandleRegistry,
        op: &'static str,
        name: &str,
    ) -> Result<Handle> {
        if let Some(handle) = self.get(name) {
            debug!("folder cache hit for '{name}'");
            return Ok(handle);
        }

        let inbox = self.inbox(automation, namespace, registry, op)?;
        if is_inbox(name) {
            return Ok(inbox);
        }

        let handle = find_sibling(automation, inbox, op, name)?;
        debug!("resolved folder '{name}' to {handle}");
        registry.track(HandleKind::Folder, handle);
        self.entries.insert(name.to_string(), handle);
        Ok(handle)
    }

    /// Name, total and unread counts of every folder beside the inbox,
    /// the inbox included.
    pub fn summaries<A: Automation + ?Sized>(
        &mut self,
        automation: &mut A,
        namespace: Handle,
        registry: &mut HandleRegistry,
        op: &'static str,
    ) -> Result<Vec<FolderSummary>> {
        let inbox = self.inbox(automation, namespace, registry, op)?;
        let children = siblings(automation, inbox, op, INBOX)?;

        let mut summaries = Vec::with_capacity(children.len());
        let mut failure = None;
        for child in children {
            if failure.is_none() {
                match read_summary(automation, child, op) {
                    Ok(summary) => summaries.push(summary),
                    Err(err) => failure = Some(err),
                }
            }
            automation.release(child);
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(summaries),
        }
    }

    fn inbox<A: Automation + ?Sized>(
        &mut self,
        automation: &mut A,
        namespace: Handle,
        registry: &mut HandleRegistry,
        op: &'static str,
    ) -> Result<Handle> {
        if let Some(handle) = self.entries.get(INBOX) {
            return Ok(*handle);
        }
        let handle = automation.inbox(namespace).guard(op, INBOX)?;
        registry.track(HandleKind::Folder, handle);
        self.entries.insert(INBOX.to_string(), handle);
        Ok(handle)
    }
}

fn cache_key(name: &str) -> &str {
    if is_inbox(name) { INBOX } else { name }
}

/// Child folders of the inbox's parent. The caller releases them.
fn siblings<A: Automation + ?Sized>(
    automation: &mut A,
    inbox: Handle,
    op: &'static str,
    target: &str,
) -> Result<Vec<Handle>> {
    let root = automation.parent(inbox).guard(op, target)?;
    let children = automation.subfolders(root).guard(op, target);
    automation.release(root);
    children
}

fn find_sibling<A: Automation + ?Sized>(
    automation: &mut A,
    inbox: Handle,
    op: &'static str,
    name: &str,
) -> Result<Handle> {
    let children = siblings(automation, inbox, op, name)?;

    let mut found = None;
    let mut failure = None;
    for child in children {
        if found.is_none() && failure.is_none() {
            match automation.get(child, Property::Name).guard(op, name) {
                Ok(Variant::Text(text)) if text == name => {
                    found = Some(child);
                    continue;
                }
                Ok(_) => {}
                Err(err) => failure = Some(err),
            }
        }
        automation.release(child);
    }

    if let Some(err) = failure {
        return Err(err);
    }
    found.ok_or_else(|| Error::FolderNotFound {
        op,
        target: name.to_string(),
        name: name.to_string(),
    })
}

fn read_summary<A: Automation + ?Sized>(
    automation: &mut A,
    folder: Handle,
    op: &'static str,
) -> Result<FolderSummary> {
    let name = automation
        .get(folder, Property::Name)
        .guard(op, "folder")?
        .into_text()
        .unwrap_or_default();
    let total = optional(automation.get(folder, Property::ItemCount), op, &name)?
        .as_int()
        .unwrap_or(0);
    let unread = optional(automation.get(folder, Property::UnreadCount), op, &name)?
        .as_int()
        .unwrap_or(0);
    Ok(FolderSummary {
        name,
        total: usize::try_from(total).unwrap_or(0),
        unread: usize::try_from(unread).unwrap_or(0),
    })
}
