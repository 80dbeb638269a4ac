//! In-process mail application implementing [`Automation`].
//!
//! Behaves like the desktop application's object model as far as the
//! adapter can observe: handles must be released, property writes are staged
//! until `save`, calls fail on threads without protocol context, deleted
//! folders leave stale handles behind, and any call site can be made to
//! fault once. The CLI uses it as its store, backed by a JSON [`Mailbox`]
//! document.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Automation, Fault, FaultKind, Handle, Property, Sort, ThreadInit, Variant};
use crate::error::{Error, Result};

const ROOT: usize = 0;
const ROOT_NAME: &str = "Mailbox";
const INBOX_NAME: &str = "Inbox";
const CO_E_NOTINITIALIZED: u32 = 0x8004_01F0;
const CO_E_SERVER_EXEC_FAILURE: u32 = 0x8008_0005;

/// Mailbox document: the folders directly under the store root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mailbox {
    #[serde(default)]
    pub folders: Vec<StoredFolder>,
}

/// A folder and the messages it holds, in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFolder {
    pub name: String,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

/// Message as held by the store. `None` fields are absent on the object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredMessage {
    pub entry_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread: Option<bool>,
    pub attachments: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<String>,
}

impl Mailbox {
    /// Read a mailbox document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write the mailbox document, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Path(format!("creating mailbox directory {parent:?}: {e}")))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Kind of object a live handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Application,
    Namespace,
    Folder,
    Items,
    Message,
}

/// Call sites that can be made to fault with [`MemoryAutomation::fail_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    ThreadInit,
    Connect,
    Inbox,
    Subfolders,
    Items,
    ItemById,
    Get,
    Set,
    Save,
    Move,
}

#[derive(Debug)]
struct FolderState {
    name: String,
    parent: Option<usize>,
    deleted: bool,
}

#[derive(Debug)]
struct MessageState {
    folder: usize,
    seq: u64,
    data: StoredMessage,
}

#[derive(Debug)]
enum Object {
    Application,
    Namespace,
    Folder(usize),
    Items(Vec<String>),
    Message {
        id: String,
        pending: Vec<(Property, Variant)>,
    },
}

impl Object {
    fn kind(&self) -> ObjectKind {
        match self {
            Object::Application => ObjectKind::Application,
            Object::Namespace => ObjectKind::Namespace,
            Object::Folder(_) => ObjectKind::Folder,
            Object::Items(_) => ObjectKind::Items,
            Object::Message { .. } => ObjectKind::Message,
        }
    }
}

#[derive(Debug)]
struct World {
    online: bool,
    foreign_thread_mode: bool,
    threads: HashSet<ThreadId>,
    folders: Vec<FolderState>,
    inbox: usize,
    messages: Vec<MessageState>,
    objects: HashMap<u64, Object>,
    next_handle: u64,
    next_seq: u64,
    faults: Vec<(FaultPoint, FaultKind)>,
    connects: usize,
    context_requests: usize,
}

/// Shared, cloneable in-process mail application.
///
/// Clones observe the same state, so a test can hand one clone to the
/// adapter and inspect the store through another.
#[derive(Debug, Clone)]
pub struct MemoryAutomation {
    world: Arc<Mutex<World>>,
}

impl Default for MemoryAutomation {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAutomation {
    /// Empty store containing only the inbox.
    pub fn new() -> Self {
        Self::from_mailbox(Mailbox::default())
    }

    /// Build a store from a mailbox document. An inbox is created if the
    /// document has none; messages without an identity get one assigned.
    pub fn from_mailbox(mailbox: Mailbox) -> Self {
        let mut world = World {
            online: true,
            foreign_thread_mode: false,
            threads: HashSet::new(),
            folders: vec![FolderState {
                name: ROOT_NAME.to_string(),
                parent: None,
                deleted: false,
            }],
            inbox: ROOT,
            messages: Vec::new(),
            objects: HashMap::new(),
            next_handle: 1,
            next_seq: 0,
            faults: Vec::new(),
            connects: 0,
            context_requests: 0,
        };

        for folder in mailbox.folders {
            let index = world.add_folder(&folder.name);
            for message in folder.messages {
                world.add_message(index, message);
            }
        }
        world.inbox = match world.find_folder(INBOX_NAME) {
            Some(index) => index,
            None => world.add_folder(INBOX_NAME),
        };

        Self {
            world: Arc::new(Mutex::new(world)),
        }
    }

    /// Load a store from a mailbox document on disk.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::from_mailbox(Mailbox::load(path)?))
    }

    /// Current contents as a mailbox document. Staged, unsaved edits are
    /// not included.
    pub fn snapshot(&self) -> Mailbox {
        let world = self.world();
        let folders = world
            .folders
            .iter()
            .enumerate()
            .filter(|(_, f)| f.parent == Some(ROOT) && !f.deleted)
            .map(|(index, f)| {
                let mut messages: Vec<&MessageState> =
                    world.messages.iter().filter(|m| m.folder == index).collect();
                messages.sort_by_key(|m| m.seq);
                StoredFolder {
                    name: f.name.clone(),
                    messages: messages.into_iter().map(|m| m.data.clone()).collect(),
                }
            })
            .collect();
        Mailbox { folders }
    }

    /// Simulate the application being started or shut down.
    pub fn set_online(&self, online: bool) {
        self.world().online = online;
    }

    /// Make first-time thread initialization report a different threading
    /// mode than the one requested.
    pub fn set_foreign_thread_mode(&self, foreign: bool) {
        self.world().foreign_thread_mode = foreign;
    }

    /// Make the next call at `point` fail with `kind`.
    pub fn fail_next(&self, point: FaultPoint, kind: FaultKind) {
        self.world().faults.push((point, kind));
    }

    /// Number of live handles of a kind.
    pub fn live(&self, kind: ObjectKind) -> usize {
        self.world()
            .objects
            .values()
            .filter(|o| o.kind() == kind)
            .count()
    }

    /// Number of live handles of any kind.
    pub fn live_total(&self) -> usize {
        self.world().objects.len()
    }

    /// Number of successful `connect` calls so far.
    pub fn connects(&self) -> usize {
        self.world().connects
    }

    /// Number of threads with protocol context.
    pub fn initialized_threads(&self) -> usize {
        self.world().threads.len()
    }

    /// Number of `initialize_thread` calls so far, repeats included.
    pub fn context_requests(&self) -> usize {
        self.world().context_requests
    }

    /// Folder name and stored state of a message.
    pub fn message(&self, id: &str) -> Option<(String, StoredMessage)> {
        let world = self.world();
        let message = world.messages.iter().find(|m| m.data.entry_id == id)?;
        Some((
            world.folders[message.folder].name.clone(),
            message.data.clone(),
        ))
    }

    /// Add a folder under the store root.
    pub fn add_folder(&self, name: &str) {
        self.world().add_folder(name);
    }

    /// File a message into a folder (created if missing). Returns its identity.
    pub fn add_message(&self, folder: &str, message: StoredMessage) -> String {
        let mut world = self.world();
        let index = match world.find_folder(folder) {
            Some(index) => index,
            None => world.add_folder(folder),
        };
        world.add_message(index, message)
    }

    /// Delete a folder and everything in it. Existing handles go stale.
    pub fn delete_folder(&self, name: &str) -> bool {
        let mut world = self.world();
        let Some(index) = world.find_folder(name) else {
            return false;
        };
        world.folders[index].deleted = true;
        world.messages.retain(|m| m.folder != index);
        true
    }

    /// Delete a single message.
    pub fn delete_message(&self, id: &str) -> bool {
        let mut world = self.world();
        let before = world.messages.len();
        world.messages.retain(|m| m.data.entry_id != id);
        world.messages.len() != before
    }

    fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl World {
    fn add_folder(&mut self, name: &str) -> usize {
        if let Some(index) = self.find_folder(name) {
            return index;
        }
        self.folders.push(FolderState {
            name: name.to_string(),
            parent: Some(ROOT),
            deleted: false,
        });
        self.folders.len() - 1
    }

    fn find_folder(&self, name: &str) -> Option<usize> {
        self.folders
            .iter()
            .position(|f| f.parent == Some(ROOT) && !f.deleted && f.name == name)
    }

    fn add_message(&mut self, folder: usize, mut data: StoredMessage) -> String {
        if data.entry_id.is_empty() {
            data.entry_id = new_entry_id();
        }
        let id = data.entry_id.clone();
        let seq = self.bump_seq();
        self.messages.push(MessageState { folder, seq, data });
        id
    }

    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn alloc(&mut self, object: Object) -> Handle {
        let handle = Handle(self.next_handle);
        self.next_handle += 1;
        self.objects.insert(handle.0, object);
        handle
    }

    fn take_fault(&mut self, point: FaultPoint) -> std::result::Result<(), Fault> {
        match self.faults.iter().position(|(p, _)| *p == point) {
            Some(pos) => {
                let (_, kind) = self.faults.remove(pos);
                Err(Fault::new(kind, format!("injected fault at {point:?}")))
            }
            None => Ok(()),
        }
    }

    fn require_thread(&self) -> std::result::Result<(), Fault> {
        if self.threads.contains(&thread::current().id()) {
            Ok(())
        } else {
            Err(Fault::new(FaultKind::Other, "CoInitialize has not been called")
                .with_code(CO_E_NOTINITIALIZED))
        }
    }

    fn object(&self, handle: Handle) -> std::result::Result<&Object, Fault> {
        self.objects
            .get(&handle.0)
            .ok_or_else(|| Fault::new(FaultKind::StaleHandle, format!("handle {handle} released")))
    }

    fn expect_kind(&self, handle: Handle, kind: ObjectKind) -> std::result::Result<(), Fault> {
        let actual = self.object(handle)?.kind();
        if actual == kind {
            Ok(())
        } else {
            Err(Fault::new(
                FaultKind::InvalidArgument,
                format!("expected {kind:?}, got {actual:?}"),
            ))
        }
    }

    fn folder_index(&self, handle: Handle) -> std::result::Result<usize, Fault> {
        match self.object(handle)? {
            Object::Folder(index) if self.folders[*index].deleted => Err(Fault::new(
                FaultKind::StaleHandle,
                "the folder has been deleted or moved",
            )),
            Object::Folder(index) => Ok(*index),
            other => Err(Fault::new(
                FaultKind::InvalidArgument,
                format!("expected folder, got {:?}", other.kind()),
            )),
        }
    }

    fn message_index(&self, id: &str) -> std::result::Result<usize, Fault> {
        self.messages
            .iter()
            .position(|m| m.data.entry_id == id)
            .ok_or_else(|| {
                Fault::new(
                    FaultKind::NotFound,
                    "the operation failed: an object could not be found",
                )
            })
    }

    fn message_handle(&self, handle: Handle) -> std::result::Result<(usize, String), Fault> {
        match self.object(handle)? {
            Object::Message { id, .. } => Ok((self.message_index(id)?, id.clone())),
            other => Err(Fault::new(
                FaultKind::InvalidArgument,
                format!("expected message, got {:?}", other.kind()),
            )),
        }
    }

    fn folder_property(&self, index: usize, property: Property) -> std::result::Result<Variant, Fault> {
        let in_folder = || self.messages.iter().filter(move |m| m.folder == index);
        match property {
            Property::Name => Ok(Variant::Text(self.folders[index].name.clone())),
            Property::ItemCount => Ok(Variant::Int(in_folder().count() as i64)),
            Property::UnreadCount => Ok(Variant::Int(
                in_folder().filter(|m| m.data.unread == Some(true)).count() as i64,
            )),
            other => Err(Fault::new(
                FaultKind::PropertyMissing,
                format!("folder has no property {other}"),
            )),
        }
    }
}

fn message_property(data: &StoredMessage, property: Property) -> std::result::Result<Variant, Fault> {
    let text = |value: &Option<String>| value.clone().map(Variant::Text).unwrap_or_default();
    let value = match property {
        Property::EntryId => Variant::Text(data.entry_id.clone()),
        Property::Subject => text(&data.subject),
        Property::SenderAddress => text(&data.sender),
        Property::To => text(&data.to),
        Property::Body => text(&data.body),
        Property::ReceivedTime => data.received.map(Variant::Time).unwrap_or_default(),
        Property::Unread => data.unread.map(Variant::Bool).unwrap_or_default(),
        Property::AttachmentCount => Variant::Int(i64::from(data.attachments)),
        Property::Importance => data.importance.map(Variant::Int).unwrap_or_default(),
        Property::ConversationId => text(&data.conversation_id),
        Property::Categories => text(&data.categories),
        other => {
            return Err(Fault::new(
                FaultKind::PropertyMissing,
                format!("message has no property {other}"),
            ));
        }
    };
    Ok(value)
}

fn apply_property(data: &mut StoredMessage, property: Property, value: Variant) {
    match (property, value) {
        (Property::Subject, value) => data.subject = value.into_text(),
        (Property::Unread, value) => data.unread = value.as_bool(),
        (Property::Importance, value) => data.importance = value.as_int(),
        (Property::Categories, value) => data.categories = value.into_text(),
        _ => {}
    }
}

fn check_writable(property: Property, value: &Variant) -> std::result::Result<(), Fault> {
    let ok = match property {
        Property::Subject | Property::Categories => {
            matches!(value, Variant::Text(_) | Variant::Empty)
        }
        Property::Unread => matches!(value, Variant::Bool(_)),
        Property::Importance => matches!(value, Variant::Int(0..=2)),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(Fault::new(
            FaultKind::InvalidArgument,
            format!("cannot set {property} to {value:?}"),
        ))
    }
}

fn sort_key(data: &StoredMessage, property: Property) -> DateTime<Utc> {
    match property {
        Property::ReceivedTime => data.received.unwrap_or_default(),
        _ => DateTime::<Utc>::default(),
    }
}

fn new_entry_id() -> String {
    format!("00000000{:032X}", rand::random::<u128>())
}

impl Automation for MemoryAutomation {
    fn initialize_thread(&mut self) -> std::result::Result<ThreadInit, Fault> {
        let mut world = self.world();
        world.context_requests += 1;
        world.take_fault(FaultPoint::ThreadInit)?;
        if !world.threads.insert(thread::current().id()) {
            return Ok(ThreadInit::AlreadyInitialized);
        }
        if world.foreign_thread_mode {
            Ok(ThreadInit::ChangedMode)
        } else {
            Ok(ThreadInit::Initialized)
        }
    }

    fn connect(&mut self) -> std::result::Result<Handle, Fault> {
        let mut world = self.world();
        world.require_thread()?;
        world.take_fault(FaultPoint::Connect)?;
        if !world.online {
            return Err(Fault::new(FaultKind::Unavailable, "server execution failed")
                .with_code(CO_E_SERVER_EXEC_FAILURE));
        }
        world.connects += 1;
        Ok(world.alloc(Object::Application))
    }

    fn namespace(&mut self, application: Handle) -> std::result::Result<Handle, Fault> {
        let mut world = self.world();
        world.require_thread()?;
        world.expect_kind(application, ObjectKind::Application)?;
        Ok(world.alloc(Object::Namespace))
    }

    fn inbox(&mut self, namespace: Handle) -> std::result::Result<Handle, Fault> {
        let mut world = self.world();
        world.require_thread()?;
        world.take_fault(FaultPoint::Inbox)?;
        world.expect_kind(namespace, ObjectKind::Namespace)?;
        let inbox = world.inbox;
        Ok(world.alloc(Object::Folder(inbox)))
    }

    fn parent(&mut self, object: Handle) -> std::result::Result<Handle, Fault> {
        let mut world = self.world();
        world.require_thread()?;
        let folder = match world.object(object)?.kind() {
            ObjectKind::Folder => {
                let index = world.folder_index(object)?;
                world.folders[index]
                    .parent
                    .ok_or_else(|| Fault::new(FaultKind::NotFound, "store root has no parent"))?
            }
            ObjectKind::Message => {
                let (index, _) = world.message_handle(object)?;
                world.messages[index].folder
            }
            other => {
                return Err(Fault::new(
                    FaultKind::InvalidArgument,
                    format!("{other:?} has no parent"),
                ));
            }
        };
        Ok(world.alloc(Object::Folder(folder)))
    }

    fn subfolders(&mut self, folder: Handle) -> std::result::Result<Vec<Handle>, Fault> {
        let mut world = self.world();
        world.require_thread()?;
        world.take_fault(FaultPoint::Subfolders)?;
        let index = world.folder_index(folder)?;
        let children: Vec<usize> = world
            .folders
            .iter()
            .enumerate()
            .filter(|(_, f)| f.parent == Some(index) && !f.deleted)
            .map(|(i, _)| i)
            .collect();
        Ok(children
            .into_iter()
            .map(|child| world.alloc(Object::Folder(child)))
            .collect())
    }

    fn items(&mut self, folder: Handle, sort: Option<Sort>) -> std::result::Result<Handle, Fault> {
        let mut world = self.world();
        world.require_thread()?;
        world.take_fault(FaultPoint::Items)?;
        let index = world.folder_index(folder)?;
        let mut messages: Vec<&MessageState> =
            world.messages.iter().filter(|m| m.folder == index).collect();
        messages.sort_by_key(|m| m.seq);
        if let Some(sort) = sort {
            messages.sort_by(|a, b| {
                let order = sort_key(&a.data, sort.property).cmp(&sort_key(&b.data, sort.property));
                if sort.descending { order.reverse() } else { order }
            });
        }
        let ids = messages.iter().map(|m| m.data.entry_id.clone()).collect();
        Ok(world.alloc(Object::Items(ids)))
    }

    fn count(&mut self, collection: Handle) -> std::result::Result<usize, Fault> {
        let world = self.world();
        world.require_thread()?;
        match world.object(collection)? {
            Object::Items(ids) => Ok(ids.len()),
            other => Err(Fault::new(
                FaultKind::InvalidArgument,
                format!("expected item collection, got {:?}", other.kind()),
            )),
        }
    }

    fn item(&mut self, collection: Handle, index: usize) -> std::result::Result<Handle, Fault> {
        let mut world = self.world();
        world.require_thread()?;
        let id = match world.object(collection)? {
            Object::Items(ids) if index >= 1 && index <= ids.len() => ids[index - 1].clone(),
            Object::Items(ids) => {
                return Err(Fault::new(
                    FaultKind::InvalidArgument,
                    format!("array index {index} out of bounds (1..={})", ids.len()),
                ));
            }
            other => {
                return Err(Fault::new(
                    FaultKind::InvalidArgument,
                    format!("expected item collection, got {:?}", other.kind()),
                ));
            }
        };
        world.message_index(&id)?;
        Ok(world.alloc(Object::Message {
            id,
            pending: Vec::new(),
        }))
    }

    fn item_by_id(&mut self, namespace: Handle, id: &str) -> std::result::Result<Handle, Fault> {
        let mut world = self.world();
        world.require_thread()?;
        world.take_fault(FaultPoint::ItemById)?;
        world.expect_kind(namespace, ObjectKind::Namespace)?;
        world.message_index(id)?;
        Ok(world.alloc(Object::Message {
            id: id.to_string(),
            pending: Vec::new(),
        }))
    }

    fn get(&mut self, object: Handle, property: Property) -> std::result::Result<Variant, Fault> {
        let mut world = self.world();
        world.require_thread()?;
        world.take_fault(FaultPoint::Get)?;
        match world.object(object)? {
            Object::Folder(_) => {
                let index = world.folder_index(object)?;
                world.folder_property(index, property)
            }
            Object::Message { pending, .. } => {
                if let Some((_, value)) = pending.iter().rev().find(|(p, _)| *p == property) {
                    return Ok(value.clone());
                }
                let (index, _) = world.message_handle(object)?;
                message_property(&world.messages[index].data, property)
            }
            other => Err(Fault::new(
                FaultKind::InvalidArgument,
                format!("{:?} has no properties", other.kind()),
            )),
        }
    }

    fn set(
        &mut self,
        object: Handle,
        property: Property,
        value: Variant,
    ) -> std::result::Result<(), Fault> {
        let mut world = self.world();
        world.require_thread()?;
        world.take_fault(FaultPoint::Set)?;
        world.message_handle(object)?;
        check_writable(property, &value)?;
        if let Some(Object::Message { pending, .. }) = world.objects.get_mut(&object.0) {
            pending.retain(|(p, _)| *p != property);
            pending.push((property, value));
        }
        Ok(())
    }

    fn save(&mut self, item: Handle) -> std::result::Result<(), Fault> {
        let mut world = self.world();
        world.require_thread()?;
        world.take_fault(FaultPoint::Save)?;
        let (index, _) = world.message_handle(item)?;
        let pending = match world.objects.get_mut(&item.0) {
            Some(Object::Message { pending, .. }) => std::mem::take(pending),
            _ => Vec::new(),
        };
        let data = &mut world.messages[index].data;
        for (property, value) in pending {
            apply_property(data, property, value);
        }
        Ok(())
    }

    fn move_to(&mut self, item: Handle, folder: Handle) -> std::result::Result<Handle, Fault> {
        let mut world = self.world();
        world.require_thread()?;
        world.take_fault(FaultPoint::Move)?;
        let (index, id) = world.message_handle(item)?;
        let target = world.folder_index(folder)?;
        let seq = world.bump_seq();
        let message = &mut world.messages[index];
        message.folder = target;
        message.seq = seq;
        Ok(world.alloc(Object::Message {
            id,
            pending: Vec::new(),
        }))
    }

    fn release(&mut self, handle: Handle) {
        self.world().objects.remove(&handle.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> MemoryAutomation {
        let mailbox = Mailbox {
            folders: vec![
                StoredFolder {
                    name: "Inbox".to_string(),
                    messages: vec![StoredMessage {
                        entry_id: "msg-1".to_string(),
                        subject: Some("Hello".to_string()),
                        unread: Some(true),
                        ..Default::default()
                    }],
                },
                StoredFolder {
                    name: "Spam".to_string(),
                    messages: Vec::new(),
                },
            ],
        };
        MemoryAutomation::from_mailbox(mailbox)
    }

    #[test]
    fn test_calls_require_thread_context() {
        let mut app = sample();
        let fault = app.connect().unwrap_err();
        assert_eq!(fault.code, CO_E_NOTINITIALIZED);

        assert_eq!(app.initialize_thread().unwrap(), ThreadInit::Initialized);
        assert_eq!(
            app.initialize_thread().unwrap(),
            ThreadInit::AlreadyInitialized
        );
        assert!(app.connect().is_ok());
    }

    #[test]
    fn test_staged_changes_need_save() {
        let mut app = sample();
        app.initialize_thread().unwrap();
        let root = app.connect().unwrap();
        let ns = app.namespace(root).unwrap();

        let item = app.item_by_id(ns, "msg-1").unwrap();
        app.set(item, Property::Unread, Variant::Bool(false)).unwrap();
        assert_eq!(app.get(item, Property::Unread).unwrap(), Variant::Bool(false));
        app.release(item);
        assert_eq!(app.message("msg-1").unwrap().1.unread, Some(true));

        let item = app.item_by_id(ns, "msg-1").unwrap();
        app.set(item, Property::Unread, Variant::Bool(false)).unwrap();
        app.save(item).unwrap();
        app.release(item);
        assert_eq!(app.message("msg-1").unwrap().1.unread, Some(false));
    }

    #[test]
    fn test_set_rejects_wrong_type() {
        let mut app = sample();
        app.initialize_thread().unwrap();
        let root = app.connect().unwrap();
        let ns = app.namespace(root).unwrap();
        let item = app.item_by_id(ns, "msg-1").unwrap();
        let fault = app
            .set(item, Property::Unread, Variant::Text("no".into()))
            .unwrap_err();
        assert_eq!(fault.kind, FaultKind::InvalidArgument);
    }

    #[test]
    fn test_handle_accounting() {
        let mut app = sample();
        app.initialize_thread().unwrap();
        let root = app.connect().unwrap();
        let ns = app.namespace(root).unwrap();
        let inbox = app.inbox(ns).unwrap();
        assert_eq!(app.live(ObjectKind::Application), 1);
        assert_eq!(app.live_total(), 3);
        app.release(inbox);
        app.release(ns);
        app.release(root);
        assert_eq!(app.live_total(), 0);
    }

    #[test]
    fn test_deleted_folder_handle_goes_stale() {
        let mut app = sample();
        app.initialize_thread().unwrap();
        let root = app.connect().unwrap();
        let ns = app.namespace(root).unwrap();
        let inbox = app.inbox(ns).unwrap();
        let store_root = app.parent(inbox).unwrap();
        let folders = app.subfolders(store_root).unwrap();
        assert_eq!(folders.len(), 2);

        assert!(app.delete_folder("Spam"));
        let fault = app.get(folders[1], Property::Name).unwrap_err();
        assert_eq!(fault.kind, FaultKind::StaleHandle);
    }

    #[test]
    fn test_injected_fault_fires_once() {
        let mut app = sample();
        app.initialize_thread().unwrap();
        app.fail_next(FaultPoint::Connect, FaultKind::Busy);
        assert_eq!(app.connect().unwrap_err().kind, FaultKind::Busy);
        assert!(app.connect().is_ok());
    }

    #[test]
    fn test_offline_application() {
        let mut app = sample();
        app.initialize_thread().unwrap();
        app.set_online(false);
        assert_eq!(app.connect().unwrap_err().kind, FaultKind::Unavailable);
        assert_eq!(app.connects(), 0);
    }

    #[test]
    fn test_inbox_created_when_missing() {
        let app = MemoryAutomation::new();
        let snapshot = app.snapshot();
        assert_eq!(snapshot.folders.len(), 1);
        assert_eq!(snapshot.folders[0].name, "Inbox");
    }

    #[test]
    fn test_generated_entry_ids() {
        let app = MemoryAutomation::new();
        let id = app.add_message("Inbox", StoredMessage::default());
        assert_eq!(id.len(), 40);
        assert!(app.message(&id).is_some());
    }

    #[test]
    fn test_mailbox_file_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("mailbox.json");
        sample().snapshot().save(&path).unwrap();

        let app = MemoryAutomation::load(&path).unwrap();
        let (folder, message) = app.message("msg-1").unwrap();
        assert_eq!(folder, "Inbox");
        assert_eq!(message.subject.as_deref(), Some("Hello"));
        assert_eq!(app.snapshot().folders.len(), 2);
    }
}
