//! Binding to the mail application's object-automation interface.
//!
//! The interface is handle based: every object (application, namespace,
//! folder, item collection, message) is reached through an opaque [`Handle`]
//! that stays valid until it is released or the session ends. Failures are
//! reported as [`Fault`]s, which the adapter converts into typed errors at
//! the call site (see [`crate::guard`]).
//!
//! All methods take `&mut self`: a binding is only reachable through the
//! adapter's lock, which is what the single-threaded protocol requires.

pub mod memory;

use std::fmt;

use chrono::{DateTime, Utc};

pub use memory::{FaultPoint, Mailbox, MemoryAutomation, ObjectKind, StoredFolder, StoredMessage};

/// Opaque reference to an external object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub u64);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Properties readable or writable on folder and message objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    EntryId,
    Subject,
    SenderAddress,
    To,
    Body,
    ReceivedTime,
    Unread,
    AttachmentCount,
    Importance,
    ConversationId,
    Categories,
    /// Folder display name.
    Name,
    /// Folder item count.
    ItemCount,
    /// Folder unread item count.
    UnreadCount,
}

impl Property {
    pub fn as_str(&self) -> &'static str {
        match self {
            Property::EntryId => "EntryID",
            Property::Subject => "Subject",
            Property::SenderAddress => "SenderEmailAddress",
            Property::To => "To",
            Property::Body => "Body",
            Property::ReceivedTime => "ReceivedTime",
            Property::Unread => "UnRead",
            Property::AttachmentCount => "Attachments.Count",
            Property::Importance => "Importance",
            Property::ConversationId => "ConversationID",
            Property::Categories => "Categories",
            Property::Name => "Name",
            Property::ItemCount => "Items.Count",
            Property::UnreadCount => "UnReadItemCount",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dynamically typed property value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    #[default]
    Empty,
    Bool(bool),
    Int(i64),
    Text(String),
    Time(DateTime<Utc>),
}

impl Variant {
    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Variant::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Variant::Int(n) => Some(*n),
            Variant::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(b) => Some(*b),
            Variant::Int(n) => Some(*n != 0),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Variant::Time(t) => Some(*t),
            _ => None,
        }
    }
}

/// Sort order requested from an item collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub property: Property,
    pub descending: bool,
}

impl Sort {
    pub fn newest_first() -> Self {
        Self {
            property: Property::ReceivedTime,
            descending: true,
        }
    }

    pub fn oldest_first() -> Self {
        Self {
            property: Property::ReceivedTime,
            descending: false,
        }
    }
}

/// Outcome of establishing protocol context on the calling thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadInit {
    /// Context was created by this call.
    Initialized,
    /// Context already existed in the requested mode.
    AlreadyInitialized,
    /// Context already existed in a different threading mode. Usable.
    ChangedMode,
}

/// Category of a runtime fault raised by the binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Object does not exist (bad identity, deleted item).
    NotFound,
    /// Handle refers to an object that no longer exists.
    StaleHandle,
    AccessDenied,
    /// Application is busy; the call may succeed later.
    Busy,
    /// Application is not running or not reachable.
    Unavailable,
    /// Wrong argument shape or type for the call.
    InvalidArgument,
    /// Property is not present on this object.
    PropertyMissing,
    Other,
}

/// Runtime fault raised by an automation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub kind: FaultKind,
    /// Protocol status code, as reported by the application.
    pub code: u32,
    pub message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: default_code(kind),
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: u32) -> Self {
        self.code = code;
        self
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.message, self.code)
    }
}

impl std::error::Error for Fault {}

fn default_code(kind: FaultKind) -> u32 {
    match kind {
        FaultKind::NotFound => 0x8004_010F,
        FaultKind::StaleHandle => 0x8001_0108,
        FaultKind::AccessDenied => 0x8007_0005,
        FaultKind::Busy => 0x8001_010A,
        FaultKind::Unavailable => 0x8001_0105,
        FaultKind::InvalidArgument => 0x8007_0057,
        FaultKind::PropertyMissing => 0x8002_0003,
        FaultKind::Other => 0x8000_4005,
    }
}

/// Handle-based object model of the mail application.
///
/// Handles returned by any method must eventually be passed to
/// [`Automation::release`]. Handles are only meaningful while the
/// application handle from [`Automation::connect`] is live.
pub trait Automation: Send {
    /// Establish protocol context on the calling thread.
    fn initialize_thread(&mut self) -> Result<ThreadInit, Fault>;

    /// Attach to the running application.
    fn connect(&mut self) -> Result<Handle, Fault>;

    /// Root namespace of the application.
    fn namespace(&mut self, application: Handle) -> Result<Handle, Fault>;

    /// The default inbox folder of the namespace.
    fn inbox(&mut self, namespace: Handle) -> Result<Handle, Fault>;

    /// Folder containing `object` (a folder or a message).
    fn parent(&mut self, object: Handle) -> Result<Handle, Fault>;

    /// Direct child folders of `folder`.
    fn subfolders(&mut self, folder: Handle) -> Result<Vec<Handle>, Fault>;

    /// Item collection of `folder`, optionally sorted.
    fn items(&mut self, folder: Handle, sort: Option<Sort>) -> Result<Handle, Fault>;

    /// Number of items in a collection.
    fn count(&mut self, collection: Handle) -> Result<usize, Fault>;

    /// Item at a 1-based position in a collection.
    fn item(&mut self, collection: Handle, index: usize) -> Result<Handle, Fault>;

    /// Message by its store-assigned identity.
    fn item_by_id(&mut self, namespace: Handle, id: &str) -> Result<Handle, Fault>;

    fn get(&mut self, object: Handle, property: Property) -> Result<Variant, Fault>;

    /// Stage a property change. Nothing reaches the store until `save`.
    fn set(&mut self, object: Handle, property: Property, value: Variant) -> Result<(), Fault>;

    /// Persist staged changes on an item.
    fn save(&mut self, item: Handle) -> Result<(), Fault>;

    /// Move an item into `folder`. Returns a handle to the moved item.
    fn move_to(&mut self, item: Handle, folder: Handle) -> Result<Handle, Fault>;

    /// Release a handle. Unsaved changes on it are discarded.
    fn release(&mut self, handle: Handle);
}
