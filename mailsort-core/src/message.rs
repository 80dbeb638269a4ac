//! Message records and the single-property operations on them.
//!
//! Every operation here takes the binding by `&mut` and is only ever called
//! with the adapter's lock held. Message handles are obtained, used and
//! released within one call.

use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::automation::{Automation, Handle, Property, Sort, Variant};
use crate::error::Result;
use crate::guard::{Guarded, optional};

/// Three-valued message importance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    #[default]
    Normal,
    High,
}

impl Importance {
    /// Map the store's importance code. Unknown codes are normal.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Importance::Low,
            2 => Importance::High,
            _ => Importance::Normal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Importance::Low => "low",
            Importance::Normal => "normal",
            Importance::High => "high",
        }
    }
}

impl std::fmt::Display for Importance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a message as read from the store.
///
/// Absent fields keep their zero value. The record is never updated in
/// place; re-read it after a write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Store-assigned identity, stable across moves.
    pub id: String,
    pub subject: String,
    pub sender: String,
    pub recipient: String,
    /// Body as shown in listings.
    pub body: String,
    /// Full message text. Same value as `body`.
    pub content: String,
    pub received: DateTime<Utc>,
    pub is_read: bool,
    pub has_attachments: bool,
    pub importance: Importance,
    pub conversation_id: String,
    pub categories: Vec<String>,
    /// Display name of the containing folder.
    pub folder: String,
}

/// Split the store's category string into tags. An empty string is an
/// empty set.
pub fn parse_categories(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// 1-based positions covered by `limit` items after skipping `offset`.
/// Empty when the window starts past the end.
pub fn window(total: usize, limit: usize, offset: usize) -> Range<usize> {
    if limit == 0 || offset >= total {
        return 1..1;
    }
    let last = total.min(offset.saturating_add(limit));
    offset + 1..last + 1
}

struct Reader<'a, A: ?Sized> {
    automation: &'a mut A,
    item: Handle,
    op: &'static str,
    target: &'a str,
}

impl<A: Automation + ?Sized> Reader<'_, A> {
    fn value(&mut self, property: Property) -> Result<Variant> {
        optional(self.automation.get(self.item, property), self.op, self.target)
    }

    fn text(&mut self, property: Property) -> Result<String> {
        Ok(self.value(property)?.into_text().unwrap_or_default())
    }
}

/// Read a message into a record. `folder` is the containing folder's name
/// when the caller already knows it.
pub(crate) fn read_record<A: Automation + ?Sized>(
    automation: &mut A,
    item: Handle,
    folder: Option<&str>,
    op: &'static str,
    target: &str,
) -> Result<MessageRecord> {
    let mut reader = Reader {
        automation: &mut *automation,
        item,
        op,
        target,
    };

    let id = reader.text(Property::EntryId)?;
    let subject = reader.text(Property::Subject)?;
    let sender = reader.text(Property::SenderAddress)?;
    let recipient = reader.text(Property::To)?;
    let body = reader.text(Property::Body)?;
    let received = reader
        .value(Property::ReceivedTime)?
        .as_time()
        .unwrap_or_default();
    let is_read = reader
        .value(Property::Unread)?
        .as_bool()
        .map(|unread| !unread)
        .unwrap_or_default();
    let has_attachments = reader
        .value(Property::AttachmentCount)?
        .as_int()
        .is_some_and(|count| count > 0);
    let importance = reader
        .value(Property::Importance)?
        .as_int()
        .map(Importance::from_code)
        .unwrap_or_default();
    let conversation_id = reader.text(Property::ConversationId)?;
    let categories = parse_categories(&reader.text(Property::Categories)?);

    let folder = match folder {
        Some(name) => name.to_string(),
        None => folder_name(automation, item, op, target)?,
    };

    Ok(MessageRecord {
        id,
        subject,
        sender,
        recipient,
        content: body.clone(),
        body,
        received,
        is_read,
        has_attachments,
        importance,
        conversation_id,
        categories,
        folder,
    })
}

/// Display name of the folder holding `object`.
pub(crate) fn folder_name<A: Automation + ?Sized>(
    automation: &mut A,
    object: Handle,
    op: &'static str,
    target: &str,
) -> Result<String> {
    let parent = automation.parent(object).guard(op, target)?;
    let name = optional(automation.get(parent, Property::Name), op, target);
    automation.release(parent);
    Ok(name?.into_text().unwrap_or_default())
}

/// Fetch a message by identity, run `f` on it and release it whatever the
/// outcome.
fn with_item<A, T, F>(
    automation: &mut A,
    namespace: Handle,
    op: &'static str,
    id: &str,
    f: F,
) -> Result<T>
where
    A: Automation + ?Sized,
    F: FnOnce(&mut A, Handle) -> Result<T>,
{
    let item = automation.item_by_id(namespace, id).guard(op, id)?;
    let result = f(automation, item);
    automation.release(item);
    result
}

/// Stage one property and save. A failure at either step leaves the stored
/// message untouched: staged changes die with the released handle.
fn write_property<A: Automation + ?Sized>(
    automation: &mut A,
    namespace: Handle,
    op: &'static str,
    id: &str,
    property: Property,
    value: Variant,
) -> Result<()> {
    with_item(automation, namespace, op, id, |automation, item| {
        automation.set(item, property, value).guard(op, id)?;
        automation.save(item).guard(op, id)
    })
}

pub(crate) fn get<A: Automation + ?Sized>(
    automation: &mut A,
    namespace: Handle,
    id: &str,
) -> Result<MessageRecord> {
    with_item(automation, namespace, "get", id, |automation, item| {
        read_record(automation, item, None, "get", id)
    })
}

pub(crate) fn set_read<A: Automation + ?Sized>(
    automation: &mut A,
    namespace: Handle,
    id: &str,
    read: bool,
) -> Result<()> {
    write_property(
        automation,
        namespace,
        "set_read",
        id,
        Property::Unread,
        Variant::Bool(!read),
    )
}

pub(crate) fn set_category<A: Automation + ?Sized>(
    automation: &mut A,
    namespace: Handle,
    id: &str,
    label: &str,
) -> Result<()> {
    write_property(
        automation,
        namespace,
        "set_category",
        id,
        Property::Categories,
        Variant::Text(label.to_string()),
    )
}

pub(crate) fn move_to<A: Automation + ?Sized>(
    automation: &mut A,
    namespace: Handle,
    id: &str,
    folder: Handle,
) -> Result<()> {
    with_item(automation, namespace, "move", id, |automation, item| {
        let moved = automation.move_to(item, folder).guard("move", id)?;
        automation.release(moved);
        Ok(())
    })
}

/// Newest-first page of a folder.
pub(crate) fn list<A: Automation + ?Sized>(
    automation: &mut A,
    folder: Handle,
    folder_label: &str,
    limit: usize,
    offset: usize,
) -> Result<Vec<MessageRecord>> {
    let op = "list";
    let items = automation
        .items(folder, Some(Sort::newest_first()))
        .guard(op, folder_label)?;
    let result = read_window(automation, items, folder_label, limit, offset);
    automation.release(items);
    result
}

fn read_window<A: Automation + ?Sized>(
    automation: &mut A,
    items: Handle,
    folder_label: &str,
    limit: usize,
    offset: usize,
) -> Result<Vec<MessageRecord>> {
    let op = "list";
    let total = automation.count(items).guard(op, folder_label)?;
    let positions = window(total, limit, offset);
    let mut records = Vec::with_capacity(positions.len());
    for index in positions {
        let item = automation.item(items, index).guard(op, folder_label)?;
        let record = read_record(automation, item, Some(folder_label), op, folder_label);
        automation.release(item);
        records.push(record?);
    }
    Ok(records)
}

/// Messages of `folder` whose conversation identifier equals
/// `conversation_id`, oldest first.
pub(crate) fn conversation<A: Automation + ?Sized>(
    automation: &mut A,
    folder: Handle,
    conversation_id: &str,
) -> Result<Vec<MessageRecord>> {
    let op = "conversation";
    if conversation_id.is_empty() {
        return Ok(Vec::new());
    }
    let folder_label = optional(automation.get(folder, Property::Name), op, conversation_id)?
        .into_text()
        .unwrap_or_default();
    let items = automation
        .items(folder, Some(Sort::oldest_first()))
        .guard(op, conversation_id)?;
    let result = scan_conversation(automation, items, &folder_label, conversation_id);
    automation.release(items);
    result
}

fn scan_conversation<A: Automation + ?Sized>(
    automation: &mut A,
    items: Handle,
    folder_label: &str,
    conversation_id: &str,
) -> Result<Vec<MessageRecord>> {
    let op = "conversation";
    let total = automation.count(items).guard(op, conversation_id)?;
    let mut records = Vec::new();
    for index in 1..=total {
        let item = automation.item(items, index).guard(op, conversation_id)?;
        let record = match optional(
            automation.get(item, Property::ConversationId),
            op,
            conversation_id,
        ) {
            Ok(Variant::Text(id)) if id == conversation_id => {
                read_record(automation, item, Some(folder_label), op, conversation_id).map(Some)
            }
            Ok(_) => Ok(None),
            Err(err) => Err(err),
        };
        automation.release(item);
        if let Some(record) = record? {
            records.push(record);
        }
    }
    Ok(records)
}
