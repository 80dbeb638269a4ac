//! The mail-store adapter.
//!
//! [`MailStore`] serializes every call behind one mutex: the automation
//! protocol offers no safe concurrent access, and even reads dereference
//! handles. Inside the critical section each call first makes sure the
//! current thread has protocol context, since the thread that acquires the
//! lock is not necessarily the one that acquired it last time.

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{info, warn};

use crate::automation::Automation;
use crate::classify::{ClassificationMapping, Step};
use crate::error::Result;
use crate::folders;
use crate::message::{self, MessageRecord};
use crate::session::{Connection, ConnectionState};
use crate::types::{ClassificationOutcome, FolderSummary};

/// Thread-safe adapter over an automation binding.
pub struct MailStore<A: Automation> {
    inner: Mutex<Connection<A>>,
    mapping: ClassificationMapping,
}

impl<A: Automation> MailStore<A> {
    /// Adapter using the built-in classification mapping.
    pub fn new(automation: A) -> Self {
        Self::with_mapping(automation, ClassificationMapping::builtin())
    }

    pub fn with_mapping(automation: A, mapping: ClassificationMapping) -> Self {
        Self {
            inner: Mutex::new(Connection::new(automation)),
            mapping,
        }
    }

    pub fn mapping(&self) -> &ClassificationMapping {
        &self.mapping
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state()
    }

    /// Number of long-lived handles currently held (session, namespace,
    /// cached folders).
    pub fn live_handles(&self) -> usize {
        self.lock().registry.len()
    }

    /// Attach to the mail application. Calling it again while attached is
    /// a no-op.
    pub fn initialize(&self) -> Result<()> {
        self.lock().initialize()
    }

    /// Release all handles and detach. Safe to call repeatedly.
    pub fn close(&self) {
        self.lock().close()
    }

    /// Messages of `folder`, newest first, skipping `offset` and returning
    /// at most `limit`. An offset past the end yields an empty page.
    pub fn list(&self, folder: &str, limit: usize, offset: usize) -> Result<Vec<MessageRecord>> {
        self.lock().list(folder, limit, offset)
    }

    /// A message by store identity.
    pub fn get(&self, id: &str) -> Result<MessageRecord> {
        self.lock().get(id)
    }

    pub fn set_read(&self, id: &str, read: bool) -> Result<()> {
        self.lock().set_read(id, read)
    }

    /// Move a message into the folder with display name `folder`.
    pub fn move_to(&self, id: &str, folder: &str) -> Result<()> {
        self.lock().move_to(id, folder)
    }

    /// Replace a message's category tags with `label`.
    pub fn set_category(&self, id: &str, label: &str) -> Result<()> {
        self.lock().set_category(id, label)
    }

    /// Tag, and when the category demands it relocate, a message according
    /// to the classification mapping.
    ///
    /// Unknown categories fail before anything touches the store. For a
    /// relocating category the move happens before the tag; if tagging then
    /// fails the message stays filed and the caller should re-apply.
    pub fn apply_classification(&self, id: &str, category: &str) -> Result<ClassificationOutcome> {
        let destination = self.mapping.resolve(id, category)?;

        let mut conn = self.lock();
        for step in destination.steps() {
            let result = match step {
                Step::Move => conn.move_to(id, destination.folder),
                Step::Tag => conn.set_category(id, destination.folder),
            };
            if let Err(err) = result {
                if *step == Step::Tag && !destination.stays_in_place {
                    warn!(
                        "{id} moved to '{}' but tagging failed: {err}",
                        destination.folder
                    );
                }
                return Err(err);
            }
        }

        info!(
            "classified {id} as {category}: {} '{}'",
            if destination.stays_in_place { "tagged" } else { "filed into" },
            destination.folder
        );
        Ok(ClassificationOutcome {
            id: id.to_string(),
            category: category.to_string(),
            destination: destination.folder.to_string(),
            relocated: !destination.stays_in_place,
        })
    }

    /// Folders beside the inbox with their total and unread counts.
    pub fn list_folders(&self) -> Result<Vec<FolderSummary>> {
        self.lock().list_folders()
    }

    /// Inbox messages belonging to a conversation, oldest first.
    pub fn conversation(&self, conversation_id: &str) -> Result<Vec<MessageRecord>> {
        self.lock().conversation(conversation_id)
    }

    fn lock(&self) -> MutexGuard<'_, Connection<A>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<A: Automation> Drop for MailStore<A> {
    fn drop(&mut self) {
        self.inner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .close();
    }
}

impl<A: Automation> Connection<A> {
    fn list(&mut self, folder: &str, limit: usize, offset: usize) -> Result<Vec<MessageRecord>> {
        let op = "list";
        let namespace = self.enter(op, folder)?;
        let handle =
            self.folders
                .resolve(&mut self.automation, namespace, &mut self.registry, op, folder)?;
        let label = if folders::is_inbox(folder) { folders::INBOX } else { folder };
        message::list(&mut self.automation, handle, label, limit, offset)
    }

    fn get(&mut self, id: &str) -> Result<MessageRecord> {
        let namespace = self.enter("get", id)?;
        message::get(&mut self.automation, namespace, id)
    }

    fn set_read(&mut self, id: &str, read: bool) -> Result<()> {
        let namespace = self.enter("set_read", id)?;
        message::set_read(&mut self.automation, namespace, id, read)
    }

    fn move_to(&mut self, id: &str, folder: &str) -> Result<()> {
        let op = "move";
        let namespace = self.enter(op, id)?;
        let handle = self
            .folders
            .resolve(&mut self.automation, namespace, &mut self.registry, op, folder)
            .map_err(|err| err.for_message(id))?;
        message::move_to(&mut self.automation, namespace, id, handle)
    }

    fn set_category(&mut self, id: &str, label: &str) -> Result<()> {
        let namespace = self.enter("set_category", id)?;
        message::set_category(&mut self.automation, namespace, id, label)
    }

    fn list_folders(&mut self) -> Result<Vec<FolderSummary>> {
        let op = "list_folders";
        let namespace = self.enter(op, folders::INBOX)?;
        self.folders
            .summaries(&mut self.automation, namespace, &mut self.registry, op)
    }

    fn conversation(&mut self, conversation_id: &str) -> Result<Vec<MessageRecord>> {
        let op = "conversation";
        let namespace = self.enter(op, conversation_id)?;
        let inbox = self
            .folders
            .resolve(&mut self.automation, namespace, &mut self.registry, op, "")?;
        message::conversation(&mut self.automation, inbox, conversation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    use chrono::{Duration, TimeZone, Utc};

    use crate::automation::{
        FaultKind, FaultPoint, Mailbox, MemoryAutomation, ObjectKind, StoredFolder,
        StoredMessage,
    };
    use crate::classify::Destination;
    use crate::error::Error;

    fn message(id: &str, minutes: i64) -> StoredMessage {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        StoredMessage {
            entry_id: id.to_string(),
            subject: Some(format!("subject {id}")),
            sender: Some("someone@example.com".to_string()),
            body: Some(format!("body of {id}")),
            received: Some(base + Duration::minutes(minutes)),
            unread: Some(true),
            ..Default::default()
        }
    }

    fn mailbox() -> MemoryAutomation {
        let mut inbox: Vec<StoredMessage> = (0..5).map(|n| message(&format!("m{n}"), n)).collect();
        inbox.push(message("msg-1", 100));
        inbox.push(message("msg-2", 101));
        MemoryAutomation::from_mailbox(Mailbox {
            folders: vec![
                StoredFolder {
                    name: "Inbox".to_string(),
                    messages: inbox,
                },
                StoredFolder {
                    name: "Work Relevant".to_string(),
                    messages: Vec::new(),
                },
                StoredFolder {
                    name: "Spam".to_string(),
                    messages: Vec::new(),
                },
                StoredFolder {
                    name: "FYI".to_string(),
                    messages: Vec::new(),
                },
                StoredFolder {
                    name: "Newsletters".to_string(),
                    messages: Vec::new(),
                },
                StoredFolder {
                    name: "Job Listings".to_string(),
                    messages: Vec::new(),
                },
                StoredFolder {
                    name: "Optional Events".to_string(),
                    messages: Vec::new(),
                },
            ],
        })
    }

    fn ready(app: &MemoryAutomation) -> MailStore<MemoryAutomation> {
        let store = MailStore::new(app.clone());
        store.initialize().unwrap();
        store
    }

    #[test]
    fn test_operations_require_initialize() {
        let store = MailStore::new(mailbox());
        assert!(matches!(
            store.list("Inbox", 10, 0),
            Err(Error::NotInitialized { op: "list", ref target }) if target == "Inbox"
        ));
        assert!(matches!(
            store.get("m0"),
            Err(Error::NotInitialized { op: "get", ref target }) if target == "m0"
        ));
        assert!(store.get("m0").unwrap_err().to_string().contains("m0"));
        assert!(matches!(
            store.apply_classification("msg-1", "fyi"),
            Err(Error::NotInitialized { ref target, .. }) if target == "msg-1"
        ));
    }

    #[test]
    fn test_initialize_twice_keeps_one_session() {
        let app = mailbox();
        let store = MailStore::new(app.clone());
        store.initialize().unwrap();
        store.initialize().unwrap();
        assert_eq!(store.state(), ConnectionState::Ready);
        assert_eq!(app.live(ObjectKind::Application), 1);
        assert_eq!(app.connects(), 1);
    }

    #[test]
    fn test_close_releases_everything() {
        let app = mailbox();
        let store = ready(&app);
        store.list("Spam", 10, 0).unwrap();
        assert_eq!(store.live_handles(), 4);

        store.close();
        store.close();
        assert_eq!(store.state(), ConnectionState::Closed);
        assert_eq!(store.live_handles(), 0);
        assert_eq!(app.live_total(), 0);
        assert!(matches!(
            store.list("Inbox", 1, 0),
            Err(Error::NotInitialized { .. })
        ));
    }

    #[test]
    fn test_drop_closes_session() {
        let app = mailbox();
        {
            let store = ready(&app);
            store.list("Inbox", 1, 0).unwrap();
        }
        assert_eq!(app.live_total(), 0);
    }

    #[test]
    fn test_list_newest_first_with_window() {
        let app = mailbox();
        let store = ready(&app);

        let ids: Vec<String> = store
            .list("Inbox", 3, 0)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["msg-2", "msg-1", "m4"]);

        let ids: Vec<String> = store
            .list("", 3, 3)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["m3", "m2", "m1"]);

        let tail = store.list("Inbox", 50, 5).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[1].id, "m0");
    }

    #[test]
    fn test_list_offset_past_end_is_empty() {
        let app = mailbox();
        let store = ready(&app);
        assert!(store.list("Inbox", 10, 7).unwrap().is_empty());
        assert!(store.list("Inbox", 10, 1000).unwrap().is_empty());
        assert!(store.list("Spam", 10, 0).unwrap().is_empty());
    }

    #[test]
    fn test_list_is_stable() {
        let app = mailbox();
        let store = ready(&app);
        let first = store.list("Inbox", 4, 1).unwrap();
        let second = store.list("Inbox", 4, 1).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_list_unknown_folder() {
        let app = mailbox();
        let store = ready(&app);
        assert!(matches!(
            store.list("Archive", 10, 0),
            Err(Error::FolderNotFound { op: "list", ref name, .. }) if name == "Archive"
        ));
    }

    #[test]
    fn test_get_nonexistent() {
        let app = mailbox();
        let store = ready(&app);
        assert!(matches!(
            store.get("nonexistent-id"),
            Err(Error::NotFound { op: "get", ref target, .. }) if target == "nonexistent-id"
        ));
    }

    #[test]
    fn test_set_read_round_trip() {
        let app = mailbox();
        let store = ready(&app);

        store.set_read("msg-1", true).unwrap();
        assert!(store.get("msg-1").unwrap().is_read);

        store.set_read("msg-1", false).unwrap();
        assert!(!store.get("msg-1").unwrap().is_read);
    }

    #[test]
    fn test_move_keeps_identity() {
        let app = mailbox();
        let store = ready(&app);
        store.move_to("m0", "Spam").unwrap();
        let record = store.get("m0").unwrap();
        assert_eq!(record.id, "m0");
        assert_eq!(record.folder, "Spam");
        assert_eq!(store.list("Spam", 10, 0).unwrap().len(), 1);
    }

    #[test]
    fn test_move_to_missing_folder() {
        let app = mailbox();
        let store = ready(&app);
        let err = store.move_to("m0", "Nowhere").unwrap_err();
        assert!(matches!(
            err,
            Error::FolderNotFound { op: "move", ref target, ref name }
                if target == "m0" && name == "Nowhere"
        ));
        assert!(err.to_string().contains("m0"));
        assert_eq!(app.message("m0").unwrap().0, "Inbox");

        // relocating into a folder that is gone names the message too
        app.delete_folder("Spam");
        assert!(matches!(
            store.apply_classification("m1", "spam_to_delete"),
            Err(Error::FolderNotFound { ref target, .. }) if target == "m1"
        ));
    }

    #[test]
    fn test_set_category_replaces_tags() {
        let app = mailbox();
        let store = ready(&app);
        store.set_category("m1", "FYI").unwrap();
        store.set_category("m1", "Spam").unwrap();
        assert_eq!(store.get("m1").unwrap().categories, vec!["Spam"]);
    }

    #[test]
    fn test_stays_in_place_scenario() {
        static MAPPING: &[(&str, Destination)] =
            &[("required_personal_action", Destination::tag("Work Relevant"))];
        let app = mailbox();
        let store = MailStore::with_mapping(
            app.clone(),
            ClassificationMapping::new(MAPPING).unwrap(),
        );
        store.initialize().unwrap();

        let outcome = store
            .apply_classification("msg-1", "required_personal_action")
            .unwrap();
        assert!(!outcome.relocated);
        assert_eq!(outcome.destination, "Work Relevant");

        let record = store.get("msg-1").unwrap();
        assert_eq!(record.folder, "Inbox");
        assert_eq!(record.categories, vec!["Work Relevant"]);
        assert!(!record.is_read);
    }

    #[test]
    fn test_relocate_scenario() {
        static MAPPING: &[(&str, Destination)] =
            &[("spam_to_delete", Destination::relocate("Spam"))];
        let app = mailbox();
        let store = MailStore::with_mapping(
            app.clone(),
            ClassificationMapping::new(MAPPING).unwrap(),
        );
        store.initialize().unwrap();

        let outcome = store.apply_classification("msg-2", "spam_to_delete").unwrap();
        assert!(outcome.relocated);

        let record = store.get("msg-2").unwrap();
        assert_eq!(record.folder, "Spam");
        assert_eq!(record.categories, vec!["Spam"]);
    }

    #[test]
    fn test_every_builtin_category() {
        let app = mailbox();
        let store = ready(&app);
        let mapping = *store.mapping();

        for (n, (label, destination)) in mapping.entries().iter().enumerate() {
            let id = app.add_message("Inbox", message(&format!("c{n}"), 200 + n as i64));
            let before = store.get(&id).unwrap();

            store.apply_classification(&id, label).unwrap();
            let after = store.get(&id).unwrap();

            assert_eq!(after.categories, vec![destination.folder.to_string()]);
            if destination.stays_in_place {
                assert_eq!(after.folder, before.folder);
                assert_eq!(after.is_read, before.is_read);
            } else {
                assert_eq!(after.folder, destination.folder);
            }
        }
    }

    #[test]
    fn test_unknown_category_has_no_side_effect() {
        let app = mailbox();
        let store = ready(&app);
        let before = app.snapshot();
        let handles = app.live_total();

        let err = store.apply_classification("msg-1", "bogus").unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownCategory { ref id, ref label } if id == "msg-1" && label == "bogus"
        ));
        assert_eq!(app.live_total(), handles);
        assert_eq!(
            serde_json::to_value(app.snapshot()).unwrap(),
            serde_json::to_value(before).unwrap()
        );
    }

    #[test]
    fn test_tag_failure_after_move_leaves_message_filed() {
        let app = mailbox();
        let store = ready(&app);

        app.fail_next(FaultPoint::Save, FaultKind::Busy);
        let err = store.apply_classification("msg-2", "spam_to_delete").unwrap_err();
        assert!(matches!(err, Error::Transient { op: "set_category", .. }));
        assert!(err.is_retryable());

        let (folder, stored) = app.message("msg-2").unwrap();
        assert_eq!(folder, "Spam");
        assert_eq!(stored.categories, None);

        // re-applying completes the tag
        store.apply_classification("msg-2", "spam_to_delete").unwrap();
        assert_eq!(store.get("msg-2").unwrap().categories, vec!["Spam"]);
    }

    #[test]
    fn test_move_failure_skips_tag() {
        let app = mailbox();
        let store = ready(&app);
        app.fail_next(FaultPoint::Move, FaultKind::AccessDenied);
        assert!(matches!(
            store.apply_classification("msg-2", "fyi"),
            Err(Error::Access { op: "move", .. })
        ));
        let (folder, stored) = app.message("msg-2").unwrap();
        assert_eq!(folder, "Inbox");
        assert_eq!(stored.categories, None);
    }

    #[test]
    fn test_list_folders() {
        let app = mailbox();
        let store = ready(&app);
        store.set_read("m0", true).unwrap();
        let folders = store.list_folders().unwrap();
        let inbox = folders.iter().find(|f| f.name == "Inbox").unwrap();
        assert_eq!(inbox.total, 7);
        assert_eq!(inbox.unread, 6);
        assert_eq!(folders.len(), 7);
    }

    #[test]
    fn test_conversation_exact_match_oldest_first() {
        let app = mailbox();
        for (id, minutes, conv) in [("t2", 30, "conv-a"), ("t1", 10, "conv-a"), ("t3", 20, "conv-ab")] {
            let mut msg = message(id, minutes);
            msg.conversation_id = Some(conv.to_string());
            app.add_message("Inbox", msg);
        }
        let store = ready(&app);
        let ids: Vec<String> = store
            .conversation("conv-a")
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["t1", "t2"]);
        assert!(store.conversation("conv-z").unwrap().is_empty());
    }

    #[test]
    fn test_stale_folder_surfaces_as_not_found() {
        let app = mailbox();
        let store = ready(&app);
        store.list("Spam", 10, 0).unwrap();
        app.delete_folder("Spam");
        assert!(matches!(
            store.list("Spam", 10, 0),
            Err(Error::NotFound { op: "list", .. })
        ));

        // a fresh session resolves again
        store.close();
        store.initialize().unwrap();
        assert!(matches!(
            store.list("Spam", 10, 0),
            Err(Error::FolderNotFound { .. })
        ));
    }

    #[test]
    fn test_transient_faults_are_not_retried() {
        let app = mailbox();
        let store = ready(&app);
        app.fail_next(FaultPoint::ItemById, FaultKind::Busy);
        assert!(matches!(
            store.get("msg-1"),
            Err(Error::Transient { op: "get", .. })
        ));
        assert!(store.get("msg-1").is_ok());
    }

    #[test]
    fn test_concurrent_lists() {
        let app = mailbox();
        let store = Arc::new(ready(&app));
        let expected = store.list("Inbox", 5, 0).unwrap();

        thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let store = Arc::clone(&store);
                    scope.spawn(move || {
                        (0..10)
                            .map(|_| store.list("Inbox", 5, 0))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            for handle in handles {
                for page in handle.join().unwrap() {
                    assert_eq!(page.unwrap(), expected);
                }
            }
        });

        // each worker thread got protocol context from inside the lock
        assert_eq!(app.initialized_threads(), 9);
        assert_eq!(app.live(ObjectKind::Message), 0);
        assert_eq!(app.live(ObjectKind::Items), 0);
    }

    #[test]
    fn test_short_lived_threads_after_close() {
        let app = mailbox();
        let store = Arc::new(ready(&app));

        thread::scope(|scope| {
            for _ in 0..50 {
                let store = Arc::clone(&store);
                scope.spawn(move || store.list("Inbox", 1, 0).unwrap());
            }
        });
        assert_eq!(app.initialized_threads(), 51);

        let requests = app.context_requests();
        store.close();
        assert_eq!(app.context_requests(), requests + 1);
        assert_eq!(app.live_total(), 0);

        // every call goes through the binding, before and after a reopen
        store.initialize().unwrap();
        store.list("Inbox", 1, 0).unwrap();
        assert_eq!(app.context_requests(), requests + 3);
    }

    #[test]
    fn test_concurrent_writes_and_reads() {
        let app = mailbox();
        let store = Arc::new(ready(&app));

        thread::scope(|scope| {
            for n in 0..5 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    let id = format!("m{n}");
                    store.set_read(&id, true).unwrap();
                    store.get(&id).unwrap();
                });
            }
            let store = Arc::clone(&store);
            scope.spawn(move || {
                for _ in 0..10 {
                    assert_eq!(store.list("Inbox", 20, 0).unwrap().len(), 7);
                }
            });
        });

        for n in 0..5 {
            assert!(store.get(&format!("m{n}")).unwrap().is_read);
        }
    }
}
