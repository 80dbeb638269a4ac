//! mailsort-core: mail-store adapter and classification policy.
//!
//! This crate provides the foundation for the mailsort tool, including:
//! - A thread-safe adapter ([`MailStore`]) over a single-threaded,
//!   handle-based mail automation interface
//! - Folder resolution with a per-session handle cache
//! - The category-to-folder classification mapping
//! - An in-process automation binding backed by a JSON mailbox document
//! - Configuration, path discovery and the classification service client

pub mod automation;
pub mod classifier;
pub mod classify;
pub mod config;
pub mod error;
pub mod folders;
pub mod guard;
pub mod message;
pub mod paths;
pub mod registry;
pub mod session;
pub mod store;
pub mod types;

pub use automation::{Automation, Mailbox, MemoryAutomation};
pub use classifier::ClassifierClient;
pub use classify::{ClassificationMapping, Destination};
pub use config::{AppConfig, ClassifierConfig};
pub use error::{Error, Result};
pub use message::{Importance, MessageRecord};
pub use paths::AppPaths;
pub use session::ConnectionState;
pub use store::MailStore;
pub use types::{Classification, ClassificationOutcome, FolderSummary};
