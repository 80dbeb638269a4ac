//! Common types used across mailsort.

use serde::{Deserialize, Serialize};

/// Folder listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderSummary {
    pub name: String,
    pub total: usize,
    pub unread: usize,
}

/// Verdict returned by the classification service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub explanation: String,
}

/// Request body sent to the classification service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub subject: String,
    pub sender: String,
    pub body: String,
}

/// What `apply_classification` did to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationOutcome {
    pub id: String,
    pub category: String,
    /// Folder the message was filed into, also used as its tag.
    pub destination: String,
    /// Whether the message was moved out of its folder.
    pub relocated: bool,
}
