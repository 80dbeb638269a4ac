//! HTTP client for the message classification service.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ClassifierConfig;
use crate::error::{Error, Result};
use crate::message::MessageRecord;
use crate::types::{Classification, ClassifyRequest};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Longest body excerpt sent for classification, in characters.
const MAX_BODY_CHARS: usize = 8000;

/// Client for the classification service.
#[derive(Debug, Clone)]
pub struct ClassifierClient {
    http: Client,
    base_url: String,
}

impl ClassifierClient {
    /// Create a new classifier client.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let timeout = timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let http = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        Self::new(&config.url, Some(Duration::from_secs(config.timeout_secs)))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check service health.
    pub fn health(&self) -> Result<Value> {
        let resp = self.http.get(format!("{}/health", self.base_url)).send()?;
        self.handle_response(resp)
    }

    /// Ask the service for the category of a message.
    pub fn classify(&self, record: &MessageRecord) -> Result<Classification> {
        let request = classify_request(record);
        let resp = self
            .http
            .post(format!("{}/classify", self.base_url))
            .json(&request)
            .send()?;
        let classification: Classification = self.handle_response(resp)?;
        if classification.category.trim().is_empty() {
            return Err(Error::Service(format!(
                "no category returned for {}",
                record.id
            )));
        }
        Ok(classification)
    }

    fn handle_response<T: DeserializeOwned>(&self, resp: reqwest::blocking::Response) -> Result<T> {
        let status = resp.status();
        let text = resp.text()?;
        if !status.is_success() {
            return Err(status_error(status, &text));
        }
        serde_json::from_str(&text).map_err(Into::into)
    }
}

/// Request body for a message, with the body cut to a bounded excerpt.
pub fn classify_request(record: &MessageRecord) -> ClassifyRequest {
    ClassifyRequest {
        subject: record.subject.clone(),
        sender: record.sender.clone(),
        body: record.content.chars().take(MAX_BODY_CHARS).collect(),
    }
}

/// Error for a non-success reply, preferring the service's `detail` field.
fn status_error(status: StatusCode, text: &str) -> Error {
    if let Ok(val) = serde_json::from_str::<Value>(text)
        && let Some(detail) = val
            .as_object()
            .and_then(|m| m.get("detail"))
            .and_then(|d| d.as_str())
    {
        return Error::Service(format!("classifier error: {detail}"));
    }
    let snippet: String = text.chars().take(400).collect();
    Error::Service(format!("classifier error ({status}): {snippet}"))
}
