use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::id::generate_id;

#[derive(Debug, Clone, Error)]
pub enum PushError {
    #[error("push rejected for token: {0}")]
    Rejected(String),
    #[error("push transport failed: {0}")]
    Transport(String),
}

/// String key/value payload delivered alongside a push.
pub type PushData = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: PushData,
}

impl PushMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: PushData::new(),
        }
    }

    pub fn with_data(mut self, key: &str, value: impl Into<String>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

/// Identifier the dispatcher assigned to one accepted push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushReceipt {
    pub message_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MulticastReport {
    pub success_count: usize,
    pub results: Vec<Result<PushReceipt, String>>,
}

/// External push-notification dispatcher. Best effort, at most once.
#[async_trait]
pub trait PushDispatcher: Send + Sync {
    async fn send(&self, token: &str, message: &PushMessage) -> Result<PushReceipt, PushError>;

    async fn send_multicast(&self, tokens: &[String], message: &PushMessage) -> Result<MulticastReport, PushError> {
        let mut results = Vec::with_capacity(tokens.len());
        for token in tokens {
            results.push(self.send(token, message).await.map_err(|err| err.to_string()));
        }
        Ok(MulticastReport {
            success_count: results.iter().filter(|result| result.is_ok()).count(),
            results,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentPush {
    pub token: String,
    pub message: PushMessage,
}

/// Keeps every push in memory; selected tokens can be made to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingPushDispatcher {
    sent: Arc<Mutex<Vec<SentPush>>>,
    rejected: Arc<Mutex<HashSet<String>>>,
}

impl RecordingPushDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_token(&self, token: &str) {
        self.rejected.lock().insert(token.to_string());
    }

    pub fn sent(&self) -> Vec<SentPush> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, token: &str) -> Vec<PushMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|push| push.token == token)
            .map(|push| push.message.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl PushDispatcher for RecordingPushDispatcher {
    async fn send(&self, token: &str, message: &PushMessage) -> Result<PushReceipt, PushError> {
        if self.rejected.lock().contains(token) {
            return Err(PushError::Rejected(token.to_string()));
        }
        self.sent.lock().push(SentPush {
            token: token.to_string(),
            message: message.clone(),
        });
        Ok(PushReceipt {
            message_id: generate_id(),
        })
    }
}

/// Writes each push to the log instead of delivering it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPushDispatcher;

#[async_trait]
impl PushDispatcher for LogPushDispatcher {
    async fn send(&self, token: &str, message: &PushMessage) -> Result<PushReceipt, PushError> {
        log::info!(
            "push to {token}: {} | {} {:?}",
            message.title,
            message.body,
            message.data
        );
        Ok(PushReceipt {
            message_id: generate_id(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn multicast_counts_successes() {
        let push = RecordingPushDispatcher::new();
        push.reject_token("bad");
        let tokens = vec!["a".to_string(), "bad".to_string(), "b".to_string()];
        let message = PushMessage::new("New Post", "alice shared a new post").with_data("type", "post");

        let report = push.send_multicast(&tokens, &message).await.unwrap();
        assert_eq!(report.success_count, 2);
        assert!(report.results[1].is_err());
        assert_eq!(push.sent().len(), 2);
        assert_eq!(push.sent_to("a")[0].data.get("type").map(String::as_str), Some("post"));
    }

    #[tokio::test]
    async fn log_dispatcher_always_accepts() {
        let receipt = LogPushDispatcher
            .send("token", &PushMessage::new("title", "body"))
            .await
            .unwrap();
        assert!(!receipt.message_id.is_empty());
    }
}
