//! Bounded delivery log (§4.L): an in-memory ring buffer of recent delivery
//! attempts, optionally mirrored to a file for durability across restarts.

use std::collections::VecDeque;
use std::path::PathBuf;

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::domain::types::{DeliveryAttemptResult, DeliveryLogEntry, WebhookPayload, WebhookSubscription};

pub struct DeliveryLogger {
    capacity: usize,
    entries: Mutex<VecDeque<DeliveryLogEntry>>,
    file_path: Option<PathBuf>,
}

impl DeliveryLogger {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: Mutex::new(VecDeque::with_capacity(capacity)), file_path: None }
    }

    pub fn with_file(capacity: usize, file_path: PathBuf) -> Self {
        Self { capacity, entries: Mutex::new(VecDeque::with_capacity(capacity)), file_path: Some(file_path) }
    }

    pub async fn log(
        &self,
        subscription: &WebhookSubscription,
        payload: &WebhookPayload,
        attempt: u32,
        result: &DeliveryAttemptResult,
    ) {
        let entry = DeliveryLogEntry {
            id: Uuid::new_v4(),
            url: subscription.url.clone(),
            event: payload.event,
            attempt,
            success: result.success,
            status_code: result.status_code,
            error: result.error.clone(),
            response_time_ms: result.response_time_ms,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            payload: payload.clone(),
        };

        {
            let mut entries = self.entries.lock().await;
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry.clone());
        }

        if let Some(path) = &self.file_path {
            if let Err(error) = append_to_file(path, &entry).await {
                warn!(%error, "failed to append delivery log entry to file");
            }
        }
    }

    pub async fn get_recent(&self, limit: usize) -> Vec<DeliveryLogEntry> {
        let entries = self.entries.lock().await;
        entries.iter().rev().take(limit).cloned().collect()
    }

    pub async fn get_by_url(&self, url: &str) -> Vec<DeliveryLogEntry> {
        let entries = self.entries.lock().await;
        entries.iter().filter(|e| e.url == url).cloned().collect()
    }

    pub async fn get_success_rate(&self) -> f64 {
        let entries = self.entries.lock().await;
        if entries.is_empty() {
            return 1.0;
        }
        let successes = entries.iter().filter(|e| e.success).count();
        successes as f64 / entries.len() as f64
    }

    pub async fn get_average_response_time_ms(&self) -> f64 {
        let entries = self.entries.lock().await;
        if entries.is_empty() {
            return 0.0;
        }
        let total: u64 = entries.iter().map(|e| e.response_time_ms).sum();
        total as f64 / entries.len() as f64
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn clear_before(&self, timestamp_ms: i64) {
        self.entries.lock().await.retain(|e| e.timestamp_ms >= timestamp_ms);
    }
}

async fn append_to_file(path: &PathBuf, entry: &DeliveryLogEntry) -> std::io::Result<()> {
    let line = serde_json::to_string(entry).unwrap_or_default();
    let mut file = tokio::fs::OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await?;
    Ok(())
}
