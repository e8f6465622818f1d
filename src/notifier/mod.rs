mod discord;
mod mock;
mod opsgenie;
mod pagerduty;
mod slack;
mod teams;
mod telegram;
mod webhook;

pub use mock::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::domain::{AlertParams, Integration, LabelSet};
use crate::error::{RcvtestError, Result};

pub const DEFAULT_ALERT_NAME: &str = "TestAlert";
pub const DEFAULT_INSTANCE: &str = "rcvtest";
pub const DEFAULT_SUMMARY: &str = "Notification test";

/// What a dispatcher reports for one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatus {
    pub last_notify_attempt: DateTime<Utc>,
    pub last_notify_attempt_duration: Duration,
    pub last_notify_attempt_error: Option<String>,
}

/// Per-organization delivery backend.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Deliver one synthetic alert through `integration`, whose settings are
    /// already plaintext. A failed delivery is reported in the status, not as
    /// an `Err`.
    async fn test_send(
        &self,
        receiver_name: &str,
        integration: &Integration,
        params: &AlertParams,
    ) -> Result<RawStatus>;
}

#[async_trait]
pub trait DispatcherResolver: Send + Sync {
    async fn dispatcher_for(&self, org_id: i64) -> Result<Arc<dyn Dispatcher>>;
}

/// The alert instance rendered to every channel.
#[derive(Debug, Clone)]
pub struct TestNotification {
    pub receiver: String,
    pub labels: LabelSet,
    pub annotations: LabelSet,
    pub starts_at: DateTime<Utc>,
    pub fingerprint: String,
}

impl TestNotification {
    /// Caller labels and annotations override the defaults.
    pub fn new(receiver: &str, params: &AlertParams) -> Self {
        let mut labels = LabelSet::new();
        labels.insert("alertname", DEFAULT_ALERT_NAME);
        labels.insert("instance", DEFAULT_INSTANCE);
        for (name, value) in params.labels.iter() {
            labels.insert(name, value);
        }

        let mut annotations = LabelSet::new();
        annotations.insert("summary", DEFAULT_SUMMARY);
        for (name, value) in params.annotations.iter() {
            annotations.insert(name, value);
        }

        let fingerprint = fingerprint(&labels);
        Self {
            receiver: receiver.to_string(),
            labels,
            annotations,
            starts_at: Utc::now(),
            fingerprint,
        }
    }

    pub fn status(&self) -> &'static str {
        "firing"
    }

    pub fn alert_name(&self) -> &str {
        self.labels.get("alertname").unwrap_or(DEFAULT_ALERT_NAME)
    }

    pub fn title(&self) -> String {
        format!("[FIRING:1] {}", self.alert_name())
    }

    pub fn summary(&self) -> &str {
        self.annotations.get("summary").unwrap_or(DEFAULT_SUMMARY)
    }

    pub fn description(&self) -> Option<&str> {
        self.annotations.get("description")
    }

    /// `severity` label, `critical` when unset.
    pub fn severity(&self) -> &str {
        self.labels.get("severity").unwrap_or("critical")
    }

    pub fn message(&self) -> String {
        let mut lines = vec![self.summary().to_string()];
        if let Some(description) = self.description() {
            lines.push(description.to_string());
        }
        lines.push(String::new());
        lines.push("Labels:".to_string());
        for (name, value) in self.labels.iter() {
            lines.push(format!(" - {} = {}", name, value));
        }
        lines.join("\n")
    }
}

/// First 16 hex chars of SHA-256 over the ordered label pairs.
pub fn fingerprint(labels: &LabelSet) -> String {
    let mut hasher = Sha256::new();
    for (name, value) in labels.iter() {
        hasher.update(name.as_bytes());
        hasher.update([0xff]);
        hasher.update(value.as_bytes());
        hasher.update([0xff]);
    }
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

/// Read access to plaintext integration settings, lenient about how scalars
/// were encoded.
pub(crate) struct Fields<'a>(&'a Map<String, Value>);

impl<'a> Fields<'a> {
    pub(crate) fn new(settings: &'a Map<String, Value>) -> Self {
        Self(settings)
    }

    pub(crate) fn str(&self, key: &str) -> Option<&'a str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub(crate) fn require(&self, key: &str) -> std::result::Result<&'a str, String> {
        self.str(key)
            .ok_or_else(|| format!("missing setting {}", key))
    }

    pub(crate) fn flag(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// String or integer identifiers, rendered as text.
    pub(crate) fn id(&self, key: &str) -> Option<String> {
        match self.0.get(key) {
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => self.str(key).map(str::to_string),
        }
    }

    pub(crate) fn list(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) => s
                .split([',', ';'])
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Turn a non-2xx response into an error carrying the status and a bounded
/// slice of the body.
pub(crate) async fn check_response(
    channel: &str,
    response: reqwest::Response,
) -> std::result::Result<(), String> {
    if response.status().is_success() {
        return Ok(());
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(256).collect();
    Err(format!("{} returned {}: {}", channel, status, body))
}

/// Request errors without the URL, which may embed a credential.
pub(crate) fn request_failed(channel: &str, err: reqwest::Error) -> String {
    format!("{} request failed: {}", channel, err.without_url())
}

/// Delivers test notifications for one organization over HTTP.
pub struct NotifierDispatcher {
    org_id: i64,
    http_client: reqwest::Client,
}

impl NotifierDispatcher {
    pub fn new(org_id: i64, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self::with_client(org_id, http_client)
    }

    pub fn with_client(org_id: i64, http_client: reqwest::Client) -> Self {
        Self {
            org_id,
            http_client,
        }
    }

    pub fn org_id(&self) -> i64 {
        self.org_id
    }

    async fn deliver(
        &self,
        integration: &Integration,
        notification: &TestNotification,
    ) -> std::result::Result<(), String> {
        let settings = Fields::new(&integration.settings);
        let client = &self.http_client;
        match integration.integration_type.as_str() {
            "webhook" => webhook::send(client, &settings, notification).await,
            "slack" => slack::send(client, &settings, notification).await,
            "discord" => discord::send(client, &settings, notification).await,
            "teams" => teams::send(client, &settings, notification).await,
            "telegram" => telegram::send(client, &settings, notification).await,
            "pagerduty" => pagerduty::send(client, &settings, notification).await,
            "opsgenie" => opsgenie::send(client, &settings, notification).await,
            other => Err(format!("no notifier for integration type {}", other)),
        }
    }
}

#[async_trait]
impl Dispatcher for NotifierDispatcher {
    async fn test_send(
        &self,
        receiver_name: &str,
        integration: &Integration,
        params: &AlertParams,
    ) -> Result<RawStatus> {
        let notification = TestNotification::new(receiver_name, params);

        let attempted_at = Utc::now();
        let started = Instant::now();
        let outcome = self.deliver(integration, &notification).await;
        let elapsed = started.elapsed();

        match &outcome {
            Ok(()) => tracing::debug!(
                org_id = self.org_id,
                integration_type = %integration.integration_type,
                fingerprint = %notification.fingerprint,
                "test notification delivered"
            ),
            Err(e) => tracing::warn!(
                org_id = self.org_id,
                integration_type = %integration.integration_type,
                error = %e,
                "test notification delivery failed"
            ),
        }

        Ok(RawStatus {
            last_notify_attempt: attempted_at,
            last_notify_attempt_duration: elapsed,
            last_notify_attempt_error: outcome.err(),
        })
    }
}

/// Registry of the dispatchers currently active, one per organization.
#[derive(Default)]
pub struct MultiOrgDispatcher {
    dispatchers: RwLock<HashMap<i64, Arc<dyn Dispatcher>>>,
}

impl MultiOrgDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, org_id: i64, dispatcher: Arc<dyn Dispatcher>) {
        self.dispatchers.write().await.insert(org_id, dispatcher);
        tracing::info!(org_id, "dispatcher registered");
    }

    pub async fn remove(&self, org_id: i64) -> bool {
        let removed = self.dispatchers.write().await.remove(&org_id).is_some();
        if removed {
            tracing::info!(org_id, "dispatcher removed");
        }
        removed
    }

    pub async fn orgs(&self) -> Vec<i64> {
        let mut orgs: Vec<i64> = self.dispatchers.read().await.keys().copied().collect();
        orgs.sort_unstable();
        orgs
    }
}

#[async_trait]
impl DispatcherResolver for MultiOrgDispatcher {
    async fn dispatcher_for(&self, org_id: i64) -> Result<Arc<dyn Dispatcher>> {
        self.dispatchers
            .read()
            .await
            .get(&org_id)
            .cloned()
            .ok_or(RcvtestError::DispatcherUnavailable { org_id })
    }
}
