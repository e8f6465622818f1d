use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use std::time::Duration;

use super::{Dispatcher, RawStatus};
use crate::domain::{AlertParams, Integration};
use crate::error::{RcvtestError, Result};

/// One recorded `test_send` call.
#[derive(Debug, Clone)]
pub struct SentTest {
    pub receiver_name: String,
    pub integration: Integration,
    pub params: AlertParams,
}

#[derive(Debug, Clone)]
enum Failure {
    /// Delivery attempted and rejected; reported in the status.
    Status(String),
    /// Dispatcher gave up before producing a status.
    Error(String),
}

/// Records every call instead of delivering anything.
#[derive(Debug, Default)]
pub struct MockDispatcher {
    sent: Mutex<Vec<SentTest>>,
    failure: Option<Failure>,
    latency: Duration,
}

impl MockDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_with(error: impl Into<String>) -> Self {
        Self {
            failure: Some(Failure::Status(error.into())),
            ..Default::default()
        }
    }

    /// Calls fail with `DeliveryFailed` instead of a status.
    pub fn erroring_with(error: impl Into<String>) -> Self {
        Self {
            failure: Some(Failure::Error(error.into())),
            ..Default::default()
        }
    }

    /// Each attempt sleeps this long and reports it as its duration.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn sent(&self) -> Vec<SentTest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Dispatcher for MockDispatcher {
    async fn test_send(
        &self,
        receiver_name: &str,
        integration: &Integration,
        params: &AlertParams,
    ) -> Result<RawStatus> {
        self.sent.lock().unwrap().push(SentTest {
            receiver_name: receiver_name.to_string(),
            integration: integration.clone(),
            params: params.clone(),
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let error = match &self.failure {
            Some(Failure::Error(e)) => return Err(RcvtestError::DeliveryFailed(e.clone())),
            Some(Failure::Status(e)) => Some(e.clone()),
            None => None,
        };

        Ok(RawStatus {
            last_notify_attempt: Utc::now(),
            last_notify_attempt_duration: self.latency,
            last_notify_attempt_error: error,
        })
    }
}
