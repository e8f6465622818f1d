//! Receiver integration testing.
//!
//! [`ReceiverTestingService::test`] reconstitutes a deliverable integration
//! from a caller's submission and sends one synthetic alert through the
//! caller's organization dispatcher. Nothing is persisted.

mod patch;

pub use patch::*;

use std::sync::Arc;
use std::time::Instant;

use crate::db::ReceiverStore;
use crate::domain::{Alert, AlertParams, Caller, Integration, IntegrationTestResult};
use crate::error::{RcvtestError, Result};
use crate::notifier::DispatcherResolver;
use crate::observability::{INTEGRATION_TESTS, INTEGRATION_TEST_DURATION};
use crate::schema::SchemaRegistry;
use crate::secrets::{ScopedDecrypter, SecretsService};

/// Receiver name handed to dispatchers for test deliveries.
pub const TEST_RECEIVER_NAME: &str = "test-receiver";

const UNKNOWN_TYPE_LABEL: &str = "unknown";

pub struct ReceiverTestingService {
    receivers: Arc<dyn ReceiverStore>,
    dispatchers: Arc<dyn DispatcherResolver>,
    secrets: Arc<dyn SecretsService>,
    schemas: Arc<SchemaRegistry>,
}

impl ReceiverTestingService {
    pub fn new(
        receivers: Arc<dyn ReceiverStore>,
        dispatchers: Arc<dyn DispatcherResolver>,
        secrets: Arc<dyn SecretsService>,
        schemas: Arc<SchemaRegistry>,
    ) -> Self {
        Self {
            receivers,
            dispatchers,
            secrets,
            schemas,
        }
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    /// Run one test delivery of `alert` through `integration`.
    ///
    /// `required_secret_keys` name the secure fields to take from the stored
    /// integration with the same UID in receiver `receiver_uid` instead of from
    /// the submission. A delivery the channel rejects is a successful call whose
    /// result carries the error; every other failure aborts with `Err`.
    pub async fn test(
        &self,
        caller: &Caller,
        alert: &Alert,
        receiver_uid: &str,
        integration: &Integration,
        required_secret_keys: &[String],
    ) -> Result<IntegrationTestResult> {
        let integration_type = integration.integration_type.as_str();
        let metric_type = self.metric_type(integration);

        let outcome = self
            .run(caller, alert, receiver_uid, integration, required_secret_keys)
            .await;

        let label = match &outcome {
            Ok(result) if result.is_success() => "success",
            Ok(_) => "delivery_failed",
            Err(_) => "error",
        };
        INTEGRATION_TESTS
            .with_label_values(&[metric_type, label])
            .inc();

        match &outcome {
            Ok(result) => {
                INTEGRATION_TEST_DURATION
                    .with_label_values(&[metric_type])
                    .observe(result.last_notify_attempt_duration.as_secs_f64());
                tracing::info!(
                    org_id = caller.org_id,
                    subject = %caller.subject,
                    integration_type,
                    integration_uid = %integration.uid,
                    outcome = label,
                    duration_ms = result.last_notify_attempt_duration.as_millis() as u64,
                    "integration test finished"
                );
            }
            Err(e) => tracing::info!(
                org_id = caller.org_id,
                subject = %caller.subject,
                integration_type,
                integration_uid = %integration.uid,
                error = %e,
                "integration test aborted"
            ),
        }

        outcome
    }

    /// Metric label for an integration. Types without a registered schema
    /// share one label so callers cannot mint new series.
    fn metric_type<'a>(&self, integration: &'a Integration) -> &'a str {
        let integration_type = integration.integration_type.as_str();
        if self
            .schemas
            .get(integration_type, &integration.version)
            .is_some()
        {
            integration_type
        } else {
            UNKNOWN_TYPE_LABEL
        }
    }

    async fn run(
        &self,
        caller: &Caller,
        alert: &Alert,
        receiver_uid: &str,
        integration: &Integration,
        required_secret_keys: &[String],
    ) -> Result<IntegrationTestResult> {
        let params = AlertParams::build(alert)?;

        let mut patched = patch_secrets(
            self.receivers.as_ref(),
            caller,
            receiver_uid,
            integration,
            required_secret_keys,
        )
        .await?;

        let decrypter = ScopedDecrypter::new(Arc::clone(&self.secrets), caller);
        self.schemas.validate(&patched, &decrypter).await?;
        patched.decrypt(&decrypter).await?;

        let dispatcher = self.dispatchers.dispatcher_for(caller.org_id).await?;

        let attempted_at = chrono::Utc::now();
        let started = Instant::now();
        match dispatcher
            .test_send(TEST_RECEIVER_NAME, &patched, &params)
            .await
        {
            Ok(status) => Ok(IntegrationTestResult {
                last_notify_attempt: status.last_notify_attempt,
                last_notify_attempt_duration: status.last_notify_attempt_duration,
                last_notify_attempt_error: status.last_notify_attempt_error.unwrap_or_default(),
            }),
            Err(RcvtestError::DeliveryFailed(reason)) => Ok(IntegrationTestResult {
                last_notify_attempt: attempted_at,
                last_notify_attempt_duration: started.elapsed(),
                last_notify_attempt_error: reason,
            }),
            Err(e) => Err(e),
        }
    }
}
