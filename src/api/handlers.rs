use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use super::auth::authorize_test;
use crate::AppState;
use crate::config::AuthMode;
use crate::domain::{Alert, Caller, Integration, IntegrationTestResult};
use crate::error::RcvtestError;
use crate::observability::{AuditEntry, gather_metrics, update_db_pool_metrics};

// Request/Response types

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AlertPayload {
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationPayload {
    #[serde(default)]
    pub uid: String,
    #[serde(rename = "type")]
    pub integration_type: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub disable_resolve_message: bool,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub settings: Map<String, Value>,
    /// Secure fields to resolve from the stored integration with the same uid
    #[serde(default)]
    pub secure_fields: BTreeMap<String, bool>,
}

impl IntegrationPayload {
    /// Split into the integration and the secure field keys flagged `true`.
    fn into_parts(self) -> (Integration, Vec<String>) {
        let required_secret_keys = self
            .secure_fields
            .into_iter()
            .filter_map(|(key, resolve)| resolve.then_some(key))
            .collect();

        let integration = Integration {
            uid: self.uid,
            integration_type: self.integration_type,
            version: self.version,
            disable_resolve_message: self.disable_resolve_message,
            settings: self.settings,
            secure_settings: BTreeMap::new(),
        };
        (integration, required_secret_keys)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TestReceiverRequest {
    #[serde(default)]
    pub alert: AlertPayload,
    /// UID of the stored receiver holding the integration's secrets
    #[serde(default)]
    pub receiver_ref: Option<String>,
    pub integration: IntegrationPayload,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TestReceiverResponse {
    pub timestamp: DateTime<Utc>,
    /// Seconds with millisecond precision, e.g. "0.153s"
    pub duration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<IntegrationTestResult> for TestReceiverResponse {
    fn from(result: IntegrationTestResult) -> Self {
        Self {
            timestamp: result.last_notify_attempt,
            duration: format_duration(result.last_notify_attempt_duration),
            error: (!result.last_notify_attempt_error.is_empty())
                .then_some(result.last_notify_attempt_error),
        }
    }
}

fn format_duration(d: Duration) -> String {
    format!("{:.3}s", d.as_secs_f64())
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize, ToSchema)]
pub struct PublicHealthResponse {
    pub status: String,
    pub version: String,
    pub auth_mode: String,
    pub uptime_seconds: u64,
    pub integration_types: Vec<String>,
}

// Handlers

/// Public health check (no auth required)
#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = PublicHealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let auth_mode = match state.settings.http.auth.mode {
        AuthMode::Bearer => "bearer",
        AuthMode::None => "none",
    };

    Json(PublicHealthResponse {
        status: if state.is_shutting_down() {
            "draining".to_string()
        } else {
            "ok".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        auth_mode: auth_mode.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        integration_types: state
            .service
            .schemas()
            .types()
            .into_iter()
            .map(String::from)
            .collect(),
    })
}

/// Send one synthetic alert through an integration
#[utoipa::path(
    post,
    path = "/v1/receivers/test",
    tag = "receivers",
    request_body = TestReceiverRequest,
    responses(
        (status = 200, description = "Test ran; error is set if the channel rejected it", body = TestReceiverResponse),
        (status = 400, description = "Invalid alert or integration", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller may not test receivers", body = ErrorResponse),
        (status = 404, description = "Receiver or integration not found", body = ErrorResponse),
        (status = 503, description = "No dispatcher for the caller's organization, or the service is draining", body = ErrorResponse),
        (status = 504, description = "Test did not finish in time", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn test_receiver(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<TestReceiverRequest>, JsonRejection>,
) -> Result<Json<TestReceiverResponse>, AppError> {
    authorize_test(&caller)?;
    if state.is_shutting_down() {
        return Err(RcvtestError::ShuttingDown.into());
    }
    let Json(request) = payload.map_err(|e| RcvtestError::InvalidRequest(e.body_text()))?;

    let alert = Alert::new(request.alert.labels, request.alert.annotations);
    let receiver_ref = request.receiver_ref.unwrap_or_default();
    let (integration, required_secret_keys) = request.integration.into_parts();

    let deadline = Duration::from_secs(state.settings.http.request_timeout_seconds);
    let outcome = tokio::time::timeout(
        deadline,
        state.service.test(
            &caller,
            &alert,
            &receiver_ref,
            &integration,
            &required_secret_keys,
        ),
    )
    .await
    .unwrap_or_else(|_| Err(RcvtestError::DeadlineExceeded));

    let outcome_label = match &outcome {
        Ok(result) if result.is_success() => "success",
        Ok(_) => "delivery_failed",
        Err(e) => e.kind(),
    };
    state.audit(&AuditEntry::integration_tested(
        &caller,
        &integration.integration_type,
        &integration.uid,
        (!receiver_ref.is_empty()).then_some(receiver_ref.as_str()),
        outcome_label,
    ));

    Ok(Json(outcome?.into()))
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Some(pool) = &state.db_pool {
        update_db_pool_metrics(pool);
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        gather_metrics(),
    )
}

// Error handling

pub struct AppError(pub RcvtestError);

impl From<RcvtestError> for AppError {
    fn from(err: RcvtestError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let message = match &self.0 {
            RcvtestError::Database(_) => {
                tracing::error!(error = %self.0, "storage failure");
                "receiver storage unavailable".to_string()
            }
            RcvtestError::Internal(_) | RcvtestError::Config(_) => {
                tracing::error!(error = %self.0, "internal failure");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
