use thiserror::Error;

#[derive(Error, Debug)]
pub enum RcvtestError {
    // Request errors
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid {field}: {reason}")]
    InvalidAlertInput { field: AlertField, reason: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("deadline exceeded before the integration test completed")]
    DeadlineExceeded,

    #[error("service is shutting down")]
    ShuttingDown,

    // Secret resolution errors
    #[error("cannot patch secrets: {0}")]
    MissingIdentity(String),

    #[error("receiver not found: {0}")]
    ReceiverNotFound(String),

    #[error("integration {integration_uid} not found in receiver {receiver_uid}")]
    IntegrationNotFound {
        receiver_uid: String,
        integration_uid: String,
    },

    #[error("failed to decrypt secure field {field}: {reason}")]
    DecryptionFailed { field: String, reason: String },

    // Validation errors
    #[error("integration validation failed: {0}")]
    ValidationFailed(FieldError),

    // Dispatch errors
    #[error("no active dispatcher for organization {org_id}")]
    DispatcherUnavailable { org_id: i64 },

    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Storage errors
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    // Config errors
    #[error("configuration error: {0}")]
    Config(String),

    // Internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// Which half of the synthetic alert failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertField {
    Labels,
    Annotations,
}

impl std::fmt::Display for AlertField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Labels => write!(f, "labels"),
            Self::Annotations => write!(f, "annotations"),
        }
    }
}

/// Structured schema violation, addressed by a dotted path such as `settings.url`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{path}: {reason}")]
pub struct FieldError {
    pub path: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn setting(key: &str, reason: impl Into<String>) -> Self {
        Self::new(format!("settings.{}", key), reason)
    }
}

pub type Result<T> = std::result::Result<T, RcvtestError>;

impl RcvtestError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidAlertInput { .. }
            | Self::MissingIdentity(_)
            | Self::ValidationFailed(_)
            | Self::Json(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::ReceiverNotFound(_) | Self::IntegrationNotFound { .. } => StatusCode::NOT_FOUND,
            Self::DispatcherUnavailable { .. } | Self::ShuttingDown => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short stable label for metrics and audit records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) | Self::Json(_) => "invalid_request",
            Self::InvalidAlertInput { .. } => "invalid_alert_input",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::ShuttingDown => "shutting_down",
            Self::MissingIdentity(_) => "missing_identity",
            Self::ReceiverNotFound(_) => "receiver_not_found",
            Self::IntegrationNotFound { .. } => "integration_not_found",
            Self::DecryptionFailed { .. } => "decryption_failed",
            Self::ValidationFailed(_) => "validation_failed",
            Self::DispatcherUnavailable { .. } => "dispatcher_unavailable",
            Self::DeliveryFailed(_) => "delivery_failed",
            Self::Database(_) => "storage",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            RcvtestError::MissingIdentity("no uid".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RcvtestError::ReceiverNotFound("r1".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RcvtestError::DispatcherUnavailable { org_id: 7 }.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            RcvtestError::ShuttingDown.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            RcvtestError::DecryptionFailed {
                field: "token".into(),
                reason: "bad tag".into()
            }
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_error_message_carries_path() {
        let err = RcvtestError::ValidationFailed(FieldError::setting("url", "required"));
        assert_eq!(
            err.to_string(),
            "integration validation failed: settings.url: required"
        );
        assert_eq!(err.kind(), "validation_failed");
    }

    #[test]
    fn test_invalid_alert_names_the_field() {
        let err = RcvtestError::InvalidAlertInput {
            field: AlertField::Labels,
            reason: "invalid name \"1x\"".into(),
        };
        assert!(err.to_string().starts_with("invalid labels:"));
    }
}
