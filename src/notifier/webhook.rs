use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use super::{Fields, TestNotification, check_response, request_failed};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Rcvtest-Signature";

pub async fn send(
    client: &reqwest::Client,
    settings: &Fields<'_>,
    notification: &TestNotification,
) -> Result<(), String> {
    let url = settings.require("url")?;
    let payload = build_payload(notification, settings);
    let body =
        serde_json::to_vec(&payload).map_err(|e| format!("json serialization failed: {}", e))?;

    let mut request = match settings.str("http_method") {
        Some("PUT") => client.put(url),
        _ => client.post(url),
    }
    .header("Content-Type", "application/json")
    .header("User-Agent", "rcvtest-webhook/1.0");

    if let Some(username) = settings.str("username") {
        request = request.basic_auth(username, settings.str("password"));
    } else if let Some(credentials) = settings.str("authorization_credentials") {
        let scheme = settings.str("authorization_scheme").unwrap_or("Bearer");
        request = request.header("Authorization", format!("{} {}", scheme, credentials));
    }

    if let Some(secret) = settings.str("hmac_secret") {
        let signature = compute_signature(secret.as_bytes(), &body)?;
        request = request.header(SIGNATURE_HEADER, format!("sha256={}", signature));
    }

    let response = request
        .body(body)
        .send()
        .await
        .map_err(|e| request_failed("webhook", e))?;

    check_response("webhook", response).await
}

/// Alertmanager-compatible webhook body carrying the single test alert.
pub fn build_payload(notification: &TestNotification, settings: &Fields<'_>) -> serde_json::Value {
    let labels: serde_json::Map<_, _> = notification
        .labels
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect();
    let annotations: serde_json::Map<_, _> = notification
        .annotations
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect();

    let title = settings
        .str("title")
        .map(str::to_string)
        .unwrap_or_else(|| notification.title());
    let message = settings
        .str("message")
        .map(str::to_string)
        .unwrap_or_else(|| notification.message());

    json!({
        "receiver": notification.receiver,
        "status": notification.status(),
        "alerts": [{
            "status": notification.status(),
            "labels": labels,
            "annotations": annotations,
            "startsAt": notification.starts_at.to_rfc3339(),
            "fingerprint": notification.fingerprint,
        }],
        "groupLabels": { "alertname": notification.alert_name() },
        "commonLabels": labels,
        "commonAnnotations": annotations,
        "title": title,
        "message": message,
        "version": "1",
    })
}

fn compute_signature(secret: &[u8], body: &[u8]) -> Result<String, String> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|e| format!("invalid hmac key: {}", e))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AlertParams;

    #[test]
    fn test_hmac_signature() {
        let sig = compute_signature(b"my-secret", b"hello world").unwrap();
        assert_eq!(sig.len(), 64);
        assert_eq!(sig, compute_signature(b"my-secret", b"hello world").unwrap());
        assert_ne!(sig, compute_signature(b"other-secret", b"hello world").unwrap());
    }

    #[test]
    fn test_webhook_payload_structure() {
        let notification = TestNotification::new("test-receiver", &AlertParams::default());
        let settings = serde_json::json!({"url": "https://example.com/hook", "title": "custom"});
        let map = settings.as_object().unwrap();
        let payload = build_payload(&notification, &Fields::new(map));

        assert_eq!(payload["receiver"], "test-receiver");
        assert_eq!(payload["status"], "firing");
        assert_eq!(payload["title"], "custom");
        let alerts = payload["alerts"].as_array().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0]["labels"]["alertname"], "TestAlert");
        assert_eq!(alerts[0]["fingerprint"], notification.fingerprint.as_str());
    }
}
