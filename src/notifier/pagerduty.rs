use serde_json::json;

use super::{Fields, TestNotification, check_response, request_failed};

const EVENTS_URL: &str = "https://events.pagerduty.com/v2/enqueue";

pub async fn send(
    client: &reqwest::Client,
    settings: &Fields<'_>,
    notification: &TestNotification,
) -> Result<(), String> {
    let routing_key = settings.require("integrationKey")?;
    let events_url = settings.str("url").unwrap_or(EVENTS_URL);
    let payload = build_payload(notification, settings, routing_key);

    let response = client
        .post(events_url)
        .json(&payload)
        .send()
        .await
        .map_err(|e| request_failed("pagerduty", e))?;

    check_response("pagerduty", response).await
}

pub fn build_payload(
    notification: &TestNotification,
    settings: &Fields<'_>,
    routing_key: &str,
) -> serde_json::Value {
    let severity = settings.str("severity").unwrap_or(notification.severity());

    let custom_details: serde_json::Map<_, _> = notification
        .labels
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect();

    let mut payload = json!({
        "summary": settings.str("summary").unwrap_or(notification.summary()),
        "source": settings.str("source").unwrap_or("rcvtest"),
        "severity": severity,
        "timestamp": notification.starts_at.to_rfc3339(),
        "custom_details": custom_details,
    });
    for key in ["component", "class", "group"] {
        if let Some(value) = settings.str(key) {
            payload[key] = json!(value);
        }
    }

    json!({
        "routing_key": routing_key,
        "event_action": "trigger",
        "dedup_key": notification.fingerprint,
        "client": "rcvtest",
        "payload": payload,
    })
}
