use serde_json::json;

use super::{Fields, TestNotification, check_response, request_failed};

const ALERTS_URL: &str = "https://api.opsgenie.com/v2/alerts";

pub async fn send(
    client: &reqwest::Client,
    settings: &Fields<'_>,
    notification: &TestNotification,
) -> Result<(), String> {
    let api_key = settings.require("apiKey")?;
    let url = settings.str("apiUrl").unwrap_or(ALERTS_URL);
    let payload = build_payload(notification, settings);

    let response = client
        .post(url)
        .header("Authorization", format!("GenieKey {}", api_key))
        .json(&payload)
        .send()
        .await
        .map_err(|e| request_failed("opsgenie", e))?;

    check_response("opsgenie", response).await
}

pub fn build_payload(notification: &TestNotification, settings: &Fields<'_>) -> serde_json::Value {
    let send_as = settings.str("sendTagsAs").unwrap_or("tags");

    let mut tags = vec![json!("rcvtest")];
    let mut details = serde_json::Map::new();
    for (name, value) in notification.labels.iter() {
        if matches!(send_as, "tags" | "both") {
            tags.push(json!(format!("{}={}", name, value)));
        }
        if matches!(send_as, "details" | "both") {
            details.insert(name.to_string(), json!(value));
        }
    }

    let message = settings
        .str("message")
        .map(str::to_string)
        .unwrap_or_else(|| notification.title());
    let description = settings
        .str("description")
        .map(str::to_string)
        .unwrap_or_else(|| notification.message());

    let mut payload = json!({
        "message": message,
        "alias": notification.fingerprint,
        "description": description,
        "source": "rcvtest",
        "tags": tags,
        "details": details,
    });

    if settings.flag("overridePriority") {
        if let Some(priority) = notification
            .labels
            .get("og_priority")
            .filter(|p| matches!(*p, "P1" | "P2" | "P3" | "P4" | "P5"))
        {
            payload["priority"] = json!(priority);
        }
    }

    let responders: Vec<serde_json::Value> = settings
        .list("responders")
        .into_iter()
        .map(|name| json!({"type": "team", "name": name}))
        .collect();
    if !responders.is_empty() {
        payload["responders"] = json!(responders);
    }

    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Alert, AlertParams};
    use std::collections::HashMap;

    fn notification_with(labels: &[(&str, &str)]) -> TestNotification {
        let labels: HashMap<String, String> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let params = AlertParams::build(&Alert::new(labels, HashMap::new())).unwrap();
        TestNotification::new("test-receiver", &params)
    }

    #[test]
    fn test_opsgenie_payload_structure() {
        let notification = notification_with(&[]);
        let settings = json!({});
        let payload = build_payload(&notification, &Fields::new(settings.as_object().unwrap()));
        assert_eq!(payload["source"], "rcvtest");
        assert_eq!(payload["message"], "[FIRING:1] TestAlert");
        let tags = payload["tags"].as_array().unwrap();
        assert_eq!(tags.len(), 3);
        assert!(payload.get("priority").is_none());
    }

    #[test]
    fn test_opsgenie_details_and_priority() {
        let notification = notification_with(&[("og_priority", "P2")]);
        let settings = json!({"sendTagsAs": "details", "overridePriority": true, "responders": "sre"});
        let payload = build_payload(&notification, &Fields::new(settings.as_object().unwrap()));
        assert_eq!(payload["tags"].as_array().unwrap().len(), 1);
        assert_eq!(payload["details"]["og_priority"], "P2");
        assert_eq!(payload["priority"], "P2");
        assert_eq!(payload["responders"][0]["name"], "sre");
    }
}
