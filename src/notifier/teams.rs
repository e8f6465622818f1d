use serde_json::json;

use super::{Fields, TestNotification, check_response, request_failed};

pub async fn send(
    client: &reqwest::Client,
    settings: &Fields<'_>,
    notification: &TestNotification,
) -> Result<(), String> {
    let url = settings.require("url")?;
    let payload = build_payload(notification, settings);

    let response = client
        .post(url)
        .json(&payload)
        .send()
        .await
        .map_err(|e| request_failed("teams", e))?;

    check_response("teams", response).await
}

/// Adaptive Card for a Teams Workflows webhook.
pub fn build_payload(notification: &TestNotification, settings: &Fields<'_>) -> serde_json::Value {
    let facts: Vec<serde_json::Value> = notification
        .labels
        .iter()
        .map(|(name, value)| json!({"title": name, "value": value}))
        .collect();

    let title = settings
        .str("title")
        .map(str::to_string)
        .unwrap_or_else(|| notification.title());
    let message = settings
        .str("message")
        .map(str::to_string)
        .unwrap_or_else(|| notification.summary().to_string());

    let mut body = vec![
        json!({
            "type": "TextBlock",
            "size": "Large",
            "weight": "Bolder",
            "text": title,
            "color": "Attention",
        }),
        json!({
            "type": "TextBlock",
            "text": message,
            "wrap": true,
        }),
    ];
    if let Some(section) = settings.str("sectiontitle") {
        body.push(json!({
            "type": "TextBlock",
            "weight": "Bolder",
            "text": section,
        }));
    }
    body.push(json!({
        "type": "FactSet",
        "facts": facts,
    }));
    body.push(json!({
        "type": "TextBlock",
        "text": format!("rcvtest | {}", notification.starts_at.to_rfc3339()),
        "size": "Small",
        "isSubtle": true,
    }));

    json!({
        "type": "message",
        "attachments": [{
            "contentType": "application/vnd.microsoft.card.adaptive",
            "contentUrl": null,
            "content": {
                "$schema": "http://adaptivecards.io/schemas/adaptive-card.json",
                "type": "AdaptiveCard",
                "version": "1.4",
                "body": body,
            }
        }]
    })
}
