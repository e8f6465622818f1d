use serde_json::json;

use super::{Fields, TestNotification, check_response, request_failed};

const SLACK_API_URL: &str = "https://slack.com/api/chat.postMessage";

/// Incoming webhook when only `url` is set; `chat.postMessage` with a bot
/// token otherwise (`url` then overrides the API endpoint).
pub async fn send(
    client: &reqwest::Client,
    settings: &Fields<'_>,
    notification: &TestNotification,
) -> Result<(), String> {
    let payload = build_payload(notification, settings);

    let response = match settings.str("token") {
        Some(token) => {
            let endpoint = settings.str("url").unwrap_or(SLACK_API_URL);
            client.post(endpoint).bearer_auth(token)
        }
        None => client.post(settings.require("url")?),
    }
    .json(&payload)
    .send()
    .await
    .map_err(|e| request_failed("slack", e))?;

    if settings.str("token").is_none() {
        return check_response("slack", response).await;
    }

    // The Web API answers 200 with {"ok": false} on failure.
    if !response.status().is_success() {
        return check_response("slack", response).await;
    }
    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| format!("slack returned an unreadable body: {}", e.without_url()))?;
    if body["ok"].as_bool() == Some(true) {
        Ok(())
    } else {
        let reason = body["error"].as_str().unwrap_or("unknown error");
        Err(format!("slack API error: {}", reason))
    }
}

pub fn build_payload(notification: &TestNotification, settings: &Fields<'_>) -> serde_json::Value {
    let fields: Vec<serde_json::Value> = notification
        .labels
        .iter()
        .map(|(name, value)| {
            json!({
                "type": "mrkdwn",
                "text": format!("*{}:* {}", name, value)
            })
        })
        .collect();

    let title = settings
        .str("title")
        .map(str::to_string)
        .unwrap_or_else(|| notification.title());
    let mut text = settings
        .str("text")
        .map(str::to_string)
        .unwrap_or_else(|| notification.summary().to_string());

    let mut mentions = Vec::new();
    if let Some(channel) = settings.str("mentionChannel") {
        mentions.push(format!("<!{}|{}>", channel, channel));
    }
    for user in settings.list("mentionUsers") {
        mentions.push(format!("<@{}>", user));
    }
    if !mentions.is_empty() {
        text = format!("{} {}", mentions.join(" "), text);
    }

    let blocks = vec![
        json!({
            "type": "header",
            "text": {
                "type": "plain_text",
                "text": title,
                "emoji": true
            }
        }),
        json!({
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": text
            }
        }),
        json!({
            "type": "section",
            "fields": fields
        }),
        json!({
            "type": "context",
            "elements": [{
                "type": "mrkdwn",
                "text": format!("rcvtest | {}", notification.starts_at.to_rfc3339())
            }]
        }),
    ];

    let mut payload = json!({
        "text": format!("{}: {}", title, text),
        "blocks": blocks,
    });

    if let Some(recipient) = settings.str("recipient") {
        payload["channel"] = json!(recipient);
    }
    if let Some(username) = settings.str("username") {
        payload["username"] = json!(username);
    }
    if let Some(emoji) = settings.str("icon_emoji") {
        payload["icon_emoji"] = json!(emoji);
    }
    if let Some(icon) = settings.str("icon_url") {
        payload["icon_url"] = json!(icon);
    }

    payload
}
