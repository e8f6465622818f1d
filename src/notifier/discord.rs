use serde_json::json;

use super::{Fields, TestNotification, check_response, request_failed};

const EMBED_COLOR_FIRING: u32 = 0xd63232;

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
        .map_err(|e| request_failed("discord", e))?;

    check_response("discord", response).await
}

pub fn build_payload(notification: &TestNotification, settings: &Fields<'_>) -> serde_json::Value {
    let fields: Vec<serde_json::Value> = notification
        .labels
        .iter()
        .map(|(name, value)| json!({"name": name, "value": value, "inline": true}))
        .collect();

    let title = settings
        .str("title")
        .map(str::to_string)
        .unwrap_or_else(|| notification.title());

    let embed = json!({
        "title": title,
        "description": notification.summary(),
        "color": EMBED_COLOR_FIRING,
        "fields": fields,
        "footer": {"text": "rcvtest"},
        "timestamp": notification.starts_at.to_rfc3339(),
    });

    let mut payload = json!({ "embeds": [embed] });
    if !settings.flag("use_discord_username") {
        payload["username"] = json!("rcvtest");
    }
    if let Some(message) = settings.str("message") {
        payload["content"] = json!(message);
    }
    if let Some(avatar) = settings.str("avatar_url") {
        payload["avatar_url"] = json!(avatar);
    }
    payload
}
