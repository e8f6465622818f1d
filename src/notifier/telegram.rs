use serde_json::json;

use super::{Fields, TestNotification, check_response, request_failed};

pub async fn send(
    client: &reqwest::Client,
    settings: &Fields<'_>,
    notification: &TestNotification,
) -> Result<(), String> {
    let bot_token = settings.require("bottoken")?;
    let url = format!("https://api.telegram.org/bot{}/sendMessage", bot_token);
    let payload = build_payload(notification, settings)?;

    let response = client
        .post(&url)
        .json(&payload)
        .send()
        .await
        .map_err(|e| request_failed("telegram", e))?;

    check_response("telegram", response).await
}

pub fn build_payload(
    notification: &TestNotification,
    settings: &Fields<'_>,
) -> Result<serde_json::Value, String> {
    let chat_id = settings
        .id("chatid")
        .ok_or_else(|| "missing setting chatid".to_string())?;
    let parse_mode = settings.str("parse_mode").unwrap_or("HTML");
    let text = match settings.str("message") {
        Some(message) => message.to_string(),
        None => build_message(notification, parse_mode == "HTML"),
    };

    let mut payload = json!({
        "chat_id": chat_id,
        "text": text,
        "disable_notification": settings.flag("disable_notifications"),
        "disable_web_page_preview": settings.flag("disable_web_page_preview"),
    });
    if parse_mode != "None" {
        payload["parse_mode"] = json!(parse_mode);
    }
    if let Some(thread) = settings.id("message_thread_id") {
        payload["message_thread_id"] = json!(thread);
    }
    Ok(payload)
}

pub fn build_message(notification: &TestNotification, html: bool) -> String {
    let escape = |s: &str| if html { html_escape(s) } else { s.to_string() };
    let bold = |s: &str| {
        if html {
            format!("<b>{}</b>", html_escape(s))
        } else {
            s.to_string()
        }
    };

    let mut lines = vec![
        format!("\u{1F534} {}", bold(&notification.title())),
        String::new(),
        escape(notification.summary()),
        String::new(),
    ];
    if let Some(description) = notification.description() {
        lines.push(escape(description));
        lines.push(String::new());
    }
    for (name, value) in notification.labels.iter() {
        lines.push(format!("{} {}", bold(&format!("{}:", name)), escape(value)));
    }
    lines.push(String::new());
    lines.push(format!(
        "rcvtest | {}",
        notification.starts_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    lines.join("\n")
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
