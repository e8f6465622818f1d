use super::FieldKind::{Bool, Id, Number, OneOf, Text, TextList, Url};
use super::{FieldKind, FieldSpec, IntegrationSchema, Rule};

fn f(key: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec::new(key, kind)
}

pub(super) fn schemas() -> Vec<IntegrationSchema> {
    vec![
        webhook(),
        slack(),
        discord(),
        teams(),
        telegram(),
        pagerduty(),
        opsgenie(),
    ]
}

fn webhook() -> IntegrationSchema {
    IntegrationSchema {
        integration_type: "webhook",
        version: "v1",
        fields: vec![
            f("url", Url).required(),
            f("http_method", OneOf(&["POST", "PUT"])),
            f("username", Text),
            f("password", Text).secure(),
            f("authorization_scheme", Text),
            f("authorization_credentials", Text).secure(),
            f("hmac_secret", Text).secure(),
            f("max_alerts", Number),
            f("title", Text),
            f("message", Text),
        ],
        rules: vec![
            Rule::Exclusive("password", "authorization_credentials"),
            Rule::Exclusive("username", "authorization_credentials"),
            Rule::Requires {
                field: "password",
                requires: "username",
            },
            Rule::Requires {
                field: "authorization_scheme",
                requires: "authorization_credentials",
            },
        ],
    }
}

fn slack() -> IntegrationSchema {
    IntegrationSchema {
        integration_type: "slack",
        version: "v1",
        fields: vec![
            f("url", Url).secure(),
            f("token", Text).secure(),
            f("recipient", Text),
            f("username", Text),
            f("icon_emoji", Text),
            f("icon_url", Url),
            f("mentionChannel", OneOf(&["here", "channel"])),
            f("mentionUsers", TextList),
            f("title", Text),
            f("text", Text),
        ],
        rules: vec![
            Rule::AnyOf(&["url", "token"]),
            Rule::Requires {
                field: "token",
                requires: "recipient",
            },
        ],
    }
}

fn discord() -> IntegrationSchema {
    IntegrationSchema {
        integration_type: "discord",
        version: "v1",
        fields: vec![
            f("url", Url).required().secure(),
            f("avatar_url", Url),
            f("use_discord_username", Bool),
            f("title", Text),
            f("message", Text),
        ],
        rules: vec![],
    }
}

fn teams() -> IntegrationSchema {
    IntegrationSchema {
        integration_type: "teams",
        version: "v1",
        fields: vec![
            f("url", Url).required().secure(),
            f("title", Text),
            f("sectiontitle", Text),
            f("message", Text),
        ],
        rules: vec![],
    }
}

fn telegram() -> IntegrationSchema {
    IntegrationSchema {
        integration_type: "telegram",
        version: "v1",
        fields: vec![
            f("bottoken", Text).required().secure(),
            f("chatid", Id).required(),
            f("message_thread_id", Id),
            f("parse_mode", OneOf(&["HTML", "Markdown", "MarkdownV2", "None"])),
            f("disable_notifications", Bool),
            f("disable_web_page_preview", Bool),
            f("message", Text),
        ],
        rules: vec![],
    }
}

fn pagerduty() -> IntegrationSchema {
    IntegrationSchema {
        integration_type: "pagerduty",
        version: "v1",
        fields: vec![
            f("integrationKey", Text).required().secure(),
            f("severity", OneOf(&["critical", "error", "warning", "info"])),
            f("url", Url),
            f("source", Text),
            f("component", Text),
            f("class", Text),
            f("group", Text),
            f("summary", Text),
        ],
        rules: vec![],
    }
}

fn opsgenie() -> IntegrationSchema {
    IntegrationSchema {
        integration_type: "opsgenie",
        version: "v1",
        fields: vec![
            f("apiKey", Text).required().secure(),
            f("apiUrl", Url),
            f("message", Text),
            f("description", Text),
            f("responders", TextList),
            f("sendTagsAs", OneOf(&["tags", "details", "both"])),
            f("overridePriority", Bool),
        ],
        rules: vec![],
    }
}
