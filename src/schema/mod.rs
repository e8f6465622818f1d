//! Settings schemas for integration types.
//!
//! Schemas are plain data registered by `(type, version)`. Validation walks the
//! declared fields of one schema; secure fields that are still encrypted are
//! decrypted on demand through the caller's [`SecretDecrypter`], so rules about
//! secret content always see plaintext.

mod builtin;

use serde_json::Value;
use std::collections::HashMap;

use crate::domain::Integration;
use crate::error::{FieldError, RcvtestError, Result};
use crate::secrets::SecretDecrypter;

pub const DEFAULT_VERSION: &str = "v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// Absolute `http` or `https` URL.
    Url,
    Bool,
    Number,
    /// String or integer identifier (chat ids, thread ids).
    Id,
    /// Array of strings, or one string separated by `,` or `;`.
    TextList,
    OneOf(&'static [&'static str]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub secure: bool,
}

impl FieldSpec {
    pub const fn new(key: &'static str, kind: FieldKind) -> Self {
        Self {
            key,
            kind,
            required: false,
            secure: false,
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn secure(mut self) -> Self {
        self.secure = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// At most one of the two may be set.
    Exclusive(&'static str, &'static str),
    /// At least one of the listed fields must be set.
    AnyOf(&'static [&'static str]),
    /// When `field` is set, `requires` must be set too.
    Requires {
        field: &'static str,
        requires: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct IntegrationSchema {
    pub integration_type: &'static str,
    pub version: &'static str,
    pub fields: Vec<FieldSpec>,
    pub rules: Vec<Rule>,
}

impl IntegrationSchema {
    pub fn secure_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().filter(|f| f.secure).map(|f| f.key)
    }
}

/// Lookup table of schemas.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<(String, String), IntegrationSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every integration type the notifier can deliver to.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for schema in builtin::schemas() {
            registry.register(schema);
        }
        registry
    }

    pub fn register(&mut self, schema: IntegrationSchema) {
        let key = (
            schema.integration_type.to_string(),
            normalize_version(schema.version),
        );
        self.schemas.insert(key, schema);
    }

    pub fn get(&self, integration_type: &str, version: &str) -> Option<&IntegrationSchema> {
        self.schemas
            .get(&(integration_type.to_string(), normalize_version(version)))
    }

    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.schemas.keys().map(|(t, _)| t.as_str()).collect();
        types.sort_unstable();
        types.dedup();
        types
    }

    pub async fn validate(
        &self,
        integration: &Integration,
        decrypter: &dyn SecretDecrypter,
    ) -> Result<()> {
        let schema = self
            .get(&integration.integration_type, &integration.version)
            .ok_or_else(|| {
                RcvtestError::ValidationFailed(FieldError::new(
                    "type",
                    format!(
                        "unsupported integration type {:?} version {:?}",
                        integration.integration_type, integration.version
                    ),
                ))
            })?;

        let mut view = SettingsView::new(integration, decrypter);

        for field in &schema.fields {
            match view.resolve(field.key).await? {
                None if field.required => {
                    return Err(RcvtestError::ValidationFailed(FieldError::setting(
                        field.key, "required",
                    )));
                }
                None => {}
                Some(value) => check_kind(field.kind, &value)
                    .map_err(|reason| RcvtestError::ValidationFailed(FieldError::setting(field.key, reason)))?,
            }
        }

        for rule in &schema.rules {
            match *rule {
                Rule::Exclusive(a, b) => {
                    if view.is_set(a).await? && view.is_set(b).await? {
                        return Err(RcvtestError::ValidationFailed(FieldError::setting(
                            b,
                            format!("cannot be set together with {}", a),
                        )));
                    }
                }
                Rule::AnyOf(keys) => {
                    let mut any = false;
                    for key in keys {
                        any |= view.is_set(key).await?;
                    }
                    if !any {
                        return Err(RcvtestError::ValidationFailed(FieldError::setting(
                            keys[0],
                            format!("one of {} is required", keys.join(", ")),
                        )));
                    }
                }
                Rule::Requires { field, requires } => {
                    if view.is_set(field).await? && !view.is_set(requires).await? {
                        return Err(RcvtestError::ValidationFailed(FieldError::setting(
                            requires,
                            format!("required when {} is set", field),
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

pub fn normalize_version(version: &str) -> String {
    let version = version.trim();
    if version.is_empty() {
        DEFAULT_VERSION.to_string()
    } else if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{}", version)
    }
}

/// Settings as seen by validation. Plain settings win; encrypted values are
/// decrypted the first time a rule asks for them and cached for the call.
struct SettingsView<'a> {
    integration: &'a Integration,
    decrypter: &'a dyn SecretDecrypter,
    resolved: HashMap<String, Option<Value>>,
}

impl<'a> SettingsView<'a> {
    fn new(integration: &'a Integration, decrypter: &'a dyn SecretDecrypter) -> Self {
        Self {
            integration,
            decrypter,
            resolved: HashMap::new(),
        }
    }

    async fn resolve(&mut self, key: &str) -> Result<Option<Value>> {
        if let Some(cached) = self.resolved.get(key) {
            return Ok(cached.clone());
        }

        let value = match self.integration.settings.get(key).filter(|v| !is_blank(v)) {
            Some(value) => Some(value.clone()),
            None => match self.integration.secure_settings.get(key) {
                Some(ciphertext) => {
                    let plaintext = self.decrypter.decrypt_field(key, ciphertext).await?;
                    Some(Value::String(plaintext)).filter(|v| !is_blank(v))
                }
                None => None,
            },
        };

        self.resolved.insert(key.to_string(), value.clone());
        Ok(value)
    }

    async fn is_set(&mut self, key: &str) -> Result<bool> {
        Ok(self.resolve(key).await?.is_some())
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

// Reasons never echo the value: it may be a secret.
fn check_kind(kind: FieldKind, value: &Value) -> std::result::Result<(), String> {
    match kind {
        FieldKind::Text => value
            .as_str()
            .map(|_| ())
            .ok_or_else(|| "must be a string".to_string()),
        FieldKind::Url => {
            let raw = value.as_str().ok_or("must be a string")?;
            match reqwest::Url::parse(raw.trim()) {
                Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
                _ => Err("must be an absolute http(s) URL".to_string()),
            }
        }
        FieldKind::Bool => match value {
            Value::Bool(_) => Ok(()),
            Value::String(s) if s.parse::<bool>().is_ok() => Ok(()),
            _ => Err("must be a boolean".to_string()),
        },
        FieldKind::Number => match value {
            Value::Number(_) => Ok(()),
            Value::String(s) if s.trim().parse::<f64>().is_ok() => Ok(()),
            _ => Err("must be a number".to_string()),
        },
        FieldKind::Id => match value {
            Value::String(_) => Ok(()),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(()),
            _ => Err("must be a string or an integer".to_string()),
        },
        FieldKind::TextList => match value {
            Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_string) => {
                Ok(())
            }
            Value::String(s) if s.split([',', ';']).any(|part| !part.trim().is_empty()) => Ok(()),
            _ => Err("must be a non-empty list of strings".to_string()),
        },
        FieldKind::OneOf(options) => match value.as_str() {
            Some(s) if options.contains(&s) => Ok(()),
            _ => Err(format!("must be one of {}", options.join(", "))),
        },
    }
}
