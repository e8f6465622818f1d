use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::Result;
use crate::secrets::SecretDecrypter;

/// One configured delivery mechanism.
///
/// `secure_settings` holds base64 ciphertext for fields stored encrypted. Once
/// decrypted, a value moves into `settings` and leaves `secure_settings`, so a key
/// is never present in both after [`Integration::decrypt`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    #[serde(default)]
    pub uid: String,
    #[serde(rename = "type")]
    pub integration_type: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub disable_resolve_message: bool,
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secure_settings: BTreeMap<String, String>,
}

impl Integration {
    pub fn new(integration_type: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            integration_type: integration_type.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn with_secure_setting(mut self, key: impl Into<String>, ciphertext: impl Into<String>) -> Self {
        self.secure_settings.insert(key.into(), ciphertext.into());
        self
    }

    pub fn is_ephemeral(&self) -> bool {
        self.uid.is_empty()
    }

    /// Plain string setting, ignoring empty strings.
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Copy the stored ciphertext for each of `keys` from `existing`, replacing
    /// whatever the caller submitted for those keys. Returns the keys `existing`
    /// holds no secret for.
    pub fn with_existing_secure_fields(&mut self, existing: &Integration, keys: &[String]) -> Vec<String> {
        let mut missing = Vec::new();
        for key in keys {
            match existing.secure_settings.get(key) {
                Some(ciphertext) => {
                    self.settings.remove(key);
                    self.secure_settings.insert(key.clone(), ciphertext.clone());
                }
                None => missing.push(key.clone()),
            }
        }
        missing
    }

    /// Decrypt every field still held as ciphertext into `settings`.
    pub async fn decrypt(&mut self, decrypter: &dyn SecretDecrypter) -> Result<()> {
        let encrypted = std::mem::take(&mut self.secure_settings);
        for (key, ciphertext) in encrypted {
            let plaintext = decrypter.decrypt_field(&key, &ciphertext).await?;
            self.settings.insert(key, Value::String(plaintext));
        }
        Ok(())
    }
}

/// A named collection of integrations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub integrations: Vec<Integration>,
}

impl Receiver {
    pub fn find_integration(&self, uid: &str) -> Option<&Integration> {
        self.integrations.iter().find(|i| i.uid == uid)
    }
}

/// Outcome of one test delivery. An empty error means the attempt succeeded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegrationTestResult {
    pub last_notify_attempt: DateTime<Utc>,
    pub last_notify_attempt_duration: Duration,
    pub last_notify_attempt_error: String,
}

impl IntegrationTestResult {
    pub fn is_success(&self) -> bool {
        self.last_notify_attempt_error.is_empty()
    }
}
