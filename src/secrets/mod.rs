mod envelope;
mod mock;

pub use envelope::*;
pub use mock::*;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;

use crate::domain::Caller;
use crate::error::{RcvtestError, Result};

/// At-rest encryption primitive. Ciphertext is bound to the organization that
/// sealed it.
#[async_trait]
pub trait SecretsService: Send + Sync {
    async fn encrypt(&self, org_id: i64, plaintext: &[u8]) -> Result<Vec<u8>>;

    async fn decrypt(&self, org_id: i64, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// Decryption capability handed to code that needs plaintext for one call.
#[async_trait]
pub trait SecretDecrypter: Send + Sync {
    /// Decode and decrypt the stored value of secure field `key`.
    async fn decrypt_field(&self, key: &str, encoded: &str) -> Result<String>;
}

/// [`SecretDecrypter`] bound to the caller's organization.
pub struct ScopedDecrypter {
    secrets: Arc<dyn SecretsService>,
    org_id: i64,
}

impl ScopedDecrypter {
    pub fn new(secrets: Arc<dyn SecretsService>, caller: &Caller) -> Self {
        Self {
            secrets,
            org_id: caller.org_id,
        }
    }
}

#[async_trait]
impl SecretDecrypter for ScopedDecrypter {
    async fn decrypt_field(&self, key: &str, encoded: &str) -> Result<String> {
        let failed = |reason: String| RcvtestError::DecryptionFailed {
            field: key.to_string(),
            reason,
        };

        let ciphertext = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| failed(format!("invalid base64: {}", e)))?;

        let plaintext = self
            .secrets
            .decrypt(self.org_id, &ciphertext)
            .await
            .map_err(|e| match e {
                RcvtestError::DecryptionFailed { reason, .. } => failed(reason),
                other => other,
            })?;

        String::from_utf8(plaintext).map_err(|_| failed("plaintext is not valid utf-8".to_string()))
    }
}

/// Encrypt `plaintext` for `org_id` and encode it the way integrations store it.
pub async fn seal_field(secrets: &dyn SecretsService, org_id: i64, plaintext: &str) -> Result<String> {
    let ciphertext = secrets.encrypt(org_id, plaintext.as_bytes()).await?;
    Ok(STANDARD.encode(ciphertext))
}
