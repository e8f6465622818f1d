use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::{Aead, Payload};
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce};
use uuid::Uuid;

use super::SecretsService;
use crate::error::{RcvtestError, Result};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// ChaCha20-Poly1305 envelope: `nonce || ciphertext+tag`, with the organization id
/// as associated data.
pub struct EnvelopeSecrets {
    key: [u8; 32],
}

impl EnvelopeSecrets {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim().as_bytes())
            .map_err(|e| RcvtestError::Config(format!("secret key is not valid base64: {}", e)))?;
        let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            RcvtestError::Config(format!(
                "secret key must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self::new(key))
    }

    pub fn from_env(var: &str) -> Result<Self> {
        let encoded = std::env::var(var)
            .map_err(|_| RcvtestError::Config(format!("environment variable {} is not set", var)))?;
        Self::from_base64(&encoded)
    }

    fn cipher(&self) -> Result<ChaCha20Poly1305> {
        ChaCha20Poly1305::new_from_slice(&self.key)
            .map_err(|e| RcvtestError::Internal(format!("failed to initialize cipher: {}", e)))
    }
}

#[async_trait]
impl SecretsService for EnvelopeSecrets {
    async fn encrypt(&self, org_id: i64, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce_source = Uuid::new_v4();
        let nonce_bytes = &nonce_source.as_bytes()[..NONCE_LEN];
        let aad = org_id.to_be_bytes();

        let ciphertext = self
            .cipher()?
            .encrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: &aad,
                },
            )
            .map_err(|e| RcvtestError::Internal(format!("failed to encrypt secret: {}", e)))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    async fn decrypt(&self, org_id: i64, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < NONCE_LEN + TAG_LEN {
            return Err(RcvtestError::DecryptionFailed {
                field: String::new(),
                reason: "ciphertext too short".to_string(),
            });
        }

        let (nonce, body) = ciphertext.split_at(NONCE_LEN);
        let aad = org_id.to_be_bytes();

        self.cipher()?
            .decrypt(Nonce::from_slice(nonce), Payload { msg: body, aad: &aad })
            .map_err(|_| RcvtestError::DecryptionFailed {
                field: String::new(),
                reason: "authentication failed (corrupt value or wrong key)".to_string(),
            })
    }
}
