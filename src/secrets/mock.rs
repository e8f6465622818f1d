use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::SecretsService;
use crate::error::{RcvtestError, Result};

/// Reversible fake for tests: `mock:<org>:<plaintext>`.
#[derive(Debug, Default)]
pub struct MockSecrets {
    fail_decrypt: AtomicBool,
    decrypt_calls: AtomicUsize,
}

impl MockSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every decrypt fails, as if the key had been rotated away.
    pub fn failing() -> Self {
        Self {
            fail_decrypt: AtomicBool::new(true),
            decrypt_calls: AtomicUsize::new(0),
        }
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }
}

fn prefix(org_id: i64) -> String {
    format!("mock:{}:", org_id)
}

#[async_trait]
impl SecretsService for MockSecrets {
    async fn encrypt(&self, org_id: i64, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut sealed = prefix(org_id).into_bytes();
        sealed.extend_from_slice(plaintext);
        Ok(sealed)
    }

    async fn decrypt(&self, org_id: i64, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_decrypt.load(Ordering::SeqCst) {
            return Err(RcvtestError::DecryptionFailed {
                field: String::new(),
                reason: "mock: decryption disabled".to_string(),
            });
        }
        ciphertext
            .strip_prefix(prefix(org_id).as_bytes())
            .map(<[u8]>::to_vec)
            .ok_or_else(|| RcvtestError::DecryptionFailed {
                field: String::new(),
                reason: "mock: ciphertext not sealed for this organization".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_secrets_counts_and_fails() {
        let ok = MockSecrets::new();
        let sealed = ok.encrypt(1, b"x").await.unwrap();
        assert_eq!(ok.decrypt(1, &sealed).await.unwrap(), b"x");
        assert_eq!(ok.decrypt_calls(), 1);

        let failing = MockSecrets::failing();
        assert!(failing.decrypt(1, &sealed).await.is_err());
    }
}
