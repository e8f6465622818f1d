use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::{Caller, Permission, Receiver};
use crate::error::{RcvtestError, Result};
use crate::secrets::{ScopedDecrypter, SecretsService};

#[async_trait]
pub trait ReceiverStore: Send + Sync {
    /// Fetch a receiver of the caller's organization.
    ///
    /// Receivers of other organizations are reported as `None`. With `decrypt`
    /// set, every integration comes back with plaintext settings and no
    /// `secure_settings`; otherwise stored ciphertext is returned untouched.
    async fn get_receiver(
        &self,
        uid: &str,
        decrypt: bool,
        caller: &Caller,
    ) -> Result<Option<Receiver>>;
}

/// Read policy shared by store implementations.
pub(crate) fn authorize_read(caller: &Caller, decrypt: bool) -> Result<()> {
    if !caller.can_read_receivers() {
        return Err(RcvtestError::Forbidden(format!(
            "{} may not read receivers",
            caller.subject
        )));
    }
    if decrypt && !caller.has(Permission::ReceiversReadSecrets) {
        return Err(RcvtestError::Forbidden(format!(
            "{} may not read receiver secrets",
            caller.subject
        )));
    }
    Ok(())
}

pub(crate) async fn decrypt_receiver(
    receiver: &mut Receiver,
    secrets: Option<&Arc<dyn SecretsService>>,
    caller: &Caller,
) -> Result<()> {
    let secrets = secrets.ok_or_else(|| {
        RcvtestError::Internal("receiver store has no secrets service configured".to_string())
    })?;
    let decrypter = ScopedDecrypter::new(Arc::clone(secrets), caller);
    for integration in &mut receiver.integrations {
        integration.decrypt(&decrypter).await?;
    }
    Ok(())
}
