use crate::db::ReceiverStore;
use crate::domain::{Caller, Integration};
use crate::error::{RcvtestError, Result};
use crate::observability::SECRET_PATCHES;

/// Merge the stored ciphertext of `required_secret_keys` into a copy of
/// `integration`.
///
/// The stored integration is the one with the same UID inside receiver
/// `receiver_uid` of the caller's organization. Patched keys stay encrypted;
/// keys not listed pass through as submitted. With no keys this is the
/// identity and the store is not touched.
pub async fn patch_secrets(
    store: &dyn ReceiverStore,
    caller: &Caller,
    receiver_uid: &str,
    integration: &Integration,
    required_secret_keys: &[String],
) -> Result<Integration> {
    if required_secret_keys.is_empty() {
        return Ok(integration.clone());
    }

    if integration.uid.is_empty() {
        SECRET_PATCHES.with_label_values(&["missing_identity"]).inc();
        return Err(RcvtestError::MissingIdentity(
            "secure fields require an integration uid".to_string(),
        ));
    }
    if receiver_uid.is_empty() {
        SECRET_PATCHES.with_label_values(&["missing_identity"]).inc();
        return Err(RcvtestError::MissingIdentity(
            "secure fields require a receiver reference".to_string(),
        ));
    }

    let receiver = store
        .get_receiver(receiver_uid, false, caller)
        .await?
        .ok_or_else(|| {
            SECRET_PATCHES.with_label_values(&["receiver_not_found"]).inc();
            RcvtestError::ReceiverNotFound(receiver_uid.to_string())
        })?;

    let existing = receiver.find_integration(&integration.uid).ok_or_else(|| {
        SECRET_PATCHES.with_label_values(&["integration_not_found"]).inc();
        RcvtestError::IntegrationNotFound {
            receiver_uid: receiver_uid.to_string(),
            integration_uid: integration.uid.clone(),
        }
    })?;

    let mut patched = integration.clone();
    let missing = patched.with_existing_secure_fields(existing, required_secret_keys);
    for key in &missing {
        tracing::debug!(
            receiver_uid,
            integration_uid = %integration.uid,
            key = %key,
            "stored integration has no secret for key, skipping"
        );
    }

    SECRET_PATCHES.with_label_values(&["patched"]).inc();
    Ok(patched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockReceiverStore;
    use crate::domain::{Permission, Receiver};

    fn caller() -> Caller {
        Caller::new("tester", 1, vec![Permission::ReceiversTest])
    }

    fn store() -> MockReceiverStore {
        let store = MockReceiverStore::new();
        store.insert(
            1,
            Receiver {
                uid: "r1".into(),
                name: "ops".into(),
                integrations: vec![
                    Integration::new("webhook", "v1")
                        .with_uid("i1")
                        .with_setting("url", "https://example.com/hook")
                        .with_secure_setting("password", "c3RvcmVk"),
                ],
            },
        );
        store
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_no_keys_is_identity_without_fetch() {
        let store = store();
        let input = Integration::new("webhook", "v1").with_setting("password", "typed");
        let out = patch_secrets(&store, &caller(), "", &input, &[]).await.unwrap();
        assert_eq!(out, input);
        assert_eq!(store.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_integration_uid() {
        let store = store();
        let input = Integration::new("webhook", "v1");
        let err = patch_secrets(&store, &caller(), "r1", &input, &keys(&["password"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RcvtestError::MissingIdentity(_)));
        assert_eq!(store.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_receiver_reference() {
        let store = store();
        let input = Integration::new("webhook", "v1").with_uid("i1");
        let err = patch_secrets(&store, &caller(), "", &input, &keys(&["password"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RcvtestError::MissingIdentity(_)));
    }

    #[tokio::test]
    async fn test_unknown_receiver_and_integration() {
        let store = store();
        let input = Integration::new("webhook", "v1").with_uid("i1");
        let err = patch_secrets(&store, &caller(), "nope", &input, &keys(&["password"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RcvtestError::ReceiverNotFound(ref uid) if uid == "nope"));

        let input = Integration::new("webhook", "v1").with_uid("i9");
        let err = patch_secrets(&store, &caller(), "r1", &input, &keys(&["password"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RcvtestError::IntegrationNotFound { .. }));
    }

    #[tokio::test]
    async fn test_stored_value_wins_and_others_pass_through() {
        let store = store();
        let input = Integration::new("webhook", "v1")
            .with_uid("i1")
            .with_setting("url", "https://changed.example.com")
            .with_setting("password", "caller-typed");
        let out = patch_secrets(&store, &caller(), "r1", &input, &keys(&["password", "hmac_secret"]))
            .await
            .unwrap();

        assert_eq!(out.secure_settings["password"], "c3RvcmVk");
        assert!(!out.settings.contains_key("password"));
        assert!(!out.secure_settings.contains_key("hmac_secret"));
        assert_eq!(out.setting_str("url"), Some("https://changed.example.com"));
        assert_eq!(input.setting_str("password"), Some("caller-typed"));
    }

    #[tokio::test]
    async fn test_store_policy_applies() {
        let store = store();
        let outsider = Caller::new("viewer", 1, vec![]);
        let input = Integration::new("webhook", "v1").with_uid("i1");
        let err = patch_secrets(&store, &outsider, "r1", &input, &keys(&["password"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RcvtestError::Forbidden(_)));
    }
}
