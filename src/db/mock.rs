use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::{ReceiverStore, authorize_read, decrypt_receiver};
use crate::domain::{Caller, Receiver};
use crate::error::Result;
use crate::secrets::SecretsService;

/// In-memory receiver store for tests and local runs.
#[derive(Default)]
pub struct MockReceiverStore {
    receivers: RwLock<Vec<(i64, Receiver)>>,
    secrets: Option<Arc<dyn SecretsService>>,
    latency: Option<Duration>,
    fetches: AtomicUsize,
}

impl MockReceiverStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secrets(mut self, secrets: Arc<dyn SecretsService>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Delay every fetch, simulating a slow backend.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, org_id: i64, receiver: Receiver) {
        let mut receivers = self.receivers.write().unwrap();
        receivers.retain(|(org, r)| !(*org == org_id && r.uid == receiver.uid));
        receivers.push((org_id, receiver));
    }

    /// Number of `get_receiver` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReceiverStore for MockReceiverStore {
    async fn get_receiver(
        &self,
        uid: &str,
        decrypt: bool,
        caller: &Caller,
    ) -> Result<Option<Receiver>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        authorize_read(caller, decrypt)?;

        let found = self
            .receivers
            .read()
            .unwrap()
            .iter()
            .find(|(org, r)| *org == caller.org_id && r.uid == uid)
            .map(|(_, r)| r.clone());

        let Some(mut receiver) = found else {
            return Ok(None);
        };
        if decrypt {
            decrypt_receiver(&mut receiver, self.secrets.as_ref(), caller).await?;
        }
        Ok(Some(receiver))
    }
}
