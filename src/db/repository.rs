use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use std::sync::Arc;

use super::{ReceiverStore, authorize_read, decrypt_receiver};
use crate::domain::{Caller, Integration, Receiver};
use crate::error::Result;
use crate::secrets::SecretsService;

/// PostgreSQL-backed receiver store. Read-only: receivers are written by the
/// configuration service that owns them.
#[derive(Clone)]
pub struct Repository {
    pool: PgPool,
    secrets: Option<Arc<dyn SecretsService>>,
}

#[derive(sqlx::FromRow)]
struct ReceiverRow {
    uid: String,
    name: String,
    integrations: Json<Vec<Integration>>,
}

impl From<ReceiverRow> for Receiver {
    fn from(row: ReceiverRow) -> Self {
        Self {
            uid: row.uid,
            name: row.name,
            integrations: row.integrations.0,
        }
    }
}

impl Repository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            secrets: None,
        }
    }

    pub fn with_secrets(mut self, secrets: Arc<dyn SecretsService>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ReceiverStore for Repository {
    async fn get_receiver(
        &self,
        uid: &str,
        decrypt: bool,
        caller: &Caller,
    ) -> Result<Option<Receiver>> {
        authorize_read(caller, decrypt)?;

        let row = sqlx::query_as::<_, ReceiverRow>(
            r#"
            SELECT uid, name, integrations
            FROM receivers WHERE org_id = $1 AND uid = $2
            "#,
        )
        .bind(caller.org_id)
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut receiver = Receiver::from(row);
        if decrypt {
            decrypt_receiver(&mut receiver, self.secrets.as_ref(), caller).await?;
        }
        Ok(Some(receiver))
    }
}
