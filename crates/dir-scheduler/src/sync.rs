use std::sync::Arc;

use dir_error::Error;
use dir_index::SearchIndex;
use dir_model::RecordRef;
use dir_store::ContentStore;
use oci_client::secrets::RegistryAuth;
use sqlx::SqlitePool;
use tokio::sync::Semaphore;

use crate::model::{validate_remote_url, SyncRow, SyncStatus};
use crate::queue;

const TABLE: &str = "syncs";

/// Credentials handed back by a remote directory's `RequestRegistryCredentials`
/// RPC. Absence of any credential (the all-`None` case) means
/// the remote allows anonymous pull.
#[derive(Debug, Clone)]
pub struct RegistryCredentials {
    pub registry_address: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl RegistryCredentials {
    pub fn to_auth(&self) -> RegistryAuth {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => RegistryAuth::Basic(u.clone(), p.clone()),
            _ => RegistryAuth::Anonymous,
        }
    }
}

/// Requests registry credentials from a remote directory, presenting this
/// peer's id for authorization. Implemented by the gRPC client
/// wiring in the server binary; kept as a trait here so `dir-scheduler`
/// doesn't need to depend on the generated protocol stubs.
#[async_trait::async_trait]
pub trait RemoteCredentials: Send + Sync {
    async fn request_registry_credentials(
        &self,
        remote_url: &str,
        local_peer_id: &str,
    ) -> Result<RegistryCredentials, Error>;
}

/// A `RemoteCredentials` that always pulls anonymously, for remotes with no
/// credential RPC (or for tests).
pub struct AnonymousCredentials;

#[async_trait::async_trait]
impl RemoteCredentials for AnonymousCredentials {
    async fn request_registry_credentials(
        &self,
        remote_url: &str,
        _local_peer_id: &str,
    ) -> Result<RegistryCredentials, Error> {
        Ok(RegistryCredentials {
            registry_address: remote_url.to_string(),
            username: None,
            password: None,
        })
    }
}

/// Mirrors records from a remote directory into the local store.
#[derive(Clone)]
pub struct SyncScheduler {
    pool: SqlitePool,
    local_store: Arc<ContentStore>,
    local_index: Arc<SearchIndex>,
    credentials: Arc<dyn RemoteCredentials>,
    repository_name: String,
    local_peer_id: String,
}

impl SyncScheduler {
    pub fn new(
        pool: SqlitePool,
        local_store: Arc<ContentStore>,
        local_index: Arc<SearchIndex>,
        credentials: Arc<dyn RemoteCredentials>,
        repository_name: String,
        local_peer_id: String,
    ) -> Self {
        SyncScheduler {
            pool,
            local_store,
            local_index,
            credentials,
            repository_name,
            local_peer_id,
        }
    }

    /// `CreateSync(remote_url, cids[])`.
    pub async fn create(&self, remote_url: &str, cids: Vec<String>) -> Result<String, Error> {
        validate_remote_url(remote_url)?;
        if cids.is_empty() {
            return Err(Error::invalid_argument("sync cids must not be empty"));
        }
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO syncs (id, status, remote_url, cids, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        )
        .bind(&id)
        .bind(SyncStatus::Pending.as_str())
        .bind(remote_url)
        .bind(serde_json::to_string(&cids).map_err(|e| Error::internal(e.to_string()))?)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// `DeleteSync(id)`: marks DELETE_PENDING rather than hard-deleting,
    /// so the worker can release credentials first.
    pub async fn delete(&self, id: &str) -> Result<(), Error> {
        let result = sqlx::query("UPDATE syncs SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(SyncStatus::DeletePending.as_str())
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("sync {id} not found")));
        }
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<SyncRow, Error> {
        sqlx::query_as::<_, SyncRow>("SELECT * FROM syncs WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found(format!("sync {id} not found")))
    }

    pub async fn list(&self) -> Result<Vec<SyncRow>, Error> {
        Ok(sqlx::query_as::<_, SyncRow>("SELECT * FROM syncs ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?)
    }

    /// One poll-and-dispatch iteration: claims PENDING and DELETE_PENDING
    /// rows up to `limit` each, dispatching every claimed row to its own
    /// task bounded by a worker pool sized `limit` wide, so a single
    /// round's claimed rows process concurrently rather than one at a
    /// time.
    #[tracing::instrument(skip(self))]
    pub async fn poll_once(&self, limit: i64) -> Result<usize, Error> {
        queue::revert_timed_out(
            &self.pool,
            TABLE,
            SyncStatus::InProgress.as_str(),
            SyncStatus::Pending.as_str(),
            chrono::Duration::seconds(60),
        )
        .await?;

        let pending = queue::claim_ready(
            &self.pool,
            TABLE,
            SyncStatus::Pending.as_str(),
            SyncStatus::InProgress.as_str(),
            limit,
        )
        .await?;

        let deleting = queue::claim_ready(
            &self.pool,
            TABLE,
            SyncStatus::DeletePending.as_str(),
            SyncStatus::DeletePending.as_str(),
            limit,
        )
        .await?;

        let claimed = pending.len() + deleting.len();
        let semaphore = Arc::new(Semaphore::new(limit.max(1) as usize));
        let mut handles = Vec::with_capacity(claimed);

        for id in pending {
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
            let this = self.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                if let Err(err) = this.process_pending(&id).await {
                    tracing::warn!(%id, %err, "sync worker failed; leaving for retry or marking failed");
                }
            }));
        }

        for id in deleting {
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
            let this = self.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                // Releasing credentials is a no-op for the anonymous/basic-auth
                // model used here; the transition itself is the cleanup.
                let _ = queue::finish(
                    &this.pool,
                    TABLE,
                    &id,
                    SyncStatus::DeletePending.as_str(),
                    SyncStatus::Deleted.as_str(),
                    None,
                )
                .await;
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        Ok(claimed)
    }

    async fn process_pending(&self, id: &str) -> Result<(), Error> {
        let row = self.get(id).await?;
        match self.run(&row).await {
            Ok(()) => {
                queue::finish(
                    &self.pool,
                    TABLE,
                    id,
                    SyncStatus::InProgress.as_str(),
                    SyncStatus::Completed.as_str(),
                    None,
                )
                .await
            }
            Err(Error::Unavailable(msg)) => {
                tracing::info!(%id, %msg, "transient sync error; will retry after timeout");
                Ok(())
            }
            Err(err) => {
                queue::finish(
                    &self.pool,
                    TABLE,
                    id,
                    SyncStatus::InProgress.as_str(),
                    SyncStatus::Failed.as_str(),
                    Some(&err.to_string()),
                )
                .await
            }
        }
    }

    /// Requests credentials, then for each CID pulls from the remote
    /// registry and pushes to the local one.
    /// Content-addressing makes the push idempotent across peers.
    async fn run(&self, row: &SyncRow) -> Result<(), Error> {
        let creds = self
            .credentials
            .request_registry_credentials(&row.remote_url, &self.local_peer_id)
            .await?;
        let remote_store = ContentStore::new(
            creds.registry_address,
            self.repository_name.clone(),
            creds.to_auth(),
        );

        let cids: Vec<String> =
            serde_json::from_str(&row.cids).map_err(|e| Error::internal(e.to_string()))?;
        for cid in cids {
            let record_ref = RecordRef { cid };
            let record = remote_store.pull(&record_ref).await?;
            self.local_store.push(&record).await?;
            self.local_index.add_record(&record_ref.cid, &record).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_credentials_have_no_basic_auth() {
        let creds = RegistryCredentials {
            registry_address: "registry.example.com".to_string(),
            username: None,
            password: None,
        };
        assert!(matches!(creds.to_auth(), RegistryAuth::Anonymous));
    }
}
