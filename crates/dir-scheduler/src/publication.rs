use std::sync::Arc;

use dir_error::Error;
use dir_index::{Page, SearchIndex};
use dir_model::extract_labels;
use dir_routing::RoutingHost;
use dir_store::ContentStore;
use sqlx::SqlitePool;
use tokio::sync::Semaphore;

use crate::model::{PublicationRow, PublicationStatus, PublicationTarget, QuerySpec};
use crate::queue;

const TABLE: &str = "publications";

/// Turns durable `Publish(request)` intent into DHT announcements.
#[derive(Clone)]
pub struct PublicationScheduler {
    pool: SqlitePool,
    store: Arc<ContentStore>,
    index: Arc<SearchIndex>,
    routing: Arc<RoutingHost>,
}

impl PublicationScheduler {
    pub fn new(
        pool: SqlitePool,
        store: Arc<ContentStore>,
        index: Arc<SearchIndex>,
        routing: Arc<RoutingHost>,
    ) -> Self {
        PublicationScheduler { pool, store, index, routing }
    }

    /// `CreatePublication(request)`: validates and stores a
    /// PENDING row, returning its id.
    pub async fn create(&self, target: PublicationTarget) -> Result<String, Error> {
        target.validate()?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        let (record_refs, queries, all_records) = match &target {
            PublicationTarget::RecordRefs(refs) => {
                (Some(serde_json::to_string(refs).map_err(|e| Error::internal(e.to_string()))?), None, 0)
            }
            PublicationTarget::Queries(queries) => (
                None,
                Some(serde_json::to_string(queries).map_err(|e| Error::internal(e.to_string()))?),
                0,
            ),
            PublicationTarget::AllRecords => (None, None, 1),
        };

        sqlx::query(
            "INSERT INTO publications (id, status, record_refs, queries, all_records, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        )
        .bind(&id)
        .bind(PublicationStatus::Pending.as_str())
        .bind(record_refs)
        .bind(queries)
        .bind(all_records)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Result<PublicationRow, Error> {
        sqlx::query_as::<_, PublicationRow>("SELECT * FROM publications WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found(format!("publication {id} not found")))
    }

    pub async fn list(&self) -> Result<Vec<PublicationRow>, Error> {
        Ok(sqlx::query_as::<_, PublicationRow>("SELECT * FROM publications ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?)
    }

    /// One poll-and-dispatch iteration: claims PENDING rows up to `limit`
    /// and dispatches each to its own task, bounded by a worker pool sized
    /// `limit` wide, so a single round's claimed rows process
    /// concurrently rather than one at a time. Intended to be driven by
    /// `crate::worker::run_poll_loop`.
    #[tracing::instrument(skip(self))]
    pub async fn poll_once(&self, limit: i64) -> Result<usize, Error> {
        queue::revert_timed_out(
            &self.pool,
            TABLE,
            PublicationStatus::InProgress.as_str(),
            PublicationStatus::Pending.as_str(),
            chrono::Duration::seconds(60),
        )
        .await?;

        let ids = queue::claim_ready(
            &self.pool,
            TABLE,
            PublicationStatus::Pending.as_str(),
            PublicationStatus::InProgress.as_str(),
            limit,
        )
        .await?;
        let count = ids.len();

        let semaphore = Arc::new(Semaphore::new(limit.max(1) as usize));
        let mut handles = Vec::with_capacity(count);
        for id in ids {
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
            let this = self.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                if let Err(err) = this.process_one(&id).await {
                    tracing::warn!(%id, %err, "publication worker failed; leaving for retry or marking failed");
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
        Ok(count)
    }

    async fn process_one(&self, id: &str) -> Result<(), Error> {
        let row = self.get(id).await?;
        match self.run(&row).await {
            Ok(()) => {
                queue::finish(
                    &self.pool,
                    TABLE,
                    id,
                    PublicationStatus::InProgress.as_str(),
                    PublicationStatus::Completed.as_str(),
                    None,
                )
                .await
            }
            Err(Error::Unavailable(msg)) => {
                tracing::info!(%id, %msg, "transient publication error; will retry after timeout");
                Ok(())
            }
            Err(err) => {
                queue::finish(
                    &self.pool,
                    TABLE,
                    id,
                    PublicationStatus::InProgress.as_str(),
                    PublicationStatus::Failed.as_str(),
                    Some(&err.to_string()),
                )
                .await
            }
        }
    }

    /// Materializes the target CID set, then for each CID fetches the
    /// record, extracts labels, and announces on the DHT.
    async fn run(&self, row: &PublicationRow) -> Result<(), Error> {
        let cids = self.materialize_cids(row).await?;
        for cid in cids {
            let record_ref = dir_model::RecordRef { cid: cid.clone() };
            let record = self.store.pull(&record_ref).await?;
            let labels = extract_labels(&record);
            self.routing.publish(&cid, &labels).await?;
        }
        Ok(())
    }

    async fn materialize_cids(&self, row: &PublicationRow) -> Result<Vec<String>, Error> {
        if row.all_records != 0 {
            return self.index.get_record_cids(&[], Page::default()).await;
        }
        if let Some(raw) = &row.record_refs {
            let refs: Vec<String> =
                serde_json::from_str(raw).map_err(|e| Error::internal(e.to_string()))?;
            return Ok(refs);
        }
        if let Some(raw) = &row.queries {
            let specs: Vec<QuerySpec> =
                serde_json::from_str(raw).map_err(|e| Error::internal(e.to_string()))?;
            let filters: Vec<_> = specs.into_iter().map(QuerySpec::into_filter).collect();
            return self.index.get_record_cids(&filters, Page::default()).await;
        }
        Err(Error::Corrupt(format!("publication {} has no target set", row.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip_through_sql_literals() {
        assert_eq!(PublicationStatus::Pending.as_str(), "pending");
        assert_eq!(PublicationStatus::InProgress.as_str(), "in_progress");
    }
}
