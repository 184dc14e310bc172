use dir_error::Error;
use sqlx::SqlitePool;

/// Claims up to `limit` rows of `table` whose `status` equals `from`,
/// atomically transitioning them to `to`, and returns their ids. SQLite has
/// no `FOR UPDATE SKIP LOCKED`; the equivalent CAS primitive here is a
/// `BEGIN IMMEDIATE` transaction (exclusive DB lock, no other writer can
/// interleave) wrapping a select-then-conditional-update pair, so at most
/// one worker claims a given row.
pub(crate) async fn claim_ready(
    pool: &SqlitePool,
    table: &str,
    from: &str,
    to: &str,
    limit: i64,
) -> Result<Vec<String>, Error> {
    let mut conn = pool.acquire().await?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

    let claim = async {
        let ids: Vec<String> = sqlx::query_scalar(&format!(
            "SELECT id FROM {table} WHERE status = ?1 ORDER BY created_at LIMIT ?2"
        ))
        .bind(from)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        if !ids.is_empty() {
            let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            let sql = format!(
                "UPDATE {table} SET status = ?, updated_at = ? WHERE id IN ({placeholders}) AND status = ?"
            );
            let mut query = sqlx::query(&sql).bind(to).bind(chrono::Utc::now().to_rfc3339());
            for id in &ids {
                query = query.bind(id);
            }
            query = query.bind(from);
            query.execute(&mut *conn).await?;
        }

        Ok::<_, sqlx::Error>(ids)
    }
    .await;

    match claim {
        Ok(ids) => {
            sqlx::query("COMMIT").execute(&mut *conn).await?;
            Ok(ids)
        }
        Err(err) => {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            Err(Error::from(err))
        }
    }
}

/// Reverts rows stuck in `in_progress` past `timeout` back to `pending`,
/// so a worker that crashed or hung mid-task doesn't strand the row
/// forever.
pub(crate) async fn revert_timed_out(
    pool: &SqlitePool,
    table: &str,
    in_progress: &str,
    pending: &str,
    timeout: chrono::Duration,
) -> Result<u64, Error> {
    let cutoff = (chrono::Utc::now() - timeout).to_rfc3339();
    let result = sqlx::query(&format!(
        "UPDATE {table} SET status = ?1, updated_at = ?2 WHERE status = ?3 AND updated_at < ?4"
    ))
    .bind(pending)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(in_progress)
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Terminal status transition, guarded so a row already moved on by
/// another worker (shouldn't happen, but cheap to guard) is left alone.
pub(crate) async fn finish(
    pool: &SqlitePool,
    table: &str,
    id: &str,
    from: &str,
    to: &str,
    error: Option<&str>,
) -> Result<(), Error> {
    sqlx::query(&format!(
        "UPDATE {table} SET status = ?1, error = ?2, updated_at = ?3 WHERE id = ?4 AND status = ?5"
    ))
    .bind(to)
    .bind(error)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(id)
    .bind(from)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        crate::MIGRATOR.run(&pool).await.unwrap();
        pool
    }

    async fn insert_publication(pool: &SqlitePool, id: &str, status: &str) {
        sqlx::query(
            "INSERT INTO publications (id, status, all_records, created_at, updated_at)
             VALUES (?1, ?2, 1, ?3, ?3)",
        )
        .bind(id)
        .bind(status)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn claim_ready_transitions_status_and_is_exclusive() {
        let pool = test_pool().await;
        insert_publication(&pool, "pub-1", "pending").await;
        insert_publication(&pool, "pub-2", "pending").await;

        let claimed = claim_ready(&pool, "publications", "pending", "in_progress", 10)
            .await
            .unwrap();
        assert_eq!(claimed.len(), 2);

        // A second claim finds nothing left in `pending`: at most one
        // worker processes a given row concurrently.
        let second = claim_ready(&pool, "publications", "pending", "in_progress", 10)
            .await
            .unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn revert_timed_out_resets_stale_in_progress_rows() {
        let pool = test_pool().await;
        insert_publication(&pool, "pub-1", "pending").await;
        claim_ready(&pool, "publications", "pending", "in_progress", 10).await.unwrap();

        // Simulate a worker timeout by backdating updated_at past the cutoff.
        sqlx::query("UPDATE publications SET updated_at = ?1 WHERE id = 'pub-1'")
            .bind((chrono::Utc::now() - chrono::Duration::seconds(120)).to_rfc3339())
            .execute(&pool)
            .await
            .unwrap();

        let reverted =
            revert_timed_out(&pool, "publications", "in_progress", "pending", chrono::Duration::seconds(60))
                .await
                .unwrap();
        assert_eq!(reverted, 1);

        let status: String = sqlx::query_scalar("SELECT status FROM publications WHERE id = 'pub-1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(status, "pending");
    }

    #[tokio::test]
    async fn finish_only_applies_to_matching_from_status() {
        let pool = test_pool().await;
        insert_publication(&pool, "pub-1", "pending").await;

        // No-op: row isn't in_progress yet.
        finish(&pool, "publications", "pub-1", "in_progress", "completed", None).await.unwrap();
        let status: String = sqlx::query_scalar("SELECT status FROM publications WHERE id = 'pub-1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(status, "pending");

        claim_ready(&pool, "publications", "pending", "in_progress", 10).await.unwrap();
        finish(&pool, "publications", "pub-1", "in_progress", "completed", None).await.unwrap();
        let status: String = sqlx::query_scalar("SELECT status FROM publications WHERE id = 'pub-1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(status, "completed");
    }
}
