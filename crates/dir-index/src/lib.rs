//! Embedded relational index mirroring record fields, used to answer
//! filtered search queries without walking the content store. Backed by
//! SQLite via `sqlx`; the schema is a denormalized projection of
//! `dir_model::Record` kept in sync by `add_record`/`remove_record`.

mod filters;

use dir_error::Error;
use dir_model::{Record, RecordData};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

pub use filters::{Filter, Page};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// The embedded index. Cheap to clone; wraps a pooled `SqlitePool`.
#[derive(Clone)]
pub struct SearchIndex {
    pool: SqlitePool,
}

impl SearchIndex {
    /// Opens (creating if absent) the SQLite database at `path` and runs
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, Error> {
        let opts: SqliteConnectOptions = path.parse::<SqliteConnectOptions>()?;
        let opts = opts.create_if_missing(true).foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(opts)
            .await?;
        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| Error::internal(e.to_string()))?;
        Ok(SearchIndex { pool })
    }

    /// In-memory database, primarily for tests.
    pub async fn open_in_memory() -> Result<Self, Error> {
        Self::open(":memory:").await
    }

    /// Mirrors `record` (addressed by `cid`) into the index. Idempotent:
    /// if a row with this CID already exists, this is a no-op.
    #[tracing::instrument(skip(self, record))]
    pub async fn add_record(&self, cid: &str, record: &Record) -> Result<(), Error> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM records WHERE cid = ?1")
            .bind(cid)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_some() {
            tracing::debug!(%cid, "add_record short-circuited: record already indexed");
            return Ok(());
        }

        let data = record.data();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO records (cid, name, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
        )
        .bind(cid)
        .bind(data.name())
        .bind(data.version())
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for skill in data.skills() {
            sqlx::query("INSERT INTO skills (record_cid, skill_id, name) VALUES (?1, ?2, ?3)")
                .bind(cid)
                .bind(skill.id)
                .bind(&skill.name)
                .execute(&mut *tx)
                .await?;
        }

        for locator in data.locators() {
            sqlx::query("INSERT INTO locators (record_cid, type, url) VALUES (?1, ?2, ?3)")
                .bind(cid)
                .bind(&locator.locator_type)
                .bind(&locator.url)
                .execute(&mut *tx)
                .await?;
        }

        for module in data.modules() {
            let version = module
                .data
                .get("version")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string);
            sqlx::query("INSERT INTO modules (record_cid, name, version) VALUES (?1, ?2, ?3)")
                .bind(cid)
                .bind(&module.name)
                .bind(version)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Removes `cid` and its child rows (cascade). A no-op, not an error,
    /// if the CID isn't present.
    #[tracing::instrument(skip(self))]
    pub async fn remove_record(&self, cid: &str) -> Result<(), Error> {
        sqlx::query("DELETE FROM records WHERE cid = ?1")
            .bind(cid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Returns the CIDs of records matching every present filter category
    /// (AND across categories, OR within a category), paginated.
    pub async fn get_record_cids(
        &self,
        filters: &[Filter],
        page: Page,
    ) -> Result<Vec<String>, Error> {
        let (sql, binds) = build_query("SELECT DISTINCT r.cid", filters, page)?;
        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = bind.apply(query);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|row| row.get::<String, _>("cid")).collect())
    }

    /// Like `get_record_cids` but returns full `RecordMeta`-shaped rows
    /// from the `records` table (cid, name, version, created_at).
    pub async fn get_records(
        &self,
        filters: &[Filter],
        page: Page,
    ) -> Result<Vec<IndexedRecord>, Error> {
        let (sql, binds) = build_query(
            "SELECT DISTINCT r.cid, r.name, r.version, r.created_at, r.updated_at",
            filters,
            page,
        )?;
        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = bind.apply(query);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(IndexedRecord {
                    cid: row.get("cid"),
                    name: row.get("name"),
                    version: row.get("version"),
                    created_at: row.get("created_at"),
                    updated_at: row.get("updated_at"),
                })
            })
            .collect()
    }
}

/// A row from the `records` table, as returned by `get_records`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRecord {
    pub cid: String,
    pub name: String,
    pub version: String,
    pub created_at: String,
    pub updated_at: String,
}

enum Bind {
    Text(String),
    Int(i64),
}

impl Bind {
    fn apply<'q>(
        &'q self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        match self {
            Bind::Text(s) => query.bind(s.as_str()),
            Bind::Int(i) => query.bind(*i),
        }
    }
}

/// Builds the dynamic `SELECT ... FROM records r` query for a filter set.
/// Every filter category joins the relevant child table and contributes
/// one `AND (cat1 OR cat2 OR ...)` clause; categories absent from
/// `filters` impose no constraint.
fn build_query(select: &str, filters: &[Filter], page: Page) -> Result<(String, Vec<Bind>), Error> {
    for f in filters {
        f.validate()?;
    }

    let mut from = String::from(" FROM records r");
    let mut wheres: Vec<String> = Vec::new();
    let mut binds: Vec<Bind> = Vec::new();
    let mut join_count = 0usize;

    let mut next_join = |from: &mut String, table: &str, join_count: &mut usize| -> String {
        *join_count += 1;
        let alias = format!("{}{}", table, join_count);
        from.push_str(&format!(" JOIN {} {} ON {}.record_cid = r.cid", table, alias, alias));
        alias
    };

    for filter in filters {
        match filter {
            Filter::Name(values) => {
                wheres.push(text_or_clause("r.name", values, &mut binds));
            }
            Filter::Version(values) => {
                wheres.push(text_or_clause("r.version", values, &mut binds));
            }
            Filter::SkillId(values) => {
                let alias = next_join(&mut from, "skills", &mut join_count);
                let clause = values
                    .iter()
                    .map(|v| {
                        binds.push(Bind::Int(*v));
                        format!("{}.skill_id = ?", alias)
                    })
                    .collect::<Vec<_>>()
                    .join(" OR ");
                wheres.push(format!("({})", clause));
            }
            Filter::SkillName(values) => {
                let alias = next_join(&mut from, "skills", &mut join_count);
                wheres.push(text_or_clause(&format!("{}.name", alias), values, &mut binds));
            }
            Filter::LocatorType(values) => {
                let alias = next_join(&mut from, "locators", &mut join_count);
                wheres.push(text_or_clause(&format!("{}.type", alias), values, &mut binds));
            }
            Filter::LocatorUrl(values) => {
                let alias = next_join(&mut from, "locators", &mut join_count);
                wheres.push(text_or_clause(&format!("{}.url", alias), values, &mut binds));
            }
            Filter::ModuleName(values) => {
                let alias = next_join(&mut from, "modules", &mut join_count);
                wheres.push(text_or_clause(&format!("{}.name", alias), values, &mut binds));
            }
            Filter::ModuleVersion(values) => {
                let alias = next_join(&mut from, "modules", &mut join_count);
                wheres.push(text_or_clause(&format!("{}.version", alias), values, &mut binds));
            }
        }
    }

    let mut sql = format!("{}{}", select, from);
    if !wheres.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&wheres.join(" AND "));
    }
    sql.push_str(" ORDER BY r.cid");

    if let Some(limit) = page.limit {
        sql.push_str(" LIMIT ?");
        binds.push(Bind::Int(limit));
        if let Some(offset) = page.offset {
            sql.push_str(" OFFSET ?");
            binds.push(Bind::Int(offset));
        }
    }

    Ok((sql, binds))
}

fn text_or_clause(column: &str, values: &[String], binds: &mut Vec<Bind>) -> String {
    let clause = values
        .iter()
        .map(|v| {
            let (op, pattern) = filters::like_or_exact(v);
            binds.push(Bind::Text(pattern));
            format!("{} {} ?", column, op)
        })
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("({})", clause)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dir_model::decode;

    fn record_json(name: &str, skill_name: &str, skill_id: i64) -> String {
        format!(
            r#"{{"name":"{name}","version":"1.0","schema_version":"v0.7.0",
                "skills":[{{"name":"{skill_name}","id":{skill_id}}}],
                "locators":[{{"type":"docker-image","url":"docker://example/{name}"}}],
                "modules":[{{"name":"runtime","data":{{"version":"2.0"}}}}]}}"#
        )
    }

    #[tokio::test]
    async fn add_is_idempotent() {
        let index = SearchIndex::open_in_memory().await.unwrap();
        let record = decode(record_json("agent-a", "nlp/completion", 1).as_bytes()).unwrap();
        index.add_record("cid1", &record).await.unwrap();

        let updated_at_after_first: String =
            sqlx::query_scalar("SELECT updated_at FROM records WHERE cid = 'cid1'")
                .fetch_one(&index.pool)
                .await
                .unwrap();

        index.add_record("cid1", &record).await.unwrap();

        let updated_at_after_second: String =
            sqlx::query_scalar("SELECT updated_at FROM records WHERE cid = 'cid1'")
                .fetch_one(&index.pool)
                .await
                .unwrap();
        assert_eq!(
            updated_at_after_first, updated_at_after_second,
            "re-adding an existing CID must be a true no-op, not just result-equivalent"
        );

        let rows = index
            .get_record_cids(&[Filter::SkillName(vec!["nlp/completion".to_string()])], Page::default())
            .await
            .unwrap();
        assert_eq!(rows, vec!["cid1".to_string()]);
    }

    #[tokio::test]
    async fn multi_version_skill_search_by_id_and_name() {
        let index = SearchIndex::open_in_memory().await.unwrap();
        let v1 = decode(record_json("agent-a", "nlp/completion", 10201).as_bytes()).unwrap();
        let v2 = decode(record_json("agent-a", "nlp/summarization", 10205).as_bytes()).unwrap();
        index.add_record("cid-v1", &v1).await.unwrap();
        index.add_record("cid-v2", &v2).await.unwrap();

        let by_id = index
            .get_record_cids(&[Filter::SkillId(vec![10201])], Page::default())
            .await
            .unwrap();
        assert_eq!(by_id, vec!["cid-v1".to_string()]);

        let by_name = index
            .get_record_cids(&[Filter::SkillName(vec!["nlp/summarization".to_string()])], Page::default())
            .await
            .unwrap();
        assert_eq!(by_name, vec!["cid-v2".to_string()]);

        let by_either = index
            .get_record_cids(
                &[Filter::SkillName(vec![
                    "nlp/completion".to_string(),
                    "nlp/summarization".to_string(),
                ])],
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(by_either.len(), 2);
    }

    #[tokio::test]
    async fn remove_cascades_to_zero_rows() {
        let index = SearchIndex::open_in_memory().await.unwrap();
        let record = decode(record_json("agent-a", "nlp/completion", 1).as_bytes()).unwrap();
        index.add_record("cid1", &record).await.unwrap();
        index.remove_record("cid1").await.unwrap();

        let rows = index.get_record_cids(&[], Page::default()).await.unwrap();
        assert!(rows.is_empty());

        let skill_rows = sqlx::query("SELECT COUNT(*) AS n FROM skills")
            .fetch_one(&index.pool)
            .await
            .unwrap();
        let n: i64 = skill_rows.get("n");
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn remove_missing_cid_is_a_no_op() {
        let index = SearchIndex::open_in_memory().await.unwrap();
        index.remove_record("does-not-exist").await.unwrap();
    }

    #[tokio::test]
    async fn wildcard_name_filter_matches_prefix() {
        let index = SearchIndex::open_in_memory().await.unwrap();
        let record = decode(record_json("agent-a", "nlp/completion", 1).as_bytes()).unwrap();
        index.add_record("cid1", &record).await.unwrap();

        let rows = index
            .get_record_cids(&[Filter::Name(vec!["agent-*".to_string()])], Page::default())
            .await
            .unwrap();
        assert_eq!(rows, vec!["cid1".to_string()]);
    }

    #[tokio::test]
    async fn empty_filter_category_is_rejected() {
        let index = SearchIndex::open_in_memory().await.unwrap();
        let err = index
            .get_record_cids(&[Filter::Name(Vec::new())], Page::default())
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn module_version_filter_matches_nested_module_data() {
        let index = SearchIndex::open_in_memory().await.unwrap();
        let record = decode(record_json("agent-a", "nlp/completion", 1).as_bytes()).unwrap();
        index.add_record("cid1", &record).await.unwrap();

        let rows = index
            .get_record_cids(&[Filter::ModuleVersion(vec!["2.0".to_string()])], Page::default())
            .await
            .unwrap();
        assert_eq!(rows, vec!["cid1".to_string()]);
    }
}
