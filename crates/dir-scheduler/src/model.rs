use dir_error::Error;
use dir_index::Filter;
use serde::{Deserialize, Serialize};

/// How a publication's target CID set is specified: exactly
/// one of these three, never an empty collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PublicationTarget {
    RecordRefs(Vec<String>),
    Queries(Vec<QuerySpec>),
    AllRecords,
}

/// A serializable stand-in for a `dir_index::Filter`, since `Filter`
/// itself isn't `Serialize` (it's a query-builder type, not wire data).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QuerySpec {
    Name(Vec<String>),
    Version(Vec<String>),
    SkillId(Vec<i64>),
    SkillName(Vec<String>),
    LocatorType(Vec<String>),
    LocatorUrl(Vec<String>),
    ModuleName(Vec<String>),
    ModuleVersion(Vec<String>),
}

impl QuerySpec {
    pub fn into_filter(self) -> Filter {
        match self {
            QuerySpec::Name(v) => Filter::Name(v),
            QuerySpec::Version(v) => Filter::Version(v),
            QuerySpec::SkillId(v) => Filter::SkillId(v),
            QuerySpec::SkillName(v) => Filter::SkillName(v),
            QuerySpec::LocatorType(v) => Filter::LocatorType(v),
            QuerySpec::LocatorUrl(v) => Filter::LocatorUrl(v),
            QuerySpec::ModuleName(v) => Filter::ModuleName(v),
            QuerySpec::ModuleVersion(v) => Filter::ModuleVersion(v),
        }
    }
}

impl PublicationTarget {
    /// `CreatePublication` validation: exactly one of the three, and the
    /// chosen one must not be an empty collection.
    pub fn validate(&self) -> Result<(), Error> {
        let empty = match self {
            PublicationTarget::RecordRefs(v) => v.is_empty(),
            PublicationTarget::Queries(v) => v.is_empty(),
            PublicationTarget::AllRecords => false,
        };
        if empty {
            return Err(Error::invalid_argument(
                "publication target collection must not be empty",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublicationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl PublicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationStatus::Pending => "pending",
            PublicationStatus::InProgress => "in_progress",
            PublicationStatus::Completed => "completed",
            PublicationStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PublicationRow {
    pub id: String,
    pub status: String,
    pub record_refs: Option<String>,
    pub queries: Option<String>,
    pub all_records: i64,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    DeletePending,
    Deleted,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::InProgress => "in_progress",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
            SyncStatus::DeletePending => "delete_pending",
            SyncStatus::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncRow {
    pub id: String,
    pub status: String,
    pub remote_url: String,
    pub cids: String,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Accepts a bare `host:port` (must contain a colon) or
/// `http(s)://host[:port]`; rejects other schemes.
pub fn validate_remote_url(url: &str) -> Result<(), Error> {
    for scheme in ["http://", "https://"] {
        if let Some(rest) = url.strip_prefix(scheme) {
            let host = rest.split('/').next().unwrap_or("");
            if host.is_empty() {
                return Err(Error::invalid_argument("URL must include a hostname"));
            }
            return Ok(());
        }
    }
    if !url.contains("://") && url.contains(':') {
        return Ok(());
    }
    Err(Error::invalid_argument(format!("invalid remote URL: {url}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_url_accepts_bare_host_port() {
        assert!(validate_remote_url("registry.example.com:443").is_ok());
    }

    #[test]
    fn remote_url_accepts_https() {
        assert!(validate_remote_url("https://registry.example.com").is_ok());
    }

    #[test]
    fn remote_url_rejects_unknown_scheme() {
        assert!(validate_remote_url("ftp://registry.example.com").is_err());
    }

    #[test]
    fn remote_url_rejects_bare_host_without_port() {
        assert!(validate_remote_url("registry.example.com").is_err());
    }

    #[test]
    fn remote_url_rejects_scheme_without_hostname() {
        assert!(validate_remote_url("http://").is_err());
        assert!(validate_remote_url("https://").is_err());
    }

    #[test]
    fn publication_target_rejects_empty_record_refs() {
        assert!(PublicationTarget::RecordRefs(Vec::new()).validate().is_err());
        assert!(PublicationTarget::AllRecords.validate().is_ok());
    }
}
