//! The configuration snapshot the core consumes.
//! Loading this from YAML or flags is an external collaborator's job; this
//! crate only owns the shape and its defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub listen_address: String,
    pub healthcheck_address: String,
    pub oci: OciConfig,
    pub search: SearchConfig,
    pub routing: RoutingConfig,
    pub sync: SyncConfig,
    pub authz: AuthzConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OciConfig {
    pub registry_address: String,
    pub repository_name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchDbType {
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub db_type: SearchDbType,
    pub sqlite: SqliteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub listen_address: String,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    #[serde(with = "duration_secs")]
    pub refresh_interval: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(with = "duration_secs")]
    pub scheduler_interval: Duration,
    pub worker_count: u32,
    #[serde(with = "duration_secs")]
    pub worker_timeout: Duration,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthzConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub trust_domain: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        RoutingConfig {
            listen_address: "/ip4/0.0.0.0/tcp/0".to_string(),
            bootstrap_peers: Vec::new(),
            refresh_interval: Duration::from_secs(30),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            scheduler_interval: Duration::from_secs(30),
            worker_count: 4,
            worker_timeout: Duration::from_secs(60),
            username: None,
            password: None,
        }
    }
}

impl Default for AuthzConfig {
    fn default() -> Self {
        AuthzConfig { enabled: false, trust_domain: String::new() }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_config_has_sane_default_refresh_interval() {
        assert_eq!(RoutingConfig::default().refresh_interval, Duration::from_secs(30));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = Config {
            listen_address: "0.0.0.0:8080".to_string(),
            healthcheck_address: "0.0.0.0:8081".to_string(),
            oci: OciConfig {
                registry_address: "registry.example.com".to_string(),
                repository_name: "agents".to_string(),
                username: None,
                password: None,
            },
            search: SearchConfig {
                db_type: SearchDbType::Sqlite,
                sqlite: SqliteConfig { db_path: "dir.db".to_string() },
            },
            routing: RoutingConfig::default(),
            sync: SyncConfig::default(),
            authz: AuthzConfig::default(),
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.oci.repository_name, "agents");
    }
}
