use std::fmt;

use cid::Cid;
use dir_model::LabelNamespace;

/// A parsed DHT key `/<namespace>/<path...>/<cid>/<peer_id>`.
/// `path` is the label path split on `/`, always non-empty; `cid` and
/// `peer_id` are the trailing two components, kept as strings since
/// `peer_id` has no `cid`-style parse requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhtKey {
    pub namespace: LabelNamespace,
    pub path: Vec<String>,
    pub cid: String,
    pub peer_id: String,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("key must have at least 5 slash-separated parts")]
    TooShort,
    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),
    #[error("label path component cannot be empty at position {0}")]
    EmptyPathComponent(usize),
    #[error("invalid CID format")]
    InvalidCid,
    #[error("peer id cannot be empty")]
    EmptyPeerId,
}

impl DhtKey {
    /// Builds a key for announcing `label` for `cid` from `peer_id`
    ///.
    pub fn new(namespace: LabelNamespace, path: Vec<String>, cid: String, peer_id: String) -> Self {
        DhtKey { namespace, path, cid, peer_id }
    }

    /// Parses and validates a raw `/...` key string against this module's
    /// structural rules. Does not validate an attached value; use
    /// `validate_value` for that.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let trimmed = raw.strip_prefix('/').unwrap_or(raw);
        let parts: Vec<&str> = trimmed.split('/').collect();
        if parts.len() < 4 {
            // namespace + >=1 path component + cid + peer_id == >= 4 splits
            // (">= 5 slash-separated parts" counts the leading empty
            // segment before the first '/').
            return Err(KeyError::TooShort);
        }

        let namespace: LabelNamespace = parts[0]
            .parse()
            .map_err(|_| KeyError::UnknownNamespace(parts[0].to_string()))?;

        let path_end = parts.len() - 2;
        let path_parts = &parts[1..path_end];
        if path_parts.is_empty() {
            return Err(KeyError::EmptyPathComponent(1));
        }
        for (i, component) in path_parts.iter().enumerate() {
            if component.is_empty() {
                return Err(KeyError::EmptyPathComponent(i + 1));
            }
        }

        let cid_str = parts[path_end];
        cid_str.parse::<Cid>().map_err(|_| KeyError::InvalidCid)?;

        let peer_id = parts[parts.len() - 1];
        if peer_id.is_empty() {
            return Err(KeyError::EmptyPeerId);
        }

        Ok(DhtKey {
            namespace,
            path: path_parts.iter().map(|s| s.to_string()).collect(),
            cid: cid_str.to_string(),
            peer_id: peer_id.to_string(),
        })
    }

    pub fn label_path(&self) -> String {
        self.path.join("/")
    }
}

impl fmt::Display for DhtKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}/{}/{}", self.namespace, self.label_path(), self.cid, self.peer_id)
    }
}

/// Rule 5: an attached value, if present, must itself parse as a CID.
pub fn validate_value(value: Option<&str>) -> Result<(), KeyError> {
    match value {
        None => Ok(()),
        Some(v) => v.parse::<Cid>().map(|_| ()).map_err(|_| KeyError::InvalidCid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CID: &str = "bafkreihdwdcefgh4dqkjv67uzcmw7ojee6xedzdetojuzjevtenxquvyku";

    #[test]
    fn parses_well_formed_key() {
        let raw = format!("/skills/programming/golang/{VALID_CID}/Peer1");
        let key = DhtKey::parse(&raw).unwrap();
        assert_eq!(key.namespace, LabelNamespace::Skills);
        assert_eq!(key.path, vec!["programming".to_string(), "golang".to_string()]);
        assert_eq!(key.peer_id, "Peer1");
    }

    #[test]
    fn rejects_empty_path_component() {
        let raw = format!("/skills//golang/{VALID_CID}/Peer1");
        let err = DhtKey::parse(&raw).unwrap_err();
        assert_eq!(err, KeyError::EmptyPathComponent(1));
    }

    #[test]
    fn rejects_invalid_cid() {
        let raw = "/domains/ai/invalid-cid/Peer1";
        let err = DhtKey::parse(raw).unwrap_err();
        assert_eq!(err, KeyError::InvalidCid);
    }

    #[test]
    fn rejects_unknown_namespace() {
        let raw = format!("/bogus/path/{VALID_CID}/Peer1");
        assert!(matches!(DhtKey::parse(&raw), Err(KeyError::UnknownNamespace(_))));
    }

    #[test]
    fn rejects_too_short_key() {
        assert_eq!(DhtKey::parse("/skills/golang"), Err(KeyError::TooShort));
    }

    #[test]
    fn display_round_trips_through_parse() {
        let key = DhtKey::new(
            LabelNamespace::Skills,
            vec!["programming".to_string(), "golang".to_string()],
            VALID_CID.to_string(),
            "Peer1".to_string(),
        );
        let rendered = key.to_string();
        assert_eq!(DhtKey::parse(&rendered).unwrap(), key);
    }
}
