use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::annotations::Annotations;
use crate::record::{Record, RecordData};
use ::cid::Cid;

/// The sole handle passed between components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub cid: String,
}

impl RecordRef {
    pub fn new(cid: Cid) -> Self {
        RecordRef { cid: cid.to_string() }
    }

    pub fn parse_cid(&self) -> Result<Cid, cid::Error> {
        self.cid.parse()
    }
}

/// Cheap lookup payload that avoids a full record fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub cid: String,
    pub annotations: std::collections::BTreeMap<String, String>,
    pub schema_version: String,
    pub created_at: DateTime<Utc>,
}

impl RecordMeta {
    pub fn from_record(cid: Cid, record: &Record) -> Self {
        let data = record.data();
        RecordMeta {
            cid: cid.to_string(),
            annotations: annotations_to_map(data.annotations()),
            schema_version: data.schema_version().to_string(),
            created_at: data.created_at(),
        }
    }
}

fn annotations_to_map(annotations: &Annotations) -> std::collections::BTreeMap<String, String> {
    annotations
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
