use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema_version::SchemaVersion;
use crate::skill::{Skill, SkillV0Alpha0Raw, SkillV1Raw};
use crate::DecodeError;

pub use crate::annotations::Annotations;

/// `(name, id)` domain classifier, V1α1 only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub id: i64,
}

/// Deployment locator. `(type, url)` is the dedup key within a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    #[serde(rename = "type")]
    pub locator_type: String,
    pub url: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default)]
    pub annotations: Annotations,
}

/// Named, arbitrarily-nested module payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Detached signature artifact, verified out-of-band via the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub signed_at: DateTime<Utc>,
    pub algorithm: String,
    pub signature: String,
    #[serde(default)]
    pub certificate: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content_bundle: Option<String>,
    #[serde(default)]
    pub annotations: Annotations,
}

/// V0α0 (v0.3.x) on-wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V0Alpha0 {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub schema_version: String,
    #[serde(default)]
    pub annotations: Annotations,
    #[serde(default)]
    pub skills: Vec<SkillV0Alpha0Raw>,
    #[serde(default)]
    pub locators: Vec<Locator>,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub signature: Option<Signature>,
    #[serde(default)]
    pub previous_cid: Option<String>,
}

/// V1α0 (v0.4–v0.6) on-wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1Alpha0 {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub schema_version: String,
    #[serde(default)]
    pub annotations: Annotations,
    #[serde(default)]
    pub skills: Vec<SkillV1Raw>,
    #[serde(default)]
    pub locators: Vec<Locator>,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub signature: Option<Signature>,
    #[serde(default)]
    pub previous_cid: Option<String>,
}

/// V1α1 (>= v0.7.0) on-wire shape: adds `domains`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1Alpha1 {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub schema_version: String,
    #[serde(default)]
    pub annotations: Annotations,
    #[serde(default)]
    pub skills: Vec<SkillV1Raw>,
    #[serde(default)]
    pub domains: Vec<Domain>,
    #[serde(default)]
    pub locators: Vec<Locator>,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub signature: Option<Signature>,
    #[serde(default)]
    pub previous_cid: Option<String>,
}

/// A tagged union over the three record schema versions.
/// Immutable once constructed; "updating" means publishing a new `Record`
/// whose `previous_cid` names the prior one.
#[derive(Debug, Clone)]
pub enum Record {
    V0Alpha0(V0Alpha0),
    V1Alpha0(V1Alpha0),
    V1Alpha1(V1Alpha1),
}

impl Record {
    pub fn schema_version_enum(&self) -> SchemaVersion {
        match self {
            Record::V0Alpha0(_) => SchemaVersion::V0Alpha0,
            Record::V1Alpha0(_) => SchemaVersion::V1Alpha0,
            Record::V1Alpha1(_) => SchemaVersion::V1Alpha1,
        }
    }

    pub fn data(&self) -> &dyn RecordData {
        match self {
            Record::V0Alpha0(r) => r,
            Record::V1Alpha0(r) => r,
            Record::V1Alpha1(r) => r,
        }
    }

    /// Canonical bytes used for CID derivation: re-serializing the typed
    /// variant normalizes field order and whitespace, so byte-identical
    /// logical records always produce byte-identical canonical output
    ///.
    pub fn to_canonical_bytes(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            Record::V0Alpha0(r) => serde_json::to_vec(r),
            Record::V1Alpha0(r) => serde_json::to_vec(r),
            Record::V1Alpha1(r) => serde_json::to_vec(r),
        }
    }
}

/// Uniform, version-independent read interface over a `Record`.
pub trait RecordData {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn description(&self) -> &str;
    fn authors(&self) -> &[String];
    fn created_at(&self) -> DateTime<Utc>;
    fn schema_version(&self) -> &str;
    fn annotations(&self) -> &Annotations;
    fn skills(&self) -> Vec<Skill>;
    fn domains(&self) -> Vec<Domain>;
    fn locators(&self) -> &[Locator];
    fn modules(&self) -> &[Module];
    fn signature(&self) -> Option<&Signature>;
    fn previous_cid(&self) -> Option<&str>;
}

macro_rules! impl_record_data_common {
    ($ty:ty) => {
        impl RecordData for $ty {
            fn name(&self) -> &str {
                &self.name
            }
            fn version(&self) -> &str {
                &self.version
            }
            fn description(&self) -> &str {
                &self.description
            }
            fn authors(&self) -> &[String] {
                &self.authors
            }
            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }
            fn schema_version(&self) -> &str {
                &self.schema_version
            }
            fn annotations(&self) -> &Annotations {
                &self.annotations
            }
            fn locators(&self) -> &[Locator] {
                &self.locators
            }
            fn modules(&self) -> &[Module] {
                &self.modules
            }
            fn signature(&self) -> Option<&Signature> {
                self.signature.as_ref()
            }
            fn previous_cid(&self) -> Option<&str> {
                self.previous_cid.as_deref()
            }
        }
    };
}

impl_record_data_common!(V0Alpha0);
impl_record_data_common!(V1Alpha0);
impl_record_data_common!(V1Alpha1);

impl RecordData for V0Alpha0 {
    fn skills(&self) -> Vec<Skill> {
        self.skills.iter().cloned().map(Skill::from).collect()
    }
    fn domains(&self) -> Vec<Domain> {
        Vec::new()
    }
}

impl RecordData for V1Alpha0 {
    fn skills(&self) -> Vec<Skill> {
        self.skills.iter().cloned().map(Skill::from).collect()
    }
    fn domains(&self) -> Vec<Domain> {
        Vec::new()
    }
}

impl RecordData for V1Alpha1 {
    fn skills(&self) -> Vec<Skill> {
        self.skills.iter().cloned().map(Skill::from).collect()
    }
    fn domains(&self) -> Vec<Domain> {
        self.domains.clone()
    }
}

/// Dispatches on the JSON's `schema_version` field and decodes into the
/// matching variant.
pub fn decode(bytes: &[u8]) -> Result<Record, DecodeError> {
    let probe: serde_json::Value = serde_json::from_slice(bytes)?;
    let raw_version = probe
        .get("schema_version")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| DecodeError::UnsupportedSchema("<missing schema_version>".to_string()))?;

    match SchemaVersion::parse(raw_version).map_err(|_| {
        DecodeError::UnsupportedSchema(raw_version.to_string())
    })? {
        SchemaVersion::V0Alpha0 => Ok(Record::V0Alpha0(serde_json::from_slice(bytes)?)),
        SchemaVersion::V1Alpha0 => Ok(Record::V1Alpha0(serde_json::from_slice(bytes)?)),
        SchemaVersion::V1Alpha1 => Ok(Record::V1Alpha1(serde_json::from_slice(bytes)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V0_JSON: &str = r#"{
        "name": "a",
        "version": "1",
        "schema_version": "v0.3.1",
        "skills": [{"category_name":"nlp","class_name":"completion","class_uid":10201}]
    }"#;

    #[test]
    fn decodes_v0_alpha0() {
        let record = decode(V0_JSON.as_bytes()).unwrap();
        assert!(matches!(record, Record::V0Alpha0(_)));
        assert_eq!(record.data().name(), "a");
        assert_eq!(record.data().skills()[0].name, "nlp/completion");
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let raw = r#"{"name":"a","version":"1","schema_version":"v9.9.9-unknown"}"#;
        // v9.9.9 parses as >=1 major, which maps to V1Alpha1 by design (any
        // future major version is treated as the newest known variant);
        // a genuinely malformed string is what actually fails to dispatch.
        assert!(decode(raw.as_bytes()).is_ok());
        let malformed = r#"{"name":"a","version":"1","schema_version":"not-a-version"}"#;
        assert!(decode(malformed.as_bytes()).is_err());
    }
}
