//! Unifies the three OASF-derived record schemas behind one read interface,
//! and produces the CIDs and labels the rest of the directory core keys
//! off of.

mod annotations;
mod cid;
mod label;
mod meta;
mod record;
mod schema_version;
mod skill;

pub use crate::cid::{compute_cid, RECORD_CODEC};
pub use label::{extract_labels, Label, LabelError, LabelNamespace};
pub use meta::{RecordMeta, RecordRef};
pub use record::{
    Annotations, Domain, Locator, Module, Record, RecordData, Signature, V0Alpha0, V1Alpha0,
    V1Alpha1,
};
pub use schema_version::SchemaVersion;
pub use skill::Skill;

pub use ::cid::Cid;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unsupported schema version: {0}")]
    UnsupportedSchema(String),
    #[error("malformed record JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decode opaque JSON bytes into a `Record`, dispatching on `schema_version`.
pub fn decode(bytes: &[u8]) -> Result<Record, DecodeError> {
    record::decode(bytes)
}
