use ::cid::Cid;
use multihash::Multihash;
use sha2::{Digest, Sha256};

use crate::record::Record;
use crate::DecodeError;

/// OASF record codec.
pub const RECORD_CODEC: u64 = 0x444951;

/// SHA2-256 multihash function code, per the multiformats table.
const SHA2_256_CODE: u64 = 0x12;

/// Computes a record's CID: canonicalize via round-trip through the typed
/// variant, hash with SHA-256, wrap as a multihash, then CIDv1 with codec
/// `0x444951`. Identical byte content decodes to the same typed
/// form and therefore always yields the same CID.
pub fn compute_cid(record: &Record) -> Result<Cid, DecodeError> {
    let canonical = record.to_canonical_bytes()?;
    let digest = Sha256::digest(&canonical);

    let multihash = Multihash::<64>::wrap(SHA2_256_CODE, &digest)
        .expect("sha2-256 digest fits the 64-byte multihash buffer");

    Ok(Cid::new_v1(RECORD_CODEC, multihash))
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
    fn identical_bytes_yield_identical_cid() {
        let record_a = crate::decode(V0_JSON.as_bytes()).unwrap();
        let record_b = crate::decode(V0_JSON.as_bytes()).unwrap();
        assert_eq!(
            compute_cid(&record_a).unwrap(),
            compute_cid(&record_b).unwrap()
        );
    }

    #[test]
    fn cid_starts_with_bafy_like_prefix() {
        let record = crate::decode(V0_JSON.as_bytes()).unwrap();
        let cid = compute_cid(&record).unwrap();
        // CIDv1 base32 (default Display) always starts with 'b'.
        assert!(cid.to_string().starts_with('b'));
    }
}
