//! Durable, content-addressed storage of records, signatures, and referrer
//! artifacts on an OCI-compatible registry. The store does not own bytes
//! on disk; every record is an OCI artifact tagged by its CID.

mod error;
mod media_types;

use std::collections::HashMap;

use dir_error::{Error, Result};
use dir_model::{compute_cid, Cid, Record, RecordMeta, RecordRef};
use oci_client::client::{Config, ImageLayer};
use oci_client::errors::OciDistributionError;
use oci_client::manifest::{OciImageManifest, OciManifest};
use oci_client::secrets::RegistryAuth;
use oci_client::{Client, Reference};

pub use error::{classify_oci_error, classify_reqwest_error};
pub use media_types::*;

/// By-convention gRPC streaming chunk size for `Push`/`Pull`.
pub const CHUNK_SIZE: usize = 4096;

/// Durable, content-addressed record storage backed by an OCI registry.
pub struct ContentStore {
    client: Client,
    auth: RegistryAuth,
    registry_address: String,
    repository_name: String,
}

impl ContentStore {
    pub fn new(registry_address: String, repository_name: String, auth: RegistryAuth) -> Self {
        ContentStore {
            client: Client::default(),
            auth,
            registry_address,
            repository_name,
        }
    }

    fn reference_for_tag(&self, tag: &str) -> Result<Reference> {
        let image = format!("{}/{}:{}", self.registry_address, self.repository_name, tag);
        image
            .parse()
            .map_err(|err| Error::invalid_argument(format!("invalid OCI reference {image}: {err}")))
    }

    fn tag_for_cid(cid: &Cid) -> String {
        // OCI tags are a restricted alphabet; CIDs are already base32/base58
        // text so they pass through unmodified except for disallowed `/`.
        cid.to_string().replace('/', "-")
    }

    /// Push a record, returning its ref. Idempotent: if an artifact already
    /// exists under this CID's tag, the push short-circuits.
    pub async fn push(&self, record: &Record) -> Result<RecordRef> {
        let cid = compute_cid(record).map_err(|err| Error::Corrupt(err.to_string()))?;
        let reference = self.reference_for_tag(&Self::tag_for_cid(&cid))?;

        match self.client.pull_manifest(&reference, &self.auth).await {
            Ok(_) => {
                tracing::debug!(%cid, "push short-circuited: artifact already tagged");
                return Ok(RecordRef::new(cid));
            }
            Err(OciDistributionError::ImageManifestNotFoundError(_)) => {}
            Err(err) => return Err(classify_oci_error(err)),
        }

        let canonical = record
            .to_canonical_bytes()
            .map_err(|err| Error::Corrupt(err.to_string()))?;
        let layer = ImageLayer::new(canonical, media_types::RECORD_LAYER.to_string(), None);
        let config = Config::oci_v1(Vec::new(), None);

        let annotations = record_annotations(record);
        let manifest = OciImageManifest {
            annotations: Some(annotations),
            ..OciImageManifest::build(&[layer.clone()], &config, None)
        };

        self.client
            .push(&reference, &[layer], config, &self.auth, Some(manifest))
            .await
            .map_err(classify_oci_error)?;

        Ok(RecordRef::new(cid))
    }

    /// Fetch the manifest and blob, decoding through the record model.
    /// Fails `NotFound` if the tag does not resolve, `Corrupt` if the blob
    /// hash mismatches the CID.
    pub async fn pull(&self, record_ref: &RecordRef) -> Result<Record> {
        let cid = record_ref
            .parse_cid()
            .map_err(|err| Error::invalid_argument(format!("invalid CID: {err}")))?;
        let reference = self.reference_for_tag(&Self::tag_for_cid(&cid))?;

        let image = self
            .client
            .pull(
                &reference,
                &self.auth,
                vec![media_types::RECORD_LAYER, media_types::RECORD_MANIFEST],
            )
            .await
            .map_err(classify_oci_error)?;

        let blob = image
            .layers
            .first()
            .ok_or_else(|| Error::Corrupt("artifact has no record layer".to_string()))?;

        let record = dir_model::decode(&blob.data).map_err(|err| Error::Corrupt(err.to_string()))?;

        let actual_cid = compute_cid(&record).map_err(|err| Error::Corrupt(err.to_string()))?;
        if actual_cid != cid {
            return Err(Error::Corrupt(format!(
                "blob hash {actual_cid} does not match tag {cid}"
            )));
        }

        Ok(record)
    }

    /// Fetch the manifest only (no blob): `O(1)` registry roundtrip.
    pub async fn lookup(&self, record_ref: &RecordRef) -> Result<RecordMeta> {
        let cid = record_ref
            .parse_cid()
            .map_err(|err| Error::invalid_argument(format!("invalid CID: {err}")))?;
        let reference = self.reference_for_tag(&Self::tag_for_cid(&cid))?;

        let (manifest, _digest) = self
            .client
            .pull_manifest(&reference, &self.auth)
            .await
            .map_err(classify_oci_error)?;

        let OciManifest::Image(manifest) = manifest else {
            return Err(Error::Corrupt("expected an image manifest".to_string()));
        };

        let annotations = manifest.annotations.unwrap_or_default();
        let schema_version = annotations
            .get("dir.schema_version")
            .cloned()
            .unwrap_or_default();
        let created_at = annotations
            .get("dir.created_at")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_else(chrono::Utc::now);

        Ok(RecordMeta {
            cid: cid.to_string(),
            annotations,
            schema_version,
            created_at,
        })
    }

    /// Untag the artifact. The registry may garbage-collect the underlying
    /// blob afterward; removing the search-index entry is the
    /// caller's responsibility (`dir-index::remove_record`).
    pub async fn delete(&self, record_ref: &RecordRef) -> Result<()> {
        let cid = record_ref
            .parse_cid()
            .map_err(|err| Error::invalid_argument(format!("invalid CID: {err}")))?;
        let reference = self.reference_for_tag(&Self::tag_for_cid(&cid))?;

        match self.client.pull_manifest(&reference, &self.auth).await {
            Ok(_) => {}
            Err(OciDistributionError::ImageManifestNotFoundError(_)) => {
                return Err(Error::not_found(format!("no record tagged {cid}")))
            }
            Err(err) => return Err(classify_oci_error(err)),
        }

        self.client
            .delete_manifest(&reference, &self.auth)
            .await
            .map_err(classify_oci_error)
    }

    /// Stores a signature artifact referencing the record's manifest via
    /// OCI referrers.
    pub async fn push_signature(
        &self,
        record_ref: &RecordRef,
        signature_bytes: &[u8],
    ) -> Result<()> {
        let cid = record_ref
            .parse_cid()
            .map_err(|err| Error::invalid_argument(format!("invalid CID: {err}")))?;
        let reference = self.reference_for_tag(&Self::tag_for_cid(&cid))?;

        let layer = ImageLayer::new(
            signature_bytes.to_vec(),
            media_types::SIGNATURE_LAYER.to_string(),
            None,
        );
        let config = Config::oci_v1(Vec::new(), None);
        let mut manifest = OciImageManifest::build(&[layer.clone()], &config, None);
        manifest.artifact_type = Some(media_types::SIGNATURE_ARTIFACT_TYPE.to_string());
        manifest.subject = self
            .client
            .pull_manifest_digest(&reference, &self.auth)
            .await
            .ok()
            .map(|digest| oci_client::manifest::OciDescriptor {
                media_type: media_types::RECORD_MANIFEST.to_string(),
                digest,
                size: 0,
                ..Default::default()
            });

        self.client
            .push(&reference, &[layer], config, &self.auth, Some(manifest))
            .await
            .map_err(classify_oci_error)?;

        Ok(())
    }

    /// Pushes a generic typed artifact referring to a record CID.
    pub async fn push_referrer(
        &self,
        record_ref: &RecordRef,
        artifact_type: &str,
        payload: &[u8],
    ) -> Result<()> {
        let cid = record_ref
            .parse_cid()
            .map_err(|err| Error::invalid_argument(format!("invalid CID: {err}")))?;
        let reference = self.reference_for_tag(&Self::tag_for_cid(&cid))?;

        let layer = ImageLayer::new(payload.to_vec(), media_types::REFERRER_LAYER.to_string(), None);
        let config = Config::oci_v1(Vec::new(), None);
        let mut manifest = OciImageManifest::build(&[layer.clone()], &config, None);
        manifest.artifact_type = Some(artifact_type.to_string());

        self.client
            .push(&reference, &[layer], config, &self.auth, Some(manifest))
            .await
            .map_err(classify_oci_error)?;

        Ok(())
    }

    /// Walks referrer artifacts attached to a record's manifest.
    pub async fn walk_referrers(
        &self,
        record_ref: &RecordRef,
        artifact_type: Option<&str>,
    ) -> Result<Vec<oci_client::manifest::OciDescriptor>> {
        let cid = record_ref
            .parse_cid()
            .map_err(|err| Error::invalid_argument(format!("invalid CID: {err}")))?;
        let reference = self.reference_for_tag(&Self::tag_for_cid(&cid))?;

        self.client
            .list_referrers(&reference, &self.auth, artifact_type.map(str::to_string))
            .await
            .map_err(classify_oci_error)
    }

    /// Optional capability: ask the registry to cryptographically verify a
    /// referrer signature. Not every
    /// registry supports this, so callers should type-assert against
    /// `ZotVerifier` rather than calling it unconditionally.
    pub fn as_zot_verifier(&self) -> Option<&dyn ZotVerifier> {
        Some(self)
    }
}

/// Capability interface for registries exposing Zot's signature-verification
/// extension. Modeled as an optional trait rather than a
/// hard dependency so stores backed by registries without the extension
/// simply don't implement it.
#[async_trait::async_trait]
pub trait ZotVerifier: Send + Sync {
    async fn verify_with_zot(&self, record_ref: &RecordRef) -> Result<bool>;
}

#[async_trait::async_trait]
impl ZotVerifier for ContentStore {
    async fn verify_with_zot(&self, record_ref: &RecordRef) -> Result<bool> {
        let cid = record_ref
            .parse_cid()
            .map_err(|err| Error::invalid_argument(format!("invalid CID: {err}")))?;
        let reference = self.reference_for_tag(&Self::tag_for_cid(&cid))?;

        let url = format!(
            "https://{}/v2/_zot/ext/verify?repo={}&digest={cid}",
            self.registry_address, self.repository_name
        );
        let response = reqwest::get(&url)
            .await
            .map_err(classify_reqwest_error)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::Unimplemented(
                "registry does not support Zot verification".to_string(),
            ));
        }
        let body: ZotVerifyResponse = response
            .json()
            .await
            .map_err(classify_reqwest_error)?;
        let _ = reference;
        Ok(body.success)
    }
}

#[derive(serde::Deserialize)]
struct ZotVerifyResponse {
    success: bool,
}

fn record_annotations(record: &Record) -> HashMap<String, String> {
    let data = record.data();
    let mut annotations: HashMap<String, String> = data
        .annotations()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    annotations.insert("dir.schema_version".to_string(), data.schema_version().to_string());
    annotations.insert("dir.created_at".to_string(), data.created_at().to_rfc3339());
    annotations.insert("dir.name".to_string(), data.name().to_string());
    annotations
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
    fn tag_for_cid_has_no_slashes() {
        let record = dir_model::decode(V0_JSON.as_bytes()).unwrap();
        let cid = compute_cid(&record).unwrap();
        assert!(!ContentStore::tag_for_cid(&cid).contains('/'));
    }

    #[test]
    fn record_annotations_carry_schema_version_and_name() {
        let record = dir_model::decode(V0_JSON.as_bytes()).unwrap();
        let annotations = record_annotations(&record);
        assert_eq!(annotations.get("dir.schema_version").unwrap(), "v0.3.1");
        assert_eq!(annotations.get("dir.name").unwrap(), "a");
    }
}
