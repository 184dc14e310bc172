//! OCI/Docker media type constants used when tagging directory artifacts.
//! Names follow the OCI Distribution Specification, grounded in the
//! reference registry server implementation
//! (examples/other_examples `Evoker-Industries-Rune` registry server).

/// Media type for the record manifest itself.
pub const RECORD_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
/// Media type of the record's JSON blob layer.
pub const RECORD_LAYER: &str = "application/vnd.agentdir.record.v1+json";
/// Media type of a detached signature artifact pushed as an OCI referrer.
pub const SIGNATURE_LAYER: &str = "application/vnd.agentdir.signature.v1+json";
/// Media type for the artifact-type field of a signature manifest.
pub const SIGNATURE_ARTIFACT_TYPE: &str = "application/vnd.agentdir.signature.v1";
/// Generic referrer artifact media type, used by extensions.
pub const REFERRER_LAYER: &str = "application/vnd.agentdir.referrer.v1+json";
