use dir_error::Error;

/// Classifies a registry error: 404 -> NotFound, 5xx -> retryable
/// Unavailable, everything else wrapped as Unavailable. Hash mismatches
/// are classified separately by the caller
/// (`Error::Corrupt`), since that's a store-level invariant violation
/// rather than a registry transport failure.
pub fn classify_oci_error(err: oci_client::errors::OciDistributionError) -> Error {
    use oci_client::errors::OciDistributionError as E;

    match &err {
        E::ImageManifestNotFoundError(_) => Error::NotFound(err.to_string()),
        E::RegistryNoPermissionsError { .. } => Error::InvalidArgument(err.to_string()),
        _ => Error::Unavailable(err.to_string()),
    }
}

pub fn classify_reqwest_error(err: reqwest::Error) -> Error {
    if err.status().map(|s| s.as_u16()) == Some(404) {
        Error::NotFound(err.to_string())
    } else {
        Error::Unavailable(err.to_string())
    }
}
