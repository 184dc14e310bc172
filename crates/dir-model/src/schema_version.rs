use crate::DecodeError;

/// The three schema ranges a `schema_version` string dispatches across.
/// Exactly three variants, no overlapping `V1`/`V2`/`V3` aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchemaVersion {
    /// v0.3.x
    V0Alpha0,
    /// v0.4.0 ..= v0.6.x
    V1Alpha0,
    /// >= v0.7.0
    V1Alpha1,
}

impl SchemaVersion {
    pub fn parse(raw: &str) -> Result<Self, DecodeError> {
        let version = raw.trim_start_matches('v');
        let semver = semver::Version::parse(version)
            .map_err(|_| DecodeError::UnsupportedSchema(raw.to_string()))?;

        match (semver.major, semver.minor) {
            (0, 3) => Ok(SchemaVersion::V0Alpha0),
            (0, 4..=6) => Ok(SchemaVersion::V1Alpha0),
            (0, minor) if minor >= 7 => Ok(SchemaVersion::V1Alpha1),
            (major, _) if major >= 1 => Ok(SchemaVersion::V1Alpha1),
            _ => Err(DecodeError::UnsupportedSchema(raw.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_known_ranges() {
        assert_eq!(SchemaVersion::parse("v0.3.1").unwrap(), SchemaVersion::V0Alpha0);
        assert_eq!(SchemaVersion::parse("v0.4.0").unwrap(), SchemaVersion::V1Alpha0);
        assert_eq!(SchemaVersion::parse("v0.6.9").unwrap(), SchemaVersion::V1Alpha0);
        assert_eq!(SchemaVersion::parse("v0.7.0").unwrap(), SchemaVersion::V1Alpha1);
        assert_eq!(SchemaVersion::parse("v1.0.0").unwrap(), SchemaVersion::V1Alpha1);
    }

    #[test]
    fn rejects_unknown_range() {
        assert!(SchemaVersion::parse("v0.2.0").is_err());
        assert!(SchemaVersion::parse("not-a-version").is_err());
    }
}
