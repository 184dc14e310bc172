use crate::key::{validate_value, DhtKey, KeyError};
use dir_model::LabelNamespace;

/// One of the four namespace-scoped record validators. Each simply
/// checks that a raw key string parses as a `DhtKey` whose namespace
/// matches the validator's own, plus that any attached value is itself a
/// valid CID.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    namespace: LabelNamespace,
}

impl Validator {
    pub fn skills() -> Self {
        Validator { namespace: LabelNamespace::Skills }
    }
    pub fn domains() -> Self {
        Validator { namespace: LabelNamespace::Domains }
    }
    pub fn modules() -> Self {
        Validator { namespace: LabelNamespace::Modules }
    }
    pub fn locators() -> Self {
        Validator { namespace: LabelNamespace::Locators }
    }

    pub fn for_namespace(namespace: LabelNamespace) -> Self {
        Validator { namespace }
    }

    pub fn validate(&self, key: &str, value: Option<&str>) -> Result<(), KeyError> {
        let parsed = DhtKey::parse(key)?;
        if parsed.namespace != self.namespace {
            return Err(KeyError::UnknownNamespace(parsed.namespace.to_string()));
        }
        validate_value(value)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("no valid values found")]
pub struct NoValidValues;

/// Resolves conflicting DHT record values for the same key: returns the
/// index of the first individually-valid value, deterministically, so all
/// peers agree on the winner.
pub fn select(key: &str, values: &[Option<&str>]) -> Result<usize, NoValidValues> {
    let namespace = DhtKey::parse(key).ok().map(|k| k.namespace);
    let Some(namespace) = namespace else {
        return Err(NoValidValues);
    };
    let validator = Validator::for_namespace(namespace);
    values
        .iter()
        .position(|value| validator.validate(key, *value).is_ok())
        .ok_or(NoValidValues)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CID: &str = "bafkreihdwdcefgh4dqkjv67uzcmw7ojee6xedzdetojuzjevtenxquvyku";

    #[test]
    fn skills_validator_accepts_well_formed_key() {
        let key = format!("/skills/programming/golang/{VALID_CID}/Peer1");
        assert!(Validator::skills().validate(&key, None).is_ok());
    }

    #[test]
    fn skills_validator_rejects_empty_path_component() {
        let key = format!("/skills//golang/{VALID_CID}/Peer1");
        assert!(Validator::skills().validate(&key, None).is_err());
    }

    #[test]
    fn domains_validator_rejects_invalid_cid_in_path() {
        let key = "/domains/ai/invalid-cid/Peer1";
        assert!(Validator::domains().validate(key, None).is_err());
    }

    #[test]
    fn select_returns_first_valid_index() {
        let key = format!("/skills/programming/golang/{VALID_CID}/Peer1");
        let values = [Some("not-a-cid"), None, Some(VALID_CID)];
        assert_eq!(select(&key, &values).unwrap(), 1);
    }

    #[test]
    fn select_fails_when_none_validate() {
        let key = "/skills//golang/bad/Peer1";
        let values = [None, None];
        assert!(select(key, &values).is_err());
    }
}
