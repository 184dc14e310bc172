use std::fmt;

use crate::record::{Record, RecordData};
use crate::schema_version::SchemaVersion;

/// The four label namespaces a record's attributes route under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelNamespace {
    Skills,
    Domains,
    Modules,
    Locators,
}

impl LabelNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelNamespace::Skills => "skills",
            LabelNamespace::Domains => "domains",
            LabelNamespace::Modules => "modules",
            LabelNamespace::Locators => "locators",
        }
    }
}

impl fmt::Display for LabelNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LabelNamespace {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skills" => Ok(LabelNamespace::Skills),
            "domains" => Ok(LabelNamespace::Domains),
            "modules" => Ok(LabelNamespace::Modules),
            "locators" => Ok(LabelNamespace::Locators),
            other => Err(LabelError(format!("unknown label namespace: {other}"))),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct LabelError(pub String);

/// A fully-formed label path, e.g. `/skills/nlp/completion`. No CID or peer
/// id yet — those are appended by the routing layer when a label is
/// announced on the DHT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub namespace: LabelNamespace,
    pub value: String,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.namespace, self.value)
    }
}

const OASF_MODULE_PREFIX: &str = "schema.oasf.agntcy.org/features/";

fn has_empty_path_component(value: &str) -> bool {
    value.split('/').any(str::is_empty)
}

/// Strips the legacy OASF module name prefix for V0α0 records.
fn module_label_value(schema_version: SchemaVersion, name: &str) -> &str {
    if schema_version == SchemaVersion::V0Alpha0 {
        name.strip_prefix(OASF_MODULE_PREFIX).unwrap_or(name)
    } else {
        name
    }
}

/// Extracts the union of a record's labels: skills, domains
/// (V1α1 only), locator types, and modules. Entries with an empty path
/// component are skipped rather than failing the whole extraction.
pub fn extract_labels(record: &Record) -> Vec<Label> {
    let data = record.data();
    let schema_version = record.schema_version_enum();
    let mut labels = Vec::new();

    for skill in data.skills() {
        if !has_empty_path_component(&skill.name) {
            labels.push(Label {
                namespace: LabelNamespace::Skills,
                value: skill.name,
            });
        }
    }

    for domain in data.domains() {
        if !has_empty_path_component(&domain.name) {
            labels.push(Label {
                namespace: LabelNamespace::Domains,
                value: domain.name,
            });
        }
    }

    for locator in data.locators() {
        if !has_empty_path_component(&locator.locator_type) {
            labels.push(Label {
                namespace: LabelNamespace::Locators,
                value: locator.locator_type.clone(),
            });
        }
    }

    for module in data.modules() {
        let value = module_label_value(schema_version, &module.name);
        if !value.is_empty() && !has_empty_path_component(value) {
            labels.push(Label {
                namespace: LabelNamespace::Modules,
                value: value.to_string(),
            });
        }
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    const V0_JSON: &str = r#"{
        "name": "a",
        "version": "1",
        "schema_version": "v0.3.1",
        "skills": [{"category_name":"nlp","class_name":"completion","class_uid":10201}],
        "modules": [{"name": "schema.oasf.agntcy.org/features/runtime/python"}]
    }"#;

    #[test]
    fn strips_legacy_module_prefix_for_v0() {
        let record = crate::decode(V0_JSON.as_bytes()).unwrap();
        let labels = extract_labels(&record);
        let module_label = labels
            .iter()
            .find(|l| l.namespace == LabelNamespace::Modules)
            .unwrap();
        assert_eq!(module_label.value, "runtime/python");
    }

    #[test]
    fn skips_empty_components_without_failing() {
        let raw = r#"{
            "name": "a", "version": "1", "schema_version": "v0.7.0",
            "locators": [{"type": "", "url": "https://example.com"}]
        }"#;
        let record = crate::decode(raw.as_bytes()).unwrap();
        let labels = extract_labels(&record);
        assert!(labels.iter().all(|l| l.namespace != LabelNamespace::Locators));
    }
}
