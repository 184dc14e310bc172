use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// A string-to-string map with duplicate keys forbidden. Plain
/// `serde_json` maps silently collapse duplicate keys before we ever see
/// them, so this wraps a `BTreeMap` and intercepts entries during
/// deserialization via `MapAccess` instead of inspecting the built map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Annotations(BTreeMap<String, String>);

impl Annotations {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(String, String)> for Annotations {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Annotations(iter.into_iter().collect())
    }
}

struct AnnotationsVisitor;

impl<'de> Visitor<'de> for AnnotationsVisitor {
    type Value = Annotations;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object with unique string keys")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut out = BTreeMap::new();
        while let Some((key, value)) = map.next_entry::<String, String>()? {
            if out.insert(key.clone(), value).is_some() {
                return Err(serde::de::Error::custom(format!(
                    "duplicate annotation key: {key}"
                )));
            }
        }
        Ok(Annotations(out))
    }
}

impl<'de> Deserialize<'de> for Annotations {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(AnnotationsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_keys() {
        let raw = r#"{"a":"1","b":"2","a":"3"}"#;
        let err = serde_json::from_str::<Annotations>(raw).unwrap_err();
        assert!(err.to_string().contains("duplicate annotation key"));
    }

    #[test]
    fn accepts_unique_keys() {
        let raw = r#"{"a":"1","b":"2"}"#;
        let annotations: Annotations = serde_json::from_str(raw).unwrap();
        assert_eq!(annotations.get("a"), Some("1"));
        assert_eq!(annotations.len(), 2);
    }
}
