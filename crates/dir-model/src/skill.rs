use serde::{Deserialize, Serialize};

/// A normalized `(name, id)` pair independent of schema version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skill {
    pub name: String,
    pub id: i64,
}

/// Raw V0Alpha0 shape: `category_name[/class_name]` with an integer `class_uid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SkillV0Alpha0Raw {
    pub category_name: String,
    #[serde(default)]
    pub class_name: Option<String>,
    pub class_uid: i64,
}

impl From<SkillV0Alpha0Raw> for Skill {
    fn from(raw: SkillV0Alpha0Raw) -> Self {
        let name = match raw.class_name {
            Some(class) if !class.is_empty() => format!("{}/{}", raw.category_name, class),
            _ => raw.category_name,
        };
        Skill { name, id: raw.class_uid }
    }
}

/// Raw V1Alpha0/V1Alpha1 shape: a single `name` string and integer `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SkillV1Raw {
    pub name: String,
    pub id: i64,
}

impl From<SkillV1Raw> for Skill {
    fn from(raw: SkillV1Raw) -> Self {
        Skill { name: raw.name, id: raw.id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_v0_name_from_category_and_class() {
        let raw = SkillV0Alpha0Raw {
            category_name: "nlp".to_string(),
            class_name: Some("completion".to_string()),
            class_uid: 10201,
        };
        let skill: Skill = raw.into();
        assert_eq!(skill.name, "nlp/completion");
        assert_eq!(skill.id, 10201);
    }

    #[test]
    fn v0_without_class_name_uses_category_only() {
        let raw = SkillV0Alpha0Raw {
            category_name: "nlp".to_string(),
            class_name: None,
            class_uid: 1,
        };
        let skill: Skill = raw.into();
        assert_eq!(skill.name, "nlp");
    }
}
