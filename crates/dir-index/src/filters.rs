use dir_error::Error;

/// A single filter category. Matches compose as OR within the category; a
/// `GetRecords`/`GetRecordCIDs` call ANDs across the categories present in
/// its filter list. A category passed with an empty value list
/// is strict-validation invalid rather than treated as "no constraint" —
/// omit the category entirely to mean that.
#[derive(Debug, Clone)]
pub enum Filter {
    Name(Vec<String>),
    Version(Vec<String>),
    SkillId(Vec<i64>),
    SkillName(Vec<String>),
    LocatorType(Vec<String>),
    LocatorUrl(Vec<String>),
    ModuleName(Vec<String>),
    ModuleVersion(Vec<String>),
}

impl Filter {
    fn category_name(&self) -> &'static str {
        match self {
            Filter::Name(_) => "name",
            Filter::Version(_) => "version",
            Filter::SkillId(_) => "skill_id",
            Filter::SkillName(_) => "skill_name",
            Filter::LocatorType(_) => "locator_type",
            Filter::LocatorUrl(_) => "locator_url",
            Filter::ModuleName(_) => "module_name",
            Filter::ModuleVersion(_) => "module_version",
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        let empty = match self {
            Filter::Name(v) | Filter::Version(v) | Filter::SkillName(v) | Filter::LocatorType(v)
            | Filter::LocatorUrl(v) | Filter::ModuleName(v) | Filter::ModuleVersion(v) => {
                v.is_empty()
            }
            Filter::SkillId(v) => v.is_empty(),
        };
        if empty {
            return Err(Error::invalid_argument(format!(
                "filter category '{}' must not be empty",
                self.category_name()
            )));
        }
        Ok(())
    }
}

/// Translates a `*`-wildcarded string filter value into a SQL `LIKE`
/// pattern, or returns it unchanged for exact match.
pub(crate) fn like_or_exact(value: &str) -> (&'static str, String) {
    if value.contains('*') {
        ("LIKE", value.replace('*', "%"))
    } else {
        ("=", value.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_name_translates_to_like() {
        let (op, pattern) = like_or_exact("nlp/*");
        assert_eq!(op, "LIKE");
        assert_eq!(pattern, "nlp/%");
    }

    #[test]
    fn exact_name_stays_equality() {
        let (op, pattern) = like_or_exact("nlp/completion");
        assert_eq!(op, "=");
        assert_eq!(pattern, "nlp/completion");
    }

    #[test]
    fn empty_filter_category_is_rejected() {
        assert!(Filter::Name(Vec::new()).validate().is_err());
        assert!(Filter::Name(vec!["a".to_string()]).validate().is_ok());
    }
}
