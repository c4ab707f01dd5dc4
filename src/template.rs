use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A file created when a project is initialized from a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateFile {
    pub path: String,
    #[serde(default)]
    pub content: String,
}

/// Initialization configuration for a new project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub files: Vec<TemplateFile>,
}

/// Known project templates, keyed by identifier
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, TemplateConfig>,
}

impl TemplateRegistry {
    pub fn new(templates: BTreeMap<String, TemplateConfig>) -> Self {
        Self { templates }
    }

    /// Look up the configuration for a template id
    ///
    /// No id, or an id nobody registered, means the project starts empty.
    pub fn resolve(&self, id: Option<&str>) -> Option<&TemplateConfig> {
        id.and_then(|id| self.templates.get(id))
    }

    /// Like `resolve`, but an id that is given and unknown is an error
    pub fn require(&self, id: Option<&str>) -> Result<Option<&TemplateConfig>> {
        match id {
            None => Ok(None),
            Some(id) => self
                .resolve(Some(id))
                .map(Some)
                .ok_or_else(|| Error::UnknownTemplate {
                    id: id.to_string(),
                    known: self.ids().collect::<Vec<_>>().join(", "),
                }),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TemplateRegistry {
        let mut templates = BTreeMap::new();
        templates.insert(
            "essay".to_string(),
            TemplateConfig {
                description: "Five paragraph essay".to_string(),
                files: vec![TemplateFile {
                    path: "essay.md".to_string(),
                    content: "# Title\n".to_string(),
                }],
            },
        );
        TemplateRegistry::new(templates)
    }

    #[test]
    fn test_resolve_known_template() {
        let registry = registry();
        let config = registry.resolve(Some("essay")).unwrap();

        assert_eq!(config.files[0].path, "essay.md");
    }

    #[test]
    fn test_resolve_absent_or_unknown() {
        let registry = registry();

        assert!(registry.resolve(None).is_none());
        assert!(registry.resolve(Some("novel")).is_none());
    }

    #[test]
    fn test_require_unknown_template() {
        let registry = registry();

        assert!(registry.require(None).unwrap().is_none());
        assert_eq!(registry.require(Some("essay")).unwrap().unwrap().files.len(), 1);
        match registry.require(Some("novel")) {
            Err(Error::UnknownTemplate { id, known }) => {
                assert_eq!(id, "novel");
                assert_eq!(known, "essay");
            }
            other => panic!("Expected Error::UnknownTemplate, got {:?}", other),
        }
    }
}
