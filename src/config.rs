//! Core configuration loaded from TOML.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Settings that shape request processing.
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// ApiSchema file path or URL.
    pub api_schema_path: Option<String>,
    /// Log request bodies at debug level only when false.
    pub mask_request_body_in_logs: bool,
    /// Skip string-to-boolean/number coercion before validation.
    pub bypass_string_type_coercion: bool,
    /// Resource names allowed to change identity even if their schema says otherwise.
    pub allow_identity_update_overrides: Vec<String>,
    /// Upper bound for the `limit` query parameter.
    pub maximum_page_size: u32,
    /// First path segment of Location headers.
    pub path_base: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            api_schema_path: None,
            mask_request_body_in_logs: true,
            bypass_string_type_coercion: false,
            allow_identity_update_overrides: Vec::new(),
            maximum_page_size: 500,
            path_base: "data".to_string(),
        }
    }
}

impl CoreConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse { source })
    }

    /// Read a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Whether `resource_name` may change its identity on update.
    pub fn allows_identity_update(&self, resource_name: &str, schema_allows: bool) -> bool {
        schema_allows
            || self
                .allow_identity_update_overrides
                .iter()
                .any(|r| r.eq_ignore_ascii_case(resource_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = CoreConfig::from_toml_str("").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.maximum_page_size, 500);
        assert!(config.mask_request_body_in_logs);
    }

    #[test]
    fn parses_all_fields() {
        let config = CoreConfig::from_toml_str(
            r#"
            api_schema_path = "ApiSchema.json"
            mask_request_body_in_logs = false
            bypass_string_type_coercion = true
            allow_identity_update_overrides = ["Student"]
            maximum_page_size = 25
            path_base = "api/data"
            "#,
        )
        .unwrap();

        assert_eq!(config.api_schema_path.as_deref(), Some("ApiSchema.json"));
        assert!(!config.mask_request_body_in_logs);
        assert!(config.bypass_string_type_coercion);
        assert_eq!(config.maximum_page_size, 25);
        assert_eq!(config.path_base, "api/data");
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = CoreConfig::from_toml_str("maximum_page_sise = 10").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn identity_update_override() {
        let config = CoreConfig {
            allow_identity_update_overrides: vec!["student".into()],
            ..CoreConfig::default()
        };
        assert!(config.allows_identity_update("Student", false));
        assert!(config.allows_identity_update("School", true));
        assert!(!config.allows_identity_update("School", false));
    }
}
