//! Configuration for the dossier workflow

use crate::catalog::ValidationCatalog;
use dossier_types::{CatalogError, ValidationCategory};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid catalog: {0}")]
    Catalog(#[from] CatalogError),
}

/// Main workflow configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Dossier numbering
    #[serde(default)]
    pub numbering: NumberingConfig,

    /// Comptabilization submission
    #[serde(default)]
    pub ac_submission: AcSubmissionConfig,

    /// Notifications to the dossier author
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Checklist override; the built-in catalog is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<Vec<ValidationCategory>>,
}

/// Numbering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumberingConfig {
    /// Middle segment of generated numbers (`DOSS-{prefix}-{year}{seq}`)
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

/// Comptabilization submission configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcSubmissionConfig {
    /// Upper bound on one submission call, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for AcSubmissionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AcSubmissionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_prefix() -> String {
    "ACGE".to_string()
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

impl WorkflowConfig {
    /// Load configuration: defaults, then an optional file, then
    /// `DOSSIER_`-prefixed environment variables (`__` separates sections,
    /// e.g. `DOSSIER_AC_SUBMISSION__TIMEOUT_MS`).
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&WorkflowConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("DOSSIER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: WorkflowConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.numbering.prefix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "numbering.prefix must not be empty".into(),
            ));
        }
        if self.ac_submission.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "ac_submission.timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// The configured catalog, or the built-in one
    pub fn build_catalog(&self) -> Result<ValidationCatalog, ConfigError> {
        match &self.catalog {
            Some(categories) => Ok(ValidationCatalog::new(categories.clone())?),
            None => Ok(ValidationCatalog::default()),
        }
    }

    /// Format a generated dossier number
    pub fn dossier_number(&self, year: i32, sequence: u64) -> String {
        format!("DOSS-{}-{}{:03}", self.numbering.prefix, year, sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_types::Phase;

    #[test]
    fn test_default_config() {
        let config = WorkflowConfig::default();
        assert_eq!(config.numbering.prefix, "ACGE");
        assert_eq!(config.ac_submission.timeout(), Duration::from_secs(5));
        assert!(config.notifications.enabled);
        assert!(config.validate().is_ok());
        assert_eq!(
            config.build_catalog().unwrap(),
            ValidationCatalog::default()
        );
    }

    #[test]
    fn test_dossier_number_format() {
        let config = WorkflowConfig::default();
        assert_eq!(config.dossier_number(2025, 1), "DOSS-ACGE-2025001");
        assert_eq!(config.dossier_number(2025, 1234), "DOSS-ACGE-20251234");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = WorkflowConfig::default();
        config.numbering.prefix = "  ".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = WorkflowConfig::default();
        config.ac_submission.timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_catalog_override() {
        let config = WorkflowConfig {
            catalog: Some(vec![ValidationCategory::new(
                "seul",
                "Seule catégorie",
                Phase::CbTypeOperation,
            )
            .with_item("a", "A")]),
            ..Default::default()
        };
        assert!(matches!(
            config.build_catalog(),
            Err(ConfigError::Catalog(CatalogError::MissingPhase(_)))
        ));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = WorkflowConfig::load(None).unwrap();
        assert!(config.catalog.is_none());
        assert!(!config.numbering.prefix.is_empty());
    }
}
