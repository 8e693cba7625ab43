//! Calculator configuration.
//!
//! Holds the recommended-dose table and optional method profile overrides,
//! loaded from JSON. `load_or_default` never fails: a missing or malformed
//! file is logged and replaced by the built-in defaults.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{CatalogError, MethodCatalog};
use crate::models::{DonorRelationship, MethodProfile};

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Recommended dose for {relationship} must be > 0, got {dose}")]
    InvalidDose {
        relationship: DonorRelationship,
        dose: f64,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Recommended DLI dose (×10⁶ CD3+ cells/kg) per donor relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecommendedDoses {
    doses: BTreeMap<DonorRelationship, f64>,
}

impl Default for RecommendedDoses {
    fn default() -> Self {
        let mut doses = BTreeMap::new();
        doses.insert(DonorRelationship::MatchedSibling, 10.0);
        doses.insert(DonorRelationship::Haploidentical, 1.0);
        Self { doses }
    }
}

impl RecommendedDoses {
    /// Recommended dose for a relationship.
    pub fn dose_for(&self, relationship: DonorRelationship) -> Option<f64> {
        self.doses.get(&relationship).copied()
    }

    /// Fill relationships the table does not mention from the defaults.
    fn fill_defaults(&mut self) {
        for (relationship, dose) in RecommendedDoses::default().doses {
            self.doses.entry(relationship).or_insert(dose);
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        for (&relationship, &dose) in &self.doses {
            if !(dose.is_finite() && dose > 0.0) {
                return Err(ConfigError::InvalidDose { relationship, dose });
            }
        }
        Ok(())
    }
}

/// Top-level calculator configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoseConfig {
    /// Recommended dose table used for chart markers
    #[serde(default)]
    pub recommended_doses: RecommendedDoses,
    /// Profiles replacing the standard ones, by method
    #[serde(default)]
    pub method_overrides: Vec<MethodProfile>,
}

impl DoseConfig {
    /// Parse and validate configuration JSON.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let mut config: DoseConfig = serde_json::from_str(json)?;
        config.recommended_doses.fill_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Load configuration from a file, or use defaults if it is missing or invalid.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => {
                log::info!(
                    "Loaded DLI config from {:?} ({} method overrides)",
                    path,
                    config.method_overrides.len()
                );
                config
            }
            Err(ConfigError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                log::info!("DLI config file {:?} not found, using defaults", path);
                Self::default()
            }
            Err(e) => {
                log::warn!("Failed to load DLI config {:?}: {}, using defaults", path, e);
                Self::default()
            }
        }
    }

    /// Check doses and override profiles.
    pub fn validate(&self) -> ConfigResult<()> {
        self.recommended_doses.validate()?;
        for profile in &self.method_overrides {
            if let Some(reason) = profile.validation_error() {
                return Err(CatalogError::InvalidProfile {
                    method: profile.method,
                    reason,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Build a catalog from the standard profiles plus overrides.
    pub fn catalog(&self) -> ConfigResult<MethodCatalog> {
        Ok(MethodCatalog::with_overrides(self.method_overrides.iter().cloned())?)
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CollectionMethod;

    #[test]
    fn test_default_recommended_doses() {
        let doses = RecommendedDoses::default();
        assert_eq!(doses.dose_for(DonorRelationship::MatchedSibling), Some(10.0));
        assert_eq!(doses.dose_for(DonorRelationship::Haploidentical), Some(1.0));
    }

    #[test]
    fn test_recommended_doses_json_shape() {
        let json = serde_json::to_string(&RecommendedDoses::default()).unwrap();
        assert_eq!(json, r#"{"Matched Sibling":10.0,"Haploidentical":1.0}"#);
    }

    #[test]
    fn test_partial_table_keeps_defaults() {
        let config = DoseConfig::from_json(r#"{"recommended_doses": {"Haploidentical": 0.5}}"#)
            .unwrap();
        assert_eq!(
            config.recommended_doses.dose_for(DonorRelationship::Haploidentical),
            Some(0.5)
        );
        assert_eq!(
            config.recommended_doses.dose_for(DonorRelationship::MatchedSibling),
            Some(10.0)
        );
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = DoseConfig::from_json("{}").unwrap();
        assert_eq!(config, DoseConfig::default());
    }

    #[test]
    fn test_invalid_dose_rejected() {
        let err = DoseConfig::from_json(r#"{"recommended_doses": {"Matched Sibling": 0}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDose { .. }));
    }

    #[test]
    fn test_override_catalog() {
        let mut profile = MethodCatalog::standard()
            .profile(CollectionMethod::Haemonetics)
            .unwrap()
            .clone();
        profile.efficiency = 0.8;
        let config = DoseConfig {
            method_overrides: vec![profile],
            ..DoseConfig::default()
        };

        let json = config.to_json().unwrap();
        let parsed = DoseConfig::from_json(&json).unwrap();
        let catalog = parsed.catalog().unwrap();
        assert_eq!(
            catalog.profile(CollectionMethod::Haemonetics).unwrap().efficiency,
            0.8
        );
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut profile = MethodCatalog::standard()
            .profile(CollectionMethod::WholeBlood)
            .unwrap()
            .clone();
        profile.efficiency = 1.5;
        let config = DoseConfig {
            method_overrides: vec![profile],
            ..DoseConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Catalog(CatalogError::InvalidProfile { .. }))
        ));
    }
}
