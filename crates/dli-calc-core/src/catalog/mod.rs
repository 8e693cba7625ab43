//! Method catalog: the fixed registry of collection-method profiles.
//!
//! The standard catalog is built once per process and never mutated. Custom
//! catalogs (configuration overrides, tests) are ordinary values.

mod aliases;

pub use aliases::*;

use std::collections::BTreeMap;
use std::sync::OnceLock;

use thiserror::Error;

use crate::models::{
    Cd3Model, CollectionMethod, InstrumentParameter, MethodProfile, ParameterRange,
};

/// Catalog errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("Unknown collection method: {name}{}", suggestion_hint(.suggestion))]
    UnknownMethod {
        name: String,
        suggestion: Option<String>,
    },

    #[error("Invalid profile for {method}: {reason}")]
    InvalidProfile {
        method: CollectionMethod,
        reason: String,
    },
}

pub(crate) fn suggestion_hint(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (did you mean \"{}\"?)", s))
        .unwrap_or_default()
}

pub type CatalogResult<T> = Result<T, CatalogError>;

static STANDARD: OnceLock<MethodCatalog> = OnceLock::new();

/// Registry of method profiles keyed by method.
pub struct MethodCatalog {
    profiles: BTreeMap<CollectionMethod, MethodProfile>,
    normalizer: MethodNormalizer,
}

impl MethodCatalog {
    /// The process-wide standard catalog.
    pub fn standard() -> &'static MethodCatalog {
        STANDARD.get_or_init(|| MethodCatalog {
            profiles: standard_profiles()
                .into_iter()
                .map(|p| (p.method, p))
                .collect(),
            normalizer: MethodNormalizer::new(),
        })
    }

    /// Build a catalog from explicit profiles. Later profiles replace earlier
    /// ones for the same method.
    pub fn from_profiles<I>(profiles: I) -> CatalogResult<Self>
    where
        I: IntoIterator<Item = MethodProfile>,
    {
        let mut map = BTreeMap::new();
        for profile in profiles {
            if let Some(reason) = profile.validation_error() {
                return Err(CatalogError::InvalidProfile {
                    method: profile.method,
                    reason,
                });
            }
            map.insert(profile.method, profile);
        }

        Ok(Self {
            profiles: map,
            normalizer: MethodNormalizer::new(),
        })
    }

    /// Standard profiles with the given ones substituted by method.
    pub fn with_overrides<I>(overrides: I) -> CatalogResult<Self>
    where
        I: IntoIterator<Item = MethodProfile>,
    {
        Self::from_profiles(standard_profiles().into_iter().chain(overrides))
    }

    /// Look up a profile by free-text method name.
    pub fn lookup(&self, name: &str) -> CatalogResult<&MethodProfile> {
        let method = self.normalizer.resolve(name).ok_or_else(|| self.unknown(name))?;
        self.profiles.get(&method).ok_or_else(|| self.unknown(name))
    }

    /// Look up a profile by method.
    pub fn profile(&self, method: CollectionMethod) -> CatalogResult<&MethodProfile> {
        self.profiles
            .get(&method)
            .ok_or_else(|| CatalogError::UnknownMethod {
                name: method.display_name().to_string(),
                suggestion: None,
            })
    }

    /// Estimate CD3+ % for a method from donor TLC and lymphocyte %.
    ///
    /// Result is always within [50, 95].
    pub fn estimate_cd3_percent(
        &self,
        method: CollectionMethod,
        donor_tlc: f64,
        lymphocyte_percent: f64,
    ) -> CatalogResult<f64> {
        Ok(self
            .profile(method)?
            .estimate_cd3_percent(donor_tlc, lymphocyte_percent))
    }

    /// Registered methods in catalog order.
    pub fn methods(&self) -> Vec<CollectionMethod> {
        self.profiles.keys().copied().collect()
    }

    /// Iterate over all profiles in catalog order.
    pub fn profiles(&self) -> impl Iterator<Item = &MethodProfile> {
        self.profiles.values()
    }

    fn unknown(&self, name: &str) -> CatalogError {
        CatalogError::UnknownMethod {
            name: name.to_string(),
            suggestion: self
                .normalizer
                .suggest(name, self.profiles.keys())
                .map(|m| m.display_name().to_string()),
        }
    }
}

/// Built-in method profiles.
pub fn standard_profiles() -> Vec<MethodProfile> {
    vec![
        MethodProfile {
            method: CollectionMethod::WholeBlood,
            efficiency: 0.25,
            volume_factor: 1.0,
            hematocrit_sensitivity: 0.2,
            rbc_contamination_base: 2000.0,
            cd3_model: Cd3Model {
                base: 55.0,
                tlc_weight: 5.0,
                lymph_weight: 10.0,
            },
            parameter_ranges: BTreeMap::new(),
        },
        MethodProfile {
            method: CollectionMethod::Haemonetics,
            efficiency: 0.85,
            volume_factor: 0.3,
            hematocrit_sensitivity: 0.6,
            rbc_contamination_base: 5.0,
            cd3_model: Cd3Model {
                base: 62.0,
                tlc_weight: 5.0,
                lymph_weight: 12.0,
            },
            parameter_ranges: apheresis_ranges((40.0, 60.0), (11.0, 13.0), (5.0, 15.0)),
        },
        MethodProfile {
            method: CollectionMethod::SpectraOptia,
            efficiency: 0.95,
            volume_factor: 0.2,
            hematocrit_sensitivity: 0.4,
            rbc_contamination_base: 3.0,
            cd3_model: Cd3Model {
                base: 68.0,
                tlc_weight: 5.0,
                lymph_weight: 12.0,
            },
            parameter_ranges: apheresis_ranges((50.0, 70.0), (12.0, 14.0), (5.0, 10.0)),
        },
    ]
}

fn apheresis_ranges(
    flow: (f64, f64),
    acd: (f64, f64),
    plasma: (f64, f64),
) -> BTreeMap<InstrumentParameter, ParameterRange> {
    let mut ranges = BTreeMap::new();
    ranges.insert(InstrumentParameter::InterfacePosition, ParameterRange::new(0.5, 1.5));
    ranges.insert(InstrumentParameter::FlowRate, ParameterRange::new(flow.0, flow.1));
    ranges.insert(InstrumentParameter::AcdRatio, ParameterRange::new(acd.0, acd.1));
    ranges.insert(InstrumentParameter::PlasmaRemoval, ParameterRange::new(plasma.0, plasma.1));
    ranges
}
