//! DLI Calculator Core Library
//!
//! Converts a prescribed donor lymphocyte infusion (DLI) dose into a
//! collection plan: volume to draw, expected red-cell contamination, and
//! apheresis instrument settings.
//!
//! # Architecture
//!
//! ```text
//! Presentation layer (sliders, charts)
//!            │  FfiDoseRequest
//!            ▼
//!   ┌─────────────────┐      ┌──────────────────────────┐
//!   │   Dose Engine   │─────▶│      Method Catalog      │
//!   │  compute_dose   │      │ Whole Blood │ Haemonetics │
//!   │  sweep / curve  │      │      Spectra Optia       │
//!   └────────┬────────┘      └──────────────────────────┘
//!            │  DoseResult
//!            ├───────────────────────┐
//!            ▼                       ▼
//!     Collection Worksheet      Dose Curve
//!      (JSON + SHA-256)        (JSON / CSV)
//! ```
//!
//! # Core Principle
//!
//! **Calculations are pure.** The engine never logs, never retries, and never
//! replaces a rejected input with a default.
//!
//! # Modules
//!
//! - [`models`]: Domain types (MethodProfile, DoseRequest, DoseResult, etc.)
//! - [`catalog`]: Registry of collection-method profiles
//! - [`engine`]: Dose-to-volume calculation, dose sweeps, chart markers
//! - [`config`]: Recommended doses and profile overrides from JSON
//! - [`export`]: Collection worksheet and curve export

pub mod catalog;
pub mod config;
pub mod engine;
pub mod export;
pub mod models;

// Re-export commonly used types
pub use catalog::{CatalogError, MethodCatalog};
pub use config::{ConfigError, DoseConfig, RecommendedDoses};
pub use engine::{compute_dose, DoseEngine, DoseError, DoseSweep, SweepPoint};
pub use export::{CollectionWorksheet, CurveExport, WorksheetExporter};
pub use models::{
    Cd3Input, Cd3Source, CollectionMethod, DonorRelationship, DoseRequest, DoseResult,
    InstrumentParameter, InstrumentSetting, MethodProfile, ParameterRange,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::Arc;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum DliError {
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("Degenerate concentration: {0}")]
    DegenerateConcentration(String),

    #[error("Degenerate efficiency: {0}")]
    DegenerateEfficiency(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<DoseError> for DliError {
    fn from(e: DoseError) -> Self {
        let message = e.to_string();
        match e {
            DoseError::UnknownMethod { .. } => DliError::UnknownMethod(message),
            DoseError::OutOfRange { .. } | DoseError::VolumeOverflow { .. } => {
                DliError::OutOfRange(message)
            }
            DoseError::DegenerateConcentration(_) => DliError::DegenerateConcentration(message),
            DoseError::DegenerateEfficiency { .. } => DliError::DegenerateEfficiency(message),
            DoseError::InvalidProfile { .. } => DliError::ConfigError(message),
        }
    }
}

impl From<CatalogError> for DliError {
    fn from(e: CatalogError) -> Self {
        DoseError::from(e).into()
    }
}

impl From<ConfigError> for DliError {
    fn from(e: ConfigError) -> Self {
        DliError::ConfigError(e.to_string())
    }
}

impl From<export::ExportError> for DliError {
    fn from(e: export::ExportError) -> Self {
        match e {
            export::ExportError::Engine(e) => e.into(),
            export::ExportError::Json(e) => e.into(),
        }
    }
}

impl From<serde_json::Error> for DliError {
    fn from(e: serde_json::Error) -> Self {
        DliError::SerializationError(e.to_string())
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Create a calculator with the standard catalog and default doses.
#[uniffi::export]
pub fn new_calculator() -> Arc<DliCalculator> {
    Arc::new(DliCalculator {
        config: DoseConfig::default(),
        catalog: None,
    })
}

/// Create a calculator from a JSON configuration file.
#[uniffi::export]
pub fn open_calculator(config_path: String) -> Result<Arc<DliCalculator>, DliError> {
    let config = DoseConfig::load(&config_path)?;
    Ok(Arc::new(DliCalculator::from_config(config)?))
}

/// Calculate against the standard catalog.
#[uniffi::export]
pub fn calculate_dli(request: FfiDoseRequest) -> Result<FfiDoseResult, DliError> {
    new_calculator().calculate(request)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Calculator bound to a configuration.
#[derive(uniffi::Object)]
pub struct DliCalculator {
    config: DoseConfig,
    /// Custom catalog when the config overrides profiles
    catalog: Option<MethodCatalog>,
}

impl DliCalculator {
    /// Build a calculator from an already loaded configuration.
    pub fn from_config(config: DoseConfig) -> Result<Self, DliError> {
        let catalog = if config.method_overrides.is_empty() {
            None
        } else {
            Some(config.catalog()?)
        };
        Ok(Self { config, catalog })
    }

    fn catalog(&self) -> &MethodCatalog {
        self.catalog
            .as_ref()
            .unwrap_or_else(|| MethodCatalog::standard())
    }

    fn engine(&self) -> DoseEngine<'_> {
        DoseEngine::new(self.catalog())
    }

    fn request(&self, request: &FfiDoseRequest) -> Result<DoseRequest, DliError> {
        let method = self.catalog().lookup(&request.method)?.method;
        Ok(DoseRequest {
            dose_cells_per_kg: request.dose_cells_per_kg,
            recipient_weight_kg: request.recipient_weight_kg,
            donor_tlc: request.donor_tlc,
            lymphocyte_percent: request.lymphocyte_percent,
            cd3: request
                .cd3_percent
                .map(Cd3Input::Measured)
                .unwrap_or(Cd3Input::Estimate),
            donor_hematocrit_percent: request.donor_hematocrit_percent,
            method,
        })
    }

    fn relationship_dose(&self, relationship: &str) -> Result<f64, DliError> {
        let parsed = DonorRelationship::parse(relationship).ok_or_else(|| {
            DliError::OutOfRange(format!("unknown donor relationship: {}", relationship))
        })?;
        self.config
            .recommended_doses
            .dose_for(parsed)
            .ok_or_else(|| DliError::ConfigError(format!("no recommended dose for {}", parsed)))
    }
}

#[uniffi::export]
impl DliCalculator {
    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// List registered collection methods.
    pub fn list_methods(&self) -> Vec<FfiMethodInfo> {
        self.catalog().profiles().map(|p| p.into()).collect()
    }

    /// Estimate CD3+ % for a method.
    pub fn estimate_cd3_percent(
        &self,
        method: String,
        donor_tlc: f64,
        lymphocyte_percent: f64,
    ) -> Result<f64, DliError> {
        let method = self.catalog().lookup(&method)?.method;
        Ok(self
            .engine()
            .estimate_cd3_percent(method, donor_tlc, lymphocyte_percent)?)
    }

    // =========================================================================
    // Calculation Operations
    // =========================================================================

    /// Calculate collection volume and instrument settings.
    pub fn calculate(&self, request: FfiDoseRequest) -> Result<FfiDoseResult, DliError> {
        let request = self.request(&request)?;
        Ok(self.engine().compute(&request)?.into())
    }

    /// Recommended dose (×10⁶ CD3+ cells/kg) for a donor relationship.
    pub fn recommended_dose(&self, relationship: String) -> Result<f64, DliError> {
        self.relationship_dose(&relationship)
    }

    /// Dose-vs-volume curve over the default grid with selected and
    /// recommended markers.
    pub fn dose_volume_curve(
        &self,
        request: FfiDoseRequest,
        relationship: String,
    ) -> Result<FfiDoseCurve, DliError> {
        let request = self.request(&request)?;
        let recommended = self.relationship_dose(&relationship)?;
        let curve = self
            .engine()
            .curve(&request, engine::default_dose_grid(), recommended)?;
        Ok(FfiDoseCurve {
            points: curve.points.into_iter().map(|p| p.into()).collect(),
            selected: curve.markers.selected.into(),
            recommended: curve.markers.recommended.into(),
        })
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Calculate and export a collection worksheet as JSON.
    pub fn collection_worksheet_json(
        &self,
        request: FfiDoseRequest,
        system_id: Option<String>,
    ) -> Result<String, DliError> {
        let request = self.request(&request)?;
        let mut exporter = WorksheetExporter::new(self.engine());
        if let Some(id) = system_id {
            exporter = exporter.with_system_id(id);
        }
        Ok(exporter.export(&request)?.to_json()?)
    }

    /// Export the dose-vs-volume curve as CSV.
    pub fn dose_volume_curve_csv(
        &self,
        request: FfiDoseRequest,
        relationship: String,
    ) -> Result<String, DliError> {
        let request = self.request(&request)?;
        let recommended = self.relationship_dose(&relationship)?;
        Ok(CurveExport::compute(&self.engine(), &request, recommended)?.to_csv())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe dose request. A missing `cd3_percent` requests an estimate.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDoseRequest {
    pub dose_cells_per_kg: f64,
    pub recipient_weight_kg: f64,
    pub donor_tlc: f64,
    pub lymphocyte_percent: f64,
    pub cd3_percent: Option<f64>,
    pub donor_hematocrit_percent: f64,
    pub method: String,
}

/// FFI-safe dose result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDoseResult {
    pub method: String,
    pub required_volume_ml: f64,
    pub rbc_contamination_estimate: f64,
    pub resolved_cd3_percent: f64,
    pub cd3_estimated: bool,
    pub required_cd3_cells: f64,
    pub effective_concentration: f64,
    pub hematocrit_efficiency: f64,
    pub instrument_parameters: Vec<FfiInstrumentSetting>,
}

impl From<DoseResult> for FfiDoseResult {
    fn from(result: DoseResult) -> Self {
        Self {
            method: result.method.display_name().to_string(),
            required_volume_ml: result.required_volume_ml,
            rbc_contamination_estimate: result.rbc_contamination_estimate,
            resolved_cd3_percent: result.resolved_cd3_percent,
            cd3_estimated: result.cd3_source == Cd3Source::Estimated,
            required_cd3_cells: result.required_cd3_cells,
            effective_concentration: result.effective_concentration,
            hematocrit_efficiency: result.hematocrit_efficiency,
            instrument_parameters: result
                .instrument_parameters
                .into_iter()
                .map(|s| s.into())
                .collect(),
        }
    }
}

/// FFI-safe instrument setting.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiInstrumentSetting {
    pub name: String,
    pub value: f64,
    pub display_value: String,
}

impl From<InstrumentSetting> for FfiInstrumentSetting {
    fn from(setting: InstrumentSetting) -> Self {
        Self {
            name: setting.parameter.display_name().to_string(),
            display_value: setting.display_value(),
            value: setting.value,
        }
    }
}

/// FFI-safe method description.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMethodInfo {
    pub name: String,
    pub is_apheresis: bool,
    pub efficiency: f64,
    pub volume_factor: f64,
    pub hematocrit_sensitivity: f64,
    pub parameter_ranges: Vec<FfiParameterRange>,
}

impl From<&MethodProfile> for FfiMethodInfo {
    fn from(profile: &MethodProfile) -> Self {
        Self {
            name: profile.method.display_name().to_string(),
            is_apheresis: profile.method.is_apheresis(),
            efficiency: profile.efficiency,
            volume_factor: profile.volume_factor,
            hematocrit_sensitivity: profile.hematocrit_sensitivity,
            parameter_ranges: profile
                .parameter_ranges
                .iter()
                .map(|(parameter, range)| FfiParameterRange {
                    name: parameter.display_name().to_string(),
                    min: range.min,
                    max: range.max,
                })
                .collect(),
        }
    }
}

/// FFI-safe parameter range.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiParameterRange {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

/// FFI-safe sweep point.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSweepPoint {
    pub dose_cells_per_kg: f64,
    pub required_volume_ml: f64,
    pub total_cd3_cells_e8: f64,
}

impl From<SweepPoint> for FfiSweepPoint {
    fn from(point: SweepPoint) -> Self {
        Self {
            dose_cells_per_kg: point.dose_cells_per_kg,
            required_volume_ml: point.required_volume_ml,
            total_cd3_cells_e8: point.total_cd3_cells_e8,
        }
    }
}

/// FFI-safe dose curve with markers.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDoseCurve {
    pub points: Vec<FfiSweepPoint>,
    pub selected: FfiSweepPoint,
    pub recommended: FfiSweepPoint,
}
