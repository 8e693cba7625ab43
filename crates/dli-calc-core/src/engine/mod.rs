//! Dose engine: converts a CD3+ dose target into a collection plan.
//!
//! Pipeline: Validation → CD3+ Resolution → Concentration → Hematocrit Derating
//! → Volume → RBC Contamination → Instrument Settings
//!
//! Every call is pure. The engine only borrows a catalog, so one engine can be
//! shared across threads.

mod instrument;
mod sweep;

pub use instrument::*;
pub use sweep::*;

use thiserror::Error;

use crate::catalog::{suggestion_hint, CatalogError, MethodCatalog};
use crate::models::{
    Cd3Input, Cd3Source, CollectionMethod, DoseRequest, DoseResult, MethodProfile,
    BASELINE_HEMATOCRIT_PERCENT,
};

/// Dose values are expressed in millions of cells.
const CELLS_PER_MILLION: f64 = 1e6;

/// TLC is expressed in thousands of cells per μL.
const TLC_UNIT: f64 = 1e3;

/// μL per mL.
const UL_PER_ML: f64 = 1e3;

/// Reference volume (mL) for the RBC contamination baseline.
const RBC_REFERENCE_VOLUME_ML: f64 = 500.0;

/// Dose engine errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DoseError {
    #[error("Unknown collection method: {name}{}", suggestion_hint(.suggestion))]
    UnknownMethod {
        name: String,
        suggestion: Option<String>,
    },

    #[error("{field} = {value} is out of range (expected {expected})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("Effective CD3+ concentration is not positive: {0} cells/μL")]
    DegenerateConcentration(f64),

    #[error(
        "Collection efficiency is not positive: efficiency {efficiency} × hematocrit derating {hematocrit_efficiency}"
    )]
    DegenerateEfficiency {
        efficiency: f64,
        hematocrit_efficiency: f64,
    },

    #[error(
        "Required volume is not finite: {required_cd3_cells} ×10⁶ CD3+ cells at {effective_concentration} cells/μL"
    )]
    VolumeOverflow {
        required_cd3_cells: f64,
        effective_concentration: f64,
    },

    #[error("Invalid profile for {method}: {reason}")]
    InvalidProfile {
        method: CollectionMethod,
        reason: String,
    },
}

impl From<CatalogError> for DoseError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::UnknownMethod { name, suggestion } => {
                DoseError::UnknownMethod { name, suggestion }
            }
            CatalogError::InvalidProfile { method, reason } => {
                DoseError::InvalidProfile { method, reason }
            }
        }
    }
}

pub type EngineResult<T> = Result<T, DoseError>;

/// Calculate a collection plan against the standard catalog.
pub fn compute_dose(request: &DoseRequest) -> EngineResult<DoseResult> {
    DoseEngine::standard().compute(request)
}

/// Dose calculator bound to a method catalog.
#[derive(Clone, Copy)]
pub struct DoseEngine<'a> {
    catalog: &'a MethodCatalog,
}

impl DoseEngine<'static> {
    /// Engine over the standard catalog.
    pub fn standard() -> Self {
        Self::new(MethodCatalog::standard())
    }
}

impl<'a> DoseEngine<'a> {
    /// Create an engine over a catalog.
    pub fn new(catalog: &'a MethodCatalog) -> Self {
        Self { catalog }
    }

    /// The catalog this engine reads profiles from.
    pub fn catalog(&self) -> &'a MethodCatalog {
        self.catalog
    }

    /// Calculate the collection plan for a request.
    pub fn compute(&self, request: &DoseRequest) -> EngineResult<DoseResult> {
        // Step 1: Validate inputs and resolve the profile
        validate(request)?;
        let profile = self.catalog.profile(request.method)?;

        // Step 2: Measured CD3+ % wins over the estimate
        let (cd3_percent, cd3_source) = resolve_cd3(profile, request);

        // Step 3: Cells to collect and how densely donor blood carries them
        let required_cd3_cells = request.dose_cells_per_kg * request.recipient_weight_kg;
        let effective_concentration = request.donor_tlc
            * TLC_UNIT
            * (request.lymphocyte_percent / 100.0)
            * (cd3_percent / 100.0);
        if !(effective_concentration > 0.0) {
            return Err(DoseError::DegenerateConcentration(effective_concentration));
        }

        // Step 4: Hematocrit derating, surfaced unclamped
        let hematocrit_efficiency = profile.hematocrit_efficiency(request.donor_hematocrit_percent);
        let combined_efficiency = profile.efficiency * hematocrit_efficiency;
        if !(combined_efficiency > 0.0) {
            return Err(DoseError::DegenerateEfficiency {
                efficiency: profile.efficiency,
                hematocrit_efficiency,
            });
        }

        // Step 5: cells / (cells/μL) = μL, scaled to instrument output in mL.
        // Units are scaled last; dose × weight × 1e6 may not fit an f64.
        let required_volume_ml = required_cd3_cells
            / (effective_concentration * combined_efficiency)
            * (CELLS_PER_MILLION * profile.volume_factor / UL_PER_ML);
        if !required_volume_ml.is_finite() {
            return Err(DoseError::VolumeOverflow {
                required_cd3_cells,
                effective_concentration,
            });
        }

        // Step 6: RBC contamination scales with hematocrit and volume
        let rbc_contamination_estimate = profile.rbc_contamination_base
            * (request.donor_hematocrit_percent / BASELINE_HEMATOCRIT_PERCENT)
            * (required_volume_ml / RBC_REFERENCE_VOLUME_ML);

        // Step 7: Instrument settings for apheresis methods
        let instrument_parameters = recommend_settings(profile, request, hematocrit_efficiency);

        Ok(DoseResult {
            method: request.method,
            required_volume_ml,
            rbc_contamination_estimate,
            resolved_cd3_percent: cd3_percent,
            cd3_source,
            required_cd3_cells,
            effective_concentration,
            hematocrit_efficiency,
            instrument_parameters,
        })
    }

    /// Estimate CD3+ % for a method without running a full calculation.
    pub fn estimate_cd3_percent(
        &self,
        method: CollectionMethod,
        donor_tlc: f64,
        lymphocyte_percent: f64,
    ) -> EngineResult<f64> {
        check_positive("donor_tlc", donor_tlc)?;
        check_percent("lymphocyte_percent", lymphocyte_percent)?;
        Ok(self
            .catalog
            .estimate_cd3_percent(method, donor_tlc, lymphocyte_percent)?)
    }
}

fn resolve_cd3(profile: &MethodProfile, request: &DoseRequest) -> (f64, Cd3Source) {
    match request.cd3 {
        Cd3Input::Measured(percent) => (percent, Cd3Source::Measured),
        Cd3Input::Estimate => (
            profile.estimate_cd3_percent(request.donor_tlc, request.lymphocyte_percent),
            Cd3Source::Estimated,
        ),
    }
}

/// Check every scalar against its domain.
pub fn validate(request: &DoseRequest) -> EngineResult<()> {
    check_positive("dose_cells_per_kg", request.dose_cells_per_kg)?;
    check_positive("recipient_weight_kg", request.recipient_weight_kg)?;
    check_positive("donor_tlc", request.donor_tlc)?;
    check_percent("lymphocyte_percent", request.lymphocyte_percent)?;
    if let Cd3Input::Measured(percent) = request.cd3 {
        check_percent("cd3_percent", percent)?;
    }
    check_percent("donor_hematocrit_percent", request.donor_hematocrit_percent)?;
    Ok(())
}

fn check_positive(field: &'static str, value: f64) -> EngineResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DoseError::OutOfRange {
            field,
            value,
            expected: "a finite value > 0",
        })
    }
}

fn check_percent(field: &'static str, value: f64) -> EngineResult<()> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(DoseError::OutOfRange {
            field,
            value,
            expected: "a percentage in [0, 100]",
        })
    }
}
