//! Collection method models.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Hematocrit (%) at which efficiency and contamination models are normalized.
pub const BASELINE_HEMATOCRIT_PERCENT: f64 = 40.0;

/// Supported lymphocyte collection methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMethod {
    /// Whole-blood draw, no apheresis instrument
    WholeBlood,
    /// Haemonetics cell separator
    Haemonetics,
    /// Spectra Optia apheresis system
    SpectraOptia,
}

impl CollectionMethod {
    /// All methods in catalog order.
    pub const ALL: [CollectionMethod; 3] = [
        CollectionMethod::WholeBlood,
        CollectionMethod::Haemonetics,
        CollectionMethod::SpectraOptia,
    ];

    /// Human-readable method name.
    pub fn display_name(&self) -> &'static str {
        match self {
            CollectionMethod::WholeBlood => "Whole Blood",
            CollectionMethod::Haemonetics => "Haemonetics",
            CollectionMethod::SpectraOptia => "Spectra Optia",
        }
    }

    /// Whether the method runs on an apheresis instrument.
    pub fn is_apheresis(&self) -> bool {
        !matches!(self, CollectionMethod::WholeBlood)
    }
}

impl fmt::Display for CollectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Instrument parameters reported with a calculation.
///
/// Declaration order is the order in which settings are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentParameter {
    /// Separation boundary between cell layers
    InterfacePosition,
    /// Inlet flow rate (mL/min)
    FlowRate,
    /// Anticoagulant ratio, reported as `1:N`
    AcdRatio,
    /// Plasma removed (mL)
    PlasmaRemoval,
    /// Hematocrit derating factor; derived, never tunable
    HematocritEfficiency,
}

impl InstrumentParameter {
    /// Human-readable parameter name.
    pub fn display_name(&self) -> &'static str {
        match self {
            InstrumentParameter::InterfacePosition => "Interface Position",
            InstrumentParameter::FlowRate => "Flow Rate",
            InstrumentParameter::AcdRatio => "ACD Ratio",
            InstrumentParameter::PlasmaRemoval => "Plasma Removal",
            InstrumentParameter::HematocritEfficiency => "Hematocrit Efficiency",
        }
    }

    /// Unit the value is expressed in, if any.
    pub fn unit(&self) -> Option<&'static str> {
        match self {
            InstrumentParameter::FlowRate => Some("mL/min"),
            InstrumentParameter::PlasmaRemoval => Some("mL"),
            _ => None,
        }
    }
}

impl fmt::Display for InstrumentParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Inclusive bound for a tunable instrument parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
}

impl ParameterRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamp a value into this range.
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    /// Check whether a value lies inside this range (inclusive).
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Midpoint of the range.
    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    /// A range is usable when both ends are finite and ordered.
    pub fn is_well_formed(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

/// Linear CD3+ percentage model used when no measured value is available.
///
/// `base + tlc_weight * (tlc / 15) + lymph_weight * (lymph% / 50)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cd3Model {
    pub base: f64,
    pub tlc_weight: f64,
    pub lymph_weight: f64,
}

impl Cd3Model {
    /// Lower bound of an estimated CD3+ percentage.
    pub const MIN_PERCENT: f64 = 50.0;
    /// Upper bound of an estimated CD3+ percentage.
    pub const MAX_PERCENT: f64 = 95.0;

    /// Estimate CD3+ % from donor TLC (×10³/μL) and lymphocyte %.
    pub fn estimate(&self, donor_tlc: f64, lymphocyte_percent: f64) -> f64 {
        let raw = self.base
            + self.tlc_weight * (donor_tlc / 15.0)
            + self.lymph_weight * (lymphocyte_percent / 50.0);
        // NaN inputs fall back to the lower bound
        raw.max(Self::MIN_PERCENT).min(Self::MAX_PERCENT)
    }
}

/// Calculation profile for a collection method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodProfile {
    /// Method this profile describes
    pub method: CollectionMethod,
    /// Collection yield, fraction in (0, 1]
    pub efficiency: f64,
    /// Multiplier from plasma-equivalent volume to instrument output volume
    pub volume_factor: f64,
    /// How strongly hematocrit above baseline degrades efficiency
    pub hematocrit_sensitivity: f64,
    /// RBC contamination (×10⁹ cells) per 500 mL at baseline hematocrit
    pub rbc_contamination_base: f64,
    /// CD3+ estimation coefficients
    pub cd3_model: Cd3Model,
    /// Tunable instrument parameters; empty for non-apheresis draws
    #[serde(default)]
    pub parameter_ranges: BTreeMap<InstrumentParameter, ParameterRange>,
}

impl MethodProfile {
    /// Whether this method emits instrument recommendations.
    pub fn has_instrument_parameters(&self) -> bool {
        !self.parameter_ranges.is_empty()
    }

    /// Declared range for a parameter.
    pub fn range(&self, parameter: InstrumentParameter) -> Option<&ParameterRange> {
        self.parameter_ranges.get(&parameter)
    }

    /// Linear hematocrit derating centered on 40%. Not clamped.
    pub fn hematocrit_efficiency(&self, donor_hematocrit_percent: f64) -> f64 {
        1.0 - self.hematocrit_sensitivity
            * (donor_hematocrit_percent - BASELINE_HEMATOCRIT_PERCENT)
            / BASELINE_HEMATOCRIT_PERCENT
    }

    /// Estimate CD3+ % for this method.
    pub fn estimate_cd3_percent(&self, donor_tlc: f64, lymphocyte_percent: f64) -> f64 {
        self.cd3_model.estimate(donor_tlc, lymphocyte_percent)
    }

    /// Describe the first structural problem with this profile, if any.
    pub fn validation_error(&self) -> Option<String> {
        if !(self.efficiency > 0.0 && self.efficiency <= 1.0) {
            return Some(format!("efficiency {} outside (0, 1]", self.efficiency));
        }
        if !(self.volume_factor >= 0.0 && self.volume_factor.is_finite()) {
            return Some(format!("volume factor {} must be >= 0", self.volume_factor));
        }
        if !self.hematocrit_sensitivity.is_finite() {
            return Some("hematocrit sensitivity must be finite".to_string());
        }
        if !(self.rbc_contamination_base >= 0.0 && self.rbc_contamination_base.is_finite()) {
            return Some(format!(
                "RBC contamination base {} must be >= 0",
                self.rbc_contamination_base
            ));
        }
        if self.parameter_ranges.contains_key(&InstrumentParameter::HematocritEfficiency) {
            return Some("hematocrit efficiency is derived and cannot carry a range".to_string());
        }
        for (parameter, range) in &self.parameter_ranges {
            if !range.is_well_formed() {
                return Some(format!(
                    "{} range [{}, {}] is not well formed",
                    parameter, range.min, range.max
                ));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apheresis_profile() -> MethodProfile {
        let mut ranges = BTreeMap::new();
        ranges.insert(InstrumentParameter::FlowRate, ParameterRange::new(50.0, 70.0));
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
            parameter_ranges: ranges,
        }
    }

    #[test]
    fn test_display_names() {
        assert_eq!(CollectionMethod::WholeBlood.to_string(), "Whole Blood");
        assert_eq!(CollectionMethod::SpectraOptia.to_string(), "Spectra Optia");
        assert_eq!(InstrumentParameter::AcdRatio.to_string(), "ACD Ratio");
        assert!(!CollectionMethod::WholeBlood.is_apheresis());
        assert!(CollectionMethod::Haemonetics.is_apheresis());
    }

    #[test]
    fn test_range_clamp() {
        let range = ParameterRange::new(0.5, 1.5);
        assert_eq!(range.clamp(0.1), 0.5);
        assert_eq!(range.clamp(2.0), 1.5);
        assert_eq!(range.clamp(1.0), 1.0);
        assert!(range.contains(1.5));
        assert!(!range.contains(1.51));
        assert_eq!(range.midpoint(), 1.0);
    }

    #[test]
    fn test_hematocrit_efficiency_baseline() {
        let profile = apheresis_profile();
        assert_eq!(profile.hematocrit_efficiency(40.0), 1.0);
        assert!((profile.hematocrit_efficiency(50.0) - 0.9).abs() < 1e-12);
        // Below baseline the factor exceeds one
        assert!(profile.hematocrit_efficiency(30.0) > 1.0);
    }

    #[test]
    fn test_cd3_estimate_clamped() {
        let model = Cd3Model {
            base: 68.0,
            tlc_weight: 5.0,
            lymph_weight: 12.0,
        };
        // 68 + 5*(15/15) + 12*(50/50) = 85
        assert!((model.estimate(15.0, 50.0) - 85.0).abs() < 1e-12);
        assert_eq!(model.estimate(1000.0, 100.0), Cd3Model::MAX_PERCENT);

        let low = Cd3Model {
            base: 10.0,
            tlc_weight: 0.0,
            lymph_weight: 0.0,
        };
        assert_eq!(low.estimate(8.0, 30.0), Cd3Model::MIN_PERCENT);
    }

    #[test]
    fn test_profile_validation() {
        let mut profile = apheresis_profile();
        assert!(profile.validation_error().is_none());

        profile.efficiency = 0.0;
        assert!(profile.validation_error().is_some());

        let mut profile = apheresis_profile();
        profile
            .parameter_ranges
            .insert(InstrumentParameter::AcdRatio, ParameterRange::new(14.0, 12.0));
        assert!(profile.validation_error().unwrap().contains("ACD Ratio"));
    }
}
