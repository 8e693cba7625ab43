//! Instrument setting recommendations for apheresis methods.
//!
//! Each tunable value is re-clamped into the method's declared range after
//! hematocrit adjustment.

use crate::models::{
    DoseRequest, InstrumentParameter, InstrumentSetting, MethodProfile,
    BASELINE_HEMATOCRIT_PERCENT,
};

/// Hematocrit (%) above which anticoagulant and plasma removal are stepped up.
pub const ELEVATED_HEMATOCRIT_PERCENT: f64 = 45.0;

/// Extra plasma removed (mL) at elevated hematocrit.
const ELEVATED_PLASMA_STEP_ML: f64 = 5.0;

/// Derive settings for every parameter the method declares.
///
/// Methods without tunables (whole blood) get an empty list. Hematocrit
/// efficiency is reported last, rounded to two decimals.
pub fn recommend_settings(
    profile: &MethodProfile,
    request: &DoseRequest,
    hematocrit_efficiency: f64,
) -> Vec<InstrumentSetting> {
    if !profile.has_instrument_parameters() {
        return Vec::new();
    }

    let hct = request.donor_hematocrit_percent;
    let hct_deviation = (hct - BASELINE_HEMATOCRIT_PERCENT) / BASELINE_HEMATOCRIT_PERCENT;
    let elevated = hct > ELEVATED_HEMATOCRIT_PERCENT;

    let mut settings = Vec::with_capacity(profile.parameter_ranges.len() + 1);

    for (&parameter, range) in &profile.parameter_ranges {
        let raw = match parameter {
            InstrumentParameter::InterfacePosition => {
                1.0 - 0.5 * (request.donor_tlc / 15.0)
                    + 0.25 * (request.lymphocyte_percent / 50.0)
                    - 0.2 * hct_deviation
            }
            // Lymphocyte-rich blood runs faster; viscous blood slower
            InstrumentParameter::FlowRate => {
                range.min
                    + (range.max - range.min)
                        * (request.lymphocyte_percent / 100.0)
                        * (1.0 - 0.2 * hct_deviation)
            }
            InstrumentParameter::AcdRatio => {
                // Half-way midpoints round to even
                range.midpoint().round_ties_even() + if elevated { 1.0 } else { 0.0 }
            }
            InstrumentParameter::PlasmaRemoval => {
                range.min + if elevated { ELEVATED_PLASMA_STEP_ML } else { 0.0 }
            }
            InstrumentParameter::HematocritEfficiency => continue,
        };

        settings.push(InstrumentSetting {
            parameter,
            value: range.clamp(raw),
        });
    }

    settings.push(InstrumentSetting {
        parameter: InstrumentParameter::HematocritEfficiency,
        value: round_to(hematocrit_efficiency, 2),
    });

    settings
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
