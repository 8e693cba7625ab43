//! Dose calculation results.

use serde::{Deserialize, Serialize};

use super::method::{CollectionMethod, InstrumentParameter};

/// Where the CD3+ percentage used in a calculation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cd3Source {
    Measured,
    Estimated,
}

/// A single recommended instrument setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSetting {
    pub parameter: InstrumentParameter,
    /// Recommended value; for ACD ratio this is the denominator N of `1:N`
    pub value: f64,
}

impl InstrumentSetting {
    /// Format the value the way it is shown to operators.
    pub fn display_value(&self) -> String {
        match self.parameter {
            InstrumentParameter::InterfacePosition | InstrumentParameter::HematocritEfficiency => {
                format!("{:.2}", self.value)
            }
            InstrumentParameter::FlowRate => format!("{:.1} mL/min", self.value),
            InstrumentParameter::AcdRatio => format!("1:{}", self.value.round() as i64),
            InstrumentParameter::PlasmaRemoval => format!("{} mL", self.value),
        }
    }
}

/// Output snapshot of one dose calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseResult {
    pub method: CollectionMethod,
    /// Volume to collect (mL)
    pub required_volume_ml: f64,
    /// Estimated RBC contamination (×10⁹ cells)
    pub rbc_contamination_estimate: f64,
    /// CD3+ % actually used
    pub resolved_cd3_percent: f64,
    pub cd3_source: Cd3Source,
    /// Total CD3+ cells needed (×10⁶)
    pub required_cd3_cells: f64,
    /// CD3+ cells per μL of donor blood
    pub effective_concentration: f64,
    /// Hematocrit derating factor (unrounded)
    pub hematocrit_efficiency: f64,
    /// Recommended settings in reporting order; empty for whole blood
    pub instrument_parameters: Vec<InstrumentSetting>,
}

impl DoseResult {
    /// Look up a recommended setting.
    pub fn parameter(&self, parameter: InstrumentParameter) -> Option<f64> {
        self.instrument_parameters
            .iter()
            .find(|s| s.parameter == parameter)
            .map(|s| s.value)
    }

    /// Whether instrument settings were produced.
    pub fn has_instrument_parameters(&self) -> bool {
        !self.instrument_parameters.is_empty()
    }
}
