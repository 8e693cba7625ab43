//! Dose request models.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::method::CollectionMethod;

/// Hematocrit band (%) considered clinically plausible for a donor.
pub const PLAUSIBLE_HEMATOCRIT_PERCENT: (f64, f64) = (20.0, 70.0);

/// Source of the CD3+ percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "percent")]
pub enum Cd3Input {
    /// Measured CD3+ % of lymphocytes; authoritative
    Measured(f64),
    /// Estimate from the method's CD3+ model
    Estimate,
}

/// Input snapshot for one dose calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseRequest {
    /// Target dose (×10⁶ CD3+ cells/kg)
    pub dose_cells_per_kg: f64,
    /// Recipient weight (kg)
    pub recipient_weight_kg: f64,
    /// Donor total leukocyte count (×10³ cells/μL)
    pub donor_tlc: f64,
    /// Lymphocytes as % of leukocytes
    pub lymphocyte_percent: f64,
    /// CD3+ % of lymphocytes, or a request to estimate it
    pub cd3: Cd3Input,
    /// Donor hematocrit (%)
    pub donor_hematocrit_percent: f64,
    /// Collection method
    pub method: CollectionMethod,
}

impl DoseRequest {
    /// Create a request at baseline hematocrit with a measured CD3+ %.
    pub fn new(
        method: CollectionMethod,
        dose_cells_per_kg: f64,
        recipient_weight_kg: f64,
        donor_tlc: f64,
        lymphocyte_percent: f64,
        cd3_percent: f64,
    ) -> Self {
        Self {
            dose_cells_per_kg,
            recipient_weight_kg,
            donor_tlc,
            lymphocyte_percent,
            cd3: Cd3Input::Measured(cd3_percent),
            donor_hematocrit_percent: super::BASELINE_HEMATOCRIT_PERCENT,
            method,
        }
    }

    /// Set donor hematocrit.
    pub fn with_hematocrit(mut self, donor_hematocrit_percent: f64) -> Self {
        self.donor_hematocrit_percent = donor_hematocrit_percent;
        self
    }

    /// Switch CD3+ input to the method's estimate.
    pub fn with_estimated_cd3(mut self) -> Self {
        self.cd3 = Cd3Input::Estimate;
        self
    }

    /// Same request at a different dose (used by sweeps).
    pub fn at_dose(&self, dose_cells_per_kg: f64) -> Self {
        Self {
            dose_cells_per_kg,
            ..self.clone()
        }
    }

    /// Whether donor hematocrit lies in the plausible band.
    pub fn is_hematocrit_plausible(&self) -> bool {
        let (low, high) = PLAUSIBLE_HEMATOCRIT_PERCENT;
        self.donor_hematocrit_percent >= low && self.donor_hematocrit_percent <= high
    }
}

/// Donor-recipient relationship, used to pick a recommended dose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DonorRelationship {
    #[serde(rename = "Matched Sibling")]
    MatchedSibling,
    #[serde(rename = "Haploidentical")]
    Haploidentical,
}

impl DonorRelationship {
    pub const ALL: [DonorRelationship; 2] = [
        DonorRelationship::MatchedSibling,
        DonorRelationship::Haploidentical,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            DonorRelationship::MatchedSibling => "Matched Sibling",
            DonorRelationship::Haploidentical => "Haploidentical",
        }
    }

    /// Parse a relationship label, ignoring case and separators.
    pub fn parse(label: &str) -> Option<Self> {
        let key: String = label
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "matchedsibling" | "sibling" | "mrd" => Some(DonorRelationship::MatchedSibling),
            "haploidentical" | "haplo" => Some(DonorRelationship::Haploidentical),
            _ => None,
        }
    }
}

impl fmt::Display for DonorRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_request_defaults() {
        let request = DoseRequest::new(CollectionMethod::WholeBlood, 10.0, 70.0, 8.0, 30.0, 70.0);
        assert_eq!(request.donor_hematocrit_percent, 40.0);
        assert_eq!(request.cd3, Cd3Input::Measured(70.0));
        assert!(request.is_hematocrit_plausible());
    }

    #[test]
    fn test_builders() {
        let request = DoseRequest::new(CollectionMethod::Haemonetics, 10.0, 70.0, 8.0, 30.0, 70.0)
            .with_hematocrit(75.0)
            .with_estimated_cd3();
        assert_eq!(request.cd3, Cd3Input::Estimate);
        assert!(!request.is_hematocrit_plausible());

        let moved = request.at_dose(2.5);
        assert_eq!(moved.dose_cells_per_kg, 2.5);
        assert_eq!(moved.donor_hematocrit_percent, 75.0);
    }

    #[test]
    fn test_relationship_parse() {
        assert_eq!(
            DonorRelationship::parse("Matched Sibling"),
            Some(DonorRelationship::MatchedSibling)
        );
        assert_eq!(
            DonorRelationship::parse("matched-sibling"),
            Some(DonorRelationship::MatchedSibling)
        );
        assert_eq!(
            DonorRelationship::parse("HAPLO"),
            Some(DonorRelationship::Haploidentical)
        );
        assert_eq!(DonorRelationship::parse("cord blood"), None);
    }

    #[test]
    fn test_cd3_input_serde() {
        let json = serde_json::to_string(&Cd3Input::Measured(70.0)).unwrap();
        assert_eq!(json, r#"{"mode":"measured","percent":70.0}"#);
        let parsed: Cd3Input = serde_json::from_str(r#"{"mode":"estimate"}"#).unwrap();
        assert_eq!(parsed, Cd3Input::Estimate);
    }
}
