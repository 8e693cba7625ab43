//! Dose-vs-volume curve export for charting tools.

use serde::{Deserialize, Serialize};

use crate::engine::{default_dose_grid, DoseCurve, DoseEngine, EngineResult};
use crate::models::{CollectionMethod, DoseRequest};

/// Curve export with the context needed to label a chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveExport {
    /// Collection method the curve was computed for
    pub method: CollectionMethod,
    /// Recipient weight (kg)
    pub recipient_weight_kg: f64,
    /// Export timestamp
    pub exported_at: String,
    /// Points and markers
    pub curve: DoseCurve,
}

impl CurveExport {
    /// Compute the default chart grid for a request.
    pub fn compute(
        engine: &DoseEngine<'_>,
        request: &DoseRequest,
        recommended_dose: f64,
    ) -> EngineResult<Self> {
        let curve = engine.curve(request, default_dose_grid(), recommended_dose)?;
        Ok(Self {
            method: request.method,
            recipient_weight_kg: request.recipient_weight_kg,
            exported_at: chrono::Utc::now().to_rfc3339(),
            curve,
        })
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV format. Marker rows are flagged in the last column.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        // Header
        csv.push_str("method,dose_cells_per_kg,required_volume_ml,total_cd3_cells_e8,marker\n");

        let method = escape_csv(self.method.display_name());
        let markers = [
            (&self.curve.markers.selected, "selected"),
            (&self.curve.markers.recommended, "recommended"),
        ];
        let rows = self
            .curve
            .points
            .iter()
            .map(|p| (p, ""))
            .chain(markers);

        for (point, marker) in rows {
            csv.push_str(&format!(
                "{},{},{},{},{}\n",
                method,
                point.dose_cells_per_kg,
                point.required_volume_ml,
                point.total_cd3_cells_e8,
                marker,
            ));
        }

        csv
    }
}

/// Escape a value for CSV.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn export() -> CurveExport {
        let request = DoseRequest::new(CollectionMethod::Haemonetics, 4.0, 70.0, 8.0, 30.0, 70.0);
        CurveExport::compute(&DoseEngine::standard(), &request, 10.0).unwrap()
    }

    #[test]
    fn test_csv_rows() {
        let csv = export().to_csv();
        let lines: Vec<&str> = csv.lines().collect();

        // Header + 50 grid points + 2 markers
        assert_eq!(lines.len(), 53);
        assert!(lines[0].starts_with("method,dose_cells_per_kg"));
        assert!(lines[1].starts_with("Haemonetics,0.5,"));
        assert!(lines[51].ends_with(",selected"));
        assert!(lines[52].starts_with("Haemonetics,10,"));
        assert!(lines[52].ends_with(",recommended"));
    }

    #[test]
    fn test_json_export() {
        let json = export().to_json().unwrap();
        assert!(json.contains("\"method\": \"haemonetics\""));
        assert!(json.contains("\"markers\""));
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
