//! Dose sweeps for dose-vs-volume charts.

use serde::{Deserialize, Serialize};

use crate::models::DoseRequest;

use super::{DoseEngine, EngineResult};

/// Default chart grid: 50 doses from 0.5 to 20 ×10⁶ CD3+ cells/kg.
pub const DEFAULT_CHART_DOSES: (f64, f64, usize) = (0.5, 20.0, 50);

/// One point on a dose-vs-volume curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    /// Dose (×10⁶ CD3+ cells/kg)
    pub dose_cells_per_kg: f64,
    /// Required collection volume (mL)
    pub required_volume_ml: f64,
    /// Total CD3+ cells delivered (×10⁸)
    pub total_cd3_cells_e8: f64,
}

/// Lazy sequence of sweep points, one independent calculation per dose.
///
/// Points come out in the order the doses were supplied. Cloning the sweep
/// before iterating restarts it from the first dose.
#[derive(Clone)]
pub struct DoseSweep<'a, I> {
    engine: DoseEngine<'a>,
    request: DoseRequest,
    doses: I,
}

impl<'a, I> Iterator for DoseSweep<'a, I>
where
    I: Iterator<Item = f64>,
{
    type Item = EngineResult<SweepPoint>;

    fn next(&mut self) -> Option<Self::Item> {
        let dose = self.doses.next()?;
        Some(self.engine.point(&self.request, dose))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.doses.size_hint()
    }
}

/// Selected and recommended doses placed on a curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartMarkers {
    pub selected: SweepPoint,
    pub recommended: SweepPoint,
}

/// A full dose-vs-volume curve with its markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseCurve {
    pub points: Vec<SweepPoint>,
    pub markers: ChartMarkers,
}

impl<'a> DoseEngine<'a> {
    /// Sweep `doses` while holding every other input of `request` fixed.
    pub fn sweep<D>(&self, request: &DoseRequest, doses: D) -> DoseSweep<'a, D::IntoIter>
    where
        D: IntoIterator<Item = f64>,
    {
        DoseSweep {
            engine: *self,
            request: request.clone(),
            doses: doses.into_iter(),
        }
    }

    /// Markers for the request's own dose and a recommended dose.
    pub fn chart_markers(
        &self,
        request: &DoseRequest,
        recommended_dose: f64,
    ) -> EngineResult<ChartMarkers> {
        Ok(ChartMarkers {
            selected: self.point(request, request.dose_cells_per_kg)?,
            recommended: self.point(request, recommended_dose)?,
        })
    }

    /// Curve over `doses` plus markers; fails on the first invalid point.
    pub fn curve<D>(
        &self,
        request: &DoseRequest,
        doses: D,
        recommended_dose: f64,
    ) -> EngineResult<DoseCurve>
    where
        D: IntoIterator<Item = f64>,
    {
        let points = self
            .sweep(request, doses)
            .collect::<EngineResult<Vec<_>>>()?;
        let markers = self.chart_markers(request, recommended_dose)?;
        Ok(DoseCurve { points, markers })
    }

    fn point(&self, request: &DoseRequest, dose: f64) -> EngineResult<SweepPoint> {
        let result = self.compute(&request.at_dose(dose))?;
        Ok(SweepPoint {
            dose_cells_per_kg: dose,
            required_volume_ml: result.required_volume_ml,
            total_cd3_cells_e8: result.required_cd3_cells / 100.0,
        })
    }
}

/// `count` evenly spaced values from `start` to `end` inclusive.
pub fn dose_grid(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count)
                .map(|i| if i == count - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// The default chart grid.
pub fn default_dose_grid() -> Vec<f64> {
    let (start, end, count) = DEFAULT_CHART_DOSES;
    dose_grid(start, end, count)
}
