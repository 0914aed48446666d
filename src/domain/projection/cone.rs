use serde::{Deserialize, Serialize};

use crate::domain::errors::{AppError, PipelineResult};
use crate::domain::logging::LogComponent;
use crate::log_warn;

/// Forecast score at one horizon; index 0 is the "now" anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionPoint {
    pub horizon_label: String,
    pub score: f64,
}

impl ProjectionPoint {
    pub fn new(horizon_label: impl Into<String>, score: f64) -> Self {
        Self { horizon_label: horizon_label.into(), score }
    }
}

/// Cone width parameters.
///
/// `sigma(0) = anchor_sigma`; for horizon `h >= 1`,
/// `sigma(h) = max(sigma(h-1), sigma_base * h + sigma_k * |score(h) - score(h-1)|)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConeParams {
    anchor_sigma: f64,
    sigma_base: f64,
    sigma_k: f64,
}

impl Default for ConeParams {
    fn default() -> Self {
        Self { anchor_sigma: 0.5, sigma_base: 2.0, sigma_k: 0.5 }
    }
}

impl ConeParams {
    pub fn new(anchor_sigma: f64, sigma_base: f64, sigma_k: f64) -> PipelineResult<Self> {
        for (name, value) in [("anchorSigma", anchor_sigma), ("sigmaBase", sigma_base), ("sigmaK", sigma_k)] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::config(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(Self { anchor_sigma, sigma_base, sigma_k })
    }

    pub fn anchor_sigma(&self) -> f64 {
        self.anchor_sigma
    }

    pub fn sigma_base(&self) -> f64 {
        self.sigma_base
    }

    pub fn sigma_k(&self) -> f64 {
        self.sigma_k
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConePoint {
    pub x: f64,
    pub horizon_label: String,
    pub value: f64,
}

/// One row per horizon for filled-area plus line rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConeRow {
    pub x: f64,
    pub horizon_label: String,
    pub center: f64,
    pub upper: f64,
    pub lower: f64,
}

/// Center path with upper/lower bound paths sharing the same x coordinates.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cone {
    pub center: Vec<ConePoint>,
    pub upper: Vec<ConePoint>,
    pub lower: Vec<ConePoint>,
    pub sigmas: Vec<f64>,
}

impl Cone {
    pub fn is_empty(&self) -> bool {
        self.center.is_empty()
    }

    pub fn len(&self) -> usize {
        self.center.len()
    }

    pub fn width_at(&self, index: usize) -> Option<f64> {
        Some(self.upper.get(index)?.value - self.lower.get(index)?.value)
    }

    pub fn rows(&self) -> Vec<ConeRow> {
        self.center
            .iter()
            .zip(self.upper.iter().zip(&self.lower))
            .map(|(c, (u, l))| ConeRow {
                x: c.x,
                horizon_label: c.horizon_label.clone(),
                center: c.value,
                upper: u.value,
                lower: l.value,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectionConeBuilder {
    params: ConeParams,
}

impl ProjectionConeBuilder {
    pub fn new(params: ConeParams) -> Self {
        Self { params }
    }

    /// Sigma per horizon for already-validated points; non-decreasing by construction.
    pub fn sigma_profile(&self, points: &[ProjectionPoint]) -> Vec<f64> {
        let mut sigmas: Vec<f64> = Vec::with_capacity(points.len());
        for (h, point) in points.iter().enumerate() {
            let sigma = match (h, sigmas.last()) {
                (0, _) | (_, None) => self.params.anchor_sigma,
                (_, Some(&prev)) => {
                    let delta = (point.score - points[h - 1].score).abs();
                    let raw = self.params.sigma_base * h as f64 + self.params.sigma_k * delta;
                    raw.max(prev)
                }
            };
            sigmas.push(sigma);
        }
        sigmas
    }

    pub fn build(&self, points: &[ProjectionPoint]) -> Cone {
        let usable = Self::usable_points(points);
        let sigmas = self.sigma_profile(&usable);
        Self::assemble(&usable, sigmas)
    }

    /// Build from a caller-supplied sigma per input point.
    ///
    /// Negative or non-finite sigmas carry the previous width forward, and the
    /// profile is made non-decreasing.
    pub fn build_with_sigmas(&self, points: &[ProjectionPoint], sigmas: &[f64]) -> PipelineResult<Cone> {
        if points.len() != sigmas.len() {
            return Err(AppError::Validation(format!(
                "expected {} sigma values, got {}",
                points.len(),
                sigmas.len()
            )));
        }

        let mut kept = Vec::with_capacity(points.len());
        let mut profile: Vec<f64> = Vec::with_capacity(points.len());
        for (point, &sigma) in points.iter().zip(sigmas) {
            if !point.score.is_finite() {
                continue;
            }
            let prev = profile.last().copied().unwrap_or(0.0);
            let sigma = if sigma.is_finite() && sigma >= 0.0 { sigma.max(prev) } else { prev };
            kept.push(point.clone());
            profile.push(sigma);
        }
        if kept.len() < points.len() {
            log_warn!(
                LogComponent::Domain("ProjectionCone"),
                "dropped {} projection point(s) with non-finite scores",
                points.len() - kept.len()
            );
        }
        Ok(Self::assemble(&kept, profile))
    }

    fn usable_points(points: &[ProjectionPoint]) -> Vec<ProjectionPoint> {
        let usable: Vec<ProjectionPoint> =
            points.iter().filter(|p| p.score.is_finite()).cloned().collect();
        if usable.len() < points.len() {
            log_warn!(
                LogComponent::Domain("ProjectionCone"),
                "dropped {} projection point(s) with non-finite scores",
                points.len() - usable.len()
            );
        }
        usable
    }

    fn assemble(points: &[ProjectionPoint], sigmas: Vec<f64>) -> Cone {
        let path = |offset: &dyn Fn(usize) -> f64| -> Vec<ConePoint> {
            points
                .iter()
                .enumerate()
                .map(|(i, p)| ConePoint {
                    x: i as f64,
                    horizon_label: p.horizon_label.clone(),
                    value: p.score + offset(i),
                })
                .collect()
        };

        Cone {
            center: path(&|_| 0.0),
            upper: path(&|i| sigmas[i]),
            lower: path(&|i| -sigmas[i]),
            sigmas: sigmas.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn horizons(scores: &[f64]) -> Vec<ProjectionPoint> {
        let labels = ["now", "3m", "6m", "12m", "24m"];
        scores.iter().enumerate().map(|(i, &s)| ProjectionPoint::new(labels[i], s)).collect()
    }

    #[test]
    fn anchor_has_fixed_small_sigma() {
        let cone = ProjectionConeBuilder::default().build(&horizons(&[60.0, 55.0, 50.0, 48.0]));
        assert_eq!(cone.sigmas[0], 0.5);
        assert_eq!(cone.width_at(0), Some(1.0));
        assert_eq!(cone.sigmas[1], 2.0 + 0.5 * 5.0);
    }

    #[test]
    fn volatile_forecast_gets_wider_cone() {
        let builder = ProjectionConeBuilder::default();
        let calm = builder.build(&horizons(&[50.0, 50.0, 50.0, 50.0]));
        let wild = builder.build(&horizons(&[50.0, 30.0, 60.0, 20.0]));
        for i in 1..4 {
            assert!(wild.width_at(i).unwrap() > calm.width_at(i).unwrap());
        }
    }

    #[test]
    fn width_never_shrinks_after_a_spike() {
        let cone = ProjectionConeBuilder::new(ConeParams::new(0.5, 0.1, 1.0).unwrap())
            .build(&horizons(&[50.0, 10.0, 10.0, 10.0]));
        for i in 1..cone.len() {
            assert!(cone.width_at(i).unwrap() >= cone.width_at(i - 1).unwrap());
        }
    }

    #[test]
    fn paths_share_x_coordinates() {
        let cone = ProjectionConeBuilder::default().build(&horizons(&[40.0, 45.0, 50.0]));
        let xs = |path: &[ConePoint]| path.iter().map(|p| p.x).collect::<Vec<_>>();
        assert_eq!(xs(&cone.center), xs(&cone.upper));
        assert_eq!(xs(&cone.center), xs(&cone.lower));
        assert_eq!(cone.rows()[2].horizon_label, "6m");
    }

    #[test]
    fn non_finite_scores_are_dropped() {
        let mut points = horizons(&[40.0, 45.0, 50.0]);
        points[1].score = f64::NAN;
        let cone = ProjectionConeBuilder::default().build(&points);
        assert_eq!(cone.len(), 2);
        assert!(ProjectionConeBuilder::default().build(&[]).is_empty());
    }

    #[test]
    fn explicit_sigmas_are_made_monotone() {
        let cone = ProjectionConeBuilder::default()
            .build_with_sigmas(&horizons(&[50.0, 50.0, 50.0]), &[1.0, 3.0, 2.0])
            .unwrap();
        assert_eq!(cone.sigmas, vec![1.0, 3.0, 3.0]);
        assert!(
            ProjectionConeBuilder::default()
                .build_with_sigmas(&horizons(&[50.0]), &[1.0, 2.0])
                .is_err()
        );
    }

    #[test]
    fn params_reject_negative_values() {
        assert!(ConeParams::new(-1.0, 2.0, 0.5).is_err());
        assert!(ConeParams::new(0.5, f64::NAN, 0.5).is_err());
    }
}
