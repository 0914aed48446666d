use std::str::FromStr;

use serde::Serialize;

use super::value_objects::{
    DivergenceLabel, DivergenceThreshold, MarketState, PressureBands, PressureRegime,
};
use crate::domain::layout::SectorGroup;
use crate::domain::logging::LogComponent;
use crate::log_debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PressureReading {
    pub regime: PressureRegime,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DivergenceReading {
    pub label: DivergenceLabel,
    /// `group_a - group_b` when both inputs were usable.
    pub spread: Option<f64>,
    pub state: Option<MarketState>,
}

/// Maps aggregates to discrete labels through ordered threshold rules.
///
/// Reaching a threshold counts: a composite score equal to a breakpoint lands
/// in the calmer band, and a spread whose magnitude equals the divergence
/// threshold is a divergence.
#[derive(Debug, Clone, Default)]
pub struct RegimeClassifier {
    bands: PressureBands,
    divergence_threshold: DivergenceThreshold,
}

impl RegimeClassifier {
    pub fn new(bands: PressureBands, divergence_threshold: DivergenceThreshold) -> Self {
        Self { bands, divergence_threshold }
    }

    pub fn bands(&self) -> &PressureBands {
        &self.bands
    }

    pub fn classify_pressure(&self, score: Option<f64>) -> PressureReading {
        let score = score.filter(|s| s.is_finite());
        let regime = match score {
            Some(s) => self.bands.band_for(s),
            None => PressureRegime::InsufficientData,
        };
        PressureReading { regime, score }
    }

    /// First matching rule wins; anything unmatched is `Balanced`.
    pub fn classify_divergence(
        &self,
        group_a: Option<f64>,
        group_b: Option<f64>,
        state: Option<MarketState>,
    ) -> DivergenceReading {
        let (Some(a), Some(b), Some(state)) = (
            group_a.filter(|v| v.is_finite()),
            group_b.filter(|v| v.is_finite()),
            state,
        ) else {
            log_debug!(
                LogComponent::Domain("Regime"),
                "divergence inputs incomplete: a={:?} b={:?} state={:?}",
                group_a,
                group_b,
                state
            );
            return DivergenceReading { label: DivergenceLabel::InsufficientData, spread: None, state };
        };

        let spread = a - b;
        let t = self.divergence_threshold.value();
        let label = match state {
            MarketState::RiskOn if spread <= -t => DivergenceLabel::RiskAppetiteConfirmed,
            MarketState::RiskOn if spread >= t => DivergenceLabel::HiddenCaution,
            MarketState::RiskOff if spread >= t => DivergenceLabel::FlightToSafety,
            MarketState::RiskOff if spread <= -t => DivergenceLabel::EarlyRecovery,
            MarketState::Neutral if spread >= t => DivergenceLabel::DefensiveRotation,
            MarketState::Neutral if spread <= -t => DivergenceLabel::CyclicalRotation,
            _ => DivergenceLabel::Balanced,
        };

        DivergenceReading { label, spread: Some(spread), state: Some(state) }
    }

    /// Lenient parse of the backend's categorical state; unknown strings yield `None`.
    pub fn parse_state(raw: &str) -> Option<MarketState> {
        MarketState::from_str(raw.trim()).ok()
    }
}

/// Mean sector percent change over the sectors named in `names` (case-insensitive).
///
/// Non-finite sector values are ignored; `None` when nothing usable matched.
pub fn group_average(sectors: &[SectorGroup], names: &[String]) -> Option<f64> {
    let values: Vec<f64> = sectors
        .iter()
        .filter(|s| names.iter().any(|n| n.eq_ignore_ascii_case(&s.name)))
        .map(|s| s.pct_change)
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
