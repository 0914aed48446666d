use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay, EnumIter, EnumString};

use crate::domain::errors::{AppError, PipelineResult};

/// Pressure regime for a 0-100 composite stability score, best band first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumIter, AsRefStr, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PressureRegime {
    LowPressure,
    Moderate,
    Elevated,
    Severe,
    Systemic,
    InsufficientData,
}

impl PressureRegime {
    /// The five scored bands, in the same order as [`PressureBands`] breakpoints.
    pub const BANDS: [PressureRegime; 5] = [
        PressureRegime::LowPressure,
        PressureRegime::Moderate,
        PressureRegime::Elevated,
        PressureRegime::Severe,
        PressureRegime::Systemic,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Self::LowPressure => "Low Pressure",
            Self::Moderate => "Moderate",
            Self::Elevated => "Elevated",
            Self::Severe => "Severe",
            Self::Systemic => "Systemic",
            Self::InsufficientData => "Insufficient Data",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::LowPressure => "Markets are functioning normally with little sign of stress.",
            Self::Moderate => "Some indicators are softening; conditions remain orderly.",
            Self::Elevated => "Stress is building across several indicator groups.",
            Self::Severe => "Broad stress; liquidity and credit indicators are deteriorating.",
            Self::Systemic => "Extreme, system-wide pressure across nearly every indicator.",
            Self::InsufficientData => "Not enough data to classify current conditions.",
        }
    }

    /// 0 for the calmest band up to 4 for systemic; `None` without data.
    pub fn severity(&self) -> Option<u8> {
        Self::BANDS.iter().position(|band| band == self).map(|i| i as u8)
    }
}

/// Ordered composite-score breakpoints separating the five pressure bands.
///
/// A score exactly on a breakpoint belongs to the higher (calmer) band.
#[derive(Debug, Clone, PartialEq)]
pub struct PressureBands {
    breakpoints: [f64; 4],
}

impl Default for PressureBands {
    fn default() -> Self {
        Self { breakpoints: [67.0, 50.0, 34.0, 20.0] }
    }
}

impl PressureBands {
    /// Accepts the four breakpoints in either order; they must be finite and distinct.
    pub fn new(thresholds: &[f64]) -> PipelineResult<Self> {
        if thresholds.is_empty() {
            return Err(AppError::config("pressureThresholds must not be empty"));
        }
        if thresholds.len() != 4 {
            return Err(AppError::config(format!(
                "pressureThresholds needs 4 breakpoints for 5 bands, got {}",
                thresholds.len()
            )));
        }
        if thresholds.iter().any(|t| !t.is_finite()) {
            return Err(AppError::config("pressureThresholds must be finite"));
        }

        let mut sorted = [thresholds[0], thresholds[1], thresholds[2], thresholds[3]];
        sorted.sort_by(|a, b| b.total_cmp(a));
        if sorted.windows(2).any(|w| w[0] == w[1]) {
            return Err(AppError::config("pressureThresholds must be distinct"));
        }
        Ok(Self { breakpoints: sorted })
    }

    pub fn breakpoints(&self) -> &[f64; 4] {
        &self.breakpoints
    }

    pub fn band_for(&self, score: f64) -> PressureRegime {
        if !score.is_finite() {
            return PressureRegime::InsufficientData;
        }
        self.breakpoints
            .iter()
            .position(|&bp| score >= bp)
            .map(|i| PressureRegime::BANDS[i])
            .unwrap_or(PressureRegime::Systemic)
    }
}

/// Categorical market state published alongside the snapshot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumIter, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum MarketState {
    #[strum(to_string = "risk_on", serialize = "risk-on", serialize = "riskon")]
    RiskOn,
    #[strum(to_string = "neutral", serialize = "mixed")]
    Neutral,
    #[strum(to_string = "risk_off", serialize = "risk-off", serialize = "riskoff")]
    RiskOff,
}

/// Interpretation of the defensive-minus-cyclical spread under a market state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumIter, AsRefStr, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DivergenceLabel {
    RiskAppetiteConfirmed,
    HiddenCaution,
    FlightToSafety,
    EarlyRecovery,
    DefensiveRotation,
    CyclicalRotation,
    Balanced,
    InsufficientData,
}

impl DivergenceLabel {
    pub fn title(&self) -> &'static str {
        match self {
            Self::RiskAppetiteConfirmed => "Risk Appetite Confirmed",
            Self::HiddenCaution => "Hidden Caution",
            Self::FlightToSafety => "Flight to Safety",
            Self::EarlyRecovery => "Early Recovery",
            Self::DefensiveRotation => "Defensive Rotation",
            Self::CyclicalRotation => "Cyclical Rotation",
            Self::Balanced => "Balanced",
            Self::InsufficientData => "Insufficient Data",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::RiskAppetiteConfirmed => {
                "Cyclical sectors lead in a risk-on market; participation confirms the move."
            }
            Self::HiddenCaution => {
                "Defensive sectors lead despite a risk-on state; investors are quietly hedging."
            }
            Self::FlightToSafety => "Defensive sectors lead in a risk-off market.",
            Self::EarlyRecovery => {
                "Cyclical sectors lead despite a risk-off state; an early sign of recovery."
            }
            Self::DefensiveRotation => "Money is rotating toward defensive sectors.",
            Self::CyclicalRotation => "Money is rotating toward cyclical sectors.",
            Self::Balanced => "No meaningful divergence between defensive and cyclical sectors.",
            Self::InsufficientData => "Not enough sector data to interpret divergence.",
        }
    }
}

/// Minimum absolute spread (percentage points) treated as a divergence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DivergenceThreshold(f64);

impl Default for DivergenceThreshold {
    fn default() -> Self {
        Self(0.5)
    }
}

impl DivergenceThreshold {
    pub fn new(value: f64) -> PipelineResult<Self> {
        if !value.is_finite() || value <= 0.0 {
            return Err(AppError::config(format!(
                "divergenceThreshold must be a positive number, got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Serializable badge payload for the view layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeBadge {
    pub key: String,
    pub title: &'static str,
    pub description: &'static str,
}

impl From<PressureRegime> for RegimeBadge {
    fn from(regime: PressureRegime) -> Self {
        Self { key: regime.to_string(), title: regime.title(), description: regime.description() }
    }
}

impl From<DivergenceLabel> for RegimeBadge {
    fn from(label: DivergenceLabel) -> Self {
        Self { key: label.to_string(), title: label.title(), description: label.description() }
    }
}
