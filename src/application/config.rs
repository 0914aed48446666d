use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::errors::{AppError, PipelineResult};
use crate::domain::layout::BubbleSizing;
use crate::domain::logging::{LogComponent, get_time_provider};
use crate::domain::projection::ConeParams;
use crate::domain::regime::{DivergenceThreshold, PressureBands, RegimeClassifier};
use crate::domain::time_series::{
    DisplayZone, GapPolicy, LookbackDays, SeriesSettings, SmoothingWindow, StaleCadence,
};
use crate::log_warn;

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_window_size() -> i64 {
    7
}

fn default_lookback_days() -> i64 {
    365
}

fn default_pressure_thresholds() -> Vec<f64> {
    vec![67.0, 50.0, 34.0, 20.0]
}

fn default_divergence_threshold() -> f64 {
    0.5
}

fn default_sigma_base() -> f64 {
    2.0
}

fn default_sigma_k() -> f64 {
    0.5
}

fn default_anchor_sigma() -> f64 {
    0.5
}

fn default_min_size() -> f64 {
    8.0
}

fn default_max_size() -> f64 {
    40.0
}

fn default_pct_padding() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_stale_cadence_months() -> i64 {
    1
}

/// One day; longer delays overflow or are ignored by browser timers.
pub const MAX_POLL_INTERVAL_SECS: u64 = 86_400;

fn default_poll_interval_secs() -> u64 {
    120
}

fn default_history_keys() -> Vec<String> {
    vec!["stability".to_string()]
}

fn default_defensive_sectors() -> Vec<String> {
    ["Utilities", "Consumer Staples", "Health Care", "Real Estate"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_cyclical_sectors() -> Vec<String> {
    [
        "Technology",
        "Consumer Discretionary",
        "Financials",
        "Industrials",
        "Energy",
        "Materials",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Dashboard configuration as supplied by the host page (camelCase JSON).
///
/// Every field is optional on the wire; missing fields take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_window_size")]
    pub window_size: i64,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    #[serde(default = "default_pressure_thresholds")]
    pub pressure_thresholds: Vec<f64>,
    #[serde(default = "default_divergence_threshold")]
    pub divergence_threshold: f64,
    #[serde(default = "default_sigma_base")]
    pub sigma_base: f64,
    #[serde(default = "default_sigma_k")]
    pub sigma_k: f64,
    #[serde(default = "default_anchor_sigma")]
    pub anchor_sigma: f64,
    #[serde(default = "default_min_size")]
    pub min_size: f64,
    #[serde(default = "default_max_size")]
    pub max_size: f64,
    #[serde(default = "default_pct_padding")]
    pub pct_padding: f64,
    #[serde(default)]
    pub interpolate_gaps: bool,
    #[serde(default = "default_true")]
    pub extend_stale: bool,
    #[serde(default = "default_stale_cadence_months")]
    pub stale_cadence_months: i64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Display timezone offset east of UTC; the browser's offset when absent.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
    #[serde(default = "default_history_keys")]
    pub history_keys: Vec<String>,
    #[serde(default = "default_defensive_sectors")]
    pub defensive_sectors: Vec<String>,
    #[serde(default = "default_cyclical_sectors")]
    pub cyclical_sectors: Vec<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            window_size: default_window_size(),
            lookback_days: default_lookback_days(),
            pressure_thresholds: default_pressure_thresholds(),
            divergence_threshold: default_divergence_threshold(),
            sigma_base: default_sigma_base(),
            sigma_k: default_sigma_k(),
            anchor_sigma: default_anchor_sigma(),
            min_size: default_min_size(),
            max_size: default_max_size(),
            pct_padding: default_pct_padding(),
            interpolate_gaps: false,
            extend_stale: default_true(),
            stale_cadence_months: default_stale_cadence_months(),
            poll_interval_secs: default_poll_interval_secs(),
            utc_offset_minutes: None,
            history_keys: default_history_keys(),
            defensive_sectors: default_defensive_sectors(),
            cyclical_sectors: default_cyclical_sectors(),
        }
    }
}

/// Typed, validated parameters for every pipeline component.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub api_base_url: String,
    pub series: SeriesSettings,
    pub gap_policy: GapPolicy,
    pub zone: DisplayZone,
    pub classifier: RegimeClassifier,
    pub sizing: BubbleSizing,
    pub cone: ConeParams,
    pub poll_interval: Duration,
    pub history_keys: Vec<String>,
    pub defensive_sectors: Vec<String>,
    pub cyclical_sectors: Vec<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            series: SeriesSettings {
                window: SmoothingWindow::default(),
                lookback: LookbackDays::default(),
                extend_stale: Some(StaleCadence::default()),
            },
            gap_policy: GapPolicy::Preserve,
            zone: DisplayZone::utc(),
            classifier: RegimeClassifier::default(),
            sizing: BubbleSizing::default(),
            cone: ConeParams::default(),
            poll_interval: Duration::from_secs(default_poll_interval_secs()),
            history_keys: default_history_keys(),
            defensive_sectors: default_defensive_sectors(),
            cyclical_sectors: default_cyclical_sectors(),
        }
    }
}

impl DashboardConfig {
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        serde_json::from_str(json).map_err(|e| AppError::config(format!("invalid config JSON: {e}")))
    }

    /// Validate every field, failing on the first bad one.
    pub fn validate(&self) -> PipelineResult<PipelineSettings> {
        let base = self.api_base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(AppError::config("apiBaseUrl must not be empty"));
        }
        if !(1..=MAX_POLL_INTERVAL_SECS).contains(&self.poll_interval_secs) {
            return Err(AppError::config(format!(
                "pollIntervalSecs must be within 1..={MAX_POLL_INTERVAL_SECS}"
            )));
        }
        if self.history_keys.iter().any(|k| k.trim().is_empty()) {
            return Err(AppError::config("historyKeys must not contain blank keys"));
        }

        let offset = match self.utc_offset_minutes {
            Some(minutes) => minutes,
            None => get_time_provider().utc_offset_minutes(),
        };

        let series = SeriesSettings {
            window: SmoothingWindow::new(self.window_size)?,
            lookback: LookbackDays::new(self.lookback_days)?,
            extend_stale: if self.extend_stale {
                Some(StaleCadence::new(self.stale_cadence_months)?)
            } else {
                None
            },
        };

        if self.defensive_sectors.is_empty() || self.cyclical_sectors.is_empty() {
            log_warn!(
                LogComponent::Application("Config"),
                "defensive or cyclical sector list is empty; divergence will report insufficient data"
            );
        }

        Ok(PipelineSettings {
            api_base_url: base.to_string(),
            series,
            gap_policy: if self.interpolate_gaps { GapPolicy::Interpolate } else { GapPolicy::Preserve },
            zone: DisplayZone::from_offset_minutes(offset)?,
            classifier: RegimeClassifier::new(
                PressureBands::new(&self.pressure_thresholds)?,
                DivergenceThreshold::new(self.divergence_threshold)?,
            ),
            sizing: BubbleSizing::new(self.min_size, self.max_size, self.pct_padding)?,
            cone: ConeParams::new(self.anchor_sigma, self.sigma_base, self.sigma_k)?,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            history_keys: self.history_keys.clone(),
            defensive_sectors: self.defensive_sectors.clone(),
            cyclical_sectors: self.cyclical_sectors.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_takes_defaults() {
        let config = DashboardConfig::from_json("{}").unwrap();
        assert_eq!(config, DashboardConfig::default());
        let settings = config.validate().unwrap();
        assert_eq!(settings.series.window.get(), 7);
        assert_eq!(settings.series.lookback.get(), 365);
        assert_eq!(settings.poll_interval, Duration::from_secs(120));
        assert_eq!(settings.classifier.bands().breakpoints(), &[67.0, 50.0, 34.0, 20.0]);
    }

    #[test]
    fn camel_case_fields_override_defaults() {
        let config = DashboardConfig::from_json(
            r#"{"windowSize": 3, "apiBaseUrl": "https://api.example.com/", "utcOffsetMinutes": 120, "extendStale": false}"#,
        )
        .unwrap();
        let settings = config.validate().unwrap();
        assert_eq!(settings.series.window.get(), 3);
        assert_eq!(settings.api_base_url, "https://api.example.com");
        assert_eq!(settings.zone.offset().local_minus_utc(), 7200);
        assert!(settings.series.extend_stale.is_none());
    }

    #[test]
    fn invalid_fields_fail_as_configuration_errors() {
        let cases = [
            DashboardConfig { window_size: 0, ..Default::default() },
            DashboardConfig { pressure_thresholds: vec![], ..Default::default() },
            DashboardConfig { divergence_threshold: 0.0, ..Default::default() },
            DashboardConfig { min_size: 50.0, ..Default::default() },
            DashboardConfig { poll_interval_secs: 0, ..Default::default() },
            DashboardConfig { poll_interval_secs: MAX_POLL_INTERVAL_SECS + 1, ..Default::default() },
            DashboardConfig { poll_interval_secs: u64::MAX / 1000, ..Default::default() },
            DashboardConfig { api_base_url: "  ".into(), ..Default::default() },
        ];
        for config in cases {
            let err = config.validate().unwrap_err();
            assert!(err.is_configuration(), "{err}");
        }
    }

    #[test]
    fn longest_poll_interval_is_accepted() {
        let config = DashboardConfig { poll_interval_secs: MAX_POLL_INTERVAL_SECS, ..Default::default() };
        let settings = config.validate().unwrap();
        assert_eq!(settings.poll_interval, Duration::from_secs(86_400));
    }

    #[test]
    fn malformed_json_is_a_configuration_error() {
        assert!(DashboardConfig::from_json("{not json").unwrap_err().is_configuration());
    }
}
