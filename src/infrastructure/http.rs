use gloo::net::http::Request;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::application::coordinator::DashboardDataSource;
use crate::application::pipeline::MarketSnapshot;
use crate::domain::errors::{AppError, NetworkResult};
use crate::domain::layout::{SectorGroup, StockPoint};
use crate::domain::logging::{LogComponent, get_logger};
use crate::domain::projection::ProjectionPoint;
use crate::domain::regime::RegimeClassifier;
use crate::domain::time_series::TimePoint;

/// Numbers may arrive as JSON numbers, numeric strings or `null`.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct HistoryPointDto {
    #[serde(alias = "timestamp", alias = "time")]
    date: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HistoryEnvelope {
    Bare(Vec<HistoryPointDto>),
    Wrapped {
        #[serde(alias = "points", alias = "history")]
        data: Vec<HistoryPointDto>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotDto {
    #[serde(default, alias = "composite_score", alias = "score", deserialize_with = "lenient_f64")]
    composite_score: Option<f64>,
    #[serde(default, alias = "market_state", alias = "state")]
    market_state: Option<String>,
    #[serde(default, alias = "defensive_avg", deserialize_with = "lenient_f64")]
    defensive_avg: Option<f64>,
    #[serde(default, alias = "cyclical_avg", deserialize_with = "lenient_f64")]
    cyclical_avg: Option<f64>,
}

impl SnapshotDto {
    fn to_domain_snapshot(&self) -> MarketSnapshot {
        let market_state = self.market_state.as_deref().and_then(|raw| {
            let parsed = RegimeClassifier::parse_state(raw);
            if parsed.is_none() {
                get_logger().warn(
                    LogComponent::Infrastructure("DashboardHttpClient"),
                    &format!("Unknown market state '{raw}'"),
                );
            }
            parsed
        });
        MarketSnapshot {
            composite_score: self.composite_score,
            market_state,
            defensive_avg: self.defensive_avg,
            cyclical_avg: self.cyclical_avg,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StockDto {
    #[serde(default, alias = "symbol")]
    ticker: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    price: Option<f64>,
    #[serde(default, alias = "pct_change", alias = "changePct", alias = "change", deserialize_with = "lenient_f64")]
    pct_change: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    volume: Option<f64>,
}

impl StockDto {
    /// Missing change or volume becomes NaN so the layout engine skips the stock.
    fn to_domain_stock(&self) -> StockPoint {
        StockPoint::new(
            self.ticker.trim(),
            self.price.unwrap_or(f64::NAN),
            self.pct_change.unwrap_or(f64::NAN),
            self.volume.unwrap_or(f64::NAN),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SectorDto {
    #[serde(alias = "sector")]
    name: String,
    #[serde(default, alias = "pct_change", alias = "avgChange", alias = "avg_change", deserialize_with = "lenient_f64")]
    pct_change: Option<f64>,
    #[serde(default)]
    stocks: Vec<StockDto>,
}

impl SectorDto {
    fn to_domain_sector(&self) -> SectorGroup {
        let stocks = self.stocks.iter().map(StockDto::to_domain_stock).collect();
        match self.pct_change.filter(|v| v.is_finite()) {
            Some(pct_change) => SectorGroup { name: self.name.clone(), pct_change, stocks },
            None => SectorGroup::from_stocks(self.name.clone(), stocks),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectionDto {
    #[serde(alias = "horizon", alias = "horizon_label", alias = "label")]
    horizon_label: String,
    #[serde(default, alias = "value", deserialize_with = "lenient_f64")]
    score: Option<f64>,
}

pub fn parse_history(body: &str) -> NetworkResult<Vec<TimePoint>> {
    let envelope: HistoryEnvelope = serde_json::from_str(body)?;
    let points = match envelope {
        HistoryEnvelope::Bare(points) | HistoryEnvelope::Wrapped { data: points } => points,
    };
    Ok(points.into_iter().map(|p| TimePoint::new(p.date, p.value)).collect())
}

pub fn parse_snapshot(body: &str) -> NetworkResult<MarketSnapshot> {
    let dto: SnapshotDto = serde_json::from_str(body)?;
    Ok(dto.to_domain_snapshot())
}

pub fn parse_sectors(body: &str) -> NetworkResult<Vec<SectorGroup>> {
    let dtos: Vec<SectorDto> = serde_json::from_str(body)?;
    Ok(dtos.iter().map(SectorDto::to_domain_sector).collect())
}

/// Projections without a usable score are skipped.
pub fn parse_projections(body: &str) -> NetworkResult<Vec<ProjectionPoint>> {
    let dtos: Vec<ProjectionDto> = serde_json::from_str(body)?;
    Ok(dtos
        .into_iter()
        .filter_map(|p| Some(ProjectionPoint::new(p.horizon_label, p.score?)))
        .collect())
}

/// Dashboard REST client on gloo for WASM.
#[derive(Debug, Clone)]
pub struct DashboardHttpClient {
    base_url: String,
    lookback_days: u32,
}

impl DashboardHttpClient {
    pub fn new(base_url: impl Into<String>, lookback_days: u32) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, lookback_days }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn history_url(&self, key: &str) -> String {
        format!(
            "{}/api/history/{}?days={}",
            self.base_url,
            urlencoding::encode(key),
            self.lookback_days
        )
    }

    pub fn snapshot_url(&self) -> String {
        format!("{}/api/snapshot", self.base_url)
    }

    pub fn sectors_url(&self) -> String {
        format!("{}/api/sectors", self.base_url)
    }

    pub fn projections_url(&self) -> String {
        format!("{}/api/projections", self.base_url)
    }

    async fn fetch_text(&self, url: &str) -> NetworkResult<String> {
        get_logger().debug(
            LogComponent::Infrastructure("DashboardHttpClient"),
            &format!("📡 GET {url}"),
        );

        let response = Request::get(url)
            .send()
            .await
            .map_err(|e| AppError::Network(format!("Failed to send request to {url}: {e}")))?;

        if !response.ok() {
            return Err(AppError::Network(format!(
                "HTTP error from {url}: {} - {}",
                response.status(),
                response.status_text()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::Network(format!("Failed to read body from {url}: {e}")))
    }
}

impl DashboardDataSource for DashboardHttpClient {
    async fn fetch_history(&self, key: &str) -> NetworkResult<Vec<TimePoint>> {
        let points = parse_history(&self.fetch_text(&self.history_url(key)).await?)?;
        get_logger().info(
            LogComponent::Infrastructure("DashboardHttpClient"),
            &format!("✅ Loaded {} points for '{key}'", points.len()),
        );
        Ok(points)
    }

    async fn fetch_snapshot(&self) -> NetworkResult<MarketSnapshot> {
        parse_snapshot(&self.fetch_text(&self.snapshot_url()).await?)
    }

    async fn fetch_sectors(&self) -> NetworkResult<Vec<SectorGroup>> {
        parse_sectors(&self.fetch_text(&self.sectors_url()).await?)
    }

    async fn fetch_projections(&self) -> NetworkResult<Vec<ProjectionPoint>> {
        parse_projections(&self.fetch_text(&self.projections_url()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::regime::MarketState;

    #[test]
    fn urls_are_built_from_trimmed_base() {
        let client = DashboardHttpClient::new("https://api.example.com/", 90);
        assert_eq!(client.history_url("stability"), "https://api.example.com/api/history/stability?days=90");
        assert_eq!(client.history_url("credit spread"), "https://api.example.com/api/history/credit%20spread?days=90");
        assert_eq!(client.history_url("a/b&c"), "https://api.example.com/api/history/a%2Fb%26c?days=90");
        assert_eq!(client.snapshot_url(), "https://api.example.com/api/snapshot");
    }

    #[test]
    fn history_accepts_bare_and_wrapped_arrays() {
        let bare = parse_history(r#"[{"date":"2024-01-01","value":1.5},{"date":"2024-01-02","value":null}]"#).unwrap();
        assert_eq!(bare.len(), 2);
        assert_eq!(bare[1].value, None);

        let wrapped = parse_history(r#"{"data":[{"timestamp":"2024-01-01T00:00:00Z","value":"2.5"}]}"#).unwrap();
        assert_eq!(wrapped[0].value, Some(2.5));
        assert!(parse_history("42").is_err());
    }

    #[test]
    fn snapshot_parses_state_leniently() {
        let snap = parse_snapshot(r#"{"compositeScore": 48.2, "marketState": "Risk-Off", "defensive_avg": "0.7"}"#).unwrap();
        assert_eq!(snap.composite_score, Some(48.2));
        assert_eq!(snap.market_state, Some(MarketState::RiskOff));
        assert_eq!(snap.defensive_avg, Some(0.7));
        assert_eq!(snap.cyclical_avg, None);

        let unknown = parse_snapshot(r#"{"marketState": "sideways"}"#).unwrap();
        assert_eq!(unknown.market_state, None);
    }

    #[test]
    fn sectors_without_average_use_stock_mean() {
        let sectors = parse_sectors(
            r#"[{"sector":"Energy","stocks":[{"symbol":"XOM","pctChange":1.0,"volume":10},{"symbol":"CVX","pctChange":3.0,"volume":null}]}]"#,
        )
        .unwrap();
        assert_eq!(sectors[0].name, "Energy");
        assert_eq!(sectors[0].pct_change, 2.0);
        assert!(sectors[0].stocks[1].volume.is_nan());
    }

    #[test]
    fn projections_without_score_are_skipped() {
        let points = parse_projections(r#"[{"horizon":"now","score":50},{"horizon":"3m","score":null},{"label":"6m","value":"47"}]"#).unwrap();
        let labels: Vec<&str> = points.iter().map(|p| p.horizon_label.as_str()).collect();
        assert_eq!(labels, vec!["now", "6m"]);
    }
}
