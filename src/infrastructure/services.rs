use chrono::{DateTime, FixedOffset, Offset, Utc};
use wasm_bindgen::JsValue;

use crate::domain::logging::{LogEntry, LogLevel, Logger, TimeProvider, get_time_provider};

/// Console logger implementation for the browser.
pub struct ConsoleLogger {
    min_level: LogLevel,
}

impl ConsoleLogger {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }

    pub fn new_production() -> Self {
        Self::new(LogLevel::Info)
    }

    pub fn new_development() -> Self {
        Self::new(LogLevel::Debug)
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    pub fn format_entry(entry: &LogEntry, timestamp: &str) -> String {
        match &entry.metadata {
            Some(metadata) => format!(
                "[{}] {} {} | {} | {}",
                timestamp, entry.level, entry.component, entry.message, metadata
            ),
            None => format!("[{}] {} {} | {}", timestamp, entry.level, entry.component, entry.message),
        }
    }
}

impl Logger for ConsoleLogger {
    fn log(&self, entry: LogEntry) {
        if entry.level < self.min_level {
            return;
        }
        let timestamp = get_time_provider().format_timestamp(entry.timestamp);
        let formatted = JsValue::from_str(&Self::format_entry(&entry, &timestamp));
        match entry.level {
            LogLevel::Trace | LogLevel::Debug => web_sys::console::debug_1(&formatted),
            LogLevel::Info => web_sys::console::info_1(&formatted),
            LogLevel::Warn => web_sys::console::warn_1(&formatted),
            LogLevel::Error => web_sys::console::error_1(&formatted),
        }
    }
}

/// Wall clock and timezone of the browser.
pub struct BrowserTimeProvider {
    offset_minutes: i32,
}

impl BrowserTimeProvider {
    pub fn new() -> Self {
        // getTimezoneOffset is minutes *behind* UTC.
        let behind = js_sys::Date::new_0().get_timezone_offset();
        Self::with_offset_minutes(-behind as i32)
    }

    pub fn with_offset_minutes(offset_minutes: i32) -> Self {
        Self { offset_minutes }
    }
}

impl Default for BrowserTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for BrowserTimeProvider {
    fn current_timestamp(&self) -> u64 {
        js_sys::Date::now() as u64
    }

    /// `HH:MM:SS.mmm` in the browser's timezone.
    fn format_timestamp(&self, timestamp: u64) -> String {
        let offset = FixedOffset::east_opt(self.offset_minutes.saturating_mul(60)).unwrap_or(Utc.fix());
        DateTime::from_timestamp_millis(timestamp as i64)
            .map(|utc| utc.with_timezone(&offset).format("%H:%M:%S%.3f").to_string())
            .unwrap_or_else(|| timestamp.to_string())
    }

    fn utc_offset_minutes(&self) -> i32 {
        self.offset_minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::logging::LogComponent;

    #[test]
    fn timestamps_render_in_local_time() {
        let provider = BrowserTimeProvider::with_offset_minutes(90);
        // 2024-01-01T00:00:00.250Z
        assert_eq!(provider.format_timestamp(1_704_067_200_250), "01:30:00.250");
        assert_eq!(provider.utc_offset_minutes(), 90);
    }

    #[test]
    fn entry_format_includes_metadata() {
        let entry = LogEntry::new_with_metadata(
            LogLevel::Warn,
            LogComponent::Infrastructure("DashboardHttpClient"),
            "slow",
            "{\"ms\":900}",
        );
        assert_eq!(
            ConsoleLogger::format_entry(&entry, "00:00:00.000"),
            "[00:00:00.000]  WARN INF:DashboardHttpClient | slow | {\"ms\":900}"
        );
    }

    #[test]
    fn production_logger_skips_debug() {
        assert_eq!(ConsoleLogger::new_production().min_level(), LogLevel::Info);
        assert_eq!(ConsoleLogger::new_development().min_level(), LogLevel::Debug);
    }
}
