//! Browser-facing adapters: the REST data source and console/clock services.

pub mod http;
pub mod services;

pub use http::DashboardHttpClient;
pub use services::{BrowserTimeProvider, ConsoleLogger};
