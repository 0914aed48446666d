use derive_more::Display;

/// Flat error system for the dashboard pipeline.
///
/// Transformations never fail on individual bad points; only structurally
/// invalid arguments (a zero smoothing window, an empty threshold table) and
/// boundary failures (network, serialization) surface as errors.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum AppError {
    #[display(fmt = "Configuration Error: {}", _0)]
    Configuration(String),
    #[display(fmt = "Validation Error: {}", _0)]
    Validation(String),
    #[display(fmt = "Network Error: {}", _0)]
    Network(String),
    #[display(fmt = "Serialization Error: {}", _0)]
    Serialization(String),
    #[display(fmt = "Presentation Error: {}", _0)]
    Presentation(String),
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn config(msg: impl Into<String>) -> Self {
        AppError::Configuration(msg.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, AppError::Configuration(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Serialization(error.to_string())
    }
}

pub type PipelineResult<T> = Result<T, AppError>;
pub type NetworkResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_category() {
        let err = AppError::config("windowSize must be >= 1");
        assert_eq!(err.to_string(), "Configuration Error: windowSize must be >= 1");
        assert!(err.is_configuration());
        assert!(!AppError::Network("x".into()).is_configuration());
    }

    #[test]
    fn serde_errors_convert() {
        let err: AppError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
