//! Domain error types.

/// Top-level error type for signalbt.
///
/// Operational outcomes of trading (not enough cash, selling more than is
/// held) are not errors; `Portfolio::buy`/`Portfolio::sell` report those as
/// `false`.
#[derive(Debug, thiserror::Error)]
pub enum SignalbtError {
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("insufficient data: need {needed} values, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("missing required column: {column}")]
    MissingColumn { column: String },

    #[error("bars for {symbol} are not strictly increasing by date")]
    UnsortedSeries { symbol: String },

    #[error("no data loaded")]
    NoData,

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SignalbtError {
    pub fn invalid_period(name: &str, period: usize) -> Self {
        SignalbtError::InvalidParameter {
            name: name.to_string(),
            reason: format!("period must be positive, got {period}"),
        }
    }

    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        SignalbtError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&SignalbtError> for std::process::ExitCode {
    fn from(err: &SignalbtError) -> Self {
        let code: u8 = match err {
            SignalbtError::Io(_) => 1,
            SignalbtError::ConfigParse { .. }
            | SignalbtError::ConfigMissing { .. }
            | SignalbtError::ConfigInvalid { .. } => 2,
            SignalbtError::DataSource { .. } | SignalbtError::MissingColumn { .. } => 3,
            SignalbtError::InvalidParameter { .. } | SignalbtError::UnsortedSeries { .. } => 4,
            SignalbtError::InsufficientData { .. } | SignalbtError::NoData => 5,
        };
        std::process::ExitCode::from(code)
    }
}
