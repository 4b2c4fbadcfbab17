//! Domain error types.

/// Top-level error type for sigtrader.
///
/// Only structurally invalid input surfaces here. Short histories, numeric
/// degeneracy and capital exhaustion are resolved inside the domain and never
/// become errors.
#[derive(Debug, thiserror::Error)]
pub enum SigtraderError {
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

    #[error("unknown strategy: {name}")]
    UnknownStrategy { name: String },

    #[error("no data for {instrument}")]
    NoData { instrument: String },

    #[error("insufficient data for {instrument}: have {bars} bars, need {minimum}")]
    InsufficientData {
        instrument: String,
        bars: usize,
        minimum: usize,
    },

    #[error("malformed bar {index} for {instrument}: {reason}")]
    MalformedBar {
        instrument: String,
        index: usize,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&SigtraderError> for std::process::ExitCode {
    fn from(err: &SigtraderError) -> Self {
        let code: u8 = match err {
            SigtraderError::Io(_) | SigtraderError::Report { .. } | SigtraderError::Json(_) => 1,
            SigtraderError::ConfigParse { .. }
            | SigtraderError::ConfigMissing { .. }
            | SigtraderError::ConfigInvalid { .. } => 2,
            SigtraderError::Data { .. } => 3,
            SigtraderError::UnknownStrategy { .. } => 4,
            SigtraderError::NoData { .. } | SigtraderError::InsufficientData { .. } => 5,
            SigtraderError::MalformedBar { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
