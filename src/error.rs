use thiserror::Error;

/// Failures that cross the library boundary.
///
/// Parse-level problems (currency, dates) never show up here: those degrade to
/// a default value on the record and processing continues.
#[derive(Debug, Error)]
pub enum MatrizError {
    /// Spreadsheet service unreachable, auth failure or a non-success status.
    #[error("upstream unavailable while reading `{tab}`: {message}")]
    UpstreamUnavailable { tab: String, message: String },

    /// Requested tab absent after direct, normalized-name and alias lookups.
    #[error("worksheet `{0}` not found")]
    TabNotFound(String),

    /// The tab exists but holds no data rows.
    #[error("no rows found in worksheet `{0}`")]
    EmptyTab(String),

    /// Missing or malformed request parameter.
    #[error("{0}")]
    Validation(String),

    /// Reading or writing the parquet mirror failed.
    #[error("mirror error: {0}")]
    Mirror(String),
}

impl MatrizError {
    pub fn upstream(tab: &str, err: impl std::fmt::Display) -> Self {
        MatrizError::UpstreamUnavailable {
            tab: tab.to_string(),
            message: err.to_string(),
        }
    }

    pub fn mirror(err: anyhow::Error) -> Self {
        MatrizError::Mirror(format!("{:#}", err))
    }
}

pub type Result<T, E = MatrizError> = std::result::Result<T, E>;
