use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("no table matching '{selector}' found in document")]
    TableNotFound { selector: String },

    #[error("table schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("malformed source: {0}")]
    MalformedSource(String),

    #[error("exchange rate missing for currency '{0}'")]
    MissingCurrency(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store unavailable at '{path}': {message}")]
    StoreUnavailable { path: String, message: String },

    #[error("write failed: {0}")]
    Write(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for EtlError {
    fn from(e: reqwest::Error) -> Self {
        EtlError::SourceUnavailable(e.to_string())
    }
}

impl From<toml::de::Error> for EtlError {
    fn from(e: toml::de::Error) -> Self {
        EtlError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
