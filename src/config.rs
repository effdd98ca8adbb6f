use crate::constants::*;
use crate::error::{EtlError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "BANK_ETL_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub rates: RatesConfig,
    pub output: OutputConfig,
    pub queries: QueriesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    /// When set, the document is read from this file instead of `url`.
    pub html_file: Option<PathBuf>,
    pub table_selector: String,
    pub table_index: usize,
    pub user_agent: String,
    /// Keep only the first `limit` extracted rows.
    pub limit: Option<usize>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            html_file: None,
            table_selector: DEFAULT_TABLE_SELECTOR.to_string(),
            table_index: 0,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    pub path: PathBuf,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_RATES_PATH),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub csv_path: PathBuf,
    pub db_path: PathBuf,
    pub table_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            table_name: TABLE_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueriesConfig {
    /// Free-form statement run after the currency projections.
    pub custom: String,
}

impl Default for QueriesConfig {
    fn default() -> Self {
        Self {
            custom: DEFAULT_CUSTOM_QUERY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub file: String,
    /// Write the log file as JSON lines instead of plain text.
    pub json: bool,
    /// Also log to stdout.
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_LOG_DIR),
            file: DEFAULT_LOG_FILE.to_string(),
            json: false,
            console: true,
        }
    }
}

impl Config {
    /// Loads the config from `path`, `$BANK_ETL_CONFIG`, or `bank_etl.toml`,
    /// in that order. Only the implicit default path may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

        match explicit {
            Some(path) => Self::from_file(&path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.source.url, "https://en.wikipedia.org/wiki/List_of_largest_banks");
        assert_eq!(config.source.table_selector, "table.wikitable");
        assert_eq!(config.rates.path, PathBuf::from("exchange_rates.csv"));
        assert_eq!(config.output.csv_path, PathBuf::from("top_10_banks.csv"));
        assert_eq!(config.output.db_path, PathBuf::from("top_10_banks.db"));
        assert_eq!(config.output.table_name, "top_10_banks");
        assert_eq!(config.logging.file, "data_processing.log");
        assert!(config.queries.custom.contains("WHERE Market_Cap_Billion_USD > 100"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [source]
            table_selector = "table.sortable"
            table_index = 1
            limit = 10

            [output]
            db_path = "out/banks.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.source.table_selector, "table.sortable");
        assert_eq!(config.source.table_index, 1);
        assert_eq!(config.source.url, DEFAULT_SOURCE_URL);
        assert_eq!(config.output.db_path, PathBuf::from("out/banks.db"));
        assert_eq!(config.output.csv_path, PathBuf::from(DEFAULT_CSV_PATH));
        assert_eq!(config.source.limit, Some(10));
        assert_eq!(config.queries.custom, DEFAULT_CUSTOM_QUERY);
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml("[source\nurl = 1").unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let err = Config::load(Some(Path::new("/nonexistent/bank_etl.toml"))).unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank_etl.toml");
        fs::write(&path, "[rates]\npath = \"fx.csv\"\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.rates.path, PathBuf::from("fx.csv"));
    }
}
