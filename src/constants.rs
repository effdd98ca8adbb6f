/// Defaults and fixed names shared across the pipeline stages.

// Source document
pub const DEFAULT_SOURCE_URL: &str = "https://en.wikipedia.org/wiki/List_of_largest_banks";
pub const DEFAULT_TABLE_SELECTOR: &str = "table.wikitable";
pub const DEFAULT_USER_AGENT: &str = concat!("bank_etl/", env!("CARGO_PKG_VERSION"));

// Local files
pub const DEFAULT_CONFIG_PATH: &str = "bank_etl.toml";
pub const DEFAULT_RATES_PATH: &str = "exchange_rates.csv";
pub const DEFAULT_CSV_PATH: &str = "top_10_banks.csv";
pub const DEFAULT_DB_PATH: &str = "top_10_banks.db";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_FILE: &str = "data_processing.log";

// Relational table
pub const TABLE_NAME: &str = "top_10_banks";

// Column names, shared by the flat file header and the table schema
pub const COL_RANK: &str = "Rank";
pub const COL_NAME: &str = "Name";
pub const COL_USD: &str = "Market_Cap_Billion_USD";
pub const COL_GBP: &str = "Market_Cap_Billion_GBP";
pub const COL_EUR: &str = "Market_Cap_Billion_EUR";
pub const COL_INR: &str = "Market_Cap_Billion_INR";

pub const COLUMNS: [&str; 6] = [COL_RANK, COL_NAME, COL_USD, COL_GBP, COL_EUR, COL_INR];

// Exchange rate file header
pub const RATE_COL_CURRENCY: &str = "Currency";
pub const RATE_COL_RATE: &str = "Rate";

pub const DEFAULT_CUSTOM_QUERY: &str =
    "SELECT Name, Market_Cap_Billion_USD FROM top_10_banks WHERE Market_Cap_Billion_USD > 100";
