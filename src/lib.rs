pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod types;

// Pipeline stages
pub mod extract;
pub mod pipeline;
pub mod query;
pub mod rates;
pub mod storage;
pub mod transform;

// Ports and their adapters
pub mod app;
pub mod infra;

pub use error::{EtlError, Result};
pub use pipeline::{Pipeline, RunReport, Stage, StageFailure};
pub use types::{BankRecord, Currency, EnrichedBankRecord, RecordSet};
