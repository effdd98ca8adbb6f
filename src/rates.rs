use crate::constants::{RATE_COL_CURRENCY, RATE_COL_RATE};
use crate::error::{EtlError, Result};
use crate::types::Currency;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Currency code -> units of local currency per 1 USD.
///
/// Presence of a particular currency is only checked at lookup time; the
/// transform resolves every currency it needs before touching any record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeRateTable {
    rates: HashMap<String, f64>,
}

impl ExchangeRateTable {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            EtlError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to open exchange rate file '{}': {}", path.display(), e),
            ))
        })?;
        let table = Self::from_reader(file)?;
        info!("Loaded {} exchange rates from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parses `Currency,Rate` rows. Extra columns are ignored.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| EtlError::MalformedSource(format!("unreadable header: {}", e)))?
            .clone();
        let col = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| EtlError::MalformedSource(format!("missing '{}' column", name)))
        };
        let code_idx = col(RATE_COL_CURRENCY)?;
        let rate_idx = col(RATE_COL_RATE)?;

        let mut rates = HashMap::new();
        for (i, row) in rdr.records().enumerate() {
            let line = i + 2;
            let row = row.map_err(|e| EtlError::MalformedSource(format!("line {}: {}", line, e)))?;
            let code = row
                .get(code_idx)
                .filter(|c| !c.is_empty())
                .ok_or_else(|| EtlError::MalformedSource(format!("line {}: empty currency code", line)))?
                .to_ascii_uppercase();
            let raw_rate = row.get(rate_idx).unwrap_or_default();
            let rate: f64 = raw_rate.parse().map_err(|_| {
                EtlError::MalformedSource(format!("line {}: rate '{}' is not a number", line, raw_rate))
            })?;
            if !rate.is_finite() || rate <= 0.0 {
                return Err(EtlError::MalformedSource(format!(
                    "line {}: rate for {} must be positive, got {}",
                    line, code, rate
                )));
            }
            debug!("rate {} = {}", code, rate);
            if rates.insert(code.clone(), rate).is_some() {
                return Err(EtlError::MalformedSource(format!(
                    "line {}: duplicate currency code {}",
                    line, code
                )));
            }
        }

        Ok(Self { rates })
    }

    pub fn get(&self, code: &str) -> Result<f64> {
        self.rates
            .get(&code.to_ascii_uppercase())
            .copied()
            .ok_or_else(|| EtlError::MissingCurrency(code.to_string()))
    }

    pub fn rate(&self, currency: Currency) -> Result<f64> {
        self.get(currency.code())
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl FromIterator<(String, f64)> for ExchangeRateTable {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            rates: iter
                .into_iter()
                .map(|(code, rate)| (code.to_ascii_uppercase(), rate))
                .collect(),
        }
    }
}
