use crate::constants::{COL_EUR, COL_GBP, COL_INR};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of the ranked source table, as extracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankRecord {
    pub rank: u32,
    pub name: String,
    pub market_cap_usd: f64,
}

/// A `BankRecord` plus its currency-converted market caps.
///
/// Serializes with the flat-file / table column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedBankRecord {
    #[serde(rename = "Rank")]
    pub rank: u32,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Market_Cap_Billion_USD")]
    pub market_cap_usd: f64,
    #[serde(rename = "Market_Cap_Billion_GBP")]
    pub market_cap_gbp: f64,
    #[serde(rename = "Market_Cap_Billion_EUR")]
    pub market_cap_eur: f64,
    #[serde(rename = "Market_Cap_Billion_INR")]
    pub market_cap_inr: f64,
}

impl EnrichedBankRecord {
    pub fn market_cap_in(&self, currency: Currency) -> f64 {
        match currency {
            Currency::Gbp => self.market_cap_gbp,
            Currency::Eur => self.market_cap_eur,
            Currency::Inr => self.market_cap_inr,
        }
    }
}

/// Ordered records in extraction rank order.
pub type RecordSet<T> = Vec<T>;

/// Target currencies the transform derives values for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    Gbp,
    Eur,
    Inr,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Gbp, Currency::Eur, Currency::Inr];

    /// ISO code as it appears in the exchange rate file.
    pub fn code(self) -> &'static str {
        match self {
            Currency::Gbp => "GBP",
            Currency::Eur => "EUR",
            Currency::Inr => "INR",
        }
    }

    /// Column holding this currency's market cap.
    pub fn column(self) -> &'static str {
        match self {
            Currency::Gbp => COL_GBP,
            Currency::Eur => COL_EUR,
            Currency::Inr => COL_INR,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
