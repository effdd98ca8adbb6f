use crate::error::Result;
use crate::rates::ExchangeRateTable;
use crate::types::{BankRecord, Currency, EnrichedBankRecord, RecordSet};
use tracing::{debug, instrument};

/// Rounds to two decimal places, halves away from zero (half-up for the
/// non-negative values this pipeline handles).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Resolved USD -> target rates for one transform call.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TargetRates {
    gbp: f64,
    eur: f64,
    inr: f64,
}

impl TargetRates {
    fn resolve(table: &ExchangeRateTable) -> Result<Self> {
        Ok(Self {
            gbp: table.rate(Currency::Gbp)?,
            eur: table.rate(Currency::Eur)?,
            inr: table.rate(Currency::Inr)?,
        })
    }
}

fn enrich_with(record: &BankRecord, rates: TargetRates) -> EnrichedBankRecord {
    EnrichedBankRecord {
        rank: record.rank,
        name: record.name.clone(),
        market_cap_usd: record.market_cap_usd,
        market_cap_gbp: round2(record.market_cap_usd * rates.gbp),
        market_cap_eur: round2(record.market_cap_usd * rates.eur),
        market_cap_inr: round2(record.market_cap_usd * rates.inr),
    }
}

/// Enriches a single record.
pub fn enrich(record: &BankRecord, rates: &ExchangeRateTable) -> Result<EnrichedBankRecord> {
    Ok(enrich_with(record, TargetRates::resolve(rates)?))
}

/// Enriches every record, preserving length and order.
///
/// All target rates are looked up before any record is touched, so a missing
/// currency fails the call even when `records` is empty.
#[instrument(skip_all, fields(records = records.len()))]
pub fn transform(
    records: &[BankRecord],
    rates: &ExchangeRateTable,
) -> Result<RecordSet<EnrichedBankRecord>> {
    let target = TargetRates::resolve(rates)?;
    debug!(?target, "resolved target rates");
    Ok(records.iter().map(|r| enrich_with(r, target)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;

    fn rates() -> ExchangeRateTable {
        [("GBP", 0.8), ("EUR", 0.9), ("INR", 83.0)]
            .into_iter()
            .map(|(c, r)| (c.to_string(), r))
            .collect()
    }

    fn record(rank: u32, name: &str, usd: f64) -> BankRecord {
        BankRecord {
            rank,
            name: name.to_string(),
            market_cap_usd: usd,
        }
    }

    #[test]
    fn test_round2_half_up() {
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(2.5), 2.5);
        assert_eq!(round2(1.234), 1.23);
        assert_eq!(round2(1.236), 1.24);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn test_transform_two_banks() {
        let input = vec![record(1, "BankA", 100.0), record(2, "BankB", 50.0)];
        let out = transform(&input, &rates()).unwrap();
        assert_eq!(
            out,
            vec![
                EnrichedBankRecord {
                    rank: 1,
                    name: "BankA".to_string(),
                    market_cap_usd: 100.0,
                    market_cap_gbp: 80.0,
                    market_cap_eur: 90.0,
                    market_cap_inr: 8300.0,
                },
                EnrichedBankRecord {
                    rank: 2,
                    name: "BankB".to_string(),
                    market_cap_usd: 50.0,
                    market_cap_gbp: 40.0,
                    market_cap_eur: 45.0,
                    market_cap_inr: 4150.0,
                },
            ]
        );
    }

    #[test]
    fn test_derived_values_match_rounded_product() {
        let table: ExchangeRateTable = [("GBP", 0.7891), ("EUR", 0.9317), ("INR", 82.9512)]
            .into_iter()
            .map(|(c, r)| (c.to_string(), r))
            .collect();
        let input = vec![
            record(1, "A", 432.92),
            record(2, "B", 231.52),
            record(3, "C", 0.01),
            record(4, "D", 0.0),
        ];
        let out = transform(&input, &table).unwrap();
        for (r, e) in input.iter().zip(&out) {
            for currency in Currency::ALL {
                let expected = round2(r.market_cap_usd * table.rate(currency).unwrap());
                assert_eq!(e.market_cap_in(currency), expected, "{} {}", r.name, currency);
            }
        }
    }

    #[test]
    fn test_transform_preserves_order_and_length() {
        let input = vec![record(3, "C", 1.0), record(1, "A", 3.0), record(2, "B", 2.0)];
        let out = transform(&input, &rates()).unwrap();
        let ranks: Vec<u32> = out.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![3, 1, 2]);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let input = vec![record(1, "A", 123.456), record(2, "B", 7.891)];
        let table = rates();
        assert_eq!(transform(&input, &table).unwrap(), transform(&input, &table).unwrap());
    }

    #[test]
    fn test_missing_currency() {
        let table: ExchangeRateTable = [("GBP".to_string(), 0.8), ("EUR".to_string(), 0.9)]
            .into_iter()
            .collect();
        match transform(&[record(1, "A", 1.0)], &table) {
            Err(EtlError::MissingCurrency(code)) => assert_eq!(code, "INR"),
            other => panic!("expected MissingCurrency, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_currency_fails_on_empty_input() {
        let table = ExchangeRateTable::default();
        assert!(matches!(
            transform(&[], &table),
            Err(EtlError::MissingCurrency(_))
        ));
    }

    #[test]
    fn test_enrich_single_record() {
        let e = enrich(&record(7, "G", 10.0), &rates()).unwrap();
        assert_eq!(e.rank, 7);
        assert_eq!(e.market_cap_eur, 9.0);
    }
}
