use crate::app::ports::DocumentSource;
use crate::error::{EtlError, Result};
use crate::types::{BankRecord, RecordSet};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use tracing::{debug, info, instrument, warn};

static FOOTNOTE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static NUMERIC_NOISE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)us\$|[$,\s]").unwrap());

/// Which table in the document holds the ranking: a CSS selector plus the
/// zero-based index among its matches.
#[derive(Debug, Clone)]
pub struct TableSelector {
    css: String,
    selector: Selector,
    index: usize,
}

impl TableSelector {
    pub fn parse(css: &str) -> Result<Self> {
        let selector = Selector::parse(css)
            .map_err(|e| EtlError::Config(format!("invalid table selector '{}': {:?}", css, e)))?;
        Ok(Self {
            css: css.to_string(),
            selector,
            index: 0,
        })
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }
}

impl fmt::Display for TableSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.css, self.index)
    }
}

/// Positions of the canonical columns within a source row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    rank: usize,
    name: usize,
    market_cap_usd: usize,
}

/// First column not already claimed whose lowercased header satisfies `matches`.
fn find_column(
    headers: &[String],
    taken: &[Option<usize>],
    matches: impl Fn(&str) -> bool,
) -> Option<usize> {
    headers
        .iter()
        .enumerate()
        .find(|(i, h)| !taken.contains(&Some(*i)) && matches(h.as_str()))
        .map(|(i, _)| i)
}

/// Maps source header text onto {rank, name, market_cap_usd}, whatever the order.
///
/// An explicit market-cap header wins over one that only names the currency,
/// so a "Total assets (US$ billion)" column is never taken for market cap
/// when a market-cap column exists.
fn map_headers(headers: &[String]) -> Result<ColumnMap> {
    let lower: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();

    let rank = find_column(&lower, &[], |h| h.contains("rank"));
    let market_cap_usd = find_column(&lower, &[rank], |h| {
        h.contains("market cap") || h.contains("capitali")
    })
    .or_else(|| find_column(&lower, &[rank], |h| h.contains("us$") || h.contains("usd")));
    let name = find_column(&lower, &[rank, market_cap_usd], |h| {
        h.contains("name") || h.contains("bank")
    });

    match (rank, name, market_cap_usd) {
        (Some(rank), Some(name), Some(market_cap_usd)) => Ok(ColumnMap {
            rank,
            name,
            market_cap_usd,
        }),
        _ => Err(EtlError::SchemaMismatch(format!(
            "cannot map headers {:?} to rank, name, market_cap_usd",
            headers
        ))),
    }
}

fn row_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|c| matches!(c.value().name(), "th" | "td"))
        .collect()
}

/// Visible cell text with footnote markers removed and whitespace collapsed.
fn cell_text(cell: ElementRef<'_>) -> String {
    let raw = cell.text().collect::<String>();
    let stripped = FOOTNOTE_RE.replace_all(&raw, "");
    WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string()
}

fn clean_number(text: &str) -> String {
    NUMERIC_NOISE_RE
        .replace_all(text, "")
        .trim_end_matches('.')
        .to_string()
}

fn parse_row(cells: &[ElementRef<'_>], columns: ColumnMap, row: usize) -> Result<BankRecord> {
    let get = |idx: usize, column: &str| {
        cells.get(idx).map(|c| cell_text(*c)).ok_or_else(|| {
            EtlError::SchemaMismatch(format!("row {}: missing {} cell", row, column))
        })
    };

    let rank_text = get(columns.rank, "rank")?;
    let rank: u32 = clean_number(&rank_text).parse().map_err(|_| {
        EtlError::SchemaMismatch(format!("row {}: rank '{}' is not a whole number", row, rank_text))
    })?;
    if rank == 0 {
        return Err(EtlError::SchemaMismatch(format!("row {}: rank must be positive", row)));
    }

    let name = get(columns.name, "name")?;
    if name.is_empty() {
        return Err(EtlError::SchemaMismatch(format!("row {}: empty name", row)));
    }

    let cap_text = get(columns.market_cap_usd, "market_cap_usd")?;
    let market_cap_usd: f64 = clean_number(&cap_text).parse().map_err(|_| {
        EtlError::SchemaMismatch(format!("row {}: market cap '{}' is not a number", row, cap_text))
    })?;
    if !market_cap_usd.is_finite() || market_cap_usd < 0.0 {
        return Err(EtlError::SchemaMismatch(format!(
            "row {}: market cap {} must be non-negative",
            row, market_cap_usd
        )));
    }

    Ok(BankRecord {
        rank,
        name,
        market_cap_usd,
    })
}

/// Locates the ranking table in `html` and parses its rows in document order.
///
/// The first all-`<th>` row is the header; later all-`<th>` rows (sub-headers,
/// repeated headers) are skipped.
pub fn parse_bank_table(html: &str, table: &TableSelector) -> Result<RecordSet<BankRecord>> {
    let document = Html::parse_document(html);
    let table_el = document
        .select(&table.selector)
        .nth(table.index)
        .ok_or_else(|| EtlError::TableNotFound {
            selector: table.to_string(),
        })?;

    let row_selector = Selector::parse("tr")
        .map_err(|e| EtlError::Config(format!("invalid row selector: {:?}", e)))?;

    let mut columns: Option<ColumnMap> = None;
    let mut records = Vec::new();

    for (row_idx, row) in table_el.select(&row_selector).enumerate() {
        let cells = row_cells(row);
        if cells.is_empty() {
            continue;
        }
        let is_header = cells.iter().all(|c| c.value().name() == "th");
        match columns {
            None if is_header => {
                let headers: Vec<String> = cells.iter().map(|c| cell_text(*c)).collect();
                debug!("table headers: {:?}", headers);
                columns = Some(map_headers(&headers)?);
            }
            None => {
                return Err(EtlError::SchemaMismatch(
                    "table has no header row before its data rows".to_string(),
                ))
            }
            Some(_) if is_header => continue,
            Some(map) => records.push(parse_row(&cells, map, row_idx + 1)?),
        }
    }

    if columns.is_none() {
        return Err(EtlError::SchemaMismatch("table has no rows".to_string()));
    }

    if records.windows(2).any(|w| w[0].rank > w[1].rank) {
        warn!("source table is not in ascending rank order; keeping document order");
    }

    Ok(records)
}

/// Pulls the ranking table from a `DocumentSource`.
pub struct Extractor<S> {
    source: S,
    table: TableSelector,
    limit: Option<usize>,
}

impl<S: DocumentSource> Extractor<S> {
    pub fn new(source: S, table: TableSelector) -> Self {
        Self {
            source,
            table,
            limit: None,
        }
    }

    /// Keep only the first `limit` rows of the table.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    #[instrument(skip(self), fields(table = %self.table))]
    pub fn extract(&self, locator: &str) -> Result<RecordSet<BankRecord>> {
        let html = self.source.fetch(locator)?;
        let mut records = parse_bank_table(&html, &self.table)?;
        if let Some(limit) = self.limit {
            records.truncate(limit);
        }
        info!("Extracted {} bank records", records.len());
        if records.is_empty() {
            warn!("No rows found - the page structure may have changed");
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <table class="infobox"><tr><th>Not it</th></tr></table>
        <table class="wikitable sortable">
          <tbody>
            <tr><th>Rank</th><th>Bank name</th><th>Market cap<br>(US$ billion)</th></tr>
            <tr><td>1</td><td><a href="/wiki/JPMorgan_Chase">JPMorgan Chase</a></td><td>432.92</td></tr>
            <tr><td>2</td><td>Bank of America</td><td>231.52<sup>[1]</sup></td></tr>
            <tr><td>3</td><td>Industrial and Commercial Bank of China</td><td>1,194.56</td></tr>
          </tbody>
        </table>
        <table class="wikitable">
          <tr><th>Rank</th><th>Bank name</th><th>Total assets</th></tr>
        </table>
        </body></html>
    "#;

    fn wikitable() -> TableSelector {
        TableSelector::parse("table.wikitable").unwrap()
    }

    struct StaticSource(&'static str);

    impl DocumentSource for StaticSource {
        fn fetch(&self, _locator: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct DownSource;

    impl DocumentSource for DownSource {
        fn fetch(&self, locator: &str) -> Result<String> {
            Err(EtlError::SourceUnavailable(format!("{} unreachable", locator)))
        }
    }

    #[test]
    fn test_parse_wikitable() {
        let records = parse_bank_table(PAGE, &wikitable()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0],
            BankRecord {
                rank: 1,
                name: "JPMorgan Chase".to_string(),
                market_cap_usd: 432.92
            }
        );
        assert_eq!(records[1].market_cap_usd, 231.52);
        assert_eq!(records[2].market_cap_usd, 1194.56);
    }

    #[test]
    fn test_headers_in_any_order() {
        let html = r#"<table class="wikitable">
            <tr><th>Market capitalization (USD bn)</th><th>Rank</th><th>Name</th></tr>
            <tr><td>100.5</td><td>1.</td><td>BankA</td></tr>
        </table>"#;
        let records = parse_bank_table(html, &wikitable()).unwrap();
        assert_eq!(
            records,
            vec![BankRecord {
                rank: 1,
                name: "BankA".to_string(),
                market_cap_usd: 100.5
            }]
        );
    }

    #[test]
    fn test_extra_columns_and_subheaders_ignored() {
        let html = r#"<table class="wikitable">
            <tr><th>Rank</th><th>Country</th><th>Bank</th><th>Market cap (US$)</th></tr>
            <tr><th colspan="4">North America</th></tr>
            <tr><th>1</th><td>US</td><td>BankA</td><td>$ 80</td></tr>
        </table>"#;
        let records = parse_bank_table(html, &wikitable()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "BankA");
        assert_eq!(records[0].market_cap_usd, 80.0);
    }

    #[test]
    fn test_market_cap_header_beats_currency_only_header() {
        let html = r#"<table class="wikitable">
            <tr><th>Rank</th><th>Bank name</th><th>Total assets (US$ billion)</th><th>Market cap (US$ billion)</th></tr>
            <tr><td>1</td><td>BankA</td><td>3,900.0</td><td>432.9</td></tr>
        </table>"#;
        let records = parse_bank_table(html, &wikitable()).unwrap();
        assert_eq!(records[0].market_cap_usd, 432.9);
    }

    #[test]
    fn test_currency_only_header_as_fallback() {
        let html = r#"<table class="wikitable">
            <tr><th>Rank</th><th>Bank</th><th>Value (USD bn)</th></tr>
            <tr><td>1</td><td>BankA</td><td>12.5</td></tr>
        </table>"#;
        let records = parse_bank_table(html, &wikitable()).unwrap();
        assert_eq!(records[0].name, "BankA");
        assert_eq!(records[0].market_cap_usd, 12.5);
    }

    #[test]
    fn test_table_index_selects_later_match() {
        let selector = wikitable().with_index(1);
        let err = parse_bank_table(PAGE, &selector).unwrap_err();
        assert!(matches!(err, EtlError::SchemaMismatch(_)));
    }

    #[test]
    fn test_table_not_found() {
        let selector = TableSelector::parse("table.missing").unwrap();
        match parse_bank_table(PAGE, &selector) {
            Err(EtlError::TableNotFound { selector }) => assert_eq!(selector, "table.missing[0]"),
            other => panic!("expected TableNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_unmappable_headers() {
        let html = r#"<table class="wikitable">
            <tr><th>#</th><th>Institution</th><th>Value</th></tr>
            <tr><td>1</td><td>BankA</td><td>1</td></tr>
        </table>"#;
        let err = parse_bank_table(html, &wikitable()).unwrap_err();
        assert!(matches!(err, EtlError::SchemaMismatch(_)));
    }

    #[test]
    fn test_bad_market_cap_value() {
        let html = r#"<table class="wikitable">
            <tr><th>Rank</th><th>Name</th><th>Market cap</th></tr>
            <tr><td>1</td><td>BankA</td><td>n/a</td></tr>
        </table>"#;
        let err = parse_bank_table(html, &wikitable()).unwrap_err();
        assert!(matches!(err, EtlError::SchemaMismatch(_)));
    }

    #[test]
    fn test_short_row() {
        let html = r#"<table class="wikitable">
            <tr><th>Rank</th><th>Name</th><th>Market cap</th></tr>
            <tr><td>1</td><td>BankA</td></tr>
        </table>"#;
        let err = parse_bank_table(html, &wikitable()).unwrap_err();
        assert!(matches!(err, EtlError::SchemaMismatch(_)));
    }

    #[test]
    fn test_invalid_selector_is_config_error() {
        let err = TableSelector::parse("table[").unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[test]
    fn test_extractor_applies_limit() {
        let extractor = Extractor::new(StaticSource(PAGE), wikitable()).with_limit(Some(2));
        let records = extractor.extract("https://example.org").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "Bank of America");
    }

    #[test]
    fn test_extractor_propagates_fetch_failure() {
        let extractor = Extractor::new(DownSource, wikitable());
        let err = extractor.extract("https://example.org").unwrap_err();
        assert!(matches!(err, EtlError::SourceUnavailable(_)));
    }
}
