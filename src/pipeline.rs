use crate::app::ports::DocumentSource;
use crate::config::Config;
use crate::error::{EtlError, Result};
use crate::extract::{Extractor, TableSelector};
use crate::query::{self, Cell, QueryResult};
use crate::rates::ExchangeRateTable;
use crate::storage::{write_flat_file, write_table};
use crate::transform;
use crate::types::{BankRecord, Currency, EnrichedBankRecord, RecordSet};
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

/// Orchestrator states. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Init,
    Extracting,
    Transforming,
    Persisting,
    Querying,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Extracting => "extracting",
            Stage::Transforming => "transforming",
            Stage::Persisting => "persisting",
            Stage::Querying => "querying",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    fn next(self) -> Option<Stage> {
        match self {
            Stage::Init => Some(Stage::Extracting),
            Stage::Extracting => Some(Stage::Transforming),
            Stage::Transforming => Some(Stage::Persisting),
            Stage::Persisting => Some(Stage::Querying),
            Stage::Querying => Some(Stage::Done),
            Stage::Done | Stage::Failed => None,
        }
    }

    pub fn can_advance_to(self, to: Stage) -> bool {
        match to {
            Stage::Failed => !self.is_terminal(),
            _ => self.next() == Some(to),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error that ended a run, tagged with the stage it happened in.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub source: EtlError,
}

#[derive(Debug, Clone, Serialize)]
pub struct Projection {
    pub currency: Currency,
    pub result: QueryResult,
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub record_count: usize,
    pub csv_path: PathBuf,
    pub db_path: PathBuf,
    pub table_name: String,
    pub projections: Vec<Projection>,
    pub custom_query: String,
    pub custom_rows: Vec<Vec<Cell>>,
}

/// Renders raw rows as `[(a, b), (c, d)]`.
pub fn render_rows(rows: &[Vec<Cell>]) -> String {
    let rendered: Vec<String> = rows
        .iter()
        .map(|row| {
            let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
            format!("({})", cells.join(", "))
        })
        .collect();
    format!("[{}]", rendered.join(", "))
}

/// Runs extract -> transform -> persist -> query once, failing fast.
pub struct Pipeline<S> {
    config: Config,
    source: S,
    state: Stage,
    transitions: Vec<Stage>,
}

impl<S: DocumentSource> Pipeline<S> {
    pub fn new(config: Config, source: S) -> Self {
        Self {
            config,
            source,
            state: Stage::Init,
            transitions: vec![Stage::Init],
        }
    }

    pub fn state(&self) -> Stage {
        self.state
    }

    /// Every state the pipeline has been in, starting with `Init`.
    pub fn transitions(&self) -> &[Stage] {
        &self.transitions
    }

    fn advance(&mut self, to: Stage) {
        if !self.state.can_advance_to(to) {
            warn!("unexpected transition {} -> {}", self.state, to);
        }
        self.state = to;
        self.transitions.push(to);
    }

    /// Executes the pipeline. A pipeline runs at most once.
    pub fn run(&mut self) -> std::result::Result<RunReport, StageFailure> {
        if self.state != Stage::Init {
            return Err(StageFailure {
                stage: self.state,
                source: EtlError::Config("pipeline has already run".to_string()),
            });
        }

        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);
        let _enter = span.enter();

        let started_at = Utc::now();
        info!("🚀 Starting bank ETL run");

        let outcome = self.run_stages(run_id, started_at);
        match &outcome {
            Ok(report) => {
                self.advance(Stage::Done);
                counter!("bank_etl_runs_total", "outcome" => "success").increment(1);
                info!(
                    "🏁 Run finished: {} records written to {} and {}",
                    report.record_count,
                    report.csv_path.display(),
                    report.db_path.display()
                );
            }
            Err(failure) => {
                self.advance(Stage::Failed);
                counter!("bank_etl_runs_total", "outcome" => "failure").increment(1);
                error!(stage = %failure.stage, error = %failure.source, "❌ Run aborted");
            }
        }
        outcome
    }

    fn run_stages(
        &mut self,
        run_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> std::result::Result<RunReport, StageFailure> {
        let records = self.stage(Stage::Extracting, |p| p.extract())?;
        let enriched = self.stage(Stage::Transforming, |p| p.transform(&records))?;
        self.stage(Stage::Persisting, |p| p.persist(&enriched))?;
        let (projections, custom_rows) = self.stage(Stage::Querying, |p| p.run_queries())?;

        Ok(RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            record_count: enriched.len(),
            csv_path: self.config.output.csv_path.clone(),
            db_path: self.config.output.db_path.clone(),
            table_name: self.config.output.table_name.clone(),
            projections,
            custom_query: self.config.queries.custom.clone(),
            custom_rows,
        })
    }

    fn stage<T>(
        &mut self,
        stage: Stage,
        f: impl FnOnce(&Self) -> Result<T>,
    ) -> std::result::Result<T, StageFailure> {
        self.advance(stage);
        let span = info_span!("stage", stage = %stage);
        let _enter = span.enter();

        info!("▶️  {} started", stage);
        let t = Instant::now();
        let result = f(self);
        let secs = t.elapsed().as_secs_f64();
        histogram!("bank_etl_stage_duration_seconds", "stage" => stage.as_str()).record(secs);

        match result {
            Ok(value) => {
                info!("✅ {} completed in {:.3}s", stage, secs);
                Ok(value)
            }
            Err(source) => {
                error!("❌ {} failed after {:.3}s: {}", stage, secs, source);
                Err(StageFailure { stage, source })
            }
        }
    }

    fn extract(&self) -> Result<RecordSet<BankRecord>> {
        let source = &self.config.source;
        let table = TableSelector::parse(&source.table_selector)?.with_index(source.table_index);
        let locator = match &source.html_file {
            Some(path) => path.display().to_string(),
            None => source.url.clone(),
        };
        let records = Extractor::new(&self.source, table)
            .with_limit(source.limit)
            .extract(&locator)?;
        counter!("bank_etl_records_total", "stage" => "extract").increment(records.len() as u64);
        Ok(records)
    }

    fn transform(&self, records: &[BankRecord]) -> Result<RecordSet<EnrichedBankRecord>> {
        let rates = ExchangeRateTable::from_path(&self.config.rates.path)?;
        let enriched = transform::transform(records, &rates)?;
        info!("💱 Enriched {} records with GBP/EUR/INR values", enriched.len());
        Ok(enriched)
    }

    fn persist(&self, records: &[EnrichedBankRecord]) -> Result<()> {
        let output = &self.config.output;
        write_flat_file(records, &output.csv_path)?;
        if let Err(e) = write_table(records, &output.db_path, &output.table_name) {
            warn!(
                "⚠️  {} was written but table {} in {} was not; persistence targets are out of sync",
                output.csv_path.display(),
                output.table_name,
                output.db_path.display()
            );
            return Err(e);
        }
        counter!("bank_etl_records_total", "stage" => "persist").increment(records.len() as u64);
        Ok(())
    }

    fn run_queries(&self) -> Result<(Vec<Projection>, Vec<Vec<Cell>>)> {
        let output = &self.config.output;
        let mut projections = Vec::with_capacity(Currency::ALL.len());
        for currency in Currency::ALL {
            let sql = query::currency_projection_sql(&output.table_name, currency)?;
            let result = query::query(&output.db_path, &sql)?;
            info!("📊 {} projection ({} rows):\n{}", currency, result.len(), result);
            projections.push(Projection { currency, result });
        }

        let custom = &self.config.queries.custom;
        info!("🔎 Running custom query: {}", custom);
        let custom_rows = query::execute_raw(&output.db_path, custom)?;
        info!("Custom query result: {}", render_rows(&custom_rows));

        Ok((projections, custom_rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_transitions() {
        assert!(Stage::Init.can_advance_to(Stage::Extracting));
        assert!(Stage::Querying.can_advance_to(Stage::Done));
        assert!(Stage::Persisting.can_advance_to(Stage::Failed));
        assert!(!Stage::Init.can_advance_to(Stage::Persisting));
        assert!(!Stage::Done.can_advance_to(Stage::Failed));
        assert!(!Stage::Failed.can_advance_to(Stage::Extracting));
        assert!(Stage::Done.is_terminal() && Stage::Failed.is_terminal());
    }

    #[test]
    fn test_render_rows() {
        let rows = vec![
            vec![Cell::Text("BankA".into()), Cell::Real(100.0)],
            vec![Cell::Text("BankB".into()), Cell::Integer(7)],
        ];
        assert_eq!(render_rows(&rows), "[(BankA, 100.0), (BankB, 7)]");
        assert_eq!(render_rows(&[]), "[]");
    }

    #[test]
    fn test_stage_failure_message() {
        let failure = StageFailure {
            stage: Stage::Transforming,
            source: EtlError::MissingCurrency("INR".into()),
        };
        assert_eq!(
            failure.to_string(),
            "transforming stage failed: exchange rate missing for currency 'INR'"
        );
    }
}
