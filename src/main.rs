use anyhow::Context;
use bank_etl::app::ports::DocumentSource;
use bank_etl::config::Config;
use bank_etl::infra::{FileDocumentSource, ReqwestHttp};
use bank_etl::pipeline::{render_rows, Pipeline};
use bank_etl::{logging, query};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser)]
#[command(name = "bank-etl")]
#[command(about = "Largest banks by market capitalization: extract, convert, persist, query")]
#[command(version)]
struct Cli {
    /// Path to the TOML config (defaults to $BANK_ETL_CONFIG, then bank_etl.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full ETL pipeline (default)
    Run(RunArgs),
    /// Run a statement against the persisted table
    Query {
        /// SQL text
        sql: String,
        /// Database file (defaults to the configured output)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Execute as a raw statement and print row tuples
        #[arg(long)]
        raw: bool,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Page holding the ranking table
    #[arg(long)]
    url: Option<String>,
    /// Read the page from a local HTML file instead of fetching it
    #[arg(long)]
    html_file: Option<PathBuf>,
    /// CSS selector for the ranking table
    #[arg(long)]
    selector: Option<String>,
    /// Which matching table to use (0-based)
    #[arg(long)]
    table_index: Option<usize>,
    /// Exchange rate CSV (Currency,Rate)
    #[arg(long)]
    rates: Option<PathBuf>,
    /// Flat file output path
    #[arg(long)]
    csv: Option<PathBuf>,
    /// SQLite database path
    #[arg(long)]
    db: Option<PathBuf>,
    /// Table name in the database
    #[arg(long)]
    table: Option<String>,
    /// Free-form query to run after loading
    #[arg(long)]
    custom_query: Option<String>,
    /// Keep only the first N rows of the source table
    #[arg(long)]
    limit: Option<usize>,
    /// Write the run report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

impl RunArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.source.url = url.clone();
        }
        if let Some(path) = &self.html_file {
            config.source.html_file = Some(path.clone());
        }
        if let Some(selector) = &self.selector {
            config.source.table_selector = selector.clone();
        }
        if let Some(index) = self.table_index {
            config.source.table_index = index;
        }
        if let Some(path) = &self.rates {
            config.rates.path = path.clone();
        }
        if let Some(path) = &self.csv {
            config.output.csv_path = path.clone();
        }
        if let Some(path) = &self.db {
            config.output.db_path = path.clone();
        }
        if let Some(table) = &self.table {
            config.output.table_name = table.clone();
        }
        if let Some(sql) = &self.custom_query {
            config.queries.custom = sql.clone();
        }
        if self.limit.is_some() {
            config.source.limit = self.limit;
        }
    }
}

fn run_pipeline(config: Config, report_path: Option<PathBuf>) -> anyhow::Result<()> {
    let source: Box<dyn DocumentSource> = match &config.source.html_file {
        Some(_) => Box::new(FileDocumentSource),
        None => Box::new(ReqwestHttp::with_user_agent(&config.source.user_agent)?),
    };

    let mut pipeline = Pipeline::new(config, source);
    let report = pipeline.run()?;

    println!("\n📊 Pipeline Results:");
    println!("   Run id: {}", report.run_id);
    println!("   Records: {}", report.record_count);
    println!("   Flat file: {}", report.csv_path.display());
    println!("   Database: {} (table {})", report.db_path.display(), report.table_name);
    println!("   Custom query rows: {}", report.custom_rows.len());

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        info!("Wrote run report to {}", path.display());
    }
    Ok(())
}

fn run_query(config: &Config, sql: &str, db: Option<PathBuf>, raw: bool) -> anyhow::Result<()> {
    let db = db.unwrap_or_else(|| config.output.db_path.clone());
    if raw {
        let rows = query::execute_raw(&db, sql)?;
        println!("{}", render_rows(&rows));
    } else {
        let result = query::query(&db, sql)?;
        println!("{}", result);
    }
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    let command = cli.command.unwrap_or_else(|| Commands::Run(RunArgs::default()));

    match command {
        Commands::Run(args) => {
            args.apply(&mut config);
            let (dispatch, _guard) = logging::build_dispatch(&config.logging)?;
            tracing::dispatcher::with_default(&dispatch, || run_pipeline(config, args.report))
        }
        Commands::Query { sql, db, raw } => {
            let (dispatch, _guard) = logging::build_dispatch(&config.logging)?;
            tracing::dispatcher::with_default(&dispatch, || run_query(&config, &sql, db, raw))
        }
    }
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}
