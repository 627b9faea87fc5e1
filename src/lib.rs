pub mod cli;
pub mod config;
pub mod diff;
pub mod expr;
pub mod fuzzy;
pub mod import;
pub mod io_utils;
pub mod issues;
pub mod mapping;
pub mod normalize;
pub mod price;
pub mod quality;
pub mod reconcile;
pub mod schema;
pub mod table;
pub mod value;

use std::{env, path::Path, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, info};

use crate::cli::{Cli, Commands, SourceType};
use crate::config::Settings;
use crate::issues::IssueLog;
use crate::mapping::MappingDocument;
use crate::table::Table;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("invoice_recon", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Normalize(args) => handle_normalize(&args),
        Commands::Reconcile(args) => handle_reconcile(&args),
        Commands::Diff(args) => handle_diff(&args),
        Commands::PriceCheck(args) => handle_price_check(&args),
    }
}

fn load_environment(
    config: Option<&Path>,
    mappings: Option<&Path>,
) -> Result<(Settings, MappingDocument, IssueLog)> {
    let settings = Settings::load_or_default(config)?;
    let mapping_path = mappings.or(settings.mapping_path.as_deref());
    let document = MappingDocument::load_or_builtin(mapping_path)?;
    let log = IssueLog::new(settings.log_max_detail_rows);
    Ok((settings, document, log))
}

fn emit_table(table: &Table, output: Option<&Path>, as_table: bool) -> Result<()> {
    if as_table {
        table.print(None);
        return Ok(());
    }
    io_utils::write_table(output, table)
}

fn finish_issue_log(log: &IssueLog, export: Option<&Path>) -> Result<()> {
    log.emit_display();
    if let Some(path) = export {
        log.export_csv(path)?;
        info!("Issue log with {} entr(ies) written to {:?}", log.history().len(), path);
    }
    Ok(())
}

fn handle_normalize(args: &cli::NormalizeArgs) -> Result<()> {
    let (settings, document, log) =
        load_environment(args.config.as_deref(), args.mappings.as_deref())?;
    let family = args.source_type.map(SourceType::family);
    let mut table =
        import::import_file(&args.input, family, &document, &settings, args.strict_key, &log)?;
    if let Some(limit) = args.limit {
        let mut seen = 0usize;
        table.retain_rows(|_| {
            seen += 1;
            seen <= limit
        });
    }
    emit_table(&table, args.output.as_deref(), args.table)?;
    info!(
        "Canonical table with {} row(s) written to {}",
        table.row_count(),
        io_utils::describe_output(args.output.as_deref())
    );
    finish_issue_log(&log, args.log_output.as_deref())
}

fn handle_reconcile(args: &cli::ReconcileArgs) -> Result<()> {
    let (mut settings, document, log) =
        load_environment(args.config.as_deref(), args.mappings.as_deref())?;
    if args.hide_missing {
        settings.hide_missing = true;
    }
    let hub = import::import_file(&args.hub, None, &document, &settings, args.strict_key, &log)?;
    let vendor =
        import::import_file(&args.vendor, None, &document, &settings, args.strict_key, &log)?;
    let outcome = reconcile::reconcile(&hub, &vendor, &settings, args.strict_key, &log);
    emit_table(&outcome.table, args.output.as_deref(), args.table)?;
    println!("{}", outcome.summary);
    finish_issue_log(&log, args.log_output.as_deref())
}

fn handle_diff(args: &cli::DiffArgs) -> Result<()> {
    let (settings, document, log) =
        load_environment(args.config.as_deref(), args.mappings.as_deref())?;
    let left_family = args.left_type.map(SourceType::family);
    let right_family = args.right_type.map(SourceType::family);
    let left = import::import_file(&args.left, left_family, &document, &settings, false, &log)?;
    let right = import::import_file(&args.right, right_family, &document, &settings, false, &log)?;
    let report = diff::compare(&left, &right, &settings);
    emit_table(&report.to_table(), args.output.as_deref(), args.table)?;
    println!("{}", report.summary());
    info!("Diff produced {} discrepancy record(s)", report.len());
    finish_issue_log(&log, args.log_output.as_deref())
}

fn handle_price_check(args: &cli::PriceCheckArgs) -> Result<()> {
    let (settings, document, log) =
        load_environment(args.config.as_deref(), args.mappings.as_deref())?;
    let hub = import::import_file(&args.hub, None, &document, &settings, false, &log)?;
    let vendor = import::import_file(&args.vendor, None, &document, &settings, false, &log)?;
    let differences = price::compare_prices(&hub, &vendor, &settings);
    emit_table(&differences, args.output.as_deref(), args.table)?;
    println!("Price differences: {}", differences.row_count());
    finish_issue_log(&log, args.log_output.as_deref())
}
