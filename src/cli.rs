use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::mapping::SourceFamily;

#[derive(Debug, Parser)]
#[command(author, version, about = "Reconcile hub and vendor invoice feeds", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import one feed and emit the canonical table
    Normalize(NormalizeArgs),
    /// Classify hub rows against a vendor feed by business key
    Reconcile(ReconcileArgs),
    /// Compare two feeds cell by cell with tolerance policies
    Diff(DiffArgs),
    /// Report effective unit-price differences per business key
    PriceCheck(PriceCheckArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum SourceType {
    Hub,
    Invoice,
    Recon,
}

impl SourceType {
    pub fn family(self) -> SourceFamily {
        match self {
            SourceType::Hub => SourceFamily::Hub,
            SourceType::Invoice => SourceFamily::VendorInvoice,
            SourceType::Recon => SourceFamily::VendorRecon,
        }
    }
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    /// Input CSV feed to normalize
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Source family when the file name prefix is ambiguous
    #[arg(long = "source-type", value_enum)]
    pub source_type: Option<SourceType>,
    /// Settings file (JSON or YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Column mapping document (JSON or YAML)
    #[arg(long)]
    pub mappings: Option<PathBuf>,
    /// Require the strict composite-key columns to resolve
    #[arg(long = "strict-key")]
    pub strict_key: bool,
    /// Limit number of rows emitted
    #[arg(long)]
    pub limit: Option<usize>,
    /// Write the issue log to this CSV file
    #[arg(long = "log-output")]
    pub log_output: Option<PathBuf>,
    /// Render output as an elastic table to stdout
    #[arg(long = "table")]
    pub table: bool,
}

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Hub-side CSV feed
    #[arg(long = "hub")]
    pub hub: PathBuf,
    /// Vendor-side CSV feed
    #[arg(long = "vendor")]
    pub vendor: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Settings file (JSON or YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Column mapping document (JSON or YAML)
    #[arg(long)]
    pub mappings: Option<PathBuf>,
    /// Group on the longer strict composite key
    #[arg(long = "strict-key")]
    pub strict_key: bool,
    /// Suppress rows for vendor keys absent on the hub side
    #[arg(long = "hide-missing")]
    pub hide_missing: bool,
    /// Write the issue log to this CSV file
    #[arg(long = "log-output")]
    pub log_output: Option<PathBuf>,
    /// Render output as an elastic table to stdout
    #[arg(long = "table")]
    pub table: bool,
}

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Left CSV feed
    #[arg(long = "left")]
    pub left: PathBuf,
    /// Right CSV feed
    #[arg(long = "right")]
    pub right: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Source family for the left feed when its file name is ambiguous
    #[arg(long = "left-type", value_enum)]
    pub left_type: Option<SourceType>,
    /// Source family for the right feed when its file name is ambiguous
    #[arg(long = "right-type", value_enum)]
    pub right_type: Option<SourceType>,
    /// Settings file (JSON or YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Column mapping document (JSON or YAML)
    #[arg(long)]
    pub mappings: Option<PathBuf>,
    /// Write the issue log to this CSV file
    #[arg(long = "log-output")]
    pub log_output: Option<PathBuf>,
    /// Render output as an elastic table to stdout
    #[arg(long = "table")]
    pub table: bool,
}

#[derive(Debug, Args)]
pub struct PriceCheckArgs {
    /// Hub-side CSV feed
    #[arg(long = "hub")]
    pub hub: PathBuf,
    /// Vendor-side CSV feed
    #[arg(long = "vendor")]
    pub vendor: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Settings file (JSON or YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Column mapping document (JSON or YAML)
    #[arg(long)]
    pub mappings: Option<PathBuf>,
    /// Write the issue log to this CSV file
    #[arg(long = "log-output")]
    pub log_output: Option<PathBuf>,
    /// Render output as an elastic table to stdout
    #[arg(long = "table")]
    pub table: bool,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Commands, SourceType};
    use crate::mapping::SourceFamily;

    #[test]
    fn parses_reconcile_flags() {
        let cli = Cli::parse_from([
            "invoice-recon",
            "reconcile",
            "--hub",
            "hub.csv",
            "--vendor",
            "invoice.csv",
            "--strict-key",
            "--hide-missing",
            "-o",
            "out.csv",
        ]);
        match cli.command {
            Commands::Reconcile(args) => {
                assert!(args.strict_key);
                assert!(args.hide_missing);
                assert_eq!(
                    args.output.as_deref().and_then(|path| path.to_str()),
                    Some("out.csv")
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_normalize_source_type() {
        let cli = Cli::parse_from([
            "invoice-recon",
            "normalize",
            "-i",
            "mystery.csv",
            "--source-type",
            "recon",
        ]);
        match cli.command {
            Commands::Normalize(args) => {
                assert_eq!(args.source_type, Some(SourceType::Recon));
                assert_eq!(
                    args.source_type.map(SourceType::family),
                    Some(SourceFamily::VendorRecon)
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_price_check_name() {
        let cli = Cli::parse_from([
            "invoice-recon",
            "price-check",
            "--hub",
            "hub.csv",
            "--vendor",
            "recon.csv",
            "--table",
        ]);
        match cli.command {
            Commands::PriceCheck(args) => assert!(args.table),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
