//! Alpha CLI — list and load month-partitioned price datasets.
//!
//! Commands:
//! - `datasets` — list asset types and their dataset identifiers
//! - `months` — list the months a dataset holds in a bucket
//! - `load` — load a contiguous month range and write it as Parquet or CSV

use alpha_core::store::{LocalStore, MonthStore, S3Store};
use alpha_core::{AssetType, LoadSummary, MonthRange, RangeLoader, StoreCredentials};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use polars::prelude::{CsvWriter, DataFrame, ParquetWriter, SerWriter};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "alpha",
    about = "Alpha datasets — load monthly price data from object storage"
)]
struct Cli {
    /// Verbose logging (debug level). RUST_LOG takes precedence.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List asset types and their dataset identifiers.
    Datasets,
    /// List the months available for a dataset.
    Months {
        #[command(flatten)]
        source: SourceArgs,

        /// Print JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Load a month range and write the merged table.
    Load {
        #[command(flatten)]
        source: SourceArgs,

        /// First month to load (YYYY.MM). Requires --end.
        #[arg(long)]
        start: Option<String>,

        /// Last month to load (YYYY.MM). Requires --start.
        #[arg(long)]
        end: Option<String>,

        /// Output file; the extension (.parquet or .csv) selects the format.
        #[arg(long, short)]
        output: PathBuf,

        /// Print the load summary as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

/// Where to read from.
#[derive(Args)]
struct SourceArgs {
    /// Asset type: stocks, etfs, indices, cryptocurrencies.
    #[arg(long)]
    asset: String,

    /// Bucket name.
    #[arg(long)]
    bucket: String,

    /// Read from a local directory mirroring the bucket layout instead of S3/R2.
    #[arg(long)]
    local_root: Option<PathBuf>,

    /// TOML credentials file (endpoint_url, access_key_id, secret_access_key).
    /// Fields set here override R2_* environment variables.
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Endpoint URL, overriding both the file and the environment.
    #[arg(long)]
    endpoint: Option<String>,
}

impl SourceArgs {
    fn asset(&self) -> Result<AssetType> {
        Ok(self.asset.parse::<AssetType>()?)
    }

    fn credentials(&self) -> Result<Option<StoreCredentials>> {
        let mut creds = StoreCredentials::from_env().unwrap_or_default();
        if let Some(path) = &self.credentials {
            let from_file = StoreCredentials::from_file(path).map_err(anyhow::Error::msg)?;
            creds = from_file.merge_over(creds);
        }
        if let Some(endpoint) = &self.endpoint {
            creds.endpoint_url = Some(endpoint.clone());
        }
        Ok((!creds.is_empty()).then_some(creds))
    }

    fn store(&self) -> Result<Box<dyn MonthStore>> {
        Ok(match &self.local_root {
            Some(root) => Box::new(LocalStore::new(root)),
            None => Box::new(S3Store::new()?),
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Datasets => run_datasets(),
        Commands::Months { source, json } => run_months(&source, json),
        Commands::Load {
            source,
            start,
            end,
            output,
            json,
        } => run_load(&source, start, end, &output, json),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_datasets() -> Result<()> {
    println!("{:<18} {}", "Asset", "Dataset");
    println!("{}", "-".repeat(48));
    for asset in AssetType::ALL {
        println!("{:<18} {}", asset.name(), asset.dataset());
    }
    Ok(())
}

fn run_months(source: &SourceArgs, json: bool) -> Result<()> {
    let asset = source.asset()?;
    let creds = source.credentials()?;
    let store = source.store()?;

    let catalog = store
        .list_months(&source.bucket, asset.dataset(), creds.as_ref())
        .with_context(|| format!("listing {} in bucket '{}'", asset.dataset(), source.bucket))?;

    if json {
        let value = serde_json::json!({
            "asset": asset,
            "bucket": source.bucket,
            "dataset": asset.dataset(),
            "fingerprint": catalog.fingerprint(),
            "months": catalog.iter().map(|(m, loc)| serde_json::json!({
                "month": m,
                "location": loc,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if catalog.is_empty() {
        println!("No months for {} in bucket '{}'", asset.dataset(), source.bucket);
        return Ok(());
    }

    println!("Dataset:     {}", asset.dataset());
    println!("Bucket:      {}", source.bucket);
    println!("Months:      {}", catalog.len());
    if let (Some(first), Some(last)) = (catalog.first(), catalog.last()) {
        println!("Span:        {first} to {last}");
    }
    println!("Fingerprint: {}", catalog.fingerprint());
    println!();
    println!("{:<10} {}", "Month", "Location");
    println!("{}", "-".repeat(58));
    for (month, location) in catalog.iter() {
        println!("{:<10} {}", month, location);
    }
    Ok(())
}

fn run_load(
    source: &SourceArgs,
    start: Option<String>,
    end: Option<String>,
    output: &Path,
    json: bool,
) -> Result<()> {
    let range = match (start, end) {
        (Some(s), Some(e)) => Some(MonthRange::new(s, e)),
        (None, None) => None,
        _ => bail!("--start and --end must be given together"),
    };
    let format = OutputFormat::from_path(output)?;

    let asset = source.asset()?;
    let creds = source.credentials()?;
    let store = source.store()?;
    tracing::debug!(store = store.name(), ?range, "starting load");

    let (mut df, summary) = RangeLoader::new(store.as_ref())
        .load_with_summary(asset, &source.bucket, range.as_ref(), creds.as_ref())?;

    write_output(&mut df, output, format)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, output);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Parquet,
    Csv,
}

impl OutputFormat {
    fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("parquet") => Ok(Self::Parquet),
            Some("csv") => Ok(Self::Csv),
            _ => bail!(
                "unsupported output '{}': use a .parquet or .csv extension",
                path.display()
            ),
        }
    }
}

fn write_output(df: &mut DataFrame, path: &Path, format: OutputFormat) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let file =
        std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    match format {
        OutputFormat::Parquet => {
            ParquetWriter::new(file).finish(df)?;
        }
        OutputFormat::Csv => {
            CsvWriter::new(file).include_header(true).finish(df)?;
        }
    }
    Ok(())
}

fn print_summary(summary: &LoadSummary, output: &Path) {
    println!();
    println!("=== Load Result ===");
    println!("Asset:       {}", summary.asset.name());
    println!("Dataset:     {}", summary.asset.dataset());
    println!("Bucket:      {}", summary.bucket);
    println!("Range:       {} to {}", summary.start, summary.end);
    println!("Months:      {}", summary.months.len());
    println!("Rows:        {}", summary.rows);
    println!("Catalog:     {}", summary.catalog_fingerprint);
    println!("Written to:  {}", output.display());
    println!();
}
