use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use cargo_port_enricher::app::enrich_use_case::EnrichUseCase;
use cargo_port_enricher::app::normalize_use_case::{report_name, NormalizeUseCase};
use cargo_port_enricher::app::ports::{CatalogSourcePort, RowSinkPort};
use cargo_port_enricher::config::Config;
use cargo_port_enricher::infra::catalog_adapter::JsonCatalogSource;
use cargo_port_enricher::infra::enrich_output_adapter::{read_rows, JsonFileRowSink};
use cargo_port_enricher::infra::http_client::ReqwestTracking;
use cargo_port_enricher::infra::report_reader::SpreadsheetReportSource;
use cargo_port_enricher::logging;
use cargo_port_enricher::pipeline::lookup::LookupClient;
use cargo_port_enricher::pipeline::processing::carriers::CarrierCatalog;
use cargo_port_enricher::pipeline::processing::eligibility::EligibilityFilter;
use cargo_port_enricher::pipeline::processing::enrich::{EnrichmentResolver, ResolveStats};
use cargo_port_enricher::pipeline::processing::normalize::ReportNormalizer;

#[derive(Parser)]
#[command(name = "cargo_port_enricher")]
#[command(about = "Normalize cargo shipment reports and attach tracked ports of loading")]
#[command(version = "0.1.0")]
struct Cli {
    /// TOML config file; environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory finished JSON files are written to
    #[arg(long, global = true, default_value = "output")]
    output: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert report files (csv, xlsx, xls, ods) into canonical JSON rows
    Normalize {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Attach tracking ports to already normalized JSON row files
    Enrich {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Normalize report files and enrich them in one pass
    Run {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

fn catalog_source(config: &Config) -> Result<Box<dyn CatalogSourcePort>> {
    if let Some(path) = &config.reference.catalog_path {
        return Ok(Box::new(JsonCatalogSource::new(path)));
    }

    #[cfg(feature = "postgres")]
    {
        use cargo_port_enricher::infra::pg_catalog_adapter::PgCatalogSource;
        if config.reference.has_database() {
            return Ok(Box::new(PgCatalogSource::from_config(&config.reference)?));
        }
    }

    bail!("no carrier catalog configured: set REFERENCE_CATALOG_PATH or the REFERENCE_DB_* variables")
}

fn enrich_use_case(config: &Config) -> Result<EnrichUseCase> {
    let tracking = ReqwestTracking::new(&config.tracking.endpoint(), config.tracking.timeout())?;
    info!("Tracking service at {}", tracking.endpoint());

    let client = LookupClient::new(Arc::new(tracking), config.tracking.retry_policy());
    let filter = EligibilityFilter::new(&config.eligibility.empty_container_marker);
    Ok(EnrichUseCase::new(
        catalog_source(config)?,
        EnrichmentResolver::new(filter, client),
    ))
}

fn print_stats(name: &str, stats: &ResolveStats, output: &Path) {
    println!("\n📊 Enrichment results for {}:", name);
    println!("   Rows: {}", stats.rows);
    println!("   Eligible: {}", stats.eligible);
    println!("   Skipped: {}", stats.skipped_total());
    for (reason, count) in &stats.skipped {
        println!("     - {}: {}", reason, count);
    }
    println!("   Lookups: {} ({} served from cache)", stats.lookups, stats.cache_hits);
    println!("   Resolved: {}", stats.resolved);
    println!("   Unresolved: {}", stats.unresolved);
    println!("   Output file: {}", output.display());
}

async fn normalize_files(inputs: &[PathBuf], sink: &JsonFileRowSink) -> Result<usize> {
    let use_case = NormalizeUseCase::new(Box::new(SpreadsheetReportSource), ReportNormalizer::new());
    let mut failures = 0;

    for input in inputs {
        let span = tracing::info_span!("Normalizing report", file = %input.display());
        let _enter = span.enter();

        let outcome = match use_case.normalize_file(input).await {
            Ok(rows) => sink.write_rows(&report_name(input), &rows).await.map_err(anyhow::Error::from),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(path) => println!("✅ {} -> {}", input.display(), path.display()),
            Err(e) => {
                failures += 1;
                error!("Normalization failed: {:#}", e);
                println!("❌ {}: {:#}", input.display(), e);
            }
        }
    }
    Ok(failures)
}

async fn enrich_files(
    inputs: &[PathBuf],
    use_case: &EnrichUseCase,
    catalog: &CarrierCatalog,
    sink: &JsonFileRowSink,
    from_reports: bool,
) -> Result<usize> {
    let normalizer = NormalizeUseCase::new(Box::new(SpreadsheetReportSource), ReportNormalizer::new());
    let mut failures = 0;

    for input in inputs {
        let span = tracing::info_span!("Enriching file", file = %input.display());
        let _enter = span.enter();

        let rows = if from_reports {
            normalizer.normalize_file(input).await
        } else {
            read_rows(input).with_context(|| format!("reading rows from {}", input.display()))
        };
        let mut rows = match rows {
            Ok(rows) => rows,
            Err(e) => {
                failures += 1;
                error!("Could not load rows: {:#}", e);
                println!("❌ {}: {:#}", input.display(), e);
                continue;
            }
        };

        let stats = use_case.enrich_batch(&mut rows, catalog).await;
        if stats.unresolved > 0 {
            warn!("{} eligible rows left without a port", stats.unresolved);
        }

        // Row files keep their name; reports get the extension appended like `normalize` does
        let name = if from_reports {
            report_name(input)
        } else {
            input
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| report_name(input))
        };
        match sink.write_rows(&name, &rows).await {
            Ok(path) => print_stats(&name, &stats, &path),
            Err(e) => {
                failures += 1;
                error!("Writing enriched rows failed: {}", e);
                println!("❌ {}: {}", input.display(), e);
            }
        }
    }
    Ok(failures)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let sink = JsonFileRowSink::new(&cli.output);

    let failures = match &cli.command {
        Commands::Normalize { inputs } => {
            println!("🔄 Normalizing {} report(s)...", inputs.len());
            normalize_files(inputs, &sink).await?
        }
        Commands::Enrich { inputs } | Commands::Run { inputs } => {
            let from_reports = matches!(cli.command, Commands::Run { .. });
            println!("🚀 Enriching {} file(s)...", inputs.len());

            let use_case = enrich_use_case(&config)?;
            // The catalog is loaded once per run; without it nothing can be decided
            let catalog = use_case.load_catalog().await?;
            enrich_files(inputs, &use_case, &catalog, &sink, from_reports).await?
        }
    };

    if failures > 0 {
        bail!("{} file(s) failed", failures);
    }
    Ok(())
}
