//! # sat-prep CLI
//!
//! Command-line interface for the sat-prep library.
//! Prepares SAT-solver datasets in a target directory, skipping files that are already there.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use log::{error, LevelFilter};
use sat_prep::{
    BatchPolicy, Catalog, CatalogConfig, Error, FetchConfig, PreparationResult, Preparer,
    ResolvedDataset, Result, DEFAULT_BASE_URL,
};

mod cli;

/// Command-line interface for sat-prep
#[derive(Parser)]
#[command(name = "sat-prep")]
#[command(about = "Idempotent downloader for SAT-solver training and evaluation datasets")]
#[command(long_about = "Downloads SAT-solver datasets into a directory, skipping files already present:
  sat-prep sat-6-10-skewed-large            # train.txt in the current directory
  sat-prep sat-var-eval -d data/num_var     # 68 evaluation files
  sat-prep https://host/file.txt --label X  # any http(s) URL, saved as train.txt
  sat-prep --list                           # show catalog

Batch Failure Behavior:
  By default a batch stops at the first failed file
  --keep-going                              # skip failed files, report them at the end")]
#[command(version = env!("SAT_PREP_VERSION"))]
struct Cli {
    /// Dataset id from the catalog, or an http(s) URL
    #[arg(required_unless_present = "list")]
    dataset: Option<String>,

    /// Target directory (defaults to the current directory)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Display name when DATASET is a URL
    #[arg(long)]
    label: Option<String>,

    /// Base URL catalog paths are resolved against
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Continue a batch after a failed file instead of stopping
    #[arg(long)]
    keep_going: bool,

    /// Overall per-request timeout in seconds (none by default)
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Connection timeout in seconds (none by default)
    #[arg(long, value_name = "SECS")]
    connect_timeout: Option<u64>,

    /// Print results as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Show what would be prepared without downloading
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// List catalog datasets and exit
    #[arg(long)]
    list: bool,
}

/// What the DATASET argument refers to
#[derive(Debug)]
enum Target {
    Catalog(ResolvedDataset),
    Url { label: String, url: String },
}

/// Resolve the DATASET argument against the catalog
fn resolve_target(dataset: &str, label: Option<&str>, catalog: &Catalog) -> Result<Target> {
    if dataset.starts_with("http://") || dataset.starts_with("https://") {
        sat_prep::parse_http_url(dataset)?;
        return Ok(Target::Url {
            label: label.unwrap_or(dataset).to_string(),
            url: dataset.to_string(),
        });
    }

    catalog.resolve(dataset).map(Target::Catalog)
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("❌ Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(LevelFilter::Warn)
        .target(env_logger::Target::Stderr);
    if verbose {
        builder.filter_module("sat_prep", LevelFilter::Debug);
    }
    builder.parse_env("RUST_LOG");
    builder.init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if cli.verbose {
        eprintln!("🧩 sat-prep v{} starting...", env!("SAT_PREP_VERSION"));
    }

    let catalog = Catalog::with_config(CatalogConfig {
        base_url: cli.base_url.clone(),
    });

    if cli.list {
        return print_catalog(&catalog, cli.json);
    }

    let dataset = cli
        .dataset
        .as_deref()
        .ok_or_else(|| Error::InvalidInput("missing dataset argument".to_string()))?;
    let target = resolve_target(dataset, cli.label.as_deref(), &catalog)?;

    let target_dir = match &cli.dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().map_err(|e| Error::filesystem(".", e))?,
    };

    if cli.dry_run {
        show_dry_run(&target, &target_dir, cli.verbose);
        return Ok(());
    }

    let config = FetchConfig {
        timeout: cli.timeout.map(Duration::from_secs),
        connect_timeout: cli.connect_timeout.map(Duration::from_secs),
        ..Default::default()
    };
    let preparer = Preparer::with_config(config)?.with_progress(cli::progress_factory());

    let policy = if cli.keep_going {
        BatchPolicy::KeepGoing
    } else {
        BatchPolicy::FailFast
    };

    let results = match &target {
        Target::Url { label, url } => vec![preparer.prepare(label, url, &target_dir).await?],
        Target::Catalog(dataset) => {
            let (results, summary) = preparer
                .prepare_dataset(dataset, &target_dir, policy)
                .await?;
            if summary.failed > 0 {
                print_results(&results, cli.json)?;
                return Err(Error::BatchIncomplete {
                    failed: summary.failed,
                    total: summary.total(),
                });
            }
            results
        }
    };

    print_results(&results, cli.json)
}

fn print_results(results: &[PreparationResult], json: bool) -> Result<()> {
    if json {
        let encoded = serde_json::to_string_pretty(results)
            .map_err(|e| Error::InvalidInput(format!("Failed to encode results: {e}")))?;
        println!("{encoded}");
    }
    Ok(())
}

fn print_catalog(catalog: &Catalog, json: bool) -> Result<()> {
    if json {
        let encoded = serde_json::to_string_pretty(catalog.datasets())
            .map_err(|e| Error::InvalidInput(format!("Failed to encode catalog: {e}")))?;
        println!("{encoded}");
        return Ok(());
    }

    for spec in catalog.datasets() {
        println!("{:<24} {:>3} file(s)  {}", spec.id, spec.file_count(), spec.label);
    }
    Ok(())
}

fn show_dry_run(target: &Target, target_dir: &Path, verbose: bool) {
    match target {
        Target::Url { label, url } => {
            eprintln!(
                "🔍 [DRY RUN] Would prepare: {label} from {url} into {}",
                target_dir.join(sat_prep::TRAIN_FILE_NAME).display()
            );
        }
        Target::Catalog(dataset) => {
            let urls = dataset.urls();
            eprintln!(
                "🔍 [DRY RUN] Would prepare: {} ({}, {} file(s)) into {}",
                dataset.label,
                dataset.id,
                urls.len(),
                target_dir.display()
            );
            if verbose {
                for url in urls {
                    eprintln!("  {url}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_target_catalog() {
        let target = resolve_target("sat-var-eval", None, &Catalog::new()).unwrap();
        match target {
            Target::Catalog(dataset) => assert_eq!(dataset.urls().len(), 68),
            other => panic!("Expected catalog target, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_target_url_with_label() {
        let target =
            resolve_target("https://host/a.txt?download=true", Some("X"), &Catalog::new()).unwrap();
        match target {
            Target::Url { label, url } => {
                assert_eq!(label, "X");
                assert_eq!(url, "https://host/a.txt?download=true");
            }
            other => panic!("Expected URL target, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_target_unknown_dataset() {
        let err = resolve_target("sat-var-evl", None, &Catalog::new()).unwrap_err();
        assert!(err.to_string().contains("Did you mean 'sat-var-eval'?"));
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::parse_from([
            "sat-prep",
            "sat-var-eval",
            "-d",
            "/tmp/e",
            "--keep-going",
            "--timeout",
            "30",
        ]);
        assert_eq!(cli.dataset.as_deref(), Some("sat-var-eval"));
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/e")));
        assert!(cli.keep_going);
        assert_eq!(cli.timeout, Some(30));
        assert_eq!(cli.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_cli_list_needs_no_dataset() {
        let cli = Cli::try_parse_from(["sat-prep", "--list"]).unwrap();
        assert!(cli.list);
        assert!(Cli::try_parse_from(["sat-prep"]).is_err());
    }
}
