use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use trackmeta::catalog::{Catalog, MetadataCache};
use trackmeta::config::AppConfig;
use trackmeta::extract::SidecarExtractor;
use trackmeta::mood::{MoodConfig, MoodStrategy};
use trackmeta::pipeline::{CatalogSource, PipelineReport};

#[derive(Parser)]
#[command(name = "trackmeta", version, about = "Game-music metadata catalog builder")]
struct Cli {
    /// Path to the JSON catalog
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Rules,
    Clusters,
}

impl From<StrategyArg> for MoodStrategy {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::Rules => MoodStrategy::Rules,
            StrategyArg::Clusters => MoodStrategy::Clusters,
        }
    }
}

#[derive(clap::Args, Clone, Default)]
struct BuildArgs {
    /// Directory of per-track feature files (defaults to config features_dir)
    #[arg(long)]
    features_dir: Option<PathBuf>,

    /// Mood classification strategy
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Number of mood clusters (4-6, clusters strategy only)
    #[arg(long)]
    clusters: Option<usize>,

    /// Clustering seed
    #[arg(long)]
    seed: Option<u64>,

    /// Number of parallel workers (0 = auto-detect from config)
    #[arg(short = 'j', long, default_value = "0")]
    jobs: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the catalog, or extract and enrich it if none exists yet
    Build(BuildArgs),

    /// List every track with its mood, function, key and tempo
    List,

    /// Show every field of one track
    Show {
        /// Track id (file name)
        track_id: String,
    },

    /// Describe the catalog fields
    Fields,

    /// Estimate the key of a 12-value chroma profile (C through B)
    Key {
        #[arg(num_args = 12, required = true, allow_negative_numbers = true)]
        profile: Vec<f64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load();

    // Resolve catalog path: CLI > config > XDG default
    let catalog_path = cli
        .catalog
        .or(config.catalog_path.clone())
        .unwrap_or_else(trackmeta::config::default_catalog_path);
    log::info!("Catalog: {}", catalog_path.display());

    match cli.command {
        Commands::Build(args) => {
            let (_, report) = open_catalog(&config, catalog_path, &args)?;
            print_report(&report);
        }

        Commands::List => {
            let (catalog, _) = open_catalog(&config, catalog_path, &BuildArgs::default())?;
            print_track_table(&catalog);
        }

        Commands::Show { track_id } => {
            let (catalog, _) = open_catalog(&config, catalog_path, &BuildArgs::default())?;
            let Some(record) = catalog.get(&track_id) else {
                println!("No track \"{}\" in the catalog.", track_id);
                return Ok(());
            };
            let fields = serde_json::to_value(record.metadata())
                .context("Failed to render track")?;
            println!("{}", track_id);
            println!("{}", "=".repeat(track_id.len()));
            if let Some(object) = fields.as_object() {
                for (name, value) in object {
                    println!("{:<25} {}", name, value);
                }
            }
            println!();
            println!("{}", record.description());
        }

        Commands::Fields => {
            for (name, description) in trackmeta::catalog::field_descriptions() {
                println!("{:<25} {}", name, description);
            }
        }

        Commands::Key { profile } => {
            let key = trackmeta::key::estimate_key(&profile).context("Key estimation failed")?;
            println!("{}", key);
        }
    }

    Ok(())
}

/// Load-or-compute the catalog with settings resolved CLI > config > default.
fn open_catalog(
    config: &AppConfig,
    catalog_path: PathBuf,
    args: &BuildArgs,
) -> Result<(Catalog, PipelineReport)> {
    let workers = if args.jobs > 0 { args.jobs } else { config.resolve_workers() };

    let mood = MoodConfig {
        strategy: args.strategy.map(Into::into).unwrap_or(config.mood.strategy),
        clusters: args.clusters.unwrap_or(config.mood.clusters),
        seed: args.seed.unwrap_or(config.mood.seed),
        max_iterations: config.mood.max_iterations,
    };
    let classifier = mood.build().context("Invalid mood configuration")?;

    let cache = MetadataCache::new(catalog_path, workers);
    let features_dir = args.features_dir.clone().or(config.features_dir.clone());
    let features_dir = match features_dir {
        Some(dir) => dir,
        None if cache.path().exists() => PathBuf::new(),
        None => anyhow::bail!(
            "No catalog at {} and no features directory given (use --features-dir or set features_dir in config)",
            cache.path().display()
        ),
    };

    let extractor = SidecarExtractor::new(features_dir, workers);
    cache
        .load_or_compute(&extractor, || extractor.discover(), classifier.as_ref())
        .context("Failed to build catalog")
}

fn print_report(report: &PipelineReport) {
    let source = match report.source {
        CatalogSource::Loaded => "loaded from disk",
        CatalogSource::Computed => "computed",
    };
    println!(
        "Catalog {}: {} processed, {} validated, {} rejected",
        source,
        report.processed,
        report.validated,
        report.rejected.len()
    );
    for r in &report.rejected {
        println!("  rejected {}: {}", r.track_id, r.reason);
    }
    if report.source == CatalogSource::Computed && !report.persisted {
        println!("(catalog file already existed, not overwritten)");
    }
}

/// Print a table of catalog tracks.
fn print_track_table(catalog: &Catalog) {
    if catalog.is_empty() {
        println!("Catalog is empty.");
        return;
    }

    println!(
        "{:<35} {:<11} {:<22} {:<10} {:>5}",
        "Track", "Mood", "Function", "Key", "BPM"
    );
    println!("{}", "-".repeat(87));

    for r in catalog.iter() {
        let m = r.metadata();
        let id = r.track_id();
        let id_display: String = if id.chars().count() > 35 {
            format!("{}...", id.chars().take(32).collect::<String>())
        } else {
            id.to_string()
        };
        let function = if m.function.is_empty() {
            "-".to_string()
        } else {
            m.function.to_string()
        };

        println!(
            "{:<35} {:<11} {:<22} {:<10} {:>5}",
            id_display,
            m.mood.as_str(),
            function,
            m.key,
            m.tempo
        );
    }

    println!();
    println!("{} tracks", catalog.len());
}
