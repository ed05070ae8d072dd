//! @ai:module:intent CLI for the LocalAI Bench execution engine
//! @ai:module:layer presentation

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use localai_bench::{
    adapter::{AdapterRegistry, MockAdapter, MockBehavior},
    catalog::{Catalog, CatalogLoader, CatalogLoaderTrait},
    config::BenchmarkConfig,
    engine::{BenchmarkEngine, RunManager, RunRequest, RunResults, RunStatus},
    report::ReportGenerator,
    store::Repository,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Config file picked up when --config is not given
const DEFAULT_CONFIG_FILE: &str = "benchmark.toml";

#[derive(Parser)]
#[command(name = "localai-bench")]
#[command(about = "Benchmark language models against task catalogs and score the results")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a benchmark run
    Run {
        /// Model IDs to benchmark (comma-separated, default: all)
        #[arg(long)]
        models: Option<String>,

        /// Task IDs to run (comma-separated)
        #[arg(long, conflicts_with = "categories")]
        tasks: Option<String>,

        /// Category IDs to run (comma-separated, default: all)
        #[arg(long)]
        categories: Option<String>,

        /// Name of the run
        #[arg(long)]
        name: Option<String>,

        /// Use mock adapters instead of real backends
        #[arg(long)]
        dry_run: bool,

        /// Output directory for reports
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List catalog entries
    List {
        #[arg(value_enum, default_value = "tasks")]
        kind: ListKind,
    },

    /// Validate the catalog data directory
    Validate,

    /// Initialize default configuration
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ListKind {
    Models,
    Tasks,
    Categories,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("localai_bench=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            models,
            tasks,
            categories,
            name,
            dry_run,
            output,
        } => {
            run_benchmark(
                cli.config,
                RunArgs {
                    models,
                    tasks,
                    categories,
                    name,
                    dry_run,
                    output,
                },
            )
            .await
        }
        Commands::List { kind } => list(cli.config, kind),
        Commands::Validate => validate(cli.config),
        Commands::Init { output } => init_config(output),
    }
}

struct RunArgs {
    models: Option<String>,
    tasks: Option<String>,
    categories: Option<String>,
    name: Option<String>,
    dry_run: bool,
    output: Option<PathBuf>,
}

/// @ai:intent Create, execute and report a benchmark run
/// @ai:effects network, fs:read, fs:write
async fn run_benchmark(config_path: Option<PathBuf>, args: RunArgs) -> Result<()> {
    let mut config = load_or_default_config(config_path)?;
    config.run.dry_run |= args.dry_run;
    if let Some(output) = args.output {
        config.paths.results_dir = output;
    }

    let catalog = load_catalog(&config)?;
    let repository = Arc::new(catalog.into_repository());

    let registry = if config.run.dry_run {
        tracing::info!("Dry run: every backend is served by mock adapters");
        MockAdapter::registry(MockBehavior::default()).0
    } else {
        AdapterRegistry::with_defaults(&config.backends)?
    };

    let request = build_request(repository.as_ref(), args.models, args.tasks, args.categories, args.name);
    let engine = Arc::new(BenchmarkEngine::new(repository, registry, &config));
    let manager = RunManager::new(engine);

    let run = manager.create_run(request)?;
    tracing::info!("Starting run {} ({})", run.id, run.name);
    manager.start_run(&run.id).await?;

    tokio::select! {
        finished = manager.wait(&run.id) => {
            finished?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupt received, cancelling run {}", run.id);
            manager.cancel_run(&run.id).await?;
            manager.wait(&run.id).await?;
        }
    }

    let results = manager.get_results(&run.id)?;
    let report_dir = ReportGenerator::new().generate_all(&results, &config.paths.results_dir)?;

    print_summary(&results);
    println!("Reports written to {}", report_dir.display());

    if results.run.status == RunStatus::Failed {
        anyhow::bail!(
            "Benchmark run failed: {}",
            results.run.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn split_ids(value: Option<String>) -> Option<Vec<String>> {
    value.map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

/// @ai:intent Turn CLI selectors into a run request; omitted selectors mean "everything"
/// @ai:effects state:read, time
fn build_request(
    repository: &dyn Repository,
    models: Option<String>,
    tasks: Option<String>,
    categories: Option<String>,
    name: Option<String>,
) -> RunRequest {
    let model_ids = split_ids(models)
        .unwrap_or_else(|| repository.list_models().into_iter().map(|m| m.id).collect());

    let task_ids = split_ids(tasks);
    let category_ids = match (&task_ids, split_ids(categories)) {
        (Some(_), _) => None,
        (None, Some(ids)) => Some(ids),
        (None, None) => Some(
            repository
                .list_categories()
                .into_iter()
                .map(|c| c.id)
                .collect(),
        ),
    };

    RunRequest {
        name: name.unwrap_or_else(|| format!("run-{}", chrono::Utc::now().format("%Y-%m-%d_%H-%M-%S"))),
        description: String::new(),
        model_ids,
        category_ids,
        task_ids,
    }
}

/// @ai:intent List catalog entries of one kind
/// @ai:effects fs:read
fn list(config_path: Option<PathBuf>, kind: ListKind) -> Result<()> {
    let config = load_or_default_config(config_path)?;
    let catalog = load_catalog(&config)?;

    match kind {
        ListKind::Models => {
            println!("Available models ({}):", catalog.models.len());
            println!();
            println!("{:<24} {:<12} {:<30}", "ID", "Backend", "Model");
            println!("{}", "-".repeat(66));
            for model in &catalog.models {
                println!(
                    "{:<24} {:<12} {:<30}",
                    model.id,
                    model.backend.as_str(),
                    model.model_id
                );
            }
        }
        ListKind::Tasks => {
            println!("Available tasks ({}):", catalog.tasks.len());
            println!();
            println!("{:<30} {:<20} {:<20}", "ID", "Category", "Template");
            println!("{}", "-".repeat(70));
            for task in &catalog.tasks {
                println!(
                    "{:<30} {:<20} {:<20}",
                    task.id,
                    task.category_id.as_deref().unwrap_or("-"),
                    task.template_id
                );
            }
        }
        ListKind::Categories => {
            println!("Available categories ({}):", catalog.categories.len());
            println!();
            println!("{:<24} {:<30} {:<6}", "ID", "Name", "Tasks");
            println!("{}", "-".repeat(62));
            for category in &catalog.categories {
                println!(
                    "{:<24} {:<30} {:<6}",
                    category.id,
                    category.name,
                    category.task_ids.len()
                );
            }
        }
    }

    Ok(())
}

/// @ai:intent Validate every catalog file loads
/// @ai:effects fs:read
fn validate(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_or_default_config(config_path)?;
    let catalog = load_catalog(&config)?;

    if !catalog.rejected.is_empty() {
        println!("Catalog validation failed:");
        for (path, reason) in &catalog.rejected {
            println!("  - {}: {}", path.display(), reason);
        }
        anyhow::bail!("{} catalog files were rejected", catalog.rejected.len());
    }

    println!("Catalog validation passed!");
    println!("  Models:     {}", catalog.models.len());
    println!("  Tasks:      {}", catalog.tasks.len());
    println!("  Categories: {}", catalog.categories.len());
    println!("  Templates:  {}", catalog.templates.len());

    Ok(())
}

/// @ai:intent Initialize default configuration file
/// @ai:effects fs:write
fn init_config(output: PathBuf) -> Result<()> {
    let config = BenchmarkConfig::default();
    config.save(&output)?;
    println!("Configuration saved to {}", output.display());
    Ok(())
}

/// @ai:intent Load configuration or use defaults, then apply environment overrides
/// @ai:effects fs:read, env
fn load_or_default_config(path: Option<PathBuf>) -> Result<BenchmarkConfig> {
    let mut config = match path {
        Some(p) => BenchmarkConfig::load(&p)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                BenchmarkConfig::load(default_path)?
            } else {
                BenchmarkConfig::default()
            }
        }
    };

    config.apply_env_overrides()?;
    Ok(config)
}

fn load_catalog(config: &BenchmarkConfig) -> Result<Catalog> {
    CatalogLoader::new()
        .load_all(&config.paths.data_dir)
        .with_context(|| format!("Failed to load catalog from {}", config.paths.data_dir.display()))
}

/// @ai:intent Print run outcome and aggregate scores
/// @ai:effects io
fn print_summary(results: &RunResults) {
    let run = &results.run;
    let total = results.all_results().count();
    let failed = results.all_results().filter(|r| !r.is_success()).count();

    println!();
    println!("Benchmark Run: {}", run.name);
    println!("{}", "=".repeat(15 + run.name.len()));
    println!();
    println!("Status:  {}", run.status);
    println!("Results: {} ({} failed)", total, failed);
    if let Some(error) = &run.error {
        println!("Error:   {}", error);
    }
    println!();

    if results.aggregate_scores.is_empty() {
        return;
    }

    println!("{:<30} {:<24} {:>10}", "Model", "Category", "Score");
    println!("{}", "-".repeat(66));
    for (model_id, categories) in &results.aggregate_scores {
        for (category, score) in categories {
            println!(
                "{:<30} {:<24} {:>10.2}",
                results.model_name(model_id),
                category,
                score
            );
        }
    }
    println!();
}
