use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hydrochar::config;
use hydrochar::io::{read_task, CsvWriter};
use hydrochar::logic::{enforce_activation, sync_method_selection};
use hydrochar::schema::keys::ACTIVATION_METHOD;
use hydrochar::{Engine, Strategy, TaskEnvelope, VERSION};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SCHEMA_VERSION: &str = "1.0.0";

#[derive(Parser, Debug)]
#[command(name = "hydrochar")]
#[command(version)]
#[command(about = "Hydrochar adsorption prediction and inverse process optimization")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Path to the TOML model package
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write the JSON result to this file as well as stdout
    #[arg(short, long, global = true)]
    out: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a forward prediction or reverse optimization task
    Run {
        /// Task file (.toml or .json)
        #[arg(short, long)]
        task: PathBuf,
        /// Also write the resolved parameters as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Seed for the search (overrides the package)
        #[arg(long)]
        seed: Option<u64>,
        /// Search strategy: genetic, differential or random
        #[arg(long)]
        strategy: Option<Strategy>,
    },
    /// Print the model feature vector for the task's fixed parameters
    Features {
        #[arg(short, long)]
        task: PathBuf,
    },
    /// Print the task's fixed parameters after activation normalization
    Normalize {
        #[arg(short, long)]
        task: PathBuf,
    },
    /// Validate a model package
    Validate,
    /// Print version information
    Version,
}

// ============================================================================
// Output Structures
// ============================================================================

#[derive(Serialize)]
struct Manifest {
    schema_version: String,
    core_version: String,
    package_module: String,
    package_version: String,
    timestamp_unix: u64,
    config_hash: String,
    wall_time_ms: f64,
}

#[derive(Serialize)]
struct ResultBundle<'a> {
    manifest: Manifest,
    result: &'a TaskEnvelope,
}

#[derive(Serialize)]
struct FeatureDump {
    features: Vec<String>,
    values: Vec<f64>,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(level),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn compute_hash(data: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn load_package(cfg_path: &Path) -> Result<(config::Root, String)> {
    let cfg_text = fs::read_to_string(cfg_path)
        .with_context(|| format!("failed to read config: {}", cfg_path.display()))?;
    let cfg = config::Root::from_toml(&cfg_text)
        .with_context(|| format!("invalid config: {}", cfg_path.display()))?;
    Ok((cfg, cfg_text))
}

fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

fn run_task(
    cfg_path: &Path,
    task_path: &Path,
    out_path: Option<&Path>,
    csv_path: Option<&Path>,
    seed: Option<u64>,
    strategy: Option<Strategy>,
) -> Result<()> {
    let (cfg, cfg_text) = load_package(cfg_path)?;
    info!(module = %cfg.package.module, version = %cfg.package.version, "model package loaded");

    let mut engine = Engine::from_config(&cfg);
    if let Some(seed) = seed {
        engine.search_settings_mut().seed = Some(seed);
    }
    if let Some(strategy) = strategy {
        engine.search_settings_mut().strategy = strategy;
    }

    let task = read_task(task_path)?;

    let start = Instant::now();
    let envelope = engine.run_task(&task);
    let wall_time_ms = start.elapsed().as_secs_f64() * 1000.0;

    emit_json(&envelope)?;

    if let Some(out_path) = out_path {
        let bundle = ResultBundle {
            manifest: Manifest {
                schema_version: SCHEMA_VERSION.to_string(),
                core_version: VERSION.to_string(),
                package_module: cfg.package.module.clone(),
                package_version: cfg.package.version.clone(),
                timestamp_unix: SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or_default(),
                config_hash: compute_hash(&cfg_text),
                wall_time_ms,
            },
            result: &envelope,
        };
        fs::write(out_path, serde_json::to_string_pretty(&bundle)?)
            .with_context(|| format!("failed to write {}", out_path.display()))?;
        info!(path = %out_path.display(), "result bundle written");
    }

    match (&envelope.report, csv_path) {
        (Some(report), Some(csv_path)) => {
            let mut w = CsvWriter::create(csv_path)?;
            w.write_header()?;
            w.write_report(report)?;
            w.flush()?;
            info!(path = %csv_path.display(), "parameter table written");
        }
        (None, Some(_)) => warn!("task failed, no CSV written"),
        _ => {}
    }

    if !envelope.success {
        bail!("task failed");
    }
    Ok(())
}

fn print_features(cfg_path: &Path, task_path: &Path) -> Result<()> {
    let (cfg, _) = load_package(cfg_path)?;
    let engine = Engine::from_config(&cfg);
    let task = read_task(task_path)?;

    let params = enforce_activation(task.fixed_params()?);
    let dump = FeatureDump {
        features: engine.schema().model_features.clone(),
        values: engine.feature_vector(&params),
    };
    emit_json(&dump)
}

fn print_normalized(cfg_path: &Path, task_path: &Path) -> Result<()> {
    let (cfg, _) = load_package(cfg_path)?;
    let task = read_task(task_path)?;

    let options = cfg.schema.options(ACTIVATION_METHOD);
    let params = sync_method_selection(task.fixed_params()?, options);
    emit_json(&enforce_activation(params))
}

fn validate_config(cfg_path: &Path) -> Result<()> {
    let (cfg, _) = load_package(cfg_path)?;
    let settings = cfg.search_settings();

    eprintln!("[hydrochar] config valid: {}", cfg_path.display());
    eprintln!(
        "  package: {} v{} ({})",
        cfg.package.program, cfg.package.version, cfg.package.module
    );
    eprintln!(
        "  schema: {} model features, {} numeric inputs, {} categorical inputs",
        cfg.model.feature_names.len().max(cfg.schema.model_features.len()),
        cfg.schema.ui_numeric_cols.len(),
        cfg.schema.ui_cat_cols.len()
    );
    eprintln!("  stats: {} features, limit overrides: {}", cfg.stats.len(), cfg.limits.len());
    eprintln!(
        "  optimizer: strategy={}, pop_size={}, generations={}, mutation_rate={}, fallback_samples={}",
        settings.strategy,
        settings.pop_size,
        settings.generations,
        settings.mutation_rate,
        settings.fallback_samples
    );
    if let Some(scaler) = &cfg.scaler {
        eprintln!("  scaler: {} columns", scaler.columns.len());
    }
    Ok(())
}

fn print_version() {
    eprintln!("hydrochar - adsorption prediction and inverse optimization core");
    eprintln!();
    eprintln!("  Core Version:      {}", VERSION);
    eprintln!("  Schema Version:    {}", SCHEMA_VERSION);
    eprintln!("  Platform:          {}", std::env::consts::OS);
    eprintln!("  Architecture:      {}", std::env::consts::ARCH);
    eprintln!();
    eprintln!("Search strategies:");
    eprintln!("  - genetic:      real-coded GA, tournament selection, blend crossover");
    eprintln!("  - differential: best/1/bin differential evolution");
    eprintln!("  - random:       uniform random search (also the fallback)");
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Commands::Version => {
            print_version();
            Ok(())
        }
        Commands::Validate => {
            let cfg_path = args.config.context("--config required for validate")?;
            validate_config(&cfg_path)
        }
        Commands::Run { task, csv, seed, strategy } => {
            let cfg_path = args.config.context("--config required")?;
            run_task(&cfg_path, &task, args.out.as_deref(), csv.as_deref(), seed, strategy)
        }
        Commands::Features { task } => {
            let cfg_path = args.config.context("--config required")?;
            print_features(&cfg_path, &task)
        }
        Commands::Normalize { task } => {
            let cfg_path = args.config.context("--config required")?;
            print_normalized(&cfg_path, &task)
        }
    }
}
