//! reach-instr CLI
//!
//! # Usage
//!
//! ```bash
//! # List the constructs declared by compiled types
//! reach-instr constructs target/classes/a/b/Foo.class --json
//!
//! # Instrument types into an output directory
//! reach-instr instrument Foo.class Bar.class --out instrumented \
//!     --config reach-instr.yaml --digest lib.jar --app com.acme:shop:1.2.0
//! ```
//!
//! Exits non-zero when any input type failed.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use reach_instr::features::instrumentation::infrastructure::debug_dump::class_artifact_path;
use reach_instr::{
    archive_digest, build_registry, instrument_batch, AppCoordinates, BatchInput, BatchItem,
    BatchOptions, InjectionContext, InstrumentConfig,
};

#[derive(Parser)]
#[command(name = "reach-instr")]
#[command(about = "Construct identification and bytecode instrumentation for compiled JVM types", long_about = None)]
struct Cli {
    /// YAML configuration (schema v1); environment overrides apply on top
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List constructs without modifying anything
    Constructs {
        /// Compiled type files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print JSON instead of one construct per line
        #[arg(long)]
        json: bool,
    },

    /// Instrument types and write the results
    Instrument {
        /// Compiled type files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output root; files land under their package path
        #[arg(short, long)]
        out: PathBuf,

        /// Archive whose SHA-1 is passed to the runtime callback
        #[arg(long)]
        digest: Option<PathBuf>,

        /// Application coordinates as group:artifact:version
        #[arg(long)]
        app: Option<AppCoordinates>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether every input was processed
fn run(cli: Cli) -> Result<bool> {
    let config = load_config(cli.config.as_ref())?;
    let registry = Arc::new(build_registry(&config));
    let options = BatchOptions::new(Arc::new(config), registry);

    match cli.command {
        Commands::Constructs { files, json } => {
            let items = instrument_batch(read_inputs(&files)?, &options.instrument(false));
            print_constructs(&items, json)?;
            Ok(report_failures(&items))
        }
        Commands::Instrument {
            files,
            out,
            digest,
            app,
        } => {
            let mut context = InjectionContext::new();
            if let Some(archive) = digest {
                let bytes = fs::read(&archive)
                    .with_context(|| format!("reading {}", archive.display()))?;
                context = context.with_archive_digest(archive_digest(&bytes));
            }
            if let Some(app) = app {
                context = context.with_app(app);
            }

            let items = instrument_batch(read_inputs(&files)?, &options.context(context));
            for item in &items {
                if let BatchItem::Ok {
                    qualified_name,
                    bytes,
                    ..
                } = item
                {
                    let path = class_artifact_path(&out, qualified_name);
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent)
                            .with_context(|| format!("creating {}", parent.display()))?;
                    }
                    fs::write(&path, bytes)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("{}", path.display());
                }
            }
            Ok(report_failures(&items))
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<InstrumentConfig> {
    let config = match path {
        Some(path) => InstrumentConfig::from_yaml(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => InstrumentConfig::default(),
    };
    let config = config.with_env_overrides()?;
    config.validate()?;
    Ok(config)
}

fn read_inputs(files: &[PathBuf]) -> Result<Vec<BatchInput>> {
    files
        .iter()
        .map(|file| {
            let bytes = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
            Ok(BatchInput::new(file.display().to_string(), bytes))
        })
        .collect()
}

fn print_constructs(items: &[BatchItem], json: bool) -> Result<()> {
    if json {
        let listing: serde_json::Map<String, serde_json::Value> = items
            .iter()
            .filter_map(|item| match item {
                BatchItem::Ok {
                    qualified_name,
                    constructs,
                    ..
                } => Some(
                    serde_json::to_value(constructs)
                        .map(|value| (qualified_name.clone(), value)),
                ),
                BatchItem::Failed { .. } => None,
            })
            .collect::<std::result::Result<_, _>>()?;
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    for item in items {
        if let BatchItem::Ok { constructs, .. } = item {
            for construct in constructs {
                println!("{construct}");
            }
        }
    }
    Ok(())
}

fn report_failures(items: &[BatchItem]) -> bool {
    let mut all_ok = true;
    for item in items {
        if let BatchItem::Failed { name, error, .. } = item {
            eprintln!("{name}: {error}");
            all_ok = false;
        }
    }
    all_ok
}
