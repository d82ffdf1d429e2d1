use clap::{Parser, Subcommand};
use stackread::config::{self, HarnessConfig};
use stackread::imaging::{Shape, StackBackend, TiffBackend};
use stackread::logging::{self, LogFormat};
use stackread::verify::Check;
use stackread::{bench, fixtures, output, scan, verify};
use std::path::PathBuf;
use tracing::error;

/// `CARGO_PKG_VERSION` on a release tag, `dev@<hash>` otherwise.
fn version_string() -> &'static str {
    match (env!("ON_RELEASE_TAG"), env!("GIT_HASH")) {
        ("true", _) => env!("CARGO_PKG_VERSION"),
        (_, "") => "dev@unknown",
        (_, hash) => Box::leak(format!("dev@{hash}").into_boxed_str()),
    }
}

#[derive(Parser)]
#[command(name = "stackread")]
#[command(about = "Write, resolve and benchmark multi-page TIFF stacks")]
#[command(long_about = "\
Write, resolve and benchmark multi-page TIFF stacks

A target stack is written into two directories: one where it is the only
file, and one where it sits next to unrelated decoy stacks. Opening the
target must give exactly one series in both places, and the legacy loader
must agree with the written dimensions.

Fixture layout:

  fixtures/
  ├── lonely/
  │   └── test.tif          # 1024x1024x2
  └── cluttered/
      ├── test.tif          # same target
      ├── dummy0.tiff       # 256x256 decoys
      ├── ...
      └── dummy49.tiff

Checks:
  cluttered-series   open_series(cluttered/test.tif) → 1 series
  lonely-series      open_series(lonely/test.tif)    → 1 series
  legacy-dimensions  open_image(lonely/test.tif)     → 1024x1024, stack of 2

Run 'stackread gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Directory holding config.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    /// Override the fixture root from config.toml
    #[arg(long, global = true)]
    fixtures: Option<PathBuf>,

    /// Log output format (filter with RUST_LOG)
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a zero-filled stack
    Write {
        path: PathBuf,
        /// Axis sizes, width first: 1024x1024x2
        #[arg(long, default_value = "1024x1024x2")]
        shape: Shape,
    },
    /// Print the series a file resolves to
    Open { path: PathBuf },
    /// Print what the legacy loader sees
    Legacy { path: PathBuf },
    /// Catalog every stack in a directory
    Scan {
        dir: PathBuf,
        /// Descend into subdirectories
        #[arg(long)]
        recursive: bool,
        /// Resolve only this file, ignoring everything else in the directory
        #[arg(long, conflicts_with = "recursive")]
        only: Option<String>,
    },
    /// Rebuild the lonely/cluttered fixture directories
    Fixtures,
    /// Rebuild fixtures and run every check once
    Verify,
    /// Run warmup and measured rounds for each check
    Bench {
        /// Also write the report as JSON to this file
        #[arg(long)]
        json: Option<PathBuf>,
        /// Run only these checks (repeatable)
        #[arg(long = "check", value_enum)]
        checks: Vec<Check>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging_with_format(cli.log_format);

    let backend = TiffBackend::new();

    match cli.command {
        Command::Write { path, shape } => {
            backend.write_stack(&path, &shape)?;
            output::print_series(&path, &backend.open_series(&path)?);
        }
        Command::Open { path } => {
            output::print_series(&path, &backend.open_series(&path)?);
        }
        Command::Legacy { path } => {
            output::print_legacy(&path, &backend.open_image(&path)?);
        }
        Command::Scan {
            dir,
            recursive,
            only,
        } => match only {
            Some(name) => {
                let series = scan::resolve_in(&backend, &dir, &name)?;
                output::print_series(&dir.join(&name), &series);
            }
            None => {
                let config = load(&cli.config_dir, None)?;
                init_thread_pool(&config.processing);
                let catalog =
                    scan::scan_directory(&backend, &dir, scan::ScanOptions { recursive })?;
                output::print_catalog(&catalog);
            }
        },
        Command::Fixtures => {
            let config = load(&cli.config_dir, cli.fixtures)?;
            let layout = fixtures::build_layout(&backend, &config.fixtures)?;
            output::print_layout(&layout, &config.fixtures);
        }
        Command::Verify => {
            let config = load(&cli.config_dir, cli.fixtures)?;
            let results = verify::run_each_fresh(&backend, &config.fixtures)?;
            output::print_verify(&results);
            if results.iter().any(|(_, r)| r.is_err()) {
                error!("verification failed");
                std::process::exit(1);
            }
        }
        Command::Bench { json, checks } => {
            let config = load(&cli.config_dir, cli.fixtures)?;
            let checks = if checks.is_empty() {
                Check::ALL.to_vec()
            } else {
                checks
            };
            let report = bench::run(&backend, &config.fixtures, &config.rounds, &checks)?;
            output::print_bench_report(&report);
            if let Some(json_path) = json {
                std::fs::write(&json_path, serde_json::to_string_pretty(&report)?)?;
            }
            if !report.all_passed() {
                error!("one or more rounds failed");
                std::process::exit(1);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load `config.toml` from `dir`, applying the `--fixtures` override.
fn load(
    dir: &std::path::Path,
    fixtures_root: Option<PathBuf>,
) -> Result<HarnessConfig, config::ConfigError> {
    let mut config = config::load_config(dir)?;
    if let Some(root) = fixtures_root {
        config.fixtures.root = root;
    }
    Ok(config)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
