//! Windowed QA extraction over dialogue transcripts.
//!
//! Reads `extractor.toml` (or `--config`), then either processes a whole input
//! directory, a single transcript, or just prints how a transcript would be
//! windowed.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use extractor::batch::{process_file, run_batch};
use extractor::core::window::build_windows;
use extractor::exit_codes;
use extractor::extract::WindowController;
use extractor::io::config::{DEFAULT_CONFIG_PATH, ExtractorConfig, load_config, write_config};
use extractor::io::transcript::load_transcript;
use extractor::logging;

#[derive(Parser)]
#[command(
    name = "extractor",
    version,
    about = "Incremental QA extraction from long dialogue transcripts"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file if missing.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Process every `*.json` transcript in the input directory.
    Run {
        #[arg(long)]
        input_dir: Option<PathBuf>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Process a single transcript file.
    Extract {
        file: PathBuf,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Print the window partition of a transcript without calling the oracle.
    Windows {
        file: PathBuf,
        /// Override the configured token budget.
        #[arg(long)]
        window_length: Option<usize>,
    },
}

fn main() -> ExitCode {
    logging::init();
    match run() {
        Ok(code) => exit_code(code),
        Err(err) => {
            eprintln!("{err:#}");
            exit_code(exit_codes::INVALID)
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Run {
            input_dir,
            output_dir,
        } => cmd_run(&cli.config, input_dir, output_dir),
        Command::Extract { file, output_dir } => cmd_extract(&cli.config, &file, output_dir),
        Command::Windows {
            file,
            window_length,
        } => cmd_windows(&cli.config, &file, window_length),
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    if !force && config_path.exists() {
        info!(path = %config_path.display(), "config already exists");
        return Ok(exit_codes::OK);
    }
    write_config(config_path, &ExtractorConfig::default())?;
    println!("{}", config_path.display());
    Ok(exit_codes::OK)
}

fn cmd_run(
    config_path: &Path,
    input_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) -> Result<i32> {
    let mut cfg = load_config(config_path)?;
    if let Some(dir) = input_dir {
        cfg.input_dir = dir;
    }
    if let Some(dir) = output_dir {
        cfg.output_dir = dir;
    }

    let oracle = cfg.build_oracle()?;
    let counter = cfg.tokenizer.counter();
    let prompts = cfg.prompt_engine()?;
    let extraction = cfg.extraction();
    let controller = WindowController::new(oracle.as_ref(), counter.as_ref(), &prompts, &extraction);

    let report = run_batch(&controller, &cfg.input_dir, &cfg.output_dir)?;
    println!(
        "processed {}/{} files, {} failed (summary: {})",
        report.summary.processed_files,
        report.summary.total_files,
        report.summary.failed_files,
        report.summary_path.display()
    );
    if report.is_partial() {
        return Ok(exit_codes::PARTIAL);
    }
    Ok(exit_codes::OK)
}

fn cmd_extract(config_path: &Path, file: &Path, output_dir: Option<PathBuf>) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let output_dir = output_dir.unwrap_or_else(|| cfg.output_dir.clone());

    let oracle = cfg.build_oracle()?;
    let counter = cfg.tokenizer.counter();
    let prompts = cfg.prompt_engine()?;
    let extraction = cfg.extraction();
    let controller = WindowController::new(oracle.as_ref(), counter.as_ref(), &prompts, &extraction);

    let processed = process_file(&controller, file, &output_dir)?;
    println!("{}", processed.output_path.display());
    Ok(exit_codes::OK)
}

fn cmd_windows(config_path: &Path, file: &Path, window_length: Option<usize>) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let budget = window_length.unwrap_or(cfg.window_length);
    if budget == 0 {
        bail!("window length must be > 0");
    }
    let turns = load_transcript(file)?;
    let counter = cfg.tokenizer.counter();

    for (index, window) in build_windows(&turns, budget, counter.as_ref())
        .iter()
        .enumerate()
    {
        println!("{index}\t{}\t{}", window.turns.len(), window.tokens);
    }
    Ok(exit_codes::OK)
}
