//! `pixelmark` CLI - apply or verify the portfolio's invisible watermark.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use pixelmark::{ApplyOutcome, VerifyOutcome, WatermarkConfig, Watermarker};

/// Apply or verify the invisible copyright watermark on portfolio images.
#[derive(Parser, Debug)]
#[command(name = "pixelmark")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply the watermark to image files. Stops at the first failure.
    Apply {
        /// Images to watermark. JPEGs are replaced by PNGs.
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },

    /// Verify that image files carry the watermark.
    Verify {
        /// Images to check.
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // Usage problems exit 1; --help and --version are not errors
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    pixelmark::init_logging(args.verbose);

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Run the selected command; `Ok(false)` means some file failed.
fn run(args: &Args) -> Result<bool> {
    let marker =
        Watermarker::new(WatermarkConfig::default()).context("Failed to initialize watermarker")?;

    Ok(match &args.command {
        Command::Apply { files } => apply_all(&marker, files),
        Command::Verify { files } => verify_all(&marker, files),
    })
}

fn apply_all(marker: &Watermarker, files: &[PathBuf]) -> bool {
    for path in files {
        match marker.apply(path) {
            Ok(ApplyOutcome::Skipped) => {
                println!("⏭ Skipped (in skip list): {}", path.display());
            }
            Ok(ApplyOutcome::AlreadyWatermarked) => {
                println!("✓ Already watermarked: {}", path.display());
            }
            Ok(ApplyOutcome::Watermarked { output }) if output != *path => {
                println!("✓ Watermarked: {} -> {}", path.display(), output.display());
            }
            Ok(ApplyOutcome::Watermarked { .. }) => {
                println!("✓ Watermarked: {}", path.display());
            }
            Err(err) => {
                println!("✗ Failed to watermark {}: {err}", path.display());
                return false;
            }
        }
    }

    true
}

fn verify_all(marker: &Watermarker, files: &[PathBuf]) -> bool {
    let mut all_good = true;

    for path in files {
        match marker.verify(path) {
            VerifyOutcome::Exempt => {
                println!("⏭ Skipped (in skip list): {}", path.display());
            }
            VerifyOutcome::Verified => {
                println!("✓ Watermark verified: {}", path.display());
            }
            VerifyOutcome::Missing { reason } => {
                println!("✗ Missing watermark: {}", path.display());
                if let Some(reason) = reason {
                    println!("  Error: {reason}");
                }
                all_good = false;
            }
        }
    }

    all_good
}
