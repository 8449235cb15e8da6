//! `pixelmark-convert` CLI - convert portfolio images to lossless WebP.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use pixelmark::convert::{
    format_byte_delta, format_bytes, ConvertConfig, Converter, FileOutcome, Summary,
    DEFAULT_INPUT_DIR,
};
use pixelmark::Error;

const RULE_WIDTH: usize = 60;

/// Convert JPEG and PNG images to lossless WebP, keeping the originals.
#[derive(Parser, Debug)]
#[command(name = "pixelmark-convert")]
#[command(version, about, long_about = None)]
struct Args {
    /// Overwrite existing WebP files.
    #[arg(long)]
    overwrite: bool,

    /// Input directory.
    #[arg(long, default_value = DEFAULT_INPUT_DIR, value_name = "DIR")]
    input_dir: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
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
        Ok(summary) if summary.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            match err.downcast_ref::<Error>() {
                Some(Error::MissingInputDir { path }) => {
                    println!("Error: Input directory '{}' does not exist", path.display());
                }
                _ => tracing::error!("{err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<Summary> {
    let config = ConvertConfig {
        input_dir: args.input_dir.clone(),
        overwrite: args.overwrite,
        ..ConvertConfig::default()
    };
    let converter = Converter::new(config).context("Failed to initialize converter")?;

    let files = converter.scan()?;
    let input_dir = &converter.config().input_dir;
    let extensions = converter.config().source_extensions.join(", ");

    if files.is_empty() {
        println!(
            "No supported image files found in '{}'",
            input_dir.display()
        );
        println!("Supported formats: {extensions}");
        return Ok(Summary::default());
    }

    println!("Found {} image(s) to convert", files.len());
    println!("Compression mode: Lossless (no quality loss)");
    println!("Input directory: {}", input_dir.display());
    println!("{}", "-".repeat(RULE_WIDTH));

    let summary = converter.run(&files, print_outcome);

    print_summary(&summary);
    Ok(summary)
}

fn print_outcome(src: &Path, dst: &Path, outcome: &FileOutcome) {
    let name = |p: &Path| {
        p.file_name()
            .map_or_else(|| p.display().to_string(), |n| n.to_string_lossy().into_owned())
    };

    match outcome {
        FileOutcome::Skipped => {
            println!("SKIP: {} -> WebP already exists", name(src));
        }
        FileOutcome::Converted(record) => {
            println!("Converting: {} -> {}", name(src), name(dst));
            println!(
                "  ✓ {} -> {} ({:.1}% smaller)",
                format_bytes(record.original_size),
                format_bytes(record.converted_size),
                record.saved_percent()
            );
        }
        FileOutcome::Failed(message) => {
            println!("Converting: {} -> {}", name(src), name(dst));
            println!("  ✗ Error: {message}");
        }
    }
}

fn print_summary(summary: &Summary) {
    println!("{}", "-".repeat(RULE_WIDTH));
    println!("CONVERSION SUMMARY:");
    println!("  Converted: {}", summary.converted);
    println!("  Skipped: {}", summary.skipped);
    println!("  Errors: {}", summary.errors);

    if let Some(percent) = summary.saved_percent() {
        println!(
            "  Original total size: {}",
            format_bytes(summary.total_original)
        );
        println!("  WebP total size: {}", format_bytes(summary.total_converted));
        println!(
            "  Total space saved: {} ({percent:.1}%)",
            format_byte_delta(summary.saved_bytes())
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["pixelmark-convert"]).unwrap();
        assert!(!args.overwrite);
        assert_eq!(args.input_dir, PathBuf::from("assets/pics"));
    }

    #[test]
    fn test_flags() {
        let args =
            Args::try_parse_from(["pixelmark-convert", "--overwrite", "--input-dir", "shots"])
                .unwrap();
        assert!(args.overwrite);
        assert_eq!(args.input_dir, PathBuf::from("shots"));
    }

    #[test]
    fn test_missing_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args {
            overwrite: false,
            input_dir: dir.path().join("absent"),
            verbose: false,
        };

        let err = run(&args).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingInputDir { .. })
        ));
    }

    #[test]
    fn test_empty_dir_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args {
            overwrite: false,
            input_dir: dir.path().to_path_buf(),
            verbose: false,
        };

        assert!(run(&args).unwrap().is_success());
    }
}
