//! # pixelmark
//!
//! Tools for a photography portfolio: an invisible copyright watermark
//! hidden in the chroma of each image, and batch conversion of JPEG/PNG
//! sources to lossless WebP.
//!
//! The watermark survives lossless re-encoding. It is embedded by
//! quantizing one value per 4x4 block of DCT coefficients taken from the
//! LL band of a Haar wavelet transform of the U and V planes.
//!
//! ## Example
//!
//! ```no_run
//! use pixelmark::{ApplyOutcome, WatermarkConfig, Watermarker};
//!
//! # fn main() -> pixelmark::Result<()> {
//! let marker = Watermarker::new(WatermarkConfig::default())?;
//!
//! if let ApplyOutcome::Watermarked { output } = marker.apply("assets/pics/dune.webp")? {
//!     println!("wrote {}", output.display());
//! }
//! assert!(marker.verify("assets/pics/dune.webp").is_ok());
//! # Ok(())
//! # }
//! ```

pub mod convert;
pub mod error;
pub mod image;
pub mod watermark;

pub use convert::{ConvertConfig, Converter, FileOutcome, Summary};
pub use error::{Error, Result};
pub use watermark::{Algorithm, ApplyOutcome, VerifyOutcome, WatermarkConfig, Watermarker};

/// Install the stderr log subscriber shared by the binaries.
///
/// `RUST_LOG` takes precedence; otherwise the crate logs warnings only,
/// or everything down to `debug` when `verbose` is set. Report lines go
/// to stdout, so the default keeps them uncluttered.
pub fn init_logging(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("pixelmark={log_level}").into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
