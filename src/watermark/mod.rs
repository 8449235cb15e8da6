//! Invisible watermark application and verification.

mod embed;
mod transform;

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use image::DynamicImage;

use crate::error::{Error, Result};
use crate::image::{is_lossy, load_image, save_lossless};

pub use embed::{bits_to_bytes, bytes_to_bits, capacity};

/// Copyright notice embedded into every image ("© Alex Clairr 2025").
pub const DEFAULT_PAYLOAD: &[u8] = b"\xc2\xa9 Alex Clairr 2025";

/// Images exempt from watermarking and verification.
pub const DEFAULT_SKIP_LIST: &[&str] = &["assets/pics/lelem.webp"];

/// Per-channel quantization step over Y, U and V. Luma is left alone.
pub const DEFAULT_SCALES: [f32; 3] = [0.0, 36.0, 36.0];

/// Extension written when a lossy source is replaced.
const LOSSLESS_REPLACEMENT: &str = "png";

/// Block embedding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    /// Quantize the largest AC coefficient of each DCT block.
    DwtDct,
    /// Quantize the largest singular value of each DCT block.
    #[default]
    DwtDctSvd,
}

impl Algorithm {
    /// Identifier used on the command line and in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DwtDct => "dwtDct",
            Self::DwtDctSvd => "dwtDctSvd",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dwtDct" => Ok(Self::DwtDct),
            "dwtDctSvd" => Ok(Self::DwtDctSvd),
            other => Err(Error::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Paths exempt from watermark processing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipList {
    paths: HashSet<PathBuf>,
}

impl SkipList {
    /// Build a skip list from paths.
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self {
            paths: paths.into_iter().map(|p| normalize(p.as_ref())).collect(),
        }
    }

    /// Whether `path` is exempt. `./a/b` and `a/b` name the same entry.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(&normalize(path))
    }

    /// Number of exempt paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether nothing is exempt.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Configuration for the watermarker.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkConfig {
    /// Bytes embedded into every image.
    pub payload: Vec<u8>,

    /// Block embedding strategy.
    pub algorithm: Algorithm,

    /// Files that are never touched.
    pub skip_list: SkipList,

    /// Quantization step per Y, U, V channel. Zero disables a channel.
    pub scales: [f32; 3],
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            payload: DEFAULT_PAYLOAD.to_vec(),
            algorithm: Algorithm::default(),
            skip_list: SkipList::new(DEFAULT_SKIP_LIST),
            scales: DEFAULT_SCALES,
        }
    }
}

impl WatermarkConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.payload.is_empty() {
            return Err(Error::InvalidParameter {
                name: "payload".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        if self.scales.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(Error::InvalidParameter {
                name: "scales".to_string(),
                reason: "must be finite and non-negative".to_string(),
            });
        }

        if self.scales.iter().all(|s| *s == 0.0) {
            return Err(Error::InvalidParameter {
                name: "scales".to_string(),
                reason: "at least one channel must carry the watermark".to_string(),
            });
        }

        Ok(())
    }
}

/// Result of applying the watermark to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The file is on the skip list and was not opened.
    Skipped,
    /// The file already carried the watermark and was left as is.
    AlreadyWatermarked,
    /// The watermark was written to `output`, which differs from the
    /// input when a lossy source was replaced.
    Watermarked { output: PathBuf },
}

/// Result of checking one file for the watermark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The file is on the skip list and counts as verified.
    Exempt,
    /// The recovered payload matches.
    Verified,
    /// No matching payload; `reason` explains a failure to read it.
    Missing { reason: Option<String> },
}

impl VerifyOutcome {
    /// Whether this outcome counts as a pass.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Exempt | Self::Verified)
    }
}

/// Applies and verifies the configured watermark.
#[derive(Debug, Clone)]
pub struct Watermarker {
    config: WatermarkConfig,
    bits: Vec<bool>,
}

impl Watermarker {
    /// Create a watermarker with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: WatermarkConfig) -> Result<Self> {
        config.validate()?;

        tracing::debug!(
            "Watermarker ready: {} payload bytes, {}, {} skipped paths",
            config.payload.len(),
            config.algorithm,
            config.skip_list.len()
        );

        let bits = bytes_to_bits(&config.payload);
        Ok(Self { config, bits })
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &WatermarkConfig {
        &self.config
    }

    /// Apply the watermark to the image at `path`.
    ///
    /// Skip-listed paths are not opened. Images that already carry the
    /// watermark are left untouched. JPEG sources are replaced by a PNG
    /// with the same stem; every other format is rewritten in place
    /// with a lossless encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be read, is too small to
    /// carry the payload, or cannot be written.
    pub fn apply<P: AsRef<Path>>(&self, path: P) -> Result<ApplyOutcome> {
        let path = path.as_ref();

        if self.config.skip_list.contains(path) {
            tracing::debug!("Skip list covers {}", path.display());
            return Ok(ApplyOutcome::Skipped);
        }

        let img = load_image(path)?;

        if self.is_watermarked(&img)? {
            tracing::debug!("Watermark already present in {}", path.display());
            return Ok(ApplyOutcome::AlreadyWatermarked);
        }

        let marked = self.embed(&img)?;

        if is_lossy(path) {
            let output = path.with_extension(LOSSLESS_REPLACEMENT);
            save_lossless(&marked, &output)?;
            fs::remove_file(path).map_err(|source| Error::file(path, source))?;
            tracing::info!("Watermarked {} -> {}", path.display(), output.display());
            Ok(ApplyOutcome::Watermarked { output })
        } else {
            save_lossless(&marked, path)?;
            tracing::info!("Watermarked {}", path.display());
            Ok(ApplyOutcome::Watermarked {
                output: path.to_path_buf(),
            })
        }
    }

    /// Check whether the image at `path` carries the watermark.
    ///
    /// Never fails: unreadable images report [`VerifyOutcome::Missing`]
    /// with the reason attached.
    pub fn verify<P: AsRef<Path>>(&self, path: P) -> VerifyOutcome {
        let path = path.as_ref();

        if self.config.skip_list.contains(path) {
            return VerifyOutcome::Exempt;
        }

        let checked = load_image(path).and_then(|img| self.is_watermarked(&img));
        match checked {
            Ok(true) => VerifyOutcome::Verified,
            Ok(false) => VerifyOutcome::Missing { reason: None },
            Err(err) => {
                tracing::debug!("Could not check {}: {err}", path.display());
                VerifyOutcome::Missing {
                    reason: Some(err.to_string()),
                }
            }
        }
    }

    /// Embed the payload into an in-memory image.
    ///
    /// The result is 8-bit RGB, or RGBA with the original alpha when the
    /// source had an alpha channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is too small to carry the payload.
    pub fn embed(&self, img: &DynamicImage) -> Result<DynamicImage> {
        let mut rgb = img.to_rgb8();
        embed::embed_bits(&mut rgb, &self.bits, self.config.algorithm, self.config.scales)?;

        if !img.color().has_alpha() {
            return Ok(DynamicImage::ImageRgb8(rgb));
        }

        let mut rgba = img.to_rgba8();
        for (dst, src) in rgba.pixels_mut().zip(rgb.pixels()) {
            dst.0[..3].copy_from_slice(&src.0);
        }
        Ok(DynamicImage::ImageRgba8(rgba))
    }

    /// Recover `payload.len()` bytes from an in-memory image.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is too small to hold the payload.
    pub fn decode_payload(&self, img: &DynamicImage) -> Result<Vec<u8>> {
        let bits = embed::extract_bits(
            &img.to_rgb8(),
            self.bits.len(),
            self.config.algorithm,
            self.config.scales,
        )?;
        Ok(bits_to_bytes(&bits))
    }

    /// Whether an in-memory image carries exactly the configured payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is too small to hold the payload.
    pub fn is_watermarked(&self, img: &DynamicImage) -> Result<bool> {
        Ok(self.decode_payload(img)? == self.config.payload)
    }
}
