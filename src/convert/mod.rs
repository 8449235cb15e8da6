//! Batch conversion of a directory of images to lossless WebP.

mod stats;

use std::fs;
use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::error::{Error, Result};
use crate::image::{extension_of, load_image, save_lossless};

pub use stats::{format_byte_delta, format_bytes, ConversionRecord, FileOutcome, Summary};

/// Directory scanned when none is given.
pub const DEFAULT_INPUT_DIR: &str = "assets/pics";

/// Source formats picked up by the scan.
pub const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Extension of every converted file.
pub const TARGET_EXTENSION: &str = "webp";

/// Configuration for the converter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertConfig {
    /// Directory whose files are converted. Not searched recursively.
    pub input_dir: PathBuf,

    /// Replace outputs that already exist.
    pub overwrite: bool,

    /// Lower-case extensions of the files to convert.
    pub source_extensions: Vec<String>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            overwrite: false,
            source_extensions: DEFAULT_SOURCE_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl ConvertConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no source extension is configured or one of
    /// them is the target extension.
    pub fn validate(&self) -> Result<()> {
        if self.source_extensions.is_empty() {
            return Err(Error::InvalidParameter {
                name: "source_extensions".to_string(),
                reason: "must list at least one extension".to_string(),
            });
        }

        if self
            .source_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(TARGET_EXTENSION))
        {
            return Err(Error::InvalidParameter {
                name: "source_extensions".to_string(),
                reason: format!("cannot include the target extension {TARGET_EXTENSION}"),
            });
        }

        Ok(())
    }
}

/// Converts the images of one directory to lossless WebP.
#[derive(Debug, Clone)]
pub struct Converter {
    config: ConvertConfig,
}

impl Converter {
    /// Create a converter with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: ConvertConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// List the source images in the input directory, sorted by path.
    ///
    /// Extensions match case-insensitively. Subdirectories are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingInputDir`] if the directory does not exist,
    /// or an IO error if it cannot be listed.
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        let dir = &self.config.input_dir;
        if !dir.is_dir() {
            return Err(Error::MissingInputDir { path: dir.clone() });
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(|source| Error::file(dir, source))? {
            let path = entry.map_err(|source| Error::file(dir, source))?.path();
            if path.is_file() && self.is_source(&path) {
                files.push(path);
            }
        }
        files.sort();

        tracing::debug!("Found {} source images in {}", files.len(), dir.display());
        Ok(files)
    }

    fn is_source(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.config.source_extensions.contains(&ext))
    }

    /// Where the converted form of `src` is written.
    #[must_use]
    pub fn output_path(&self, src: &Path) -> PathBuf {
        src.with_extension(TARGET_EXTENSION)
    }

    /// Convert one file unless its output exists and overwriting is off.
    ///
    /// Failures are captured in the outcome rather than returned.
    pub fn process(&self, src: &Path) -> FileOutcome {
        let dst = self.output_path(src);

        if dst.exists() && !self.config.overwrite {
            tracing::debug!("{} exists, skipping", dst.display());
            return FileOutcome::Skipped;
        }

        match convert_file(src, &dst) {
            Ok(record) => FileOutcome::Converted(record),
            Err(err) => {
                tracing::warn!("Converting {} failed: {err}", src.display());
                FileOutcome::Failed(err.to_string())
            }
        }
    }

    /// Process `files` in order, reporting each outcome to `observer`.
    ///
    /// A failed file never stops the batch.
    pub fn run<F>(&self, files: &[PathBuf], mut observer: F) -> Summary
    where
        F: FnMut(&Path, &Path, &FileOutcome),
    {
        let mut summary = Summary::default();

        for src in files {
            let outcome = self.process(src);
            observer(src, &self.output_path(src), &outcome);
            summary.record(&outcome);
        }

        tracing::info!(
            "Converted {}, skipped {}, failed {}",
            summary.converted,
            summary.skipped,
            summary.errors
        );
        summary
    }
}

/// Convert `src` to lossless WebP at `dst` and report both sizes.
///
/// # Errors
///
/// Returns an error if `src` cannot be decoded or `dst` cannot be written.
pub fn convert_file(src: &Path, dst: &Path) -> Result<ConversionRecord> {
    let img = normalize(load_image(src)?);
    save_lossless(&img, dst)?;

    let original_size = file_size(src)?;
    let converted_size = file_size(dst)?;

    tracing::debug!(
        "{} ({original_size} B) -> {} ({converted_size} B)",
        src.display(),
        dst.display()
    );

    Ok(ConversionRecord {
        original_size,
        converted_size,
    })
}

/// Bring an image into a layout the WebP encoder accepts.
///
/// RGB and RGBA pass through. Anything carrying alpha (luma+alpha,
/// decoded palettes with transparency, wide RGBA) becomes RGBA; every
/// other layout becomes RGB.
#[must_use]
pub fn normalize(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

fn file_size(path: &Path) -> Result<u64> {
    fs::metadata(path)
        .map(|meta| meta.len())
        .map_err(|source| Error::file(path, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ColorType, GrayAlphaImage, GrayImage, ImageBuffer, LumaA, Rgb};

    fn converter(dir: &Path, overwrite: bool) -> Converter {
        Converter::new(ConvertConfig {
            input_dir: dir.to_path_buf(),
            overwrite,
            ..ConvertConfig::default()
        })
        .unwrap()
    }

    fn write_png(path: &Path) {
        DynamicImage::new_rgb8(8, 8).save(path).unwrap();
    }

    #[test]
    fn test_validate() {
        assert!(ConvertConfig::default().validate().is_ok());

        let none = ConvertConfig {
            source_extensions: Vec::new(),
            ..ConvertConfig::default()
        };
        assert!(none.validate().is_err());

        let loops = ConvertConfig {
            source_extensions: vec!["webp".to_string()],
            ..ConvertConfig::default()
        };
        assert!(loops.validate().is_err());
    }

    #[test]
    fn test_output_path_swaps_extension() {
        let conv = converter(Path::new("."), false);
        assert_eq!(
            conv.output_path(Path::new("pics/shot.JPEG")),
            Path::new("pics/shot.webp")
        );
    }

    #[test]
    fn test_scan_matches_case_insensitively_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("b.PNG"));
        write_png(&dir.path().join("a.png"));
        fs::write(dir.path().join("c.JPG"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::write(dir.path().join("d.webp"), b"x").unwrap();
        fs::create_dir(dir.path().join("nested.png")).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        write_png(&dir.path().join("sub").join("deep.png"));

        let files = converter(dir.path(), false).scan().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a.png", "b.PNG", "c.JPG"]);
    }

    #[test]
    fn test_scan_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let conv = converter(&dir.path().join("absent"), false);

        assert!(matches!(conv.scan(), Err(Error::MissingInputDir { .. })));
    }

    #[test]
    fn test_normalize_layouts() {
        let la = DynamicImage::ImageLumaA8(GrayAlphaImage::from_pixel(2, 2, LumaA([10, 20])));
        assert_eq!(normalize(la).color(), ColorType::Rgba8);

        let gray = DynamicImage::ImageLuma8(GrayImage::new(2, 2));
        assert_eq!(normalize(gray).color(), ColorType::Rgb8);

        let wide: ImageBuffer<Rgb<u16>, Vec<u16>> = ImageBuffer::new(2, 2);
        assert_eq!(normalize(DynamicImage::ImageRgb16(wide)).color(), ColorType::Rgb8);

        let rgba = DynamicImage::new_rgba8(2, 2);
        assert_eq!(normalize(rgba).color(), ColorType::Rgba8);
    }

    #[test]
    fn test_process_skips_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.png");
        write_png(&src);
        fs::write(dir.path().join("a.webp"), b"keep me").unwrap();

        assert_eq!(converter(dir.path(), false).process(&src), FileOutcome::Skipped);
        assert_eq!(fs::read(dir.path().join("a.webp")).unwrap(), b"keep me");

        let outcome = converter(dir.path(), true).process(&src);
        assert!(matches!(outcome, FileOutcome::Converted(_)));
        assert_ne!(fs::read(dir.path().join("a.webp")).unwrap(), b"keep me");
    }

    #[test]
    fn test_failure_does_not_stop_batch() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"not a jpeg").unwrap();
        write_png(&dir.path().join("b.png"));

        let conv = converter(dir.path(), false);
        let files = conv.scan().unwrap();

        let mut seen = Vec::new();
        let summary = conv.run(&files, |src, _, outcome| {
            seen.push((src.to_path_buf(), outcome.clone()));
        });

        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[0].1, FileOutcome::Failed(_)));
        assert!(matches!(seen[1].1, FileOutcome::Converted(_)));
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.converted, 1);
        assert!(!summary.is_success());
        assert!(!dir.path().join("a.webp").exists());
    }
}
