//! Image saving utilities.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat};

use crate::error::{Error, Result};

use super::extension_of;

/// Save an image without losing pixel data.
///
/// The encoding is picked from the extension of `path`:
/// - `webp`: lossless WebP
/// - `png`: PNG at best compression with adaptive filtering
/// - anything else: the format's default encoder
///
/// Lossy formats are refused. The image is written to a sibling
/// temporary file first and renamed over `path`.
///
/// # Errors
///
/// Returns an error if the format is lossy or unknown, or if encoding or
/// writing fails.
pub fn save_lossless<P: AsRef<Path>>(img: &DynamicImage, path: P) -> Result<()> {
    let path = path.as_ref();

    let format = ImageFormat::from_path(path).map_err(|source| Error::ImageSave {
        path: path.to_path_buf(),
        source,
    })?;

    if format == ImageFormat::Jpeg {
        return Err(Error::InvalidParameter {
            name: "output".to_string(),
            reason: format!("{} is a lossy format", path.display()),
        });
    }

    let temp_path = temp_path(path);

    if let Err(err) = write_encoded(img, &temp_path, format) {
        // Best effort: the temp file may not exist if creation failed
        let _ = fs::remove_file(&temp_path);
        return Err(match err {
            Error::ImageSave { source, .. } => Error::ImageSave {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        });
    }

    // Atomic rename
    fs::rename(&temp_path, path).map_err(|source| Error::file(path, source))?;

    tracing::debug!("Saved {} as lossless {:?}", path.display(), format);
    Ok(())
}

fn write_encoded(img: &DynamicImage, path: &Path, format: ImageFormat) -> Result<()> {
    let file = File::create(path).map_err(|source| Error::file(path, source))?;
    let mut writer = BufWriter::new(file);

    let encoded = match format {
        ImageFormat::WebP => img.write_with_encoder(WebPEncoder::new_lossless(&mut writer)),
        ImageFormat::Png => img.write_with_encoder(PngEncoder::new_with_quality(
            &mut writer,
            CompressionType::Best,
            FilterType::Adaptive,
        )),
        other => img.write_to(&mut writer, other),
    };

    encoded.map_err(|source| Error::ImageSave {
        path: path.to_path_buf(),
        source,
    })?;

    writer.flush().map_err(|source| Error::file(path, source))
}

/// Sibling path used while writing `path`.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "image".into(), |n| n.to_string_lossy().into_owned());
    let ext = extension_of(path).unwrap_or_default();
    // Keep the real extension last so format detection on the temp file agrees
    path.with_file_name(format!(".{name}.tmp.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn checkerboard() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(16, 8, |x, y| {
            if (x + y) % 2 == 0 {
                Rgb([200, 30, 90])
            } else {
                Rgb([10, 220, 140])
            }
        }))
    }

    #[test]
    fn test_webp_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.webp");
        let img = checkerboard();

        save_lossless(&img, &path).unwrap();

        let back = image::open(&path).unwrap();
        assert_eq!(back.to_rgb8(), img.to_rgb8());
    }

    #[test]
    fn test_png_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.png");
        let img = checkerboard();

        save_lossless(&img, &path).unwrap();

        let back = image::open(&path).unwrap();
        assert_eq!(back.to_rgb8(), img.to_rgb8());
    }

    #[test]
    fn test_refuses_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.jpg");

        let err = save_lossless(&checkerboard(), &path).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.png");

        save_lossless(&checkerboard(), &path).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_temp_path_keeps_extension() {
        let tmp = temp_path(Path::new("pics/a.webp"));
        assert_eq!(tmp, Path::new("pics/.a.webp.tmp.webp"));
    }
}
