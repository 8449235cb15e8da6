//! Image loading utilities.

use std::path::Path;

use image::{DynamicImage, ImageReader};

use crate::error::{Error, Result};

/// Load and decode an image from disk.
///
/// The format is sniffed from the file contents, so a file whose
/// extension lies about its encoding still decodes.
///
/// # Errors
///
/// Returns [`Error::File`] if the file cannot be opened and
/// [`Error::ImageLoad`] if it cannot be decoded.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path = path.as_ref();

    let reader = ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|source| Error::file(path, source))?;

    let img = reader.decode().map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(
        "Loaded {} ({}x{}, {:?})",
        path.display(),
        img.width(),
        img.height(),
        img.color()
    );

    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_file_error() {
        let err = load_image("does/not/exist.png").unwrap_err();
        assert!(matches!(err, Error::File { .. }));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let err = load_image(&path).unwrap_err();
        assert!(matches!(err, Error::ImageLoad { .. }));
    }

    #[test]
    fn test_sniffs_format_from_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mislabelled.jpg");
        DynamicImage::new_rgb8(4, 4)
            .save_with_format(&path, image::ImageFormat::Png)
            .unwrap();

        let img = load_image(&path).unwrap();
        assert_eq!((img.width(), img.height()), (4, 4));
    }
}
