//! Image loading and lossless saving utilities.

mod load;
mod save;

use std::path::Path;

pub use load::load_image;
pub use save::save_lossless;

/// Extensions whose encodings discard pixel data.
pub const LOSSY_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// Lower-cased extension of `path`, if it has one.
#[must_use]
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Whether `path` names a lossy image format.
#[must_use]
pub fn is_lossy(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| LOSSY_EXTENSIONS.contains(&ext.as_str()))
}
