//! Image decoding and content hashing

use std::fs::File;
use std::io;
use std::path::Path;

use image::{DynamicImage, ImageDecoder, ImageReader};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::storage::StorageError;
use crate::tensor::Tensor;

/// Extensions recognized when scanning a folder (matched case-sensitively)
pub const IMAGE_EXTENSIONS: &[&str] = &[
    ".ras", ".xwd", ".bmp", ".jpe", ".jpg", ".jpeg", ".xpm", ".ief", ".pbm", ".tif", ".gif",
    ".ppm", ".xbm", ".tiff", ".rgb", ".pgm", ".png", ".pnm", ".webp",
];

/// Whether a path carries one of `IMAGE_EXTENSIONS`
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| known[1..] == *ext))
}

/// Decode an image file into a `[1, H, W, 3]` tensor with values in `0.0..=1.0`
///
/// EXIF orientation is applied before conversion, and any alpha channel is
/// dropped.
pub fn load_image(path: &Path) -> Result<Tensor, StorageError> {
    let io_err = |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };
    let decode_err = |source| StorageError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let mut decoder = ImageReader::open(path)
        .map_err(io_err)?
        .with_guessed_format()
        .map_err(io_err)?
        .into_decoder()
        .map_err(decode_err)?;
    let orientation = decoder.orientation().map_err(decode_err)?;

    let mut image = DynamicImage::from_decoder(decoder).map_err(decode_err)?;
    image.apply_orientation(orientation);

    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let data = rgb
        .into_raw()
        .into_iter()
        .map(|v| f32::from(v) / 255.0)
        .collect();

    debug!("Decoded {} ({}x{})", path.display(), width, height);
    Ok(Tensor::new(vec![1, height as usize, width as usize, 3], data)?)
}

/// SHA-256 of a file's content, hex encoded
pub fn file_hash(path: &Path) -> Result<String, StorageError> {
    let mut hasher = Sha256::new();
    hash_into(&mut hasher, path)?;
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 over each file's name and content, in the order given
pub fn files_hash(paths: &[impl AsRef<Path>]) -> Result<String, StorageError> {
    let mut hasher = Sha256::new();
    for path in paths {
        let path = path.as_ref();
        if let Some(name) = path.file_name() {
            hasher.update(name.as_encoded_bytes());
        }
        hasher.update([0u8]);
        hash_into(&mut hasher, path)?;
    }
    Ok(hex::encode(hasher.finalize()))
}

fn hash_into(hasher: &mut Sha256, path: &Path) -> Result<(), StorageError> {
    let io_err = |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(io_err)?;
    io::copy(&mut file, hasher).map_err(io_err)?;
    Ok(())
}
