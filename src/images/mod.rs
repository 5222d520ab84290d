//! Image sources on disk
//!
//! Provides:
//! - Name resolution against the input/output/temp directories
//! - Decoding to normalized RGB tensors
//! - Content hashes used for re-run detection

mod decode;
mod sources;

pub use decode::{file_hash, files_hash, has_image_extension, load_image, IMAGE_EXTENSIONS};
pub use sources::ImageSources;
