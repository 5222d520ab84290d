//! In-memory keyed storage for images and latents
//!
//! Two independent stores live side by side:
//! - `ImageStore`: key -> ordered image batches, exported as one concatenation
//! - `LatentStore`: key -> ordered single-item latent records
//!
//! Nothing here persists. A `Storage` is created at process start and shared
//! by reference with whatever dispatches node operations.

mod image_store;
mod key;
mod latent_store;

use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tensor::TensorError;

pub use image_store::ImageStore;
pub use key::{KeySelection, StorageKey};
pub use latent_store::{Latent, LatentStore};

/// Which store an operation or query targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Image,
    Latent,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Image => f.write_str("Image"),
            StoreKind::Latent => f.write_str("Latent"),
        }
    }
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{kind} storage {key} doesn't exist")]
    Missing { kind: StoreKind, key: StorageKey },

    #[error("{kind} storage {key}: loop index {index} out of range ({available} available)")]
    OutOfRange {
        kind: StoreKind,
        key: StorageKey,
        index: usize,
        available: usize,
    },

    #[error("Invalid image file: {0}")]
    InvalidFile(String),

    #[error("No image is found in folder {}", .0.display())]
    EmptyFolder(PathBuf),

    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
}

/// One loop iteration's worth of stored data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopPage<T> {
    pub value: T,
    pub loop_idx: usize,
    /// `loop_idx % batch_size`, kept for node output compatibility
    pub idx_in_batch: usize,
}

impl<T> LoopPage<T> {
    fn new(value: T, loop_idx: usize, batch_size: NonZeroUsize) -> Self {
        Self {
            value,
            loop_idx,
            idx_in_batch: loop_idx % batch_size.get(),
        }
    }
}

/// Process-wide image and latent storage
#[derive(Debug, Default)]
pub struct Storage {
    images: ImageStore,
    latents: LatentStore,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    pub fn latents(&self) -> &LatentStore {
        &self.latents
    }

    /// Number of loop iterations available for a key, `None` if unknown
    ///
    /// Images report the page count for `batch_size`. Latents report the raw
    /// record count and ignore `batch_size`, since latent export loops index
    /// records directly.
    pub fn length(&self, kind: StoreKind, key: &str, batch_size: NonZeroUsize) -> Option<usize> {
        let key = key.trim();
        match kind {
            StoreKind::Image => self.images.page_count(key, batch_size),
            StoreKind::Latent => self.latents.len(key),
        }
    }
}
