//! Typed node inputs
//!
//! Optional ordering inputs the graph wires in (`pipeline`, `opt_pipeline`)
//! carry no data and are ignored during deserialization.

use std::num::NonZeroUsize;

use serde::Deserialize;

use crate::storage::{Latent, StorageKey};
use crate::tensor::Tensor;

const DEFAULT_BATCH_SIZE: usize = 1000;

fn default_batch_size() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN)
}

fn default_key_list() -> String {
    "*".to_string()
}

/// `ImageStorageImport`
#[derive(Debug, Clone, Deserialize)]
pub struct ImageImportParams {
    pub key: StorageKey,
    pub image: Tensor,
}

/// `ImageStorageExport` / `LatentStorageExport`
#[derive(Debug, Clone, Deserialize)]
pub struct ExportParams {
    pub key: StorageKey,
}

/// `ImageStorageExportLoop` / `LatentStorageExportLoop`
#[derive(Debug, Clone, Deserialize)]
pub struct ExportLoopParams {
    pub key: StorageKey,
    #[serde(default = "default_batch_size")]
    pub batch_size: NonZeroUsize,
    #[serde(default)]
    pub loop_idx: usize,
    /// Read by the host loop controller only
    #[serde(default)]
    pub loop_end: usize,
}

/// `ImageStorageReset` / `LatentStorageReset`
#[derive(Debug, Clone, Deserialize)]
pub struct ResetParams {
    #[serde(default = "default_key_list")]
    pub key_list: String,
}

/// `ImageToImageStorage`
#[derive(Debug, Clone, Deserialize)]
pub struct ImageFileParams {
    pub key: StorageKey,
    /// File name in the input directory, optionally annotated
    pub image: String,
}

/// `FolderToImageStorage`
#[derive(Debug, Clone, Deserialize)]
pub struct ImageFolderParams {
    pub key: StorageKey,
    /// Folder name in the input directory
    pub folder: String,
}

/// `LatentStorageImport`
#[derive(Debug, Clone, Deserialize)]
pub struct LatentImportParams {
    pub key: StorageKey,
    pub latent: Latent,
}
