//! Node execution against shared storage

use std::sync::Arc;

use tracing::{debug, info};

use super::{ChangeMarker, NodeOutput, NodeRequest};
use crate::images::{file_hash, files_hash, load_image, ImageSources};
use crate::storage::{KeySelection, Storage, StorageError};

/// Executes storage nodes
pub struct NodeRunner {
    storage: Arc<Storage>,
    sources: ImageSources,
}

impl NodeRunner {
    pub fn new(storage: Arc<Storage>, sources: ImageSources) -> Self {
        Self { storage, sources }
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn sources(&self) -> &ImageSources {
        &self.sources
    }

    /// Pre-flight checks run before the graph starts executing
    pub fn validate(&self, request: &NodeRequest) -> Result<(), StorageError> {
        match request {
            NodeRequest::ImageToImageStorage(p) => self.sources.file(&p.image).map(drop),
            NodeRequest::FolderToImageStorage(p) => self.sources.folder(&p.folder).map(drop),
            _ => Ok(()),
        }
    }

    /// Whether cached output may be reused
    ///
    /// Storage reads and writes depend on state outside their inputs and
    /// always re-run. Loads from disk re-run when the content hash changes.
    pub fn is_changed(&self, request: &NodeRequest) -> Result<ChangeMarker, StorageError> {
        match request {
            NodeRequest::ImageToImageStorage(p) => {
                let path = self.sources.file(&p.image)?;
                Ok(ChangeMarker::RerunIfContentHashChanges(file_hash(&path)?))
            }
            NodeRequest::FolderToImageStorage(p) => {
                let folder = self.sources.folder(&p.folder)?;
                let images = self.sources.folder_images(&folder)?;
                Ok(ChangeMarker::RerunIfContentHashChanges(files_hash(&images)?))
            }
            _ => Ok(ChangeMarker::AlwaysRerun),
        }
    }

    /// Run a node
    pub fn execute(&self, request: NodeRequest) -> Result<NodeOutput, StorageError> {
        debug!("Executing {}", request.class_type());

        let images = self.storage.images();
        let latents = self.storage.latents();

        match request {
            NodeRequest::ImageStorageImport(p) => {
                images.import(p.key, p.image);
                Ok(NodeOutput::None)
            }
            NodeRequest::ImageStorageExport(p) => Ok(NodeOutput::Image {
                image: images.export(p.key.as_str())?,
            }),
            NodeRequest::ImageStorageExportLoop(p) => {
                let page = images.export_loop(p.key.as_str(), p.batch_size, p.loop_idx)?;
                Ok(NodeOutput::ImageLoop {
                    image: page.value,
                    loop_idx: page.loop_idx,
                    idx_in_batch: page.idx_in_batch,
                })
            }
            NodeRequest::ImageStorageReset(p) => {
                images.reset(&KeySelection::parse(&p.key_list));
                Ok(NodeOutput::None)
            }
            NodeRequest::ImageToImageStorage(p) => {
                let path = self.sources.file(&p.image)?;
                let image = load_image(&path)?;
                info!("Image storage {}: loaded {}", p.key, path.display());
                images.replace(p.key, vec![image]);
                Ok(NodeOutput::None)
            }
            NodeRequest::FolderToImageStorage(p) => {
                let folder = self.sources.folder(&p.folder)?;
                let paths = self.sources.folder_images(&folder)?;

                // Decode everything before touching the stored sequence
                let loaded = paths
                    .iter()
                    .map(|path| load_image(path))
                    .collect::<Result<Vec<_>, _>>()?;

                info!(
                    "Image storage {}: loaded {} image(s) from {}",
                    p.key,
                    loaded.len(),
                    folder.display()
                );
                images.replace(p.key, loaded);
                Ok(NodeOutput::None)
            }
            NodeRequest::LatentStorageImport(p) => {
                latents.import(p.key, &p.latent);
                Ok(NodeOutput::None)
            }
            NodeRequest::LatentStorageExport(p) => Ok(NodeOutput::Latent {
                latent: latents.export(p.key.as_str())?,
            }),
            NodeRequest::LatentStorageExportLoop(p) => {
                let page = latents.export_loop(p.key.as_str(), p.batch_size, p.loop_idx)?;
                Ok(NodeOutput::LatentLoop {
                    latent: page.value,
                    loop_idx: page.loop_idx,
                    idx_in_batch: page.idx_in_batch,
                })
            }
            NodeRequest::LatentStorageReset(p) => {
                latents.reset(&KeySelection::parse(&p.key_list));
                Ok(NodeOutput::None)
            }
        }
    }
}
