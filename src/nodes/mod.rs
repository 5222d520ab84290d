//! Storage nodes
//!
//! Each node class has a typed parameter struct. Requests arrive tagged by
//! `class_type` with their `inputs`, the way the graph engine submits them,
//! and are executed by a `NodeRunner` against a shared `Storage`.

mod params;
mod runner;

use serde::{Deserialize, Serialize};

use crate::storage::Latent;
use crate::tensor::Tensor;

pub use params::{
    ExportLoopParams, ExportParams, ImageFileParams, ImageFolderParams, ImageImportParams,
    LatentImportParams, ResetParams,
};
pub use runner::NodeRunner;

/// Category every storage node is listed under
pub const NODE_CATEGORY: &str = "Loopchain/storage";

/// When the graph engine must re-run a node instead of reusing its output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rerun", content = "hash", rename_all = "snake_case")]
pub enum ChangeMarker {
    AlwaysRerun,
    RerunIfContentHashChanges(String),
}

/// A node invocation
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "class_type", content = "inputs")]
pub enum NodeRequest {
    ImageStorageImport(ImageImportParams),
    ImageStorageExport(ExportParams),
    ImageStorageExportLoop(ExportLoopParams),
    ImageStorageReset(ResetParams),
    ImageToImageStorage(ImageFileParams),
    FolderToImageStorage(ImageFolderParams),
    LatentStorageImport(LatentImportParams),
    LatentStorageExport(ExportParams),
    LatentStorageExportLoop(ExportLoopParams),
    LatentStorageReset(ResetParams),
}

impl NodeRequest {
    pub fn class_type(&self) -> &'static str {
        match self {
            NodeRequest::ImageStorageImport(_) => "ImageStorageImport",
            NodeRequest::ImageStorageExport(_) => "ImageStorageExport",
            NodeRequest::ImageStorageExportLoop(_) => "ImageStorageExportLoop",
            NodeRequest::ImageStorageReset(_) => "ImageStorageReset",
            NodeRequest::ImageToImageStorage(_) => "ImageToImageStorage",
            NodeRequest::FolderToImageStorage(_) => "FolderToImageStorage",
            NodeRequest::LatentStorageImport(_) => "LatentStorageImport",
            NodeRequest::LatentStorageExport(_) => "LatentStorageExport",
            NodeRequest::LatentStorageExportLoop(_) => "LatentStorageExportLoop",
            NodeRequest::LatentStorageReset(_) => "LatentStorageReset",
        }
    }
}

/// Values a node hands back to the graph
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeOutput {
    /// Output-only nodes (imports and resets)
    None,
    Image {
        image: Tensor,
    },
    ImageLoop {
        image: Tensor,
        loop_idx: usize,
        idx_in_batch: usize,
    },
    Latent {
        latent: Latent,
    },
    LatentLoop {
        latent: Latent,
        loop_idx: usize,
        idx_in_batch: usize,
    },
}

/// Static description of a node class
#[derive(Debug, Clone, Copy, Serialize)]
pub struct NodeClass {
    pub class_type: &'static str,
    pub category: &'static str,
    pub output_names: &'static [&'static str],
    /// Runs for its side effect, with no outputs
    pub output_node: bool,
}

const fn side_effect(class_type: &'static str) -> NodeClass {
    NodeClass {
        class_type,
        category: NODE_CATEGORY,
        output_names: &[],
        output_node: true,
    }
}

const fn producer(class_type: &'static str, output_names: &'static [&'static str]) -> NodeClass {
    NodeClass {
        class_type,
        category: NODE_CATEGORY,
        output_names,
        output_node: false,
    }
}

/// Every registered storage node
pub const NODE_CLASSES: &[NodeClass] = &[
    side_effect("ImageStorageImport"),
    producer("ImageStorageExportLoop", &["IMAGE", "LOOP IDX (INT)", "IDX_IN_BATCH (INT)"]),
    producer("ImageStorageExport", &["IMAGE"]),
    side_effect("ImageStorageReset"),
    side_effect("ImageToImageStorage"),
    side_effect("FolderToImageStorage"),
    side_effect("LatentStorageImport"),
    producer("LatentStorageExport", &["LATENT"]),
    producer("LatentStorageExportLoop", &["LATENT", "LOOP IDX (INT)", "IDX_IN_BATCH (INT)"]),
    side_effect("LatentStorageReset"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_tagging() {
        let req: NodeRequest = serde_json::from_value(serde_json::json!({
            "class_type": "ImageStorageExportLoop",
            "inputs": {"key": "frames", "batch_size": 4, "loop_idx": 2, "loop_end": 9}
        }))
        .unwrap();

        match &req {
            NodeRequest::ImageStorageExportLoop(p) => {
                assert_eq!(p.batch_size.get(), 4);
                assert_eq!(p.loop_idx, 2);
            }
            other => panic!("unexpected request {other:?}"),
        }
        assert_eq!(req.class_type(), "ImageStorageExportLoop");
    }

    #[test]
    fn test_unknown_class_rejected() {
        let req = serde_json::from_value::<NodeRequest>(serde_json::json!({
            "class_type": "SaveImage",
            "inputs": {}
        }));
        assert!(req.is_err());
    }

    #[test]
    fn test_registry_matches_requests() {
        assert_eq!(NODE_CLASSES.len(), 10);
        assert!(NODE_CLASSES.iter().all(|c| c.category == NODE_CATEGORY));

        let export_loop = NODE_CLASSES
            .iter()
            .find(|c| c.class_type == "LatentStorageExportLoop")
            .unwrap();
        assert!(!export_loop.output_node);
        assert_eq!(export_loop.output_names.len(), 3);
    }

    #[test]
    fn test_change_marker_json() {
        let always = serde_json::to_value(ChangeMarker::AlwaysRerun).unwrap();
        assert_eq!(always, serde_json::json!({"rerun": "always_rerun"}));

        let hashed =
            serde_json::to_value(ChangeMarker::RerunIfContentHashChanges("ab".into())).unwrap();
        assert_eq!(
            hashed,
            serde_json::json!({"rerun": "rerun_if_content_hash_changes", "hash": "ab"})
        );
    }
}
