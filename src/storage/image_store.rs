//! Image batch storage
//!
//! Each key holds the batches imported under it, in order. Exports treat
//! them as one batch concatenated along the item axis.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::{KeySelection, LoopPage, StorageError, StorageKey, StoreKind};
use crate::tensor::Tensor;

/// Key -> ordered image batches
#[derive(Debug, Default)]
pub struct ImageStore {
    sequences: RwLock<HashMap<StorageKey, Vec<Tensor>>>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch, creating the sequence on first use
    pub fn import(&self, key: StorageKey, batch: Tensor) {
        debug!("Image storage {}: appending {} item(s)", key, batch.len());
        self.sequences.write().entry(key).or_default().push(batch);
    }

    /// Replace the whole sequence for a key
    pub fn replace(&self, key: StorageKey, batches: Vec<Tensor>) {
        debug!("Image storage {}: replaced with {} batch(es)", key, batches.len());
        self.sequences.write().insert(key, batches);
    }

    /// Every stored item for a key as one batch
    pub fn export(&self, key: &str) -> Result<Tensor, StorageError> {
        let sequences = self.sequences.read();
        let batches = stored(&sequences, key)?;
        Ok(Tensor::cat(batches)?)
    }

    /// Page `loop_idx` of the concatenated sequence split into `batch_size` pages
    pub fn export_loop(
        &self,
        key: &str,
        batch_size: NonZeroUsize,
        loop_idx: usize,
    ) -> Result<LoopPage<Tensor>, StorageError> {
        let sequences = self.sequences.read();
        let batches = stored(&sequences, key)?;

        let size = batch_size.get();
        let total = item_count(batches);
        let pages = total.div_ceil(size);
        if loop_idx >= pages {
            return Err(StorageError::OutOfRange {
                kind: StoreKind::Image,
                key: StorageKey::new(key),
                index: loop_idx,
                available: pages,
            });
        }

        let start = loop_idx * size;
        let end = (start + size).min(total);

        // Slice only the batches overlapping [start, end)
        let mut parts = Vec::new();
        let mut offset = 0;
        for batch in batches.iter().filter(|b| !b.is_empty()) {
            let (lo, hi) = (offset, offset + batch.len());
            offset = hi;
            if hi <= start {
                continue;
            }
            if lo >= end {
                break;
            }
            parts.push(batch.slice(start.saturating_sub(lo), end.min(hi) - lo));
        }

        let page = Tensor::cat(&parts)?;
        Ok(LoopPage::new(page, loop_idx, batch_size))
    }

    /// Delete the selected keys, returning how many existed
    pub fn reset(&self, selection: &KeySelection) -> usize {
        let mut sequences = self.sequences.write();
        let removed = match selection {
            KeySelection::All => {
                let n = sequences.len();
                sequences.clear();
                n
            }
            KeySelection::Keys(keys) => keys
                .iter()
                .filter(|k| sequences.remove(k.as_str()).is_some())
                .count(),
        };
        info!("Image storage reset: removed {} key(s)", removed);
        removed
    }

    /// Number of `batch_size` pages for a key, `None` if the key is unknown
    pub fn page_count(&self, key: &str, batch_size: NonZeroUsize) -> Option<usize> {
        self.item_count(key)
            .map(|total| total.div_ceil(batch_size.get()))
    }

    /// Total items stored under a key
    pub fn item_count(&self, key: &str) -> Option<usize> {
        self.sequences.read().get(key.trim()).map(|b| item_count(b))
    }

    #[cfg(test)]
    pub fn contains(&self, key: &str) -> bool {
        self.sequences.read().contains_key(key.trim())
    }

    /// Stored keys, sorted
    pub fn keys(&self) -> Vec<StorageKey> {
        let mut keys: Vec<_> = self.sequences.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

fn item_count(batches: &[Tensor]) -> usize {
    batches.iter().map(Tensor::len).sum()
}

/// Batches for a key, which must exist and be non-empty
fn stored<'a>(
    sequences: &'a HashMap<StorageKey, Vec<Tensor>>,
    key: &str,
) -> Result<&'a [Tensor], StorageError> {
    let key = key.trim();
    match sequences.get(key) {
        Some(batches) if !batches.is_empty() => Ok(batches),
        _ => Err(StorageError::Missing {
            kind: StoreKind::Image,
            key: StorageKey::new(key),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    /// Batch of `n` 1x1 RGB images whose pixels all equal `first + i`
    fn batch(first: usize, n: usize) -> Tensor {
        let data = (first..first + n)
            .flat_map(|v| [v as f32; 3])
            .collect();
        Tensor::new(vec![n, 1, 1, 3], data).unwrap()
    }

    fn ids(t: &Tensor) -> Vec<usize> {
        t.data().chunks(3).map(|px| px[0] as usize).collect()
    }

    #[test]
    fn test_export_concatenates_in_order() {
        let store = ImageStore::new();
        store.import("k".into(), batch(0, 2));
        store.import("k".into(), batch(2, 3));
        store.import("k".into(), batch(5, 1));

        let all = store.export("k").unwrap();
        assert_eq!(all.shape(), &[6, 1, 1, 3]);
        assert_eq!(ids(&all), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_export_missing_key() {
        let store = ImageStore::new();
        let err = store.export("absent").unwrap_err();
        assert!(matches!(err, StorageError::Missing { kind: StoreKind::Image, .. }));

        store.replace("empty".into(), Vec::new());
        assert!(matches!(
            store.export("empty").unwrap_err(),
            StorageError::Missing { .. }
        ));
    }

    #[test]
    fn test_export_loop_pages() {
        let store = ImageStore::new();
        store.import("k".into(), batch(0, 4));
        store.import("k".into(), batch(4, 3));

        // 7 items in pages of 3: [0,1,2] [3,4,5] [6]
        let page = store.export_loop(" k ", nz(3), 1).unwrap();
        assert_eq!(ids(&page.value), vec![3, 4, 5]);
        assert_eq!(page.loop_idx, 1);
        assert_eq!(page.idx_in_batch, 1);

        let last = store.export_loop("k", nz(3), 2).unwrap();
        assert_eq!(ids(&last.value), vec![6]);

        let err = store.export_loop("k", nz(3), 3).unwrap_err();
        assert!(matches!(
            err,
            StorageError::OutOfRange { index: 3, available: 3, .. }
        ));
    }

    #[test]
    fn test_export_loop_idx_in_batch_formula() {
        let store = ImageStore::new();
        store.import("k".into(), batch(0, 10));

        let page = store.export_loop("k", nz(2), 4).unwrap();
        assert_eq!(page.idx_in_batch, 0);
        let page = store.export_loop("k", nz(4), 2).unwrap();
        assert_eq!(page.idx_in_batch, 2);
    }

    #[test]
    fn test_export_loop_matches_full_export() {
        let store = ImageStore::new();
        store.import("k".into(), batch(0, 5));
        store.import("k".into(), batch(5, 2));
        store.import("k".into(), batch(7, 6));
        let all = ids(&store.export("k").unwrap());

        for size in 1..=14 {
            let pages = store.page_count("k", nz(size)).unwrap();
            let mut seen = Vec::new();
            for i in 0..pages {
                seen.extend(ids(&store.export_loop("k", nz(size), i).unwrap().value));
            }
            assert_eq!(seen, all, "batch_size {size}");
        }
    }

    #[test]
    fn test_reset_selected_keys() {
        let store = ImageStore::new();
        store.import("a".into(), batch(0, 1));
        store.import("b".into(), batch(0, 1));
        store.import("c".into(), batch(0, 1));

        let removed = store.reset(&KeySelection::parse("a, c, missing"));
        assert_eq!(removed, 2);
        assert_eq!(store.keys(), vec![StorageKey::new("b")]);
    }

    #[test]
    fn test_reset_all() {
        let store = ImageStore::new();
        store.import("a".into(), batch(0, 1));
        store.import("b".into(), batch(0, 1));

        assert_eq!(store.reset(&KeySelection::All), 2);
        assert!(store.keys().is_empty());
        assert_eq!(store.reset(&KeySelection::All), 0);
    }

    #[test]
    fn test_replace_discards_previous() {
        let store = ImageStore::new();
        store.import("k".into(), batch(0, 3));
        store.replace("k".into(), vec![batch(9, 1)]);

        assert_eq!(store.item_count("k"), Some(1));
        assert_eq!(ids(&store.export("k").unwrap()), vec![9]);
    }
}
