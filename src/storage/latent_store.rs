//! Latent record storage
//!
//! Imported latent batches are split item by item; each stored record holds
//! one sample and the noise mask paired with it.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{KeySelection, LoopPage, StorageError, StorageKey, StoreKind};
use crate::tensor::Tensor;

/// Latent value as exchanged with the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Latent {
    pub samples: Tensor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_mask: Option<Tensor>,
}

/// Key -> ordered single-item latent records
#[derive(Debug, Default)]
pub struct LatentStore {
    sequences: RwLock<HashMap<StorageKey, Vec<Latent>>>,
}

impl LatentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a latent batch into records and append them
    ///
    /// Sample `i` is paired with mask `i`. When there are fewer masks than
    /// samples, the overflow samples reuse the first mask. Returns the number
    /// of records appended.
    pub fn import(&self, key: StorageKey, latent: &Latent) -> usize {
        let masks = latent
            .noise_mask
            .as_ref()
            .map(Tensor::split_items)
            .unwrap_or_default();

        let records: Vec<Latent> = latent
            .samples
            .split_items()
            .into_iter()
            .enumerate()
            .map(|(i, samples)| Latent {
                samples,
                noise_mask: masks.get(i).or(masks.first()).cloned(),
            })
            .collect();

        let appended = records.len();
        debug!(
            "Latent storage {}: appending {} record(s), {} mask(s)",
            key,
            appended,
            masks.len()
        );
        self.sequences.write().entry(key).or_default().extend(records);
        appended
    }

    /// All records for a key joined back into one latent batch
    ///
    /// Masks are joined only when every record carries one.
    pub fn export(&self, key: &str) -> Result<Latent, StorageError> {
        let sequences = self.sequences.read();
        let records = stored(&sequences, key)?;

        let samples = Tensor::cat(records.iter().map(|r| &r.samples))?;
        let masks: Option<Vec<&Tensor>> = records.iter().map(|r| r.noise_mask.as_ref()).collect();
        let noise_mask = match masks {
            Some(masks) => Some(Tensor::cat(masks)?),
            None => None,
        };

        Ok(Latent { samples, noise_mask })
    }

    /// The record at `loop_idx`
    ///
    /// Records are already single items, so `batch_size` only feeds the
    /// `idx_in_batch` output.
    pub fn export_loop(
        &self,
        key: &str,
        batch_size: NonZeroUsize,
        loop_idx: usize,
    ) -> Result<LoopPage<Latent>, StorageError> {
        let sequences = self.sequences.read();
        let records = stored(&sequences, key)?;

        let record = records.get(loop_idx).ok_or_else(|| StorageError::OutOfRange {
            kind: StoreKind::Latent,
            key: StorageKey::new(key),
            index: loop_idx,
            available: records.len(),
        })?;

        Ok(LoopPage::new(record.clone(), loop_idx, batch_size))
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
        info!("Latent storage reset: removed {} key(s)", removed);
        removed
    }

    /// Record count for a key, `None` if the key is unknown
    pub fn len(&self, key: &str) -> Option<usize> {
        self.sequences.read().get(key.trim()).map(Vec::len)
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

fn stored<'a>(
    sequences: &'a HashMap<StorageKey, Vec<Latent>>,
    key: &str,
) -> Result<&'a [Latent], StorageError> {
    let key = key.trim();
    match sequences.get(key) {
        Some(records) if !records.is_empty() => Ok(records),
        _ => Err(StorageError::Missing {
            kind: StoreKind::Latent,
            key: StorageKey::new(key),
        }),
    }
}
