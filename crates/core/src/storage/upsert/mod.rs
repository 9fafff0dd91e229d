pub mod city_price;
pub mod monthly_supply;
pub mod monthly_wholesale;
pub mod partial_market;
pub mod weekly_wholesale;

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::IngestionError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    pub inserted: i64,
    pub skipped: i64,
}

/// Insert-if-absent, skip-if-present store for one curated table (or one branch of a
/// dual-strategy table). `flush` implements the shared four-step algorithm; implementors
/// only need to supply the dedup key, a bulk existence probe, and a bulk insert.
#[async_trait]
pub trait UpsertStore: Send + Sync {
    type Record: Send;
    type Key: Eq + Hash + Clone + Send + Sync;

    fn key(&self, record: &Self::Record) -> Self::Key;

    async fn existing_keys(&self, keys: &[Self::Key]) -> Result<HashSet<Self::Key>, IngestionError>;

    async fn insert_batch(&self, records: Vec<Self::Record>) -> Result<u64, IngestionError>;

    /// Stamps the row's `last_updated`/`fecha_ingestion` field with `now`. Called by the default
    /// `flush` immediately before `insert_batch`, so a row's timestamp reflects when it was
    /// actually written, not when it was parsed out of the SOAP response.
    fn stamp_flushed_at(&self, record: &mut Self::Record, now: DateTime<Utc>);

    /// Collapses `batch` to unique keys (keeping the last occurrence of each), probes which keys
    /// already exist, and bulk-inserts the rest. `updated` is always zero: existing rows are never
    /// modified, matching the skip-on-conflict policy shared by every curated table.
    async fn flush(&self, batch: Vec<Self::Record>) -> Result<FlushOutcome, IngestionError> {
        if batch.is_empty() {
            return Ok(FlushOutcome::default());
        }

        let mut deduped: HashMap<Self::Key, Self::Record> = HashMap::with_capacity(batch.len());
        for record in batch {
            deduped.insert(self.key(&record), record);
        }

        let keys: Vec<Self::Key> = deduped.keys().cloned().collect();
        let existing = self.existing_keys(&keys).await?;

        let mut skipped: i64 = 0;
        let mut to_insert = Vec::with_capacity(deduped.len());
        for (key, record) in deduped {
            if existing.contains(&key) {
                skipped += 1;
            } else {
                to_insert.push(record);
            }
        }

        let inserted = if to_insert.is_empty() {
            0
        } else {
            let now = Utc::now();
            for record in &mut to_insert {
                self.stamp_flushed_at(record, now);
            }
            self.insert_batch(to_insert).await?
        };

        Ok(FlushOutcome {
            inserted: inserted as i64,
            skipped,
        })
    }
}
