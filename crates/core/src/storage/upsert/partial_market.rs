use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::domain::curated::PartialMarket;
use crate::error::IngestionError;
use crate::storage::upsert::UpsertStore;

/// Computes the dedup hash over `muniId | fuenId | futiId | idArtiSemana | enmaFecha | artiNombre`.
/// `enma_fecha_raw` must be the original text the parser saw, not the materialized instant, so
/// that re-submitting an identical record always produces the same 64-char hex key.
pub fn dedup_hash(
    muni_id: i64,
    fuen_id: i64,
    futi_id: i64,
    id_arti_semana: i64,
    enma_fecha_raw: &str,
    arti_nombre: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(muni_id.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(fuen_id.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(futi_id.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(id_arti_semana.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(enma_fecha_raw.as_bytes());
    hasher.update(b"|");
    hasher.update(arti_nombre.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash-key upsert keyed on `dedup_hash`.
#[derive(Debug, Clone)]
pub struct PartialMarketStore {
    pool: PgPool,
}

impl PartialMarketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UpsertStore for PartialMarketStore {
    type Record = PartialMarket;
    type Key = String;

    fn key(&self, record: &PartialMarket) -> String {
        record.dedup_hash.clone()
    }

    async fn existing_keys(&self, keys: &[String]) -> Result<HashSet<String>, IngestionError> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }

        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT dedup_hash FROM partial_market WHERE dedup_hash = ANY($1)")
                .bind(keys)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(h,)| h).collect())
    }

    fn stamp_flushed_at(&self, record: &mut PartialMarket, now: DateTime<Utc>) {
        record.last_updated = Some(now);
    }

    async fn insert_batch(&self, records: Vec<PartialMarket>) -> Result<u64, IngestionError> {
        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO partial_market \
                (ingestion_run_id, dedup_hash, muni_id, fuen_id, futi_id, id_arti_semana, \
                 enma_fecha, arti_nombre, promedio_kg, last_updated) ",
        );
        qb.push_values(&records, |mut b, r| {
            b.push_bind(r.ingestion_run_id)
                .push_bind(&r.dedup_hash)
                .push_bind(r.muni_id)
                .push_bind(r.fuen_id)
                .push_bind(r.futi_id)
                .push_bind(r.id_arti_semana)
                .push_bind(r.enma_fecha)
                .push_bind(&r.arti_nombre)
                .push_bind(r.promedio_kg)
                .push_bind(r.last_updated.expect("flush stamps last_updated immediately before insert_batch"));
        });
        qb.push(" ON CONFLICT (dedup_hash) DO NOTHING");

        let result = qb.build().persistent(false).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_fields_produce_same_hash() {
        let a = dedup_hash(1, 2, 3, 4, "2026-01-15T00:00:00Z", "Tomate");
        let b = dedup_hash(1, 2, 3, 4, "2026-01-15T00:00:00Z", "Tomate");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn different_raw_fecha_text_changes_the_hash() {
        let a = dedup_hash(1, 2, 3, 4, "2026-01-15T00:00:00Z", "Tomate");
        let b = dedup_hash(1, 2, 3, 4, "2026-01-15T00:00:00.000Z", "Tomate");
        assert_ne!(a, b);
    }
}
