use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::curated::MonthlySupply;
use crate::error::IngestionError;
use crate::storage::upsert::UpsertStore;

/// Temporary-id branch: records that carry `tmp_abas_mes_id`, keyed on `ux_monthly_supply_tmp`.
#[derive(Debug, Clone)]
pub struct MonthlySupplyTmpIdStore {
    pool: PgPool,
}

impl MonthlySupplyTmpIdStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UpsertStore for MonthlySupplyTmpIdStore {
    type Record = MonthlySupply;
    type Key = i64;

    fn key(&self, record: &MonthlySupply) -> i64 {
        record.tmp_abas_mes_id.expect("caller must route tmp-id records only")
    }

    async fn existing_keys(&self, keys: &[i64]) -> Result<HashSet<i64>, IngestionError> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }

        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT tmp_abas_mes_id FROM monthly_supply WHERE tmp_abas_mes_id = ANY($1)",
        )
        .bind(keys)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(k,)| k).collect())
    }

    fn stamp_flushed_at(&self, record: &mut MonthlySupply, now: DateTime<Utc>) {
        record.last_updated = Some(now);
    }

    async fn insert_batch(&self, records: Vec<MonthlySupply>) -> Result<u64, IngestionError> {
        insert_monthly_supply_batch(&self.pool, &records, "ux_monthly_supply_tmp").await
    }
}

/// Fallback branch: records without a temporary id, keyed on `(arti_id, fuen_id, fecha_mes_ini)`
/// against `ux_monthly_supply_fallback`.
#[derive(Debug, Clone)]
pub struct MonthlySupplyFallbackStore {
    pool: PgPool,
}

impl MonthlySupplyFallbackStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UpsertStore for MonthlySupplyFallbackStore {
    type Record = MonthlySupply;
    type Key = (i64, i64, DateTime<Utc>);

    fn key(&self, record: &MonthlySupply) -> (i64, i64, DateTime<Utc>) {
        (record.arti_id, record.fuen_id, record.fecha_mes_ini)
    }

    async fn existing_keys(
        &self,
        keys: &[(i64, i64, DateTime<Utc>)],
    ) -> Result<HashSet<(i64, i64, DateTime<Utc>)>, IngestionError> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }

        let arti_ids: Vec<i64> = keys.iter().map(|k| k.0).collect();
        let fuen_ids: Vec<i64> = keys.iter().map(|k| k.1).collect();
        let fechas: Vec<DateTime<Utc>> = keys.iter().map(|k| k.2).collect();

        let rows: Vec<(i64, i64, DateTime<Utc>)> = sqlx::query_as(
            "SELECT s.arti_id, s.fuen_id, s.fecha_mes_ini \
             FROM monthly_supply s \
             JOIN UNNEST($1::bigint[], $2::bigint[], $3::timestamptz[]) AS k(arti_id, fuen_id, fecha_mes_ini) \
               ON s.arti_id = k.arti_id AND s.fuen_id = k.fuen_id AND s.fecha_mes_ini = k.fecha_mes_ini \
             WHERE s.tmp_abas_mes_id IS NULL",
        )
        .bind(&arti_ids)
        .bind(&fuen_ids)
        .bind(&fechas)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    fn stamp_flushed_at(&self, record: &mut MonthlySupply, now: DateTime<Utc>) {
        record.last_updated = Some(now);
    }

    async fn insert_batch(&self, records: Vec<MonthlySupply>) -> Result<u64, IngestionError> {
        insert_monthly_supply_batch(&self.pool, &records, "ux_monthly_supply_fallback").await
    }
}

async fn insert_monthly_supply_batch(
    pool: &PgPool,
    records: &[MonthlySupply],
    conflict_constraint: &str,
) -> Result<u64, IngestionError> {
    let mut qb = sqlx::QueryBuilder::new(
        "INSERT INTO monthly_supply \
            (ingestion_run_id, tmp_abas_mes_id, arti_id, fuen_id, fecha_mes_ini, \
             arti_nombre, fuen_nombre, promedio_kg, unidad_medida, last_updated) ",
    );
    qb.push_values(records, |mut b, r| {
        b.push_bind(r.ingestion_run_id)
            .push_bind(r.tmp_abas_mes_id)
            .push_bind(r.arti_id)
            .push_bind(r.fuen_id)
            .push_bind(r.fecha_mes_ini)
            .push_bind(&r.arti_nombre)
            .push_bind(&r.fuen_nombre)
            .push_bind(r.promedio_kg)
            .push_bind(&r.unidad_medida)
            .push_bind(r.last_updated.expect("flush stamps last_updated immediately before insert_batch"));
    });
    qb.push(" ON CONFLICT ON CONSTRAINT ")
        .push(conflict_constraint)
        .push(" DO NOTHING");

    let result = qb.build().persistent(false).execute(pool).await?;
    Ok(result.rows_affected())
}
