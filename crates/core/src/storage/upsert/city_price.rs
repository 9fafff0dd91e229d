use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::curated::CityPrice;
use crate::error::IngestionError;
use crate::storage::upsert::UpsertStore;

/// Single business-key upsert on `(reg_id, cod_producto)`.
#[derive(Debug, Clone)]
pub struct CityPriceStore {
    pool: PgPool,
}

impl CityPriceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UpsertStore for CityPriceStore {
    type Record = CityPrice;
    type Key = (i64, i64);

    fn key(&self, record: &CityPrice) -> (i64, i64) {
        (record.reg_id, record.cod_producto)
    }

    async fn existing_keys(&self, keys: &[(i64, i64)]) -> Result<HashSet<(i64, i64)>, IngestionError> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }

        let reg_ids: Vec<i64> = keys.iter().map(|k| k.0).collect();
        let cod_productos: Vec<i64> = keys.iter().map(|k| k.1).collect();

        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT c.reg_id, c.cod_producto \
             FROM city_price c \
             JOIN UNNEST($1::bigint[], $2::bigint[]) AS k(reg_id, cod_producto) \
               ON c.reg_id = k.reg_id AND c.cod_producto = k.cod_producto",
        )
        .bind(&reg_ids)
        .bind(&cod_productos)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    fn stamp_flushed_at(&self, record: &mut CityPrice, now: DateTime<Utc>) {
        record.last_updated = Some(now);
    }

    async fn insert_batch(&self, records: Vec<CityPrice>) -> Result<u64, IngestionError> {
        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO city_price \
                (ingestion_run_id, reg_id, cod_producto, fecha_captura, ciud_nombre, \
                 arti_nombre, fuen_nombre, promedio_kg, minimo_kg, maximo_kg, last_updated) ",
        );
        qb.push_values(&records, |mut b, r| {
            b.push_bind(r.ingestion_run_id)
                .push_bind(r.reg_id)
                .push_bind(r.cod_producto)
                .push_bind(r.fecha_captura)
                .push_bind(&r.ciud_nombre)
                .push_bind(&r.arti_nombre)
                .push_bind(&r.fuen_nombre)
                .push_bind(r.promedio_kg)
                .push_bind(r.minimo_kg)
                .push_bind(r.maximo_kg)
                .push_bind(r.last_updated.expect("flush stamps last_updated immediately before insert_batch"));
        });
        qb.push(" ON CONFLICT (reg_id, cod_producto) DO NOTHING");

        let result = qb.build().persistent(false).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
