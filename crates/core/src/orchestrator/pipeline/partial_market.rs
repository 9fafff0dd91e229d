use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::curated::PartialMarket;
use crate::domain::method::IngestionMethod;
use crate::domain::records::PartialMarketRecord;
use crate::domain::reject::Reject;
use crate::domain::run::RunMetrics;
use crate::error::IngestionError;
use crate::orchestrator::pipeline::MethodPipeline;
use crate::parse::{parse_datetime, partial_market::PartialMarketParser, ParsedRecord};
use crate::soap::SoapSource;
use crate::storage::upsert::partial_market::{dedup_hash, PartialMarketStore};
use crate::storage::upsert::UpsertStore;

pub struct PartialMarketPipeline {
    store: PartialMarketStore,
}

impl PartialMarketPipeline {
    pub fn new(pool: PgPool) -> Self {
        Self {
            store: PartialMarketStore::new(pool),
        }
    }
}

#[async_trait]
impl MethodPipeline for PartialMarketPipeline {
    async fn run(
        &self,
        soap: &SoapSource,
        method: IngestionMethod,
        run_id: i64,
        batch_size: usize,
        max_child_elements: usize,
        metrics: &mut RunMetrics,
        rejects: &mut Vec<Reject>,
    ) -> Result<(), IngestionError> {
        let body = soap.stream(method).await?;
        let mut parser = PartialMarketParser::new(body, max_child_elements);
        let mut batch: Vec<PartialMarket> = Vec::with_capacity(batch_size);

        while let Some(outcome) = parser.next().await? {
            metrics.record_seen();
            match outcome {
                ParsedRecord::Malformed { raw_data, reason } => {
                    rejects.push(Reject {
                        raw_data,
                        reason,
                        is_parse_error: true,
                    });
                    metrics.record_rejected();
                }
                ParsedRecord::Record(record) => match build_curated(&record, run_id) {
                    Ok(row) => batch.push(row),
                    Err(reason) => {
                        rejects.push(Reject {
                            raw_data: format!("{record:?}"),
                            reason,
                            is_parse_error: false,
                        });
                        metrics.record_rejected();
                    }
                },
            }

            if batch.len() >= batch_size {
                flush(&self.store, &mut batch, metrics).await?;
            }
        }

        flush(&self.store, &mut batch, metrics).await?;
        Ok(())
    }
}

fn build_curated(record: &PartialMarketRecord, run_id: i64) -> Result<PartialMarket, String> {
    let mut missing = Vec::new();
    if record.muni_id.is_none() {
        missing.push("muniId");
    }
    if record.fuen_id.is_none() {
        missing.push("fuenId");
    }
    if record.futi_id.is_none() {
        missing.push("futiId");
    }
    if record.id_arti_semana.is_none() {
        missing.push("idArtiSemana");
    }
    if record.enma_fecha_raw.is_none() {
        missing.push("enmaFecha");
    }
    if !missing.is_empty() {
        return Err(format!("Missing: {}", missing.join(", ")));
    }

    let raw_fecha = record.enma_fecha_raw.as_deref().unwrap();
    let enma_fecha = parse_datetime(raw_fecha)
        .ok_or_else(|| "Missing: enmaFecha (unparseable)".to_string())?
        .into_instant();
    let arti_nombre = record.arti_nombre.as_deref().unwrap_or("");

    let muni_id = record.muni_id.unwrap();
    let fuen_id = record.fuen_id.unwrap();
    let futi_id = record.futi_id.unwrap();
    let id_arti_semana = record.id_arti_semana.unwrap();

    Ok(PartialMarket {
        ingestion_run_id: run_id,
        dedup_hash: dedup_hash(
            muni_id,
            fuen_id,
            futi_id,
            id_arti_semana,
            raw_fecha,
            arti_nombre,
        ),
        muni_id,
        fuen_id,
        futi_id,
        id_arti_semana,
        enma_fecha,
        arti_nombre: record.arti_nombre.clone(),
        promedio_kg: record.promedio_kg,
        last_updated: None,
    })
}

async fn flush(
    store: &PartialMarketStore,
    batch: &mut Vec<PartialMarket>,
    metrics: &mut RunMetrics,
) -> Result<(), IngestionError> {
    if batch.is_empty() {
        return Ok(());
    }
    let taken = std::mem::take(batch);
    let outcome = store.flush(taken).await?;
    metrics.record_inserted(outcome.inserted);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_any_required_field_yields_a_reject_reason() {
        let record = PartialMarketRecord {
            muni_id: Some(1),
            fuen_id: None,
            futi_id: Some(3),
            id_arti_semana: Some(4),
            enma_fecha_raw: Some("2026-01-15T00:00:00Z".to_string()),
            ..Default::default()
        };
        let err = build_curated(&record, 1).unwrap_err();
        assert_eq!(err, "Missing: fuenId");
    }

    #[test]
    fn identical_records_hash_to_the_same_dedup_key() {
        let record = PartialMarketRecord {
            muni_id: Some(1),
            fuen_id: Some(2),
            futi_id: Some(3),
            id_arti_semana: Some(4),
            enma_fecha_raw: Some("2026-01-15T00:00:00Z".to_string()),
            arti_nombre: Some("Tomate".to_string()),
            ..Default::default()
        };
        let a = build_curated(&record, 1).unwrap();
        let b = build_curated(&record, 2).unwrap();
        assert_eq!(a.dedup_hash, b.dedup_hash);
    }
}
