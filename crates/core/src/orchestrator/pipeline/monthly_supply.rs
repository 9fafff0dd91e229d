use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::curated::MonthlySupply;
use crate::domain::method::IngestionMethod;
use crate::domain::records::MonthlySupplyRecord;
use crate::domain::reject::Reject;
use crate::domain::run::RunMetrics;
use crate::error::IngestionError;
use crate::orchestrator::pipeline::MethodPipeline;
use crate::parse::monthly_supply::MonthlySupplyParser;
use crate::parse::ParsedRecord;
use crate::soap::SoapSource;
use crate::storage::upsert::monthly_supply::{MonthlySupplyFallbackStore, MonthlySupplyTmpIdStore};
use crate::storage::upsert::UpsertStore;

pub struct MonthlySupplyPipeline {
    tmp_store: MonthlySupplyTmpIdStore,
    fallback_store: MonthlySupplyFallbackStore,
}

impl MonthlySupplyPipeline {
    pub fn new(pool: PgPool) -> Self {
        Self {
            tmp_store: MonthlySupplyTmpIdStore::new(pool.clone()),
            fallback_store: MonthlySupplyFallbackStore::new(pool),
        }
    }
}

#[async_trait]
impl MethodPipeline for MonthlySupplyPipeline {
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
        let mut parser = MonthlySupplyParser::new(body, max_child_elements);
        let mut tmp_batch: Vec<MonthlySupply> = Vec::new();
        let mut fallback_batch: Vec<MonthlySupply> = Vec::new();

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
                    Ok(row) => {
                        if row.tmp_abas_mes_id.is_some() {
                            tmp_batch.push(row);
                        } else {
                            fallback_batch.push(row);
                        }
                    }
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

            if tmp_batch.len() + fallback_batch.len() >= batch_size {
                flush_both(self, &mut tmp_batch, &mut fallback_batch, metrics).await?;
            }
        }

        flush_both(self, &mut tmp_batch, &mut fallback_batch, metrics).await?;
        Ok(())
    }
}

async fn flush_both(
    pipeline: &MonthlySupplyPipeline,
    tmp_batch: &mut Vec<MonthlySupply>,
    fallback_batch: &mut Vec<MonthlySupply>,
    metrics: &mut RunMetrics,
) -> Result<(), IngestionError> {
    if !tmp_batch.is_empty() {
        let taken = std::mem::take(tmp_batch);
        let outcome = pipeline.tmp_store.flush(taken).await?;
        metrics.record_inserted(outcome.inserted);
    }
    if !fallback_batch.is_empty() {
        let taken = std::mem::take(fallback_batch);
        let outcome = pipeline.fallback_store.flush(taken).await?;
        metrics.record_inserted(outcome.inserted);
    }
    Ok(())
}

fn build_curated(record: &MonthlySupplyRecord, run_id: i64) -> Result<MonthlySupply, String> {
    let mut missing = Vec::new();
    if record.arti_id.is_none() {
        missing.push("artiId");
    }
    if record.fuen_id.is_none() {
        missing.push("fuenId");
    }
    if record.fecha_mes_ini.is_none() {
        missing.push("fechaMes");
    }
    if !missing.is_empty() {
        return Err(format!("Missing: {}", missing.join(", ")));
    }

    Ok(MonthlySupply {
        ingestion_run_id: run_id,
        tmp_abas_mes_id: record.tmp_abas_mes_id,
        arti_id: record.arti_id.unwrap(),
        fuen_id: record.fuen_id.unwrap(),
        fecha_mes_ini: record.fecha_mes_ini.unwrap().into_instant(),
        arti_nombre: record.arti_nombre.clone(),
        fuen_nombre: record.fuen_nombre.clone(),
        promedio_kg: record.promedio_kg,
        unidad_medida: record.unidad_medida.clone(),
        last_updated: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fecha_mes_is_rejected() {
        let record = MonthlySupplyRecord {
            arti_id: Some(1),
            fuen_id: Some(2),
            ..Default::default()
        };
        let err = build_curated(&record, 1).unwrap_err();
        assert_eq!(err, "Missing: fechaMes");
    }
}
