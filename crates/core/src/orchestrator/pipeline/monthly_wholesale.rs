use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::curated::MonthlyWholesale;
use crate::domain::method::IngestionMethod;
use crate::domain::records::MonthlyWholesaleRecord;
use crate::domain::reject::Reject;
use crate::domain::run::RunMetrics;
use crate::error::IngestionError;
use crate::orchestrator::pipeline::MethodPipeline;
use crate::parse::monthly_wholesale::MonthlyWholesaleParser;
use crate::parse::ParsedRecord;
use crate::soap::SoapSource;
use crate::storage::upsert::monthly_wholesale::{
    MonthlyWholesaleFallbackStore, MonthlyWholesaleTmpIdStore,
};
use crate::storage::upsert::UpsertStore;

pub struct MonthlyWholesalePipeline {
    tmp_store: MonthlyWholesaleTmpIdStore,
    fallback_store: MonthlyWholesaleFallbackStore,
}

impl MonthlyWholesalePipeline {
    pub fn new(pool: PgPool) -> Self {
        Self {
            tmp_store: MonthlyWholesaleTmpIdStore::new(pool.clone()),
            fallback_store: MonthlyWholesaleFallbackStore::new(pool),
        }
    }
}

#[async_trait]
impl MethodPipeline for MonthlyWholesalePipeline {
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
        let mut parser = MonthlyWholesaleParser::new(body, max_child_elements);
        let mut tmp_batch: Vec<MonthlyWholesale> = Vec::new();
        let mut fallback_batch: Vec<MonthlyWholesale> = Vec::new();

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
                        if row.tmp_mayo_mes_id.is_some() {
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
    pipeline: &MonthlyWholesalePipeline,
    tmp_batch: &mut Vec<MonthlyWholesale>,
    fallback_batch: &mut Vec<MonthlyWholesale>,
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

fn build_curated(record: &MonthlyWholesaleRecord, run_id: i64) -> Result<MonthlyWholesale, String> {
    let mut missing = Vec::new();
    if record.arti_id.is_none() {
        missing.push("artiId");
    }
    if record.fuen_id.is_none() {
        missing.push("fuenId");
    }
    if record.fecha_mes_ini.is_none() {
        missing.push("fechaMesIni");
    }
    if !missing.is_empty() {
        return Err(format!("Missing: {}", missing.join(", ")));
    }

    Ok(MonthlyWholesale {
        ingestion_run_id: run_id,
        tmp_mayo_mes_id: record.tmp_mayo_mes_id,
        arti_id: record.arti_id.unwrap(),
        fuen_id: record.fuen_id.unwrap(),
        fecha_mes_ini: record.fecha_mes_ini.unwrap().into_instant(),
        fecha_mes_fin: record.fecha_mes_fin.map(|d| d.into_instant()),
        arti_nombre: record.arti_nombre.clone(),
        fuen_nombre: record.fuen_nombre.clone(),
        promedio_kg: record.promedio_kg,
        last_updated: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fecha_mes_ini_is_rejected() {
        let record = MonthlyWholesaleRecord {
            arti_id: Some(1),
            fuen_id: Some(2),
            ..Default::default()
        };
        let err = build_curated(&record, 1).unwrap_err();
        assert_eq!(err, "Missing: fechaMesIni");
    }
}
