use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::curated::WeeklyWholesale;
use crate::domain::method::IngestionMethod;
use crate::domain::records::WeeklyWholesaleRecord;
use crate::domain::reject::Reject;
use crate::domain::run::RunMetrics;
use crate::error::IngestionError;
use crate::orchestrator::pipeline::MethodPipeline;
use crate::parse::weekly_wholesale::WeeklyWholesaleParser;
use crate::parse::ParsedRecord;
use crate::soap::SoapSource;
use crate::storage::upsert::weekly_wholesale::{WeeklyWholesaleFallbackStore, WeeklyWholesaleTmpIdStore};
use crate::storage::upsert::UpsertStore;

/// Routes each record to the temporary-id branch if `tmp_mayo_sem_id` is present, else to the
/// `(arti_id, fuen_id, fecha_ini)` fallback branch. Both branches run the same batching algorithm
/// against their own unique constraint.
pub struct WeeklyWholesalePipeline {
    tmp_store: WeeklyWholesaleTmpIdStore,
    fallback_store: WeeklyWholesaleFallbackStore,
}

impl WeeklyWholesalePipeline {
    pub fn new(pool: PgPool) -> Self {
        Self {
            tmp_store: WeeklyWholesaleTmpIdStore::new(pool.clone()),
            fallback_store: WeeklyWholesaleFallbackStore::new(pool),
        }
    }
}

#[async_trait]
impl MethodPipeline for WeeklyWholesalePipeline {
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
        let mut parser = WeeklyWholesaleParser::new(body, max_child_elements);
        let mut tmp_batch: Vec<WeeklyWholesale> = Vec::new();
        let mut fallback_batch: Vec<WeeklyWholesale> = Vec::new();

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
                        if row.tmp_mayo_sem_id.is_some() {
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
    pipeline: &WeeklyWholesalePipeline,
    tmp_batch: &mut Vec<WeeklyWholesale>,
    fallback_batch: &mut Vec<WeeklyWholesale>,
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

fn build_curated(record: &WeeklyWholesaleRecord, run_id: i64) -> Result<WeeklyWholesale, String> {
    let mut missing = Vec::new();
    if record.arti_id.is_none() {
        missing.push("artiId");
    }
    if record.fuen_id.is_none() {
        missing.push("fuenId");
    }
    if record.fecha_ini.is_none() {
        missing.push("fechaIni");
    }
    if !missing.is_empty() {
        return Err(format!("Missing: {}", missing.join(", ")));
    }

    Ok(WeeklyWholesale {
        ingestion_run_id: run_id,
        tmp_mayo_sem_id: record.tmp_mayo_sem_id,
        arti_id: record.arti_id.unwrap(),
        fuen_id: record.fuen_id.unwrap(),
        fecha_ini: record.fecha_ini.unwrap().into_instant(),
        fecha_fin: record.fecha_fin.map(|d| d.into_instant()),
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
    fn presence_of_tmp_id_is_preserved_for_routing() {
        let record = WeeklyWholesaleRecord {
            tmp_mayo_sem_id: Some(99),
            arti_id: Some(1),
            fuen_id: Some(2),
            fecha_ini: Some(crate::domain::records::RawDateTime::EpochMillis(0)),
            ..Default::default()
        };
        let row = build_curated(&record, 1).unwrap();
        assert_eq!(row.tmp_mayo_sem_id, Some(99));
    }

    #[test]
    fn absence_of_tmp_id_routes_to_fallback() {
        let record = WeeklyWholesaleRecord {
            arti_id: Some(1),
            fuen_id: Some(2),
            fecha_ini: Some(crate::domain::records::RawDateTime::EpochMillis(0)),
            ..Default::default()
        };
        let row = build_curated(&record, 1).unwrap();
        assert_eq!(row.tmp_mayo_sem_id, None);
    }
}
