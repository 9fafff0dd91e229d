use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::curated::CityPrice;
use crate::domain::method::IngestionMethod;
use crate::domain::records::CityPriceRecord;
use crate::domain::reject::Reject;
use crate::domain::run::RunMetrics;
use crate::error::IngestionError;
use crate::orchestrator::pipeline::MethodPipeline;
use crate::parse::city_price::CityPriceParser;
use crate::parse::ParsedRecord;
use crate::soap::SoapSource;
use crate::storage::upsert::city_price::CityPriceStore;
use crate::storage::upsert::UpsertStore;

pub struct CityPricePipeline {
    store: CityPriceStore,
}

impl CityPricePipeline {
    pub fn new(pool: PgPool) -> Self {
        Self {
            store: CityPriceStore::new(pool),
        }
    }
}

#[async_trait]
impl MethodPipeline for CityPricePipeline {
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
        let mut parser = CityPriceParser::new(body, max_child_elements);
        let mut batch: Vec<CityPrice> = Vec::with_capacity(batch_size);

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

fn build_curated(record: &CityPriceRecord, run_id: i64) -> Result<CityPrice, String> {
    let mut missing = Vec::new();
    if record.reg_id.is_none() {
        missing.push("regId");
    }
    if record.cod_producto.is_none() {
        missing.push("codProducto");
    }
    if record.fecha_captura.is_none() {
        missing.push("fechaCaptura");
    }
    if !missing.is_empty() {
        return Err(format!("Missing: {}", missing.join(", ")));
    }

    Ok(CityPrice {
        ingestion_run_id: run_id,
        reg_id: record.reg_id.unwrap(),
        cod_producto: record.cod_producto.unwrap(),
        fecha_captura: record.fecha_captura.unwrap().into_instant(),
        ciud_nombre: record.ciud_nombre.clone(),
        arti_nombre: record.arti_nombre.clone(),
        fuen_nombre: record.fuen_nombre.clone(),
        promedio_kg: record.promedio_kg,
        minimo_kg: record.minimo_kg,
        maximo_kg: record.maximo_kg,
        last_updated: None,
    })
}

async fn flush(
    store: &CityPriceStore,
    batch: &mut Vec<CityPrice>,
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
    fn missing_required_field_is_rejected_with_field_name() {
        let record = CityPriceRecord {
            reg_id: None,
            cod_producto: Some(1),
            fecha_captura: Some(crate::domain::records::RawDateTime::EpochMillis(0)),
            ..Default::default()
        };
        let err = build_curated(&record, 1).unwrap_err();
        assert_eq!(err, "Missing: regId");
    }

    #[test]
    fn fully_populated_record_builds_a_curated_row() {
        let record = CityPriceRecord {
            reg_id: Some(10),
            cod_producto: Some(20),
            fecha_captura: Some(crate::domain::records::RawDateTime::EpochMillis(0)),
            promedio_kg: Some(1.5),
            ..Default::default()
        };
        let row = build_curated(&record, 7).unwrap();
        assert_eq!(row.ingestion_run_id, 7);
        assert_eq!(row.reg_id, 10);
        assert_eq!(row.promedio_kg, Some(1.5));
    }
}
