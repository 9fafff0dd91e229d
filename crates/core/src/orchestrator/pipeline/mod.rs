pub mod city_price;
pub mod monthly_supply;
pub mod monthly_wholesale;
pub mod partial_market;
pub mod weekly_wholesale;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::method::IngestionMethod;
use crate::domain::reject::Reject;
use crate::domain::run::RunMetrics;
use crate::error::IngestionError;
use crate::soap::SoapSource;

/// Per-method combination of parser, required-field validation, and upsert strategy. A strategy
/// interface selected by a registry map keyed on the method, rather than a base job class with
/// per-method subclasses.
#[async_trait]
pub trait MethodPipeline: Send + Sync {
    async fn run(
        &self,
        soap: &SoapSource,
        method: IngestionMethod,
        run_id: i64,
        batch_size: usize,
        max_child_elements: usize,
        metrics: &mut RunMetrics,
        rejects: &mut Vec<Reject>,
    ) -> Result<(), IngestionError>;
}

pub fn registry(pool: PgPool) -> HashMap<IngestionMethod, Arc<dyn MethodPipeline>> {
    let mut map: HashMap<IngestionMethod, Arc<dyn MethodPipeline>> = HashMap::new();

    map.insert(
        IngestionMethod::PromediosSipsaCiudad,
        Arc::new(city_price::CityPricePipeline::new(pool.clone())),
    );
    map.insert(
        IngestionMethod::PromediosSipsaParcial,
        Arc::new(partial_market::PartialMarketPipeline::new(pool.clone())),
    );
    map.insert(
        IngestionMethod::PromediosSipsaMayorista,
        Arc::new(weekly_wholesale::WeeklyWholesalePipeline::new(pool.clone())),
    );
    map.insert(
        IngestionMethod::PromedioMayoristaSipsaMesMadr,
        Arc::new(monthly_wholesale::MonthlyWholesalePipeline::new(pool.clone())),
    );
    map.insert(
        IngestionMethod::PromedioAbasSipsaMesMadr,
        Arc::new(monthly_supply::MonthlySupplyPipeline::new(pool)),
    );

    map
}
