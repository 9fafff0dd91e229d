use chrono::Utc;
use sipsa_core::domain::curated::{CityPrice, PartialMarket};
use sipsa_core::storage::upsert::city_price::CityPriceStore;
use sipsa_core::storage::upsert::partial_market::{dedup_hash, PartialMarketStore};
use sipsa_core::storage::upsert::UpsertStore;
use sipsa_core::storage::ControlStore;
use sqlx::PgPool;

async fn seed_run(pool: &PgPool) -> i64 {
    use sipsa_core::domain::run::{CreateRunRequest, RequestSource};

    ControlStore::new(pool.clone())
        .create_or_restart_run(&CreateRunRequest {
            method_name: "promediosSipsaCiudad".to_string(),
            window_key: "2026-07-29".to_string(),
            request_id: "seed".to_string(),
            request_source: RequestSource::Manual,
            force: false,
        })
        .await
        .unwrap()
}

fn city_price(run_id: i64, reg_id: i64, cod_producto: i64) -> CityPrice {
    let now = Utc::now();
    CityPrice {
        ingestion_run_id: run_id,
        reg_id,
        cod_producto,
        fecha_captura: now,
        ciud_nombre: Some("Bogota".to_string()),
        arti_nombre: Some("Papa criolla".to_string()),
        fuen_nombre: Some("Corabastos".to_string()),
        promedio_kg: Some(1800.0),
        minimo_kg: Some(1500.0),
        maximo_kg: Some(2100.0),
        last_updated: None,
    }
}

#[sqlx::test]
async fn city_price_flush_skips_existing_business_key(pool: PgPool) {
    let run_id = seed_run(&pool).await;
    let store = CityPriceStore::new(pool.clone());

    let first = store.flush(vec![city_price(run_id, 1, 100)]).await.unwrap();
    assert_eq!((first.inserted, first.skipped), (1, 0));

    let second = store.flush(vec![city_price(run_id, 1, 100)]).await.unwrap();
    assert_eq!(
        (second.inserted, second.skipped),
        (0, 1),
        "a repeated (reg_id, cod_producto) must be skipped, not re-inserted"
    );

    let count: (i64,) = sqlx::query_as("SELECT count(*) FROM city_price")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 1);
}

#[sqlx::test]
async fn city_price_flush_dedupes_within_one_batch_keeping_last(pool: PgPool) {
    let run_id = seed_run(&pool).await;
    let store = CityPriceStore::new(pool.clone());

    let mut first = city_price(run_id, 2, 200);
    first.promedio_kg = Some(1000.0);
    let mut second = city_price(run_id, 2, 200);
    second.promedio_kg = Some(2000.0);

    let outcome = store.flush(vec![first, second]).await.unwrap();
    assert_eq!((outcome.inserted, outcome.skipped), (1, 0));

    let row: (Option<f64>,) = sqlx::query_as(
        "SELECT promedio_kg FROM city_price WHERE reg_id = 2 AND cod_producto = 200",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(row.0, Some(2000.0), "the last occurrence in a batch wins the in-batch dedup");
}

#[sqlx::test]
async fn partial_market_flush_dedupes_on_content_hash(pool: PgPool) {
    let run_id = seed_run(&pool).await;
    let store = PartialMarketStore::new(pool.clone());
    let now = Utc::now();

    let hash = dedup_hash(10, 20, 30, 40, "2026-07-29T00:00:00Z", "Tomate chonto");
    let row = PartialMarket {
        ingestion_run_id: run_id,
        dedup_hash: hash.clone(),
        muni_id: 10,
        fuen_id: 20,
        futi_id: 30,
        id_arti_semana: 40,
        enma_fecha: now,
        arti_nombre: Some("Tomate chonto".to_string()),
        promedio_kg: Some(900.0),
        last_updated: None,
    };

    let first = store.flush(vec![row.clone()]).await.unwrap();
    assert_eq!((first.inserted, first.skipped), (1, 0));

    let second = store.flush(vec![row]).await.unwrap();
    assert_eq!((second.inserted, second.skipped), (0, 1));
}
