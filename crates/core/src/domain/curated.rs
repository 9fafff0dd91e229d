use chrono::{DateTime, Utc};

/// Curated "city price" row, deduplicated on `(reg_id, cod_producto)`.
#[derive(Debug, Clone)]
pub struct CityPrice {
    pub ingestion_run_id: i64,
    pub reg_id: i64,
    pub cod_producto: i64,
    pub fecha_captura: DateTime<Utc>,
    pub ciud_nombre: Option<String>,
    pub arti_nombre: Option<String>,
    pub fuen_nombre: Option<String>,
    pub promedio_kg: Option<f64>,
    pub minimo_kg: Option<f64>,
    pub maximo_kg: Option<f64>,
    /// Stamped by `UpsertStore::flush` immediately before `insert_batch`, not at parse time.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Curated "partial market" row, deduplicated on a SHA-256 hash key.
#[derive(Debug, Clone)]
pub struct PartialMarket {
    pub ingestion_run_id: i64,
    pub dedup_hash: String,
    pub muni_id: i64,
    pub fuen_id: i64,
    pub futi_id: i64,
    pub id_arti_semana: i64,
    pub enma_fecha: DateTime<Utc>,
    pub arti_nombre: Option<String>,
    pub promedio_kg: Option<f64>,
    /// Stamped by `UpsertStore::flush` immediately before `insert_batch`, not at parse time.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Curated "weekly wholesale" row. Dual dedup strategy: `tmp_mayo_sem_id` if present else
/// `(arti_id, fuen_id, fecha_ini)`.
#[derive(Debug, Clone)]
pub struct WeeklyWholesale {
    pub ingestion_run_id: i64,
    pub tmp_mayo_sem_id: Option<i64>,
    pub arti_id: i64,
    pub fuen_id: i64,
    pub fecha_ini: DateTime<Utc>,
    pub fecha_fin: Option<DateTime<Utc>>,
    pub arti_nombre: Option<String>,
    pub fuen_nombre: Option<String>,
    pub promedio_kg: Option<f64>,
    /// Stamped by `UpsertStore::flush` immediately before `insert_batch`, not at parse time.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Curated "monthly wholesale" row. Dual dedup strategy: `tmp_mayo_mes_id` if present else
/// `(arti_id, fuen_id, fecha_mes_ini)`.
#[derive(Debug, Clone)]
pub struct MonthlyWholesale {
    pub ingestion_run_id: i64,
    pub tmp_mayo_mes_id: Option<i64>,
    pub arti_id: i64,
    pub fuen_id: i64,
    pub fecha_mes_ini: DateTime<Utc>,
    pub fecha_mes_fin: Option<DateTime<Utc>>,
    pub arti_nombre: Option<String>,
    pub fuen_nombre: Option<String>,
    pub promedio_kg: Option<f64>,
    /// Stamped by `UpsertStore::flush` immediately before `insert_batch`, not at parse time.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Curated "monthly supply" row. Dual dedup strategy: `tmp_abas_mes_id` if present else
/// `(arti_id, fuen_id, fecha_mes_ini)`.
#[derive(Debug, Clone)]
pub struct MonthlySupply {
    pub ingestion_run_id: i64,
    pub tmp_abas_mes_id: Option<i64>,
    pub arti_id: i64,
    pub fuen_id: i64,
    pub fecha_mes_ini: DateTime<Utc>,
    pub arti_nombre: Option<String>,
    pub fuen_nombre: Option<String>,
    pub promedio_kg: Option<f64>,
    pub unidad_medida: Option<String>,
    /// Stamped by `UpsertStore::flush` immediately before `insert_batch`, not at parse time.
    pub last_updated: Option<DateTime<Utc>>,
}
