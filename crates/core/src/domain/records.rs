use chrono::{DateTime, TimeZone, Utc};

/// A date-time field tolerant of either ISO-8601 text or an epoch-millis numeric string.
/// Kept as the raw alternative the parser actually saw; only materialized into an absolute
/// `DateTime<Utc>` at upsert time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawDateTime {
    Iso(DateTime<Utc>),
    EpochMillis(i64),
}

impl RawDateTime {
    pub fn into_instant(self) -> DateTime<Utc> {
        match self {
            RawDateTime::Iso(dt) => dt,
            RawDateTime::EpochMillis(ms) => {
                Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
            }
        }
    }
}

/// Parsed "city price" record (method `promediosSipsaCiudad`), best-effort and null-tolerant
/// per field. Required fields for per-record validation: `reg_id`, `cod_producto`,
/// `fecha_captura`.
#[derive(Debug, Clone, Default)]
pub struct CityPriceRecord {
    pub reg_id: Option<i64>,
    pub cod_producto: Option<i64>,
    pub fecha_captura: Option<RawDateTime>,
    pub ciud_nombre: Option<String>,
    pub arti_nombre: Option<String>,
    pub fuen_nombre: Option<String>,
    pub promedio_kg: Option<f64>,
    pub minimo_kg: Option<f64>,
    pub maximo_kg: Option<f64>,
}

/// Parsed "partial market" record (method `promediosSipsaParcial`). Required fields: `muni_id`,
/// `fuen_id`, `futi_id`, `id_arti_semana`, `enma_fecha_raw`. The dedup hash is computed over the
/// *raw* `enma_fecha_raw` text, not the materialized instant.
#[derive(Debug, Clone, Default)]
pub struct PartialMarketRecord {
    pub muni_id: Option<i64>,
    pub fuen_id: Option<i64>,
    pub futi_id: Option<i64>,
    pub id_arti_semana: Option<i64>,
    pub enma_fecha_raw: Option<String>,
    pub arti_nombre: Option<String>,
    pub promedio_kg: Option<f64>,
}

/// Parsed "weekly wholesale" record (method `promediosSipsaMayorista`). Required fields:
/// `arti_id`, `fuen_id`, `fecha_ini`. Dedup: `tmp_mayo_sem_id` if present else
/// `(arti_id, fuen_id, fecha_ini)`.
#[derive(Debug, Clone, Default)]
pub struct WeeklyWholesaleRecord {
    pub tmp_mayo_sem_id: Option<i64>,
    pub arti_id: Option<i64>,
    pub fuen_id: Option<i64>,
    pub fecha_ini: Option<RawDateTime>,
    pub fecha_fin: Option<RawDateTime>,
    pub arti_nombre: Option<String>,
    pub fuen_nombre: Option<String>,
    pub promedio_kg: Option<f64>,
}

/// Parsed "monthly wholesale" record (method `promedioMayoristaSipsaMesMadr`). Required fields:
/// `arti_id`, `fuen_id`, `fecha_mes_ini`. Dedup: `tmp_mayo_mes_id` if present else
/// `(arti_id, fuen_id, fecha_mes_ini)`.
#[derive(Debug, Clone, Default)]
pub struct MonthlyWholesaleRecord {
    pub tmp_mayo_mes_id: Option<i64>,
    pub arti_id: Option<i64>,
    pub fuen_id: Option<i64>,
    pub fecha_mes_ini: Option<RawDateTime>,
    pub fecha_mes_fin: Option<RawDateTime>,
    pub arti_nombre: Option<String>,
    pub fuen_nombre: Option<String>,
    pub promedio_kg: Option<f64>,
}

/// Parsed "monthly supply" record (method `promedioAbasSipsaMesMadr`). Required fields:
/// `arti_id`, `fuen_id`, `fecha_mes_ini` (the raw XML element for this is `fechames`, but it is
/// the same canonical monthly-start date as the wholesale variants). Dedup: `tmp_abas_mes_id`
/// if present else `(arti_id, fuen_id, fecha_mes_ini)`.
#[derive(Debug, Clone, Default)]
pub struct MonthlySupplyRecord {
    pub tmp_abas_mes_id: Option<i64>,
    pub arti_id: Option<i64>,
    pub fuen_id: Option<i64>,
    pub fecha_mes_ini: Option<RawDateTime>,
    pub arti_nombre: Option<String>,
    pub fuen_nombre: Option<String>,
    pub promedio_kg: Option<f64>,
    pub unidad_medida: Option<String>,
}
