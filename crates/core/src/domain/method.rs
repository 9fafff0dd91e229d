use std::fmt;

/// The five pull categories. A tagged enum rather than a class hierarchy, per the "inheritance
/// for handlers" redesign note: each variant carries its own window classification, parser, and
/// upsert strategy, selected by `match` instead of dynamic dispatch through a base job class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IngestionMethod {
    PromediosSipsaCiudad,
    PromediosSipsaParcial,
    PromediosSipsaMayorista,
    PromedioMayoristaSipsaMesMadr,
    PromedioAbasSipsaMesMadr,
}

impl IngestionMethod {
    pub const ALL: [IngestionMethod; 5] = [
        IngestionMethod::PromediosSipsaCiudad,
        IngestionMethod::PromediosSipsaParcial,
        IngestionMethod::PromediosSipsaMayorista,
        IngestionMethod::PromedioMayoristaSipsaMesMadr,
        IngestionMethod::PromedioAbasSipsaMesMadr,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IngestionMethod::PromediosSipsaCiudad => "promediosSipsaCiudad",
            IngestionMethod::PromediosSipsaParcial => "promediosSipsaParcial",
            IngestionMethod::PromediosSipsaMayorista => "promediosSipsaMayorista",
            IngestionMethod::PromedioMayoristaSipsaMesMadr => "promedioMayoristaSipsaMesMadr",
            IngestionMethod::PromedioAbasSipsaMesMadr => "promedioAbasSipsaMesMadr",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str().eq_ignore_ascii_case(name))
    }

    /// The daily batch fires these three methods in this order.
    pub fn daily_batch() -> [IngestionMethod; 3] {
        [
            IngestionMethod::PromediosSipsaCiudad,
            IngestionMethod::PromediosSipsaParcial,
            IngestionMethod::PromediosSipsaMayorista,
        ]
    }

    /// `monthly` iff the method name matches the configured monthly pattern (contains `mesmadr`
    /// or `abas`, case-insensitive); `daily` otherwise.
    pub fn is_monthly(self) -> bool {
        let lower = self.as_str().to_ascii_lowercase();
        lower.contains("mesmadr") || lower.contains("abas")
    }

    pub fn available_methods() -> Vec<&'static str> {
        Self::ALL.iter().map(|m| m.as_str()).collect()
    }
}

impl fmt::Display for IngestionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_methods_case_insensitively() {
        assert_eq!(
            IngestionMethod::parse("PROMEDIOSSIPSACIUDAD"),
            Some(IngestionMethod::PromediosSipsaCiudad)
        );
        assert_eq!(IngestionMethod::parse("bogus"), None);
    }

    #[test]
    fn classifies_monthly_methods() {
        assert!(IngestionMethod::PromedioMayoristaSipsaMesMadr.is_monthly());
        assert!(IngestionMethod::PromedioAbasSipsaMesMadr.is_monthly());
        assert!(!IngestionMethod::PromediosSipsaCiudad.is_monthly());
        assert!(!IngestionMethod::PromediosSipsaParcial.is_monthly());
        assert!(!IngestionMethod::PromediosSipsaMayorista.is_monthly());
    }
}
