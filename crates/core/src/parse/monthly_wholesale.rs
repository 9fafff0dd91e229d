use tokio::io::AsyncBufRead;

use crate::domain::records::MonthlyWholesaleRecord;
use crate::error::IngestionError;
use crate::parse::{parse_datetime, parse_decimal, parse_int, ParsedRecord, RecordBuilder, XmlRecordReader};

impl RecordBuilder for MonthlyWholesaleRecord {
    fn apply_field(&mut self, name: &str, text: &str) {
        match name {
            "tmpmayomesid" => self.tmp_mayo_mes_id = parse_int(text),
            "artiid" => self.arti_id = parse_int(text),
            "fuenid" => self.fuen_id = parse_int(text),
            "fechamesini" => self.fecha_mes_ini = parse_datetime(text),
            "fechamesfin" => self.fecha_mes_fin = parse_datetime(text),
            "artinombre" => self.arti_nombre = Some(text.to_string()),
            "fuennombre" => self.fuen_nombre = Some(text.to_string()),
            "promediokg" => self.promedio_kg = parse_decimal(text),
            _ => {}
        }
    }
}

/// Streaming pull parser for `promedioMayoristaSipsaMesMadr`.
pub struct MonthlyWholesaleParser<R> {
    reader: XmlRecordReader<R>,
}

impl<R> MonthlyWholesaleParser<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(inner: R, max_child_elements: usize) -> Self {
        Self {
            reader: XmlRecordReader::new(inner, max_child_elements),
        }
    }

    pub async fn next(&mut self) -> Result<Option<ParsedRecord<MonthlyWholesaleRecord>>, IngestionError> {
        self.reader.next_record::<MonthlyWholesaleRecord>().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_monthly_window_bounds() {
        let xml = br#"<return>
            <tmpMayoMesId>9</tmpMayoMesId>
            <artiId>1</artiId>
            <fuenId>2</fuenId>
            <fechaMesIni>2026-01-01T00:00:00Z</fechaMesIni>
            <fechaMesFin>2026-01-31T00:00:00Z</fechaMesFin>
            <promedioKg>1800.25</promedioKg>
        </return>"#;

        let mut parser = MonthlyWholesaleParser::new(&xml[..], 64);
        let ParsedRecord::Record(record) = parser.next().await.unwrap().unwrap() else {
            panic!("expected a well-formed record");
        };
        assert_eq!(record.tmp_mayo_mes_id, Some(9));
        assert!(record.fecha_mes_ini.is_some());
        assert!(record.fecha_mes_fin.is_some());
        assert_eq!(record.promedio_kg, Some(1800.25));
    }

    #[tokio::test]
    async fn missing_required_fields_stay_none_rather_than_failing() {
        let xml = br#"<return>
            <artiNombre>Arroz</artiNombre>
        </return>"#;

        let mut parser = MonthlyWholesaleParser::new(&xml[..], 64);
        let ParsedRecord::Record(record) = parser.next().await.unwrap().unwrap() else {
            panic!("expected a well-formed record");
        };
        assert_eq!(record.arti_id, None);
        assert_eq!(record.fecha_mes_ini, None);
        assert_eq!(record.arti_nombre.as_deref(), Some("Arroz"));
    }
}
