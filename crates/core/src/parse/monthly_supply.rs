use tokio::io::AsyncBufRead;

use crate::domain::records::MonthlySupplyRecord;
use crate::error::IngestionError;
use crate::parse::{parse_datetime, parse_decimal, parse_int, ParsedRecord, RecordBuilder, XmlRecordReader};

impl RecordBuilder for MonthlySupplyRecord {
    fn apply_field(&mut self, name: &str, text: &str) {
        match name {
            "tmpabasmesid" => self.tmp_abas_mes_id = parse_int(text),
            "artiid" => self.arti_id = parse_int(text),
            "fuenid" => self.fuen_id = parse_int(text),
            "fechames" => self.fecha_mes_ini = parse_datetime(text),
            "artinombre" => self.arti_nombre = Some(text.to_string()),
            "fuennombre" => self.fuen_nombre = Some(text.to_string()),
            "promediokg" => self.promedio_kg = parse_decimal(text),
            "unidadmedida" => self.unidad_medida = Some(text.to_string()),
            _ => {}
        }
    }
}

/// Streaming pull parser for `promedioAbasSipsaMesMadr`.
pub struct MonthlySupplyParser<R> {
    reader: XmlRecordReader<R>,
}

impl<R> MonthlySupplyParser<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(inner: R, max_child_elements: usize) -> Self {
        Self {
            reader: XmlRecordReader::new(inner, max_child_elements),
        }
    }

    pub async fn next(&mut self) -> Result<Option<ParsedRecord<MonthlySupplyRecord>>, IngestionError> {
        self.reader.next_record::<MonthlySupplyRecord>().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_supply_unit_alongside_weight() {
        let xml = br#"<return>
            <tmpAbasMesId>3</tmpAbasMesId>
            <artiId>1</artiId>
            <fuenId>2</fuenId>
            <fechaMes>2026-02-01T00:00:00Z</fechaMes>
            <unidadMedida>Toneladas</unidadMedida>
            <promedioKg>950.0</promedioKg>
        </return>"#;

        let mut parser = MonthlySupplyParser::new(&xml[..], 64);
        let ParsedRecord::Record(record) = parser.next().await.unwrap().unwrap() else {
            panic!("expected a well-formed record");
        };
        assert_eq!(record.tmp_abas_mes_id, Some(3));
        assert!(record.fecha_mes_ini.is_some());
        assert_eq!(record.unidad_medida.as_deref(), Some("Toneladas"));
    }

    #[tokio::test]
    async fn blank_unit_field_is_null_not_empty_string() {
        let xml = br#"<return>
            <artiId>1</artiId>
            <fuenId>2</fuenId>
            <fechaMes>2026-02-01T00:00:00Z</fechaMes>
            <unidadMedida></unidadMedida>
        </return>"#;

        let mut parser = MonthlySupplyParser::new(&xml[..], 64);
        let ParsedRecord::Record(record) = parser.next().await.unwrap().unwrap() else {
            panic!("expected a well-formed record");
        };
        assert_eq!(record.unidad_medida, None);
    }
}
