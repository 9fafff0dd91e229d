use tokio::io::AsyncBufRead;

use crate::domain::records::PartialMarketRecord;
use crate::error::IngestionError;
use crate::parse::{parse_decimal, parse_int, ParsedRecord, RecordBuilder, XmlRecordReader};

impl RecordBuilder for PartialMarketRecord {
    fn apply_field(&mut self, name: &str, text: &str) {
        match name {
            "muniid" => self.muni_id = parse_int(text),
            "fuenid" => self.fuen_id = parse_int(text),
            "futiid" => self.futi_id = parse_int(text),
            "idartisemana" => self.id_arti_semana = parse_int(text),
            // Preserved as raw text: the dedup hash is computed over the original
            // string, and only the orchestrator converts it to an absolute instant.
            "enmafecha" => self.enma_fecha_raw = Some(text.to_string()),
            "artinombre" => self.arti_nombre = Some(text.to_string()),
            "promediokg" => self.promedio_kg = parse_decimal(text),
            _ => {}
        }
    }
}

/// Streaming pull parser for `promediosSipsaParcial`.
pub struct PartialMarketParser<R> {
    reader: XmlRecordReader<R>,
}

impl<R> PartialMarketParser<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(inner: R, max_child_elements: usize) -> Self {
        Self {
            reader: XmlRecordReader::new(inner, max_child_elements),
        }
    }

    pub async fn next(&mut self) -> Result<Option<ParsedRecord<PartialMarketRecord>>, IngestionError> {
        self.reader.next_record::<PartialMarketRecord>().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn preserves_raw_enma_fecha_text_for_hashing() {
        let xml = br#"<return>
            <muniId>1</muniId>
            <fuenId>2</fuenId>
            <futiId>3</futiId>
            <idArtiSemana>4</idArtiSemana>
            <enmaFecha>2026-01-15T00:00:00Z</enmaFecha>
            <artiNombre>Tomate</artiNombre>
        </return>"#;

        let mut parser = PartialMarketParser::new(&xml[..], 64);
        let ParsedRecord::Record(record) = parser.next().await.unwrap().unwrap() else {
            panic!("expected a well-formed record");
        };
        assert_eq!(record.enma_fecha_raw.as_deref(), Some("2026-01-15T00:00:00Z"));
        assert_eq!(record.muni_id, Some(1));
        assert_eq!(record.arti_nombre.as_deref(), Some("Tomate"));
    }
}
