use tokio::io::AsyncBufRead;

use crate::domain::records::WeeklyWholesaleRecord;
use crate::error::IngestionError;
use crate::parse::{parse_datetime, parse_decimal, parse_int, ParsedRecord, RecordBuilder, XmlRecordReader};

impl RecordBuilder for WeeklyWholesaleRecord {
    fn apply_field(&mut self, name: &str, text: &str) {
        match name {
            "tmpmayosemid" => self.tmp_mayo_sem_id = parse_int(text),
            "artiid" => self.arti_id = parse_int(text),
            "fuenid" => self.fuen_id = parse_int(text),
            "fechaini" => self.fecha_ini = parse_datetime(text),
            "fechafin" => self.fecha_fin = parse_datetime(text),
            "artinombre" => self.arti_nombre = Some(text.to_string()),
            "fuennombre" => self.fuen_nombre = Some(text.to_string()),
            "promediokg" => self.promedio_kg = parse_decimal(text),
            _ => {}
        }
    }
}

/// Streaming pull parser for `promediosSipsaMayorista`.
pub struct WeeklyWholesaleParser<R> {
    reader: XmlRecordReader<R>,
}

impl<R> WeeklyWholesaleParser<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(inner: R, max_child_elements: usize) -> Self {
        Self {
            reader: XmlRecordReader::new(inner, max_child_elements),
        }
    }

    pub async fn next(&mut self) -> Result<Option<ParsedRecord<WeeklyWholesaleRecord>>, IngestionError> {
        self.reader.next_record::<WeeklyWholesaleRecord>().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn routes_to_temporary_id_branch_when_present() {
        let xml = br#"<return>
            <tmpMayoSemId>555</tmpMayoSemId>
            <artiId>1</artiId>
            <fuenId>2</fuenId>
            <fechaIni>2026-01-12T00:00:00Z</fechaIni>
        </return>"#;

        let mut parser = WeeklyWholesaleParser::new(&xml[..], 64);
        let ParsedRecord::Record(record) = parser.next().await.unwrap().unwrap() else {
            panic!("expected a well-formed record");
        };
        assert_eq!(record.tmp_mayo_sem_id, Some(555));
        assert!(record.fecha_ini.is_some());
    }

    #[tokio::test]
    async fn falls_back_to_business_key_fields_when_tmp_id_absent() {
        let xml = br#"<return>
            <artiId>1</artiId>
            <fuenId>2</fuenId>
            <fechaIni>2026-01-12T00:00:00Z</fechaIni>
        </return>"#;

        let mut parser = WeeklyWholesaleParser::new(&xml[..], 64);
        let ParsedRecord::Record(record) = parser.next().await.unwrap().unwrap() else {
            panic!("expected a well-formed record");
        };
        assert_eq!(record.tmp_mayo_sem_id, None);
        assert_eq!(record.arti_id, Some(1));
    }
}
