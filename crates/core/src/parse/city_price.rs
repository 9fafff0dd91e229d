use tokio::io::AsyncBufRead;

use crate::domain::records::CityPriceRecord;
use crate::error::IngestionError;
use crate::parse::{parse_datetime, parse_decimal, parse_int, ParsedRecord, RecordBuilder, XmlRecordReader};

impl RecordBuilder for CityPriceRecord {
    fn apply_field(&mut self, name: &str, text: &str) {
        match name {
            "regid" => self.reg_id = parse_int(text),
            "codproducto" => self.cod_producto = parse_int(text),
            "fechacaptura" => self.fecha_captura = parse_datetime(text),
            "ciudnombre" => self.ciud_nombre = Some(text.to_string()),
            "artinombre" => self.arti_nombre = Some(text.to_string()),
            "fuennombre" => self.fuen_nombre = Some(text.to_string()),
            "promediokg" => self.promedio_kg = parse_decimal(text),
            "minimokg" => self.minimo_kg = parse_decimal(text),
            "maximokg" => self.maximo_kg = parse_decimal(text),
            _ => {}
        }
    }
}

/// Streaming pull parser for `promediosSipsaCiudad`.
pub struct CityPriceParser<R> {
    reader: XmlRecordReader<R>,
}

impl<R> CityPriceParser<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(inner: R, max_child_elements: usize) -> Self {
        Self {
            reader: XmlRecordReader::new(inner, max_child_elements),
        }
    }

    pub async fn next(&mut self) -> Result<Option<ParsedRecord<CityPriceRecord>>, IngestionError> {
        self.reader.next_record::<CityPriceRecord>().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_fields_and_ignores_unknown_elements() {
        let xml = br#"<return>
            <regId>10</regId>
            <codProducto>200</codProducto>
            <fechaCaptura>2026-01-15T00:00:00Z</fechaCaptura>
            <artiNombre>Papa criolla</artiNombre>
            <promedioKg>2500.5</promedioKg>
            <unexpectedField>ignore me</unexpectedField>
        </return>"#;

        let mut parser = CityPriceParser::new(&xml[..], 64);
        let ParsedRecord::Record(record) = parser.next().await.unwrap().unwrap() else {
            panic!("expected a well-formed record");
        };
        assert_eq!(record.reg_id, Some(10));
        assert_eq!(record.cod_producto, Some(200));
        assert!(record.fecha_captura.is_some());
        assert_eq!(record.arti_nombre.as_deref(), Some("Papa criolla"));
        assert_eq!(record.promedio_kg, Some(2500.5));

        assert!(parser.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blank_numeric_fields_become_null_without_failing() {
        let xml = br#"<return>
            <regId>10</regId>
            <codProducto>200</codProducto>
            <fechaCaptura>2026-01-15T00:00:00Z</fechaCaptura>
            <promedioKg></promedioKg>
        </return>"#;

        let mut parser = CityPriceParser::new(&xml[..], 64);
        let ParsedRecord::Record(record) = parser.next().await.unwrap().unwrap() else {
            panic!("expected a well-formed record");
        };
        assert_eq!(record.promedio_kg, None);
    }

    #[tokio::test]
    async fn malformed_field_is_rejected_without_aborting_the_stream() {
        let xml = br#"<return>
            <regId>10</regId>
            <artiNombre>&bogus;</artiNombre>
        </return>
        <return>
            <regId>20</regId>
            <codProducto>300</codProducto>
            <fechaCaptura>2026-01-16T00:00:00Z</fechaCaptura>
        </return>"#;

        let mut parser = CityPriceParser::new(&xml[..], 64);
        match parser.next().await.unwrap().unwrap() {
            ParsedRecord::Malformed { reason, .. } => assert!(reason.contains("artinombre")),
            ParsedRecord::Record(_) => panic!("expected the undecodable entity to be rejected"),
        }

        let ParsedRecord::Record(record) = parser.next().await.unwrap().unwrap() else {
            panic!("the stream must still be usable after a malformed record");
        };
        assert_eq!(record.reg_id, Some(20));
    }

    #[tokio::test]
    async fn surfaces_soap_fault_from_fault_text() {
        let xml = br#"<soap:Fault><soap:Reason><soap:Text>Backend busy</soap:Text></soap:Reason></soap:Fault>"#;
        let mut parser = CityPriceParser::new(&xml[..], 64);
        let err = parser.next().await.unwrap_err();
        match err {
            IngestionError::SoapFault(msg) => assert_eq!(msg, "Backend busy"),
            other => panic!("expected SoapFault, got {other:?}"),
        }
    }
}
