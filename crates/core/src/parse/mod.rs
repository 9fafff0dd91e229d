pub mod city_price;
pub mod monthly_supply;
pub mod monthly_wholesale;
pub mod partial_market;
pub mod weekly_wholesale;

use chrono::{DateTime, TimeZone, Utc};
use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Reader;
use tokio::io::AsyncBufRead;

use crate::domain::records::RawDateTime;
use crate::error::IngestionError;

/// Best-effort integer parse: returns `None` on failure rather than raising.
pub fn parse_int(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok()
}

/// Best-effort decimal parse: returns `None` on failure rather than raising.
pub fn parse_decimal(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok()
}

/// Attempts ISO-8601 first, falls back to an epoch-millis numeric string; returns `None` if both
/// fail.
pub fn parse_datetime(text: &str) -> Option<RawDateTime> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(RawDateTime::Iso(dt.with_timezone(&Utc)));
    }

    if let Ok(millis) = t.parse::<i64>() {
        if Utc.timestamp_millis_opt(millis).single().is_some() {
            return Some(RawDateTime::EpochMillis(millis));
        }
    }

    None
}

/// A per-method typed accumulator built one field at a time from a `<return>` block. Unknown
/// field names are silently ignored: look up a handler by the lowercased local name and apply it
/// to a mutable builder.
pub trait RecordBuilder: Default {
    fn apply_field(&mut self, name: &str, text: &str);
}

fn local_name_lower(name: QName<'_>) -> String {
    String::from_utf8_lossy(name.local_name().as_ref()).to_ascii_lowercase()
}

/// Outcome of pulling one `<return>` block out of the stream. `Malformed` means a single field's
/// text failed to decode; the reader has already resynchronized past the block's closing tag
/// before returning it, so the caller can keep pulling records from the same stream.
#[derive(Debug)]
pub enum ParsedRecord<B> {
    Record(B),
    Malformed { raw_data: String, reason: String },
}

/// A field-level text-decode failure (recoverable, the tokenizer itself is still sound) versus a
/// fatal reader-level failure (stream position is no longer trustworthy).
enum FieldError {
    Malformed,
    Fatal(IngestionError),
}

/// Streams `<return>` records out of a SOAP envelope body one at a time, XXE-safe by
/// construction (quick-xml never resolves external entities or processes DTDs), with a cap on
/// child elements per record as a defense against a pathological payload.
pub struct XmlRecordReader<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    max_child_elements: usize,
    finished: bool,
}

impl<R> XmlRecordReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(inner: R, max_child_elements: usize) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            max_child_elements,
            finished: false,
        }
    }

    /// Reads the next `<return>` block, or `Ok(None)` at end of stream. A single malformed field
    /// inside a `<return>` block is reported as `ParsedRecord::Malformed` and the stream keeps
    /// going. Raises `SoapFault` if a `<Fault>` element is encountered; raises `ParseError` only
    /// for genuinely unrecoverable stream states (malformed XML, or end-of-stream/read failure
    /// before a `<return>` or `<Fault>` block closes).
    pub async fn next_record<B: RecordBuilder>(
        &mut self,
    ) -> Result<Option<ParsedRecord<B>>, IngestionError> {
        if self.finished {
            return Ok(None);
        }

        loop {
            self.buf.clear();
            match self.reader.read_event_into_async(&mut self.buf).await {
                Ok(Event::Start(ref e)) => {
                    let name = local_name_lower(e.name());
                    if name == "fault" {
                        let message = self.read_fault_text().await?;
                        self.finished = true;
                        return Err(IngestionError::SoapFault(message));
                    }
                    if name == "return" {
                        return self.read_return_into_builder::<B>().await.map(Some);
                    }
                    // Envelope/Header/Body wrapper elements and anything else: keep scanning.
                }
                Ok(Event::Eof) => {
                    self.finished = true;
                    return Ok(None);
                }
                Ok(_) => {}
                Err(e) => {
                    self.finished = true;
                    return Err(IngestionError::ParseError(format!("XML read error: {e}")));
                }
            }
        }
    }

    async fn read_return_into_builder<B: RecordBuilder>(
        &mut self,
    ) -> Result<ParsedRecord<B>, IngestionError> {
        let mut builder = B::default();
        let mut field_count: usize = 0;
        let mut fields_seen: Vec<String> = Vec::new();

        loop {
            self.buf.clear();
            match self.reader.read_event_into_async(&mut self.buf).await {
                Ok(Event::Start(ref e)) => {
                    field_count += 1;
                    if field_count > self.max_child_elements {
                        self.finished = true;
                        return Err(IngestionError::ParseError(format!(
                            "return block exceeds max child elements ({})",
                            self.max_child_elements
                        )));
                    }
                    let name = local_name_lower(e.name());
                    match self.read_element_text().await {
                        Ok(text) => {
                            let trimmed = text.trim();
                            if !trimmed.is_empty() {
                                fields_seen.push(format!("{name}={trimmed}"));
                                builder.apply_field(&name, trimmed);
                            }
                        }
                        Err(FieldError::Malformed) => {
                            self.skip_to_return_close().await?;
                            return Ok(ParsedRecord::Malformed {
                                raw_data: fields_seen.join(", "),
                                reason: format!("field '{name}' contains undecodable text"),
                            });
                        }
                        Err(FieldError::Fatal(err)) => return Err(err),
                    }
                }
                Ok(Event::Empty(_)) => {
                    field_count += 1;
                    if field_count > self.max_child_elements {
                        self.finished = true;
                        return Err(IngestionError::ParseError(format!(
                            "return block exceeds max child elements ({})",
                            self.max_child_elements
                        )));
                    }
                    // Self-closing element: always blank text, field is skipped.
                }
                Ok(Event::End(ref e)) if local_name_lower(e.name()) == "return" => {
                    return Ok(ParsedRecord::Record(builder));
                }
                Ok(Event::Eof) => {
                    self.finished = true;
                    return Err(IngestionError::ParseError(
                        "stream ended mid-record".to_string(),
                    ));
                }
                Ok(_) => {}
                Err(e) => {
                    self.finished = true;
                    return Err(IngestionError::ParseError(format!("XML read error: {e}")));
                }
            }
        }
    }

    async fn read_element_text(&mut self) -> Result<String, FieldError> {
        let mut text = String::new();
        loop {
            self.buf.clear();
            match self.reader.read_event_into_async(&mut self.buf).await {
                Ok(Event::Text(e)) => match e.unescape() {
                    Ok(decoded) => text.push_str(&decoded),
                    Err(_) => return Err(FieldError::Malformed),
                },
                Ok(Event::End(_)) => return Ok(text),
                Ok(Event::Eof) => {
                    self.finished = true;
                    return Err(FieldError::Fatal(IngestionError::ParseError(
                        "stream ended mid-field".to_string(),
                    )));
                }
                Ok(_) => {}
                Err(e) => {
                    self.finished = true;
                    return Err(FieldError::Fatal(IngestionError::ParseError(format!(
                        "XML read error: {e}"
                    ))));
                }
            }
        }
    }

    /// Discards events until the current `<return>` block's closing tag, so a malformed field
    /// doesn't abort the whole run. End-of-stream or a reader error while resyncing is fatal:
    /// there's no reliable position left to resume from.
    async fn skip_to_return_close(&mut self) -> Result<(), IngestionError> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into_async(&mut self.buf).await {
                Ok(Event::End(ref e)) if local_name_lower(e.name()) == "return" => return Ok(()),
                Ok(Event::Eof) => {
                    self.finished = true;
                    return Err(IngestionError::ParseError(
                        "stream ended while resynchronizing after a malformed record".to_string(),
                    ));
                }
                Ok(_) => {}
                Err(e) => {
                    self.finished = true;
                    return Err(IngestionError::ParseError(format!(
                        "XML read error while resynchronizing: {e}"
                    )));
                }
            }
        }
    }

    async fn read_fault_text(&mut self) -> Result<String, IngestionError> {
        let mut text = String::new();
        loop {
            self.buf.clear();
            match self.reader.read_event_into_async(&mut self.buf).await {
                Ok(Event::Start(ref e)) => {
                    let name = local_name_lower(e.name());
                    if name == "text" || name == "faultstring" {
                        text = match self.read_element_text().await {
                            Ok(t) => t,
                            Err(FieldError::Malformed) => String::new(),
                            Err(FieldError::Fatal(err)) => return Err(err),
                        };
                    }
                }
                Ok(Event::End(ref e)) if local_name_lower(e.name()) == "fault" => {
                    return Ok(fault_message(&text));
                }
                Ok(Event::Eof) => return Ok(fault_message(&text)),
                Ok(_) => {}
                Err(e) => return Err(IngestionError::ParseError(format!("XML read error: {e}"))),
            }
        }
    }
}

fn fault_message(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        "SOAP fault".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_integers_and_nulls_on_garbage() {
        assert_eq!(parse_int("123"), Some(123));
        assert_eq!(parse_int("  42 "), Some(42));
        assert_eq!(parse_int("abc"), None);
        assert_eq!(parse_int(""), None);
    }

    #[test]
    fn parses_decimals_and_nulls_on_garbage() {
        assert_eq!(parse_decimal("3.14"), Some(3.14));
        assert_eq!(parse_decimal("nope"), None);
    }

    #[test]
    fn parses_iso8601_datetime() {
        let dt = parse_datetime("2026-01-15T10:30:00Z").unwrap();
        match dt {
            RawDateTime::Iso(v) => assert_eq!(v.to_rfc3339(), "2026-01-15T10:30:00+00:00"),
            RawDateTime::EpochMillis(_) => panic!("expected ISO variant"),
        }
    }

    #[test]
    fn falls_back_to_epoch_millis_when_not_iso() {
        let dt = parse_datetime("1768472400000").unwrap();
        assert!(matches!(dt, RawDateTime::EpochMillis(1768472400000)));
    }

    #[test]
    fn returns_none_when_neither_format_matches() {
        assert!(parse_datetime("not-a-date").is_none());
        assert!(parse_datetime("").is_none());
    }
}
