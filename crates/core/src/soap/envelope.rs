/// Builds the SOAP 1.2 envelope wrapping the named empty request element. A pure
/// function of `(method_name, namespace)` so it is covered by plain unit tests rather than an
/// integration test against a live endpoint.
pub fn build_request(method_name: &str, namespace: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope" xmlns:ser="{namespace}">
  <soap:Header/>
  <soap:Body>
    <ser:{method_name}/>
  </soap:Body>
</soap:Envelope>"#
    )
}

pub const CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_well_formed_envelope_with_the_requested_element() {
        let xml = build_request("promediosSipsaCiudad", "http://sipsa.dane.gov.co/services/");
        assert!(xml.contains("<ser:promediosSipsaCiudad/>"));
        assert!(xml.contains("http://www.w3.org/2003/05/soap-envelope"));
        assert!(xml.contains("http://sipsa.dane.gov.co/services/"));

        let mut reader = quick_xml::Reader::from_str(&xml);
        reader.trim_text(true);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(quick_xml::events::Event::Eof) => break,
                Err(e) => panic!("envelope is not well-formed XML: {e}"),
                _ => {}
            }
            buf.clear();
        }
    }
}
