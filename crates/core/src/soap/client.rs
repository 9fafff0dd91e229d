use std::io;
use std::time::Duration;

use futures::TryStreamExt;
use tokio::io::{AsyncBufRead, BufReader};
use tokio_util::io::StreamReader;

use crate::config::SoapConfig;
use crate::domain::method::IngestionMethod;
use crate::error::IngestionError;
use crate::soap::envelope;

/// Streaming fetcher exposing one lazy byte stream per method. Retries the initial
/// request with exponential backoff; the returned body is an `AsyncBufRead` consumed incrementally
/// by the XML parser, never buffered whole into memory.
#[derive(Debug, Clone)]
pub struct SoapSource {
    http: reqwest::Client,
    endpoint: String,
    namespace: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl SoapSource {
    pub fn from_config(config: &SoapConfig) -> Result<Self, IngestionError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .build()
            .map_err(|e| {
                IngestionError::ConfigurationError(format!("failed to build SOAP http client: {e}"))
            })?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            namespace: config.namespace.clone(),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    pub async fn stream(
        &self,
        method: IngestionMethod,
    ) -> Result<impl AsyncBufRead + Unpin, IngestionError> {
        let response = self.send_with_retry(method).await?;

        let byte_stream = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));

        Ok(BufReader::new(StreamReader::new(byte_stream)))
    }

    async fn send_with_retry(
        &self,
        method: IngestionMethod,
    ) -> Result<reqwest::Response, IngestionError> {
        let body = envelope::build_request(method.as_str(), &self.namespace);

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let result = self
                .http
                .post(&self.endpoint)
                .header("Content-Type", envelope::CONTENT_TYPE)
                .header("Accept-Encoding", "gzip")
                .body(body.clone())
                .send()
                .await;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    }

                    if status.is_server_error() && attempt < self.max_retries {
                        tracing::warn!(
                            method = %method,
                            attempt,
                            http_status = %status,
                            "SOAP request failed with server error; retrying"
                        );
                        tokio::time::sleep(self.backoff_for(attempt)).await;
                        continue;
                    }

                    return Err(IngestionError::ExternalUnavailable(format!(
                        "SOAP endpoint returned HTTP {status}"
                    )));
                }
                Err(err) => {
                    if attempt >= self.max_retries {
                        return Err(IngestionError::ExternalUnavailable(format!(
                            "SOAP transport failure after {attempt} attempt(s): {err}"
                        )));
                    }

                    tracing::warn!(
                        method = %method,
                        attempt,
                        error = %err,
                        "SOAP transport failure; retrying"
                    );
                    tokio::time::sleep(self.backoff_for(attempt)).await;
                }
            }
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}
