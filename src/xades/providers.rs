//! Time-stamping and revocation evidence providers.
//!
//! The wire protocols (RFC 3161 / OCSP ASN.1) live behind these traits;
//! the pipeline only depends on the evidence contracts and their failure
//! semantics. Network implementations carry a bounded timeout and a small
//! fixed retry budget before surfacing a terminal error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Default network timeout for provider calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default retry budget (total attempts).
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// A trusted timestamp over signed data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampToken {
    pub issued_at: DateTime<Utc>,
    /// Base64 token body, embedded verbatim as the encapsulated value.
    pub token: String,
    pub authority: String,
}

/// Certificate revocation evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationEvidence {
    pub checked_at: DateTime<Utc>,
    pub status: RevocationStatus,
    /// Base64 responder output, embedded verbatim as the encapsulated value.
    pub response: String,
    pub responder: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevocationStatus {
    Good,
    Revoked,
    Unknown,
}

impl RevocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Revoked => "revoked",
            Self::Unknown => "unknown",
        }
    }
}

/// Error from a timestamp or revocation provider.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ProviderError {
    /// Network or HTTP error (retried transiently).
    Network(String),
    /// The authority answered with an error.
    Api(String),
    /// Failed to parse the response.
    Parse(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(e) => write!(f, "provider network error: {e}"),
            Self::Api(e) => write!(f, "provider API error: {e}"),
            Self::Parse(e) => write!(f, "provider parse error: {e}"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Time-Stamping Authority boundary.
pub trait TimestampProvider {
    fn timestamp(
        &self,
        digest: &str,
    ) -> impl Future<Output = Result<TimestampToken, ProviderError>>;
}

/// Revocation-status (OCSP) boundary.
pub trait RevocationProvider {
    fn check(
        &self,
        serial: &str,
    ) -> impl Future<Output = Result<RevocationEvidence, ProviderError>>;
}

/// Run `op` up to `attempts` times, sleeping briefly between failures.
pub(crate) async fn with_retries<T, F, Fut>(
    what: &str,
    attempts: u32,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut last = None;
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!(what, attempt, attempts, error = %e, "provider call failed");
                last = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(Duration::from_millis(200 * u64::from(attempt))).await;
                }
            }
        }
    }
    Err(last.unwrap_or_else(|| ProviderError::Network("no attempts made".into())))
}

// ---------------------------------------------------------------------------
// HTTP implementations
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct TsaRequest<'a> {
    digest: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TsaResponse {
    token: String,
    issued_at: Option<DateTime<Utc>>,
}

/// JSON-over-HTTP timestamp client with timeout and retry budget.
#[derive(Debug, Clone)]
pub struct HttpTsaClient {
    endpoint: String,
    client: reqwest::Client,
    attempts: u32,
}

impl HttpTsaClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
            attempts: DEFAULT_ATTEMPTS,
        })
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    async fn request_once(&self, digest: &str) -> Result<TimestampToken, ProviderError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&TsaRequest { digest })
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(ProviderError::Api(format!("HTTP {status}: {body}")));
        }

        let parsed: TsaResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(TimestampToken {
            issued_at: parsed.issued_at.unwrap_or_else(Utc::now),
            token: parsed.token,
            authority: self.endpoint.clone(),
        })
    }
}

impl TimestampProvider for HttpTsaClient {
    async fn timestamp(&self, digest: &str) -> Result<TimestampToken, ProviderError> {
        let digest = digest.to_string();
        with_retries("tsa", self.attempts, || self.request_once(&digest)).await
    }
}

#[derive(Serialize)]
struct OcspRequest<'a> {
    serial: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OcspResponse {
    status: String,
    response: String,
    produced_at: Option<DateTime<Utc>>,
}

/// JSON-over-HTTP revocation client with timeout and retry budget.
#[derive(Debug, Clone)]
pub struct HttpOcspClient {
    endpoint: String,
    client: reqwest::Client,
    attempts: u32,
}

impl HttpOcspClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
            attempts: DEFAULT_ATTEMPTS,
        })
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    async fn request_once(&self, serial: &str) -> Result<RevocationEvidence, ProviderError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&OcspRequest { serial })
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(ProviderError::Api(format!("HTTP {status}: {body}")));
        }

        let parsed: OcspResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let revocation_status = match parsed.status.as_str() {
            "good" => RevocationStatus::Good,
            "revoked" => RevocationStatus::Revoked,
            _ => RevocationStatus::Unknown,
        };
        Ok(RevocationEvidence {
            checked_at: parsed.produced_at.unwrap_or_else(Utc::now),
            status: revocation_status,
            response: parsed.response,
            responder: self.endpoint.clone(),
        })
    }
}

impl RevocationProvider for HttpOcspClient {
    async fn check(&self, serial: &str) -> Result<RevocationEvidence, ProviderError> {
        let serial = serial.to_string();
        with_retries("ocsp", self.attempts, || self.request_once(&serial)).await
    }
}

// ---------------------------------------------------------------------------
// Fixed providers for tests and embedded use
// ---------------------------------------------------------------------------

/// Timestamp provider returning a fixed token. Deterministic, no network.
#[derive(Debug, Clone)]
pub struct FixedTimestampProvider {
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

impl FixedTimestampProvider {
    pub fn new(token: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            issued_at,
        }
    }
}

impl TimestampProvider for FixedTimestampProvider {
    async fn timestamp(&self, _digest: &str) -> Result<TimestampToken, ProviderError> {
        Ok(TimestampToken {
            issued_at: self.issued_at,
            token: self.token.clone(),
            authority: "urn:test:tsa".into(),
        })
    }
}

/// Revocation provider returning a fixed status. Deterministic, no network.
#[derive(Debug, Clone)]
pub struct FixedRevocationProvider {
    pub status: RevocationStatus,
    pub response: String,
    pub checked_at: DateTime<Utc>,
}

impl FixedRevocationProvider {
    pub fn good(response: impl Into<String>, checked_at: DateTime<Utc>) -> Self {
        Self {
            status: RevocationStatus::Good,
            response: response.into(),
            checked_at,
        }
    }
}

impl RevocationProvider for FixedRevocationProvider {
    async fn check(&self, _serial: &str) -> Result<RevocationEvidence, ProviderError> {
        Ok(RevocationEvidence {
            checked_at: self.checked_at,
            status: self.status,
            response: self.response.clone(),
            responder: "urn:test:ocsp".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsa_request_serialization() {
        let req = TsaRequest { digest: "abc123" };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"digest":"abc123"}"#);
    }

    #[test]
    fn ocsp_response_deserialization() {
        let json = r#"{"status":"good","response":"b64data","producedAt":"2025-03-01T10:00:00Z"}"#;
        let parsed: OcspResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.status, "good");
        assert_eq!(parsed.response, "b64data");
        assert!(parsed.produced_at.is_some());
    }

    #[tokio::test]
    async fn retries_surface_last_error() {
        let mut calls = 0u32;
        let result: Result<(), _> = with_retries("test", 3, || {
            calls += 1;
            async { Err(ProviderError::Network("down".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn retries_stop_on_success() {
        let mut calls = 0u32;
        let result = with_retries("test", 3, || {
            calls += 1;
            let ok = calls == 2;
            async move {
                if ok {
                    Ok(42)
                } else {
                    Err(ProviderError::Network("down".into()))
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 2);
    }
}
