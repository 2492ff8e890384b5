use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::EfacturaError;

/// Summary of a signing certificate.
///
/// Real X.509 parsing and cryptographic verification live behind this
/// boundary; the pipeline only needs the summary fields and the PEM blob
/// to embed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pem: String,
}

/// Validity of a certificate at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateStatus {
    Valid,
    Expired,
    NotYetValid,
}

impl Certificate {
    /// Build a certificate summary around a PEM blob.
    ///
    /// The blob must at least carry certificate markers; anything else is
    /// rejected as unreadable.
    pub fn new(
        subject: impl Into<String>,
        issuer: impl Into<String>,
        serial: impl Into<String>,
        valid_from: DateTime<Utc>,
        valid_to: DateTime<Utc>,
        pem: impl Into<String>,
    ) -> Result<Self, EfacturaError> {
        let pem = pem.into();
        if !pem.contains("BEGIN CERTIFICATE") || !pem.contains("END CERTIFICATE") {
            return Err(EfacturaError::Certificate(
                "unreadable certificate: PEM markers not found".into(),
            ));
        }
        if valid_to < valid_from {
            return Err(EfacturaError::Certificate(
                "certificate validity window is inverted".into(),
            ));
        }
        Ok(Self {
            subject: subject.into(),
            issuer: issuer.into(),
            serial: serial.into(),
            valid_from,
            valid_to,
            pem,
        })
    }

    /// Validity status: valid iff `now ∈ [valid_from, valid_to]`.
    pub fn status_at(&self, now: DateTime<Utc>) -> CertificateStatus {
        if now < self.valid_from {
            CertificateStatus::NotYetValid
        } else if now > self.valid_to {
            CertificateStatus::Expired
        } else {
            CertificateStatus::Valid
        }
    }

    /// Fail with a certificate error unless valid at `now`.
    pub fn ensure_valid_at(&self, now: DateTime<Utc>) -> Result<(), EfacturaError> {
        match self.status_at(now) {
            CertificateStatus::Valid => Ok(()),
            CertificateStatus::Expired => Err(EfacturaError::Certificate(format!(
                "certificate {} expired at {}",
                self.serial, self.valid_to
            ))),
            CertificateStatus::NotYetValid => Err(EfacturaError::Certificate(format!(
                "certificate {} not valid before {}",
                self.serial, self.valid_from
            ))),
        }
    }

    /// Base64 certificate body for the `X509Certificate` element.
    pub fn body_base64(&self) -> String {
        let body: String = self
            .pem
            .lines()
            .filter(|l| !l.starts_with("-----"))
            .collect();
        body
    }

    /// SHA-256 fingerprint of the PEM body, base64-encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.body_base64().as_bytes());
        BASE64.encode(hasher.finalize())
    }
}

/// Opaque private-key handle paired with a certificate.
#[derive(Debug, Clone)]
pub struct SigningKey {
    pem: String,
}

impl SigningKey {
    pub fn new(pem: impl Into<String>) -> Result<Self, EfacturaError> {
        let pem = pem.into();
        if !pem.contains("PRIVATE KEY") {
            return Err(EfacturaError::Certificate(
                "unreadable signing key: PEM markers not found".into(),
            ));
        }
        Ok(Self { pem })
    }

    pub(crate) fn secret_bytes(&self) -> &[u8] {
        self.pem.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const TEST_PEM: &str =
        "-----BEGIN CERTIFICATE-----\nMIIBtestbody\n-----END CERTIFICATE-----";

    fn cert(from: (i32, u32, u32), to: (i32, u32, u32)) -> Certificate {
        Certificate::new(
            "CN=Despacho Ejemplo SL",
            "CN=AC Test",
            "0102030405",
            Utc.with_ymd_and_hms(from.0, from.1, from.2, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(to.0, to.1, to.2, 0, 0, 0).unwrap(),
            TEST_PEM,
        )
        .unwrap()
    }

    #[test]
    fn validity_window() {
        let c = cert((2024, 1, 1), (2026, 1, 1));
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(c.status_at(now), CertificateStatus::Valid);

        let before = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(c.status_at(before), CertificateStatus::NotYetValid);

        let after = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(c.status_at(after), CertificateStatus::Expired);
        assert!(c.ensure_valid_at(after).is_err());
    }

    #[test]
    fn rejects_non_pem() {
        let err = Certificate::new(
            "CN=X",
            "CN=Y",
            "1",
            Utc::now(),
            Utc::now(),
            "not a certificate",
        )
        .unwrap_err();
        assert!(matches!(err, EfacturaError::Certificate(_)));
    }

    #[test]
    fn body_strips_markers() {
        let c = cert((2024, 1, 1), (2026, 1, 1));
        assert_eq!(c.body_base64(), "MIIBtestbody");
        assert!(!c.fingerprint().is_empty());
    }
}
