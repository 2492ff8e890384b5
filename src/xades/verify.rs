use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use quick_xml::Reader;
use quick_xml::events::Event;
use sha2::{Digest, Sha256};

use super::XadesLevel;
use super::sign::strip_existing_signature;
use crate::core::EfacturaError;

/// Certificate summary extracted from a signed document's KeyInfo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub serial: String,
}

#[derive(Default)]
struct SignatureScan {
    signature_count: usize,
    has_signed_info: bool,
    has_signature_value: bool,
    has_key_info: bool,
    digest_value: Option<String>,
    subject: Option<String>,
    issuer: Option<String>,
    serial: Option<String>,
    // Appearance order of evidence blocks inside the unsigned container.
    order_counter: usize,
    timestamp_idx: Option<usize>,
    cert_refs_idx: Option<usize>,
    revocation_refs_idx: Option<usize>,
    refs_timestamp_idx: Option<usize>,
    cert_values_idx: Option<usize>,
    revocation_values_idx: Option<usize>,
}

fn scan(xml: &str) -> Result<SignatureScan, EfacturaError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut state = SignatureScan::default();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = std::str::from_utf8(e.name().as_ref())
                    .unwrap_or("")
                    .to_string();
                match name.as_str() {
                    "ds:Signature" => state.signature_count += 1,
                    "ds:SignedInfo" => state.has_signed_info = true,
                    "ds:SignatureValue" => state.has_signature_value = true,
                    "ds:KeyInfo" => state.has_key_info = true,
                    "xades:SignatureTimeStamp" => {
                        state.timestamp_idx = Some(state.next_order());
                    }
                    "xades:CompleteCertificateRefs" => {
                        state.cert_refs_idx = Some(state.next_order());
                    }
                    "xades:CompleteRevocationRefs" => {
                        state.revocation_refs_idx = Some(state.next_order());
                    }
                    "xades:SigAndRefsTimeStamp" => {
                        state.refs_timestamp_idx = Some(state.next_order());
                    }
                    "xades:CertificateValues" => {
                        state.cert_values_idx = Some(state.next_order());
                    }
                    "xades:RevocationValues" => {
                        state.revocation_values_idx = Some(state.next_order());
                    }
                    _ => {}
                }
                path.push(name);
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                match path.last().map(String::as_str) {
                    Some("ds:DigestValue") if path.iter().any(|p| p == "ds:Reference") => {
                        state.digest_value = Some(text);
                    }
                    Some("ds:X509SubjectName") => state.subject = Some(text),
                    Some("ds:X509IssuerName") => state.issuer = Some(text),
                    Some("ds:X509SerialNumber") => state.serial = Some(text),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(EfacturaError::Xml(format!("XML parse error: {e}")));
            }
            _ => {}
        }
    }

    Ok(state)
}

impl SignatureScan {
    fn next_order(&mut self) -> usize {
        self.order_counter += 1;
        self.order_counter
    }
}

/// Validate the structure of a signed document and return the evidence
/// level it reaches.
///
/// Checks the required sub-elements (SignedInfo, SignatureValue, KeyInfo),
/// enforces the exactly-one-envelope invariant, verifies the evidence
/// blocks are cumulative and ordered (T before C before X before XL), and
/// re-verifies the document digest against the embedded reference.
pub fn validate_signature_structure(xml: &str) -> Result<XadesLevel, EfacturaError> {
    let scan = scan(xml)?;

    match scan.signature_count {
        0 => {
            return Err(EfacturaError::SignatureStructural(
                "document has no signature envelope".into(),
            ));
        }
        1 => {}
        n => {
            return Err(EfacturaError::SignatureStructural(format!(
                "document has {n} signature envelopes, expected exactly one"
            )));
        }
    }

    for (present, element) in [
        (scan.has_signed_info, "ds:SignedInfo"),
        (scan.has_signature_value, "ds:SignatureValue"),
        (scan.has_key_info, "ds:KeyInfo"),
    ] {
        if !present {
            return Err(EfacturaError::SignatureStructural(format!(
                "signature is missing required element {element}"
            )));
        }
    }

    // Digest re-verification against the signature-stripped document.
    let declared = scan.digest_value.as_deref().ok_or_else(|| {
        EfacturaError::SignatureStructural("signature reference has no digest value".into())
    })?;
    let stripped = strip_existing_signature(xml);
    let mut hasher = Sha256::new();
    hasher.update(stripped.as_bytes());
    let actual = BASE64.encode(hasher.finalize());
    if declared != actual {
        return Err(EfacturaError::SignatureStructural(
            "document digest does not match the signed reference".into(),
        ));
    }

    // Evidence must be cumulative.
    let has_t = scan.timestamp_idx.is_some();
    let has_c = scan.cert_refs_idx.is_some() && scan.revocation_refs_idx.is_some();
    let has_x = scan.refs_timestamp_idx.is_some();
    let has_xl = scan.cert_values_idx.is_some() && scan.revocation_values_idx.is_some();

    if has_c && !has_t {
        return Err(EfacturaError::SignatureStructural(
            "level C evidence present without a T timestamp".into(),
        ));
    }
    if has_x && !has_c {
        return Err(EfacturaError::SignatureStructural(
            "level X evidence present without C references".into(),
        ));
    }
    if has_xl && !has_x {
        return Err(EfacturaError::SignatureStructural(
            "level XL values present without an X timestamp".into(),
        ));
    }

    // And ordered: T before C before X before XL.
    let sequence = [
        scan.timestamp_idx,
        scan.cert_refs_idx,
        scan.revocation_refs_idx,
        scan.refs_timestamp_idx,
        scan.cert_values_idx,
        scan.revocation_values_idx,
    ];
    let mut previous = 0usize;
    for idx in sequence.into_iter().flatten() {
        if idx < previous {
            return Err(EfacturaError::SignatureStructural(
                "evidence blocks are out of order".into(),
            ));
        }
        previous = idx;
    }

    Ok(if has_xl {
        XadesLevel::Xl
    } else if has_x {
        XadesLevel::X
    } else if has_c {
        XadesLevel::C
    } else if has_t {
        XadesLevel::T
    } else {
        XadesLevel::Bes
    })
}

/// Summary of the signature envelope a document carries: the evidence
/// level reached and the embedded certificate reference.
#[derive(Debug, Clone)]
pub struct SignatureEnvelope {
    pub level: XadesLevel,
    pub certificate: CertificateInfo,
}

/// Validate the envelope and return its summary.
pub fn envelope_info(xml: &str) -> Result<SignatureEnvelope, EfacturaError> {
    let level = validate_signature_structure(xml)?;
    let certificate = certificate_info(xml).ok_or_else(|| {
        EfacturaError::SignatureStructural("signature has no embedded certificate".into())
    })?;
    Ok(SignatureEnvelope { level, certificate })
}

/// Extract the embedded certificate summary, if the document is signed.
pub fn certificate_info(xml: &str) -> Option<CertificateInfo> {
    let scan = scan(xml).ok()?;
    if scan.signature_count == 0 {
        return None;
    }
    Some(CertificateInfo {
        subject: scan.subject.unwrap_or_default(),
        issuer: scan.issuer.unwrap_or_default(),
        serial: scan.serial.unwrap_or_default(),
    })
}
