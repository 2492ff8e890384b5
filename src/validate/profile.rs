use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

use super::business::is_valid_tax_id;
use super::{Requirement, ValidationReport};
use crate::core::ValidationIssue;
use crate::facturae::from_xml;

/// Receiving-authority validation profile.
///
/// Each profile is a named checklist of mandatory evidence a document
/// must carry before delivery. FACE additionally requires XAdES-T
/// timestamp evidence on top of AEAT's checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Aeat,
    Face,
    General,
}

impl Profile {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Aeat => "AEAT",
            Self::Face => "FACE",
            Self::General => "GENERAL",
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Profile pass: evaluate the authority checklist. Failed items are
/// always hard errors and gate delivery.
pub fn validate_profile(xml: &str, profile: Profile) -> ValidationReport {
    let mut report = ValidationReport {
        is_valid: true,
        ..ValidationReport::default()
    };

    let has_certificate = xml.contains("<ds:X509Certificate");
    let has_signature = xml.contains("<ds:Signature");
    let has_timestamp = xml.contains("<xades:SignatureTimeStamp")
        && xml.contains("<xades:EncapsulatedTimeStamp");

    require(
        &mut report,
        profile,
        "certificate",
        has_certificate,
        "an embedded signing certificate is required",
    );
    require(
        &mut report,
        profile,
        "signature",
        has_signature,
        "a signature envelope is required",
    );

    match from_xml(xml) {
        Ok(document) => {
            require(
                &mut report,
                profile,
                "issuer-tax-id",
                is_valid_tax_id(&document.parties.seller.tax_id),
                "issuer tax id must be a valid NIF/NIE/CIF",
            );
            require(
                &mut report,
                profile,
                "recipient-tax-id",
                is_valid_tax_id(&document.parties.buyer.tax_id),
                "recipient tax id must be a valid NIF/NIE/CIF",
            );

            let positive_total = !document.invoices.is_empty()
                && document
                    .invoices
                    .iter()
                    .all(|inv| inv.totals.invoice_total > Decimal::ZERO);
            require(
                &mut report,
                profile,
                "positive-total",
                positive_total,
                "every invoice total must be greater than zero",
            );
        }
        Err(e) => {
            report.errors.push(ValidationIssue::with_rule(
                "document",
                e.to_string(),
                "FE-STR-00",
            ));
        }
    }

    let issue_dates = extract_issue_dates(xml);
    let dates_parse = !issue_dates.is_empty() && issue_dates.iter().all(Option::is_some);
    let detail = match profile {
        // AEAT additionally rejects future-dated invoices.
        Profile::Aeat => {
            let today = Utc::now().date_naive();
            let not_future = dates_parse
                && issue_dates.iter().flatten().all(|d| *d <= today);
            require(
                &mut report,
                profile,
                "issue-date",
                not_future,
                "issue date must be valid and not in the future",
            );
            None
        }
        Profile::Face | Profile::General => Some("issue date must be a valid date"),
    };
    if let Some(detail) = detail {
        require(&mut report, profile, "issue-date", dates_parse, detail);
    }

    if profile == Profile::Face {
        require(
            &mut report,
            profile,
            "timestamp",
            has_timestamp,
            "XAdES-T evidence (signature timestamp with encapsulated TSA value) is required",
        );
    }

    report.is_valid = report.errors.is_empty();
    report
}

fn require(report: &mut ValidationReport, profile: Profile, name: &str, met: bool, detail: &str) {
    report.requirements.push(Requirement {
        name: name.into(),
        met,
        detail: detail.into(),
    });
    if !met {
        report.errors.push(ValidationIssue::with_rule(
            name,
            format!("{profile} profile: {detail}"),
            format!("{}-{}", profile.name(), name.to_ascii_uppercase()),
        ));
    }
}

/// Raw `<IssueDate>` texts, parsed individually so an unparseable date is
/// distinguishable from a missing one.
fn extract_issue_dates(xml: &str) -> Vec<Option<NaiveDate>> {
    let mut dates = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find("<IssueDate>") {
        let after = &rest[start + "<IssueDate>".len()..];
        let Some(end) = after.find("</IssueDate>") else {
            break;
        };
        dates.push(NaiveDate::from_str(after[..end].trim()).ok());
        rest = &after[end..];
    }
    dates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_dates() {
        let xml = "<a><IssueDate>2025-03-01</IssueDate><IssueDate>bad</IssueDate></a>";
        let dates = extract_issue_dates(xml);
        assert_eq!(dates.len(), 2);
        assert!(dates[0].is_some());
        assert!(dates[1].is_none());
    }

    #[test]
    fn profile_names() {
        assert_eq!(Profile::Aeat.name(), "AEAT");
        assert_eq!(Profile::Face.name(), "FACE");
        assert_eq!(Profile::General.name(), "GENERAL");
    }
}
