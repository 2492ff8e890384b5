//! Multi-pass document validation.
//!
//! Three independently invocable passes:
//!
//! - **Structural** ([`validate_structure`]) — root element, namespace,
//!   and required blocks.
//! - **Business** ([`validate_business`]) — tax-id formats, totals
//!   reconciliation, item presence. Hard errors in strict mode, warnings
//!   otherwise.
//! - **Profile** ([`validate_profile`]) — per-authority required-evidence
//!   checklists (AEAT, FACE, GENERAL). Always hard errors; gates delivery.
//!
//! Every pass is a pure function of its input: validating the same
//! document twice yields an identical report.

mod business;
mod profile;
mod structural;

pub use business::{Mode, is_valid_tax_id, validate_business};
pub use profile::{Profile, validate_profile};
pub use structural::validate_structure;

use crate::core::ValidationIssue;

/// Outcome of a validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    /// Profile mode only: one entry per checklist item, met or not.
    pub requirements: Vec<Requirement>,
}

impl ValidationReport {
    pub(crate) fn from_issues(
        errors: Vec<ValidationIssue>,
        warnings: Vec<ValidationIssue>,
    ) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            requirements: Vec::new(),
        }
    }

    /// Merge another report into this one.
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.requirements.extend(other.requirements);
        self.is_valid = self.errors.is_empty();
    }
}

/// One profile checklist item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub met: bool,
    pub detail: String,
}

/// Full pre-delivery validation: structural + business, plus signature
/// structure iff a signature element exists. A missing signature is a
/// warning — pre-signing documents may legitimately be validated.
#[cfg(feature = "xades")]
pub fn validate_signed_document(
    xml: &str,
    config: &crate::core::FacturaeConfig,
    mode: Mode,
) -> ValidationReport {
    let mut report = validate_structure(xml, config);
    report.merge(validate_business(xml, config, mode));

    if xml.contains("<ds:Signature") {
        if let Err(e) = crate::xades::validate_signature_structure(xml) {
            report
                .errors
                .push(ValidationIssue::new("signature", e.to_string()));
        }
    } else {
        report.warnings.push(ValidationIssue::with_rule(
            "signature",
            "document is not signed",
            "FE-SIG-00",
        ));
    }

    report.is_valid = report.errors.is_empty();
    report
}
