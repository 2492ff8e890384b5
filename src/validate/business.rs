use rust_decimal::Decimal;

use super::ValidationReport;
use crate::core::{FacturaeConfig, PartyIdentity, ValidationIssue};
use crate::facturae::{FacturaeDocument, from_xml};

/// Business-rule severity mode. Strict turns rule failures into hard
/// errors; lenient downgrades them to warnings (they still block
/// delivery to any external profile).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Strict,
    Lenient,
}

/// Declarative field schema: one row per checked party field, evaluated
/// by a single generic routine — no reflection.
struct FieldSpec {
    field: &'static str,
    required: bool,
    constraint: Constraint,
    rule: &'static str,
}

enum Constraint {
    TaxId,
    NonEmpty,
    KnownCountry,
}

const PARTY_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        field: "tax_id",
        required: true,
        constraint: Constraint::TaxId,
        rule: "FE-NIF-01",
    },
    FieldSpec {
        field: "address.town",
        required: true,
        constraint: Constraint::NonEmpty,
        rule: "FE-ADR-01",
    },
    FieldSpec {
        field: "address.post_code",
        required: true,
        constraint: Constraint::NonEmpty,
        rule: "FE-ADR-02",
    },
    FieldSpec {
        field: "address.country_code",
        required: true,
        constraint: Constraint::KnownCountry,
        rule: "FE-ADR-03",
    },
];

fn field_value<'a>(party: &'a PartyIdentity, field: &str) -> &'a str {
    match field {
        "tax_id" => &party.tax_id,
        "address.town" => &party.address.town,
        "address.post_code" => &party.address.post_code,
        "address.country_code" => &party.address.country_code,
        _ => "",
    }
}

fn check_party(
    party: &PartyIdentity,
    prefix: &str,
    config: &FacturaeConfig,
    issues: &mut Vec<ValidationIssue>,
) {
    for spec in PARTY_FIELDS {
        let value = field_value(party, spec.field);
        let path = format!("{prefix}.{}", spec.field);

        if value.trim().is_empty() {
            if spec.required {
                issues.push(ValidationIssue::with_rule(
                    path,
                    format!("{} must not be empty", spec.field),
                    spec.rule,
                ));
            }
            continue;
        }

        let ok = match spec.constraint {
            Constraint::NonEmpty => true,
            Constraint::TaxId => is_valid_tax_id(value),
            Constraint::KnownCountry => config.is_allowed_country(value),
        };
        if !ok {
            let message = match spec.constraint {
                Constraint::TaxId => format!("'{value}' is not a valid NIF/NIE/CIF"),
                Constraint::KnownCountry => {
                    format!("country code '{value}' is not in the configured allowlist")
                }
                Constraint::NonEmpty => String::new(),
            };
            issues.push(ValidationIssue::with_rule(path, message, spec.rule));
        }
    }
}

const DNI_CONTROL_LETTERS: &[u8; 23] = b"TRWAGMYFPDXBNJZSQVHLCKE";

/// Validate a Spanish tax identifier: DNI (8 digits + control letter),
/// NIE (X/Y/Z + 7 digits + control letter), or CIF (organization letter +
/// 7 digits + check character). DNI/NIE control letters are verified.
pub fn is_valid_tax_id(id: &str) -> bool {
    let id = id.trim().to_ascii_uppercase();
    let bytes = id.as_bytes();
    if bytes.len() != 9 || !id.is_ascii() {
        return false;
    }

    let first = bytes[0];
    if first.is_ascii_digit() {
        // DNI: 8 digits + control letter.
        let digits = &id[..8];
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        let Ok(number) = digits.parse::<u32>() else {
            return false;
        };
        bytes[8] == DNI_CONTROL_LETTERS[(number % 23) as usize]
    } else if matches!(first, b'X' | b'Y' | b'Z') {
        // NIE: leading letter maps to 0/1/2, then DNI rules.
        let digits = &id[1..8];
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        let prefix = match first {
            b'X' => 0u32,
            b'Y' => 1,
            _ => 2,
        };
        let Ok(number) = digits.parse::<u32>() else {
            return false;
        };
        bytes[8] == DNI_CONTROL_LETTERS[((prefix * 10_000_000 + number) % 23) as usize]
    } else if first.is_ascii_alphabetic() {
        // CIF: organization letter + 7 digits + digit or letter check.
        id[1..8].bytes().all(|b| b.is_ascii_digit())
            && (bytes[8].is_ascii_digit() || bytes[8].is_ascii_alphabetic())
    } else {
        false
    }
}

/// Tolerance for totals reconciliation: one cent.
const TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Business pass over the parsed document.
pub fn validate_business(xml: &str, config: &FacturaeConfig, mode: Mode) -> ValidationReport {
    let document = match from_xml(xml) {
        Ok(doc) => doc,
        Err(e) => {
            return ValidationReport::from_issues(
                vec![ValidationIssue::with_rule(
                    "document",
                    e.to_string(),
                    "FE-STR-00",
                )],
                Vec::new(),
            );
        }
    };

    let issues = business_issues(&document, config);
    match mode {
        Mode::Strict => ValidationReport::from_issues(issues, Vec::new()),
        Mode::Lenient => ValidationReport::from_issues(Vec::new(), issues),
    }
}

fn business_issues(document: &FacturaeDocument, config: &FacturaeConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    check_party(&document.parties.seller, "parties.seller", config, &mut issues);
    check_party(&document.parties.buyer, "parties.buyer", config, &mut issues);

    for (i, invoice) in document.invoices.iter().enumerate() {
        let totals = &invoice.totals;
        let expected =
            totals.gross_amount + totals.total_tax_outputs - totals.total_taxes_withheld;
        if (totals.invoice_total - expected).abs() > TOLERANCE {
            issues.push(ValidationIssue::with_rule(
                format!("invoices[{i}].totals.invoice_total"),
                format!(
                    "invoice total {} does not reconcile with gross {} + taxes {} − withheld {}",
                    totals.invoice_total,
                    totals.gross_amount,
                    totals.total_tax_outputs,
                    totals.total_taxes_withheld
                ),
                "FE-TOT-01",
            ));
        }

        if invoice.items.is_empty() {
            issues.push(ValidationIssue::with_rule(
                format!("invoices[{i}].items"),
                "invoice must have at least one item",
                "FE-ITM-01",
            ));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dni_control_letter() {
        assert!(is_valid_tax_id("12345678Z"));
        assert!(!is_valid_tax_id("12345678A"));
        assert!(is_valid_tax_id("00000000T"));
    }

    #[test]
    fn nie_control_letter() {
        // X0000000 → 0 % 23 → 'T'
        assert!(is_valid_tax_id("X0000000T"));
        assert!(!is_valid_tax_id("X0000000A"));
    }

    #[test]
    fn cif_shape() {
        assert!(is_valid_tax_id("B12345678"));
        assert!(is_valid_tax_id("A1234567H"));
        assert!(!is_valid_tax_id("B1234"));
        assert!(!is_valid_tax_id("B12C45678"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(!is_valid_tax_id(""));
        assert!(!is_valid_tax_id("         "));
        assert!(!is_valid_tax_id("9Z"));
        assert!(!is_valid_tax_id("1234567é9"));
    }
}
