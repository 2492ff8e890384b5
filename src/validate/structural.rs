use quick_xml::Reader;
use quick_xml::events::Event;

use super::ValidationReport;
use crate::core::{FacturaeConfig, ValidationIssue};

#[derive(Default)]
struct InvoiceBlocks {
    has_header: bool,
    has_issue_data: bool,
    has_totals: bool,
}

/// Structural pass: the document parses, has the single configured root
/// with its namespace, contains FileHeader/Parties/Invoices, and every
/// invoice carries InvoiceHeader/InvoiceIssueData/InvoiceTotals.
pub fn validate_structure(xml: &str, config: &FacturaeConfig) -> ValidationReport {
    let mut errors = Vec::new();

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root_seen = false;
    let mut root_ok = false;
    let mut namespace_ok = false;
    let mut extra_roots = false;
    let mut has_file_header = false;
    let mut has_parties = false;
    let mut has_invoices = false;
    let mut invoices: Vec<InvoiceBlocks> = Vec::new();
    let mut depth = 0usize;
    let mut in_invoice = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name_buf = e.name();
                let name = std::str::from_utf8(name_buf.as_ref()).unwrap_or("");
                if depth == 0 {
                    if root_seen {
                        extra_roots = true;
                    }
                    root_seen = true;
                    root_ok = name == "fe:Facturae" || name == "Facturae";
                    for attr in e.attributes().flatten() {
                        let key = std::str::from_utf8(attr.key.as_ref()).unwrap_or("");
                        let value = std::str::from_utf8(&attr.value).unwrap_or("");
                        if (key == "xmlns:fe" || key == "xmlns") && value == config.namespace {
                            namespace_ok = true;
                        }
                    }
                } else if depth == 1 {
                    match name {
                        "FileHeader" => has_file_header = true,
                        "Parties" => has_parties = true,
                        "Invoices" => has_invoices = true,
                        _ => {}
                    }
                } else if name == "Invoice" && !in_invoice {
                    in_invoice = true;
                    invoices.push(InvoiceBlocks::default());
                } else if in_invoice {
                    if let Some(current) = invoices.last_mut() {
                        match name {
                            "InvoiceHeader" => current.has_header = true,
                            "InvoiceIssueData" => current.has_issue_data = true,
                            "InvoiceTotals" => current.has_totals = true,
                            _ => {}
                        }
                    }
                }
                depth += 1;
            }
            Ok(Event::End(ref e)) => {
                depth = depth.saturating_sub(1);
                let name_buf = e.name();
                let name = std::str::from_utf8(name_buf.as_ref()).unwrap_or("");
                if name == "Invoice" {
                    in_invoice = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                errors.push(ValidationIssue::with_rule(
                    "document",
                    format!("document is not well-formed XML: {e}"),
                    "FE-STR-00",
                ));
                return ValidationReport::from_issues(errors, Vec::new());
            }
            _ => {}
        }
    }

    if !root_seen || !root_ok {
        errors.push(ValidationIssue::with_rule(
            "document",
            "root element must be fe:Facturae",
            "FE-STR-01",
        ));
    } else {
        if extra_roots {
            errors.push(ValidationIssue::with_rule(
                "document",
                "document must have a single root element",
                "FE-STR-01",
            ));
        }
        if !namespace_ok {
            errors.push(ValidationIssue::with_rule(
                "document",
                format!("root element must declare the namespace {}", config.namespace),
                "FE-STR-02",
            ));
        }
    }

    for (present, block, rule) in [
        (has_file_header, "FileHeader", "FE-STR-03"),
        (has_parties, "Parties", "FE-STR-04"),
        (has_invoices, "Invoices", "FE-STR-05"),
    ] {
        if root_seen && root_ok && !present {
            errors.push(ValidationIssue::with_rule(
                "document",
                format!("document is missing the {block} block"),
                rule,
            ));
        }
    }

    for (i, invoice) in invoices.iter().enumerate() {
        for (present, block) in [
            (invoice.has_header, "InvoiceHeader"),
            (invoice.has_issue_data, "InvoiceIssueData"),
            (invoice.has_totals, "InvoiceTotals"),
        ] {
            if !present {
                errors.push(ValidationIssue::with_rule(
                    format!("invoices[{i}]"),
                    format!("invoice is missing the {block} block"),
                    "FE-STR-06",
                ));
            }
        }
    }

    ValidationReport::from_issues(errors, Vec::new())
}
