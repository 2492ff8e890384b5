use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::Event;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::model::*;
use crate::core::{
    Address, Contact, EfacturaError, PartyIdentity, PartyKind, ResidenceCode,
};

/// Parse a Facturae XML string back into the document tree.
///
/// Round-trip contract: a document produced by the assembler re-parses
/// into a tree with identical item count, totals, and party identities.
/// Signature elements are skipped — the validator inspects those.
pub fn from_xml(xml: &str) -> Result<FacturaeDocument, EfacturaError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut doc = ParsedDocument::default();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = std::str::from_utf8(e.name().as_ref())
                    .unwrap_or("")
                    .to_string();
                doc.handle_start(&name);
                path.push(name);
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if !text.is_empty() {
                    doc.handle_text(&path, &text);
                }
            }
            Ok(Event::End(_)) => {
                let ended = path.pop().unwrap_or_default();
                doc.handle_end(&ended, &path);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(EfacturaError::Xml(format!("XML parse error: {e}")));
            }
            _ => {}
        }
    }

    doc.into_document()
}

fn path_has(path: &[String], name: &str) -> bool {
    path.iter().any(|p| p == name)
}

fn parse_decimal(text: &str) -> Decimal {
    Decimal::from_str(text).unwrap_or(Decimal::ZERO)
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::from_str(text).ok()
}

// ---------------------------------------------------------------------------
// Accumulators
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ParsedDocument {
    saw_root: bool,
    schema_version: Option<String>,
    modality: Option<String>,
    issuer_type: Option<String>,
    seller: PartyAcc,
    buyer: PartyAcc,
    invoices: Vec<InvoiceDocument>,
    current_invoice: Option<InvoiceAcc>,
    current_tax: Option<TaxAcc>,
}

#[derive(Default)]
struct PartyAcc {
    person_type: Option<String>,
    residence: Option<String>,
    tax_id: Option<String>,
    first_name: Option<String>,
    first_surname: Option<String>,
    second_surname: Option<String>,
    corporate_name: Option<String>,
    trade_name: Option<String>,
    street: Option<String>,
    post_code: Option<String>,
    town: Option<String>,
    province: Option<String>,
    country_code: Option<String>,
    phone: Option<String>,
    email: Option<String>,
}

impl PartyAcc {
    fn into_party(self) -> PartyIdentity {
        let kind = if let Some(corporate_name) = self.corporate_name {
            PartyKind::LegalEntity {
                corporate_name,
                trade_name: self.trade_name,
            }
        } else {
            PartyKind::Individual {
                first_name: self.first_name.unwrap_or_default(),
                surname: self.first_surname.unwrap_or_default(),
                second_surname: self.second_surname,
            }
        };
        let contact = if self.phone.is_some() || self.email.is_some() {
            Some(Contact {
                phone: self.phone,
                email: self.email,
            })
        } else {
            None
        };
        PartyIdentity {
            tax_id: self.tax_id.unwrap_or_default(),
            residence: self
                .residence
                .as_deref()
                .and_then(ResidenceCode::from_code)
                .unwrap_or(ResidenceCode::Resident),
            kind,
            address: Address {
                street: self.street.unwrap_or_default(),
                post_code: self.post_code.unwrap_or_default(),
                town: self.town.unwrap_or_default(),
                province: self.province.unwrap_or_default(),
                country_code: self.country_code.unwrap_or_else(|| "ESP".into()),
            },
            contact,
        }
    }
}

#[derive(Default)]
struct InvoiceAcc {
    number: Option<String>,
    series_code: Option<String>,
    document_type: Option<String>,
    class: Option<String>,
    issue_date: Option<String>,
    operation_date: Option<String>,
    currency: Option<String>,
    language: Option<String>,
    taxes_outputs: Vec<TaxLine>,
    taxes_withheld: Vec<TaxLine>,
    gross_amount: Decimal,
    total_tax_outputs: Decimal,
    total_taxes_withheld: Decimal,
    invoice_total: Decimal,
    outstanding: Decimal,
    executable: Decimal,
    items: Vec<ItemLine>,
    current_item: Option<ItemAcc>,
    legal_literals: Vec<String>,
    related_documents: Vec<String>,
}

#[derive(Default)]
struct ItemAcc {
    description: Option<String>,
    quantity: Decimal,
    unit_price: Decimal,
    total_cost: Decimal,
    gross_amount: Decimal,
    taxes: Vec<TaxLine>,
}

#[derive(Default)]
struct TaxAcc {
    tax_type_code: Option<String>,
    rate: Decimal,
    base: Decimal,
    amount: Decimal,
}

impl TaxAcc {
    fn into_line(self) -> TaxLine {
        TaxLine {
            tax_type_code: self.tax_type_code.unwrap_or_default(),
            rate: self.rate,
            base: self.base,
            amount: self.amount,
        }
    }
}

impl ParsedDocument {
    fn handle_start(&mut self, name: &str) {
        match name {
            "fe:Facturae" | "Facturae" => self.saw_root = true,
            "Invoice" => self.current_invoice = Some(InvoiceAcc::default()),
            "InvoiceLine" => {
                if let Some(inv) = self.current_invoice.as_mut() {
                    inv.current_item = Some(ItemAcc::default());
                }
            }
            "Tax" => self.current_tax = Some(TaxAcc::default()),
            _ => {}
        }
    }

    fn handle_text(&mut self, path: &[String], text: &str) {
        let Some(last) = path.last().map(String::as_str) else {
            return;
        };

        // FileHeader
        if path_has(path, "FileHeader") {
            match last {
                "SchemaVersion" => self.schema_version = Some(text.into()),
                "Modality" => self.modality = Some(text.into()),
                "InvoiceIssuerType" => self.issuer_type = Some(text.into()),
                _ => {}
            }
            return;
        }

        // Parties
        if path_has(path, "SellerParty") || path_has(path, "BuyerParty") {
            let party = if path_has(path, "SellerParty") {
                &mut self.seller
            } else {
                &mut self.buyer
            };
            match last {
                "PersonTypeCode" => party.person_type = Some(text.into()),
                "ResidenceTypeCode" => party.residence = Some(text.into()),
                "TaxIdentificationNumber" => party.tax_id = Some(text.into()),
                "Name" => party.first_name = Some(text.into()),
                "FirstSurname" => party.first_surname = Some(text.into()),
                "SecondSurname" => party.second_surname = Some(text.into()),
                "CorporateName" => party.corporate_name = Some(text.into()),
                "TradeName" => party.trade_name = Some(text.into()),
                "Address" => party.street = Some(text.into()),
                "PostCode" => party.post_code = Some(text.into()),
                "Town" => party.town = Some(text.into()),
                "Province" => party.province = Some(text.into()),
                "CountryCode" => party.country_code = Some(text.into()),
                "Telephone" => party.phone = Some(text.into()),
                "ElectronicMail" => party.email = Some(text.into()),
                _ => {}
            }
            return;
        }

        // Inside an invoice
        let Some(inv) = self.current_invoice.as_mut() else {
            return;
        };

        // Tax sub-elements (invoice- or item-level)
        if path_has(path, "Tax") {
            if let Some(tax) = self.current_tax.as_mut() {
                match last {
                    "TaxTypeCode" => tax.tax_type_code = Some(text.into()),
                    "TaxRate" => tax.rate = parse_decimal(text),
                    "TotalAmount" if path_has(path, "TaxableBase") => {
                        tax.base = parse_decimal(text);
                    }
                    "TotalAmount" if path_has(path, "TaxAmount") => {
                        tax.amount = parse_decimal(text);
                    }
                    _ => {}
                }
            }
            return;
        }

        if path_has(path, "InvoiceLine") {
            if let Some(item) = inv.current_item.as_mut() {
                match last {
                    "ItemDescription" => item.description = Some(text.into()),
                    "Quantity" => item.quantity = parse_decimal(text),
                    "UnitPriceWithoutTax" => item.unit_price = parse_decimal(text),
                    "TotalCost" => item.total_cost = parse_decimal(text),
                    "GrossAmount" => item.gross_amount = parse_decimal(text),
                    _ => {}
                }
            }
            return;
        }

        match last {
            "InvoiceNumber" => inv.number = Some(text.into()),
            "InvoiceSeriesCode" => inv.series_code = Some(text.into()),
            "InvoiceDocumentType" => inv.document_type = Some(text.into()),
            "InvoiceClass" => inv.class = Some(text.into()),
            "IssueDate" => inv.issue_date = Some(text.into()),
            "OperationDate" => inv.operation_date = Some(text.into()),
            "InvoiceCurrencyCode" => inv.currency = Some(text.into()),
            "LanguageName" => inv.language = Some(text.into()),
            "TotalGrossAmount" => inv.gross_amount = parse_decimal(text),
            "TotalTaxOutputs" => inv.total_tax_outputs = parse_decimal(text),
            "TotalTaxesWithheld" => inv.total_taxes_withheld = parse_decimal(text),
            "InvoiceTotal" => inv.invoice_total = parse_decimal(text),
            "TotalOutstandingAmount" => inv.outstanding = parse_decimal(text),
            "TotalExecutableAmount" => inv.executable = parse_decimal(text),
            "LegalReference" => inv.legal_literals.push(text.into()),
            "RelatedDocument" => inv.related_documents.push(text.into()),
            _ => {}
        }
    }

    fn handle_end(&mut self, ended: &str, path: &[String]) {
        match ended {
            "Tax" => {
                let Some(tax) = self.current_tax.take() else {
                    return;
                };
                let Some(inv) = self.current_invoice.as_mut() else {
                    return;
                };
                if path_has(path, "InvoiceLine") {
                    if let Some(item) = inv.current_item.as_mut() {
                        item.taxes.push(tax.into_line());
                    }
                } else if path_has(path, "TaxesWithheld") {
                    inv.taxes_withheld.push(tax.into_line());
                } else {
                    inv.taxes_outputs.push(tax.into_line());
                }
            }
            "InvoiceLine" => {
                if let Some(inv) = self.current_invoice.as_mut() {
                    if let Some(item) = inv.current_item.take() {
                        inv.items.push(ItemLine {
                            description: item.description.unwrap_or_default(),
                            quantity: item.quantity,
                            unit_price: item.unit_price,
                            total_cost: item.total_cost,
                            gross_amount: item.gross_amount,
                            taxes: item.taxes,
                        });
                    }
                }
            }
            "Invoice" => {
                if let Some(inv) = self.current_invoice.take() {
                    self.invoices.push(inv.into_invoice());
                }
            }
            _ => {}
        }
    }

    fn into_document(self) -> Result<FacturaeDocument, EfacturaError> {
        if !self.saw_root {
            return Err(EfacturaError::Xml(
                "document has no Facturae root element".into(),
            ));
        }

        Ok(FacturaeDocument {
            header: FileHeader {
                schema_version: self.schema_version.unwrap_or_default(),
                modality: self
                    .modality
                    .as_deref()
                    .and_then(Modality::from_code)
                    .unwrap_or(Modality::Individual),
                issuer_type: self
                    .issuer_type
                    .as_deref()
                    .and_then(IssuerType::from_code)
                    .unwrap_or(IssuerType::Seller),
            },
            parties: Parties {
                seller: self.seller.into_party(),
                buyer: self.buyer.into_party(),
            },
            invoices: self.invoices,
        })
    }
}

impl InvoiceAcc {
    fn into_invoice(self) -> InvoiceDocument {
        InvoiceDocument {
            header: InvoiceHeader {
                number: self.number.unwrap_or_default(),
                series_code: self.series_code,
                document_type: self
                    .document_type
                    .as_deref()
                    .and_then(DocumentType::from_code)
                    .unwrap_or(DocumentType::Complete),
                class: self
                    .class
                    .as_deref()
                    .and_then(InvoiceClass::from_code)
                    .unwrap_or(InvoiceClass::Original),
            },
            issue_data: IssueData {
                issue_date: self
                    .issue_date
                    .as_deref()
                    .and_then(parse_date)
                    .unwrap_or_default(),
                operation_date: self.operation_date.as_deref().and_then(parse_date),
                currency: self.currency.unwrap_or_else(|| "EUR".into()),
                language: self.language.unwrap_or_else(|| "es".into()),
            },
            taxes_outputs: self.taxes_outputs,
            taxes_withheld: self.taxes_withheld,
            totals: InvoiceTotals {
                gross_amount: self.gross_amount,
                total_tax_outputs: self.total_tax_outputs,
                total_taxes_withheld: self.total_taxes_withheld,
                invoice_total: self.invoice_total,
                outstanding: self.outstanding,
                executable: self.executable,
            },
            items: self.items,
            legal_literals: self.legal_literals,
            related_documents: self.related_documents,
        }
    }
}
