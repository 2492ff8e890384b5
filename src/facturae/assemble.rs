use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::model::*;
use super::xml_utils::{XmlResult, XmlWriter, format_decimal};
use crate::core::{
    EfacturaError, FacturaeConfig, InvoiceRecord, PartyIdentity, PartyKind, TaxBreakdown,
    calculate,
};

/// Build the normalized document tree from a calculated invoice record.
///
/// Deterministic: the same record and config always yield the identical
/// tree. Missing optional business fields are filled with defaults; the
/// assembler never rejects a record — structural emptiness and business
/// inconsistencies are the validator's concern.
pub fn build_document(record: &InvoiceRecord, config: &FacturaeConfig) -> FacturaeDocument {
    let breakdown = record
        .breakdown
        .clone()
        .or_else(|| calculate(&calculation_input(record)).ok())
        .unwrap_or_else(zero_breakdown)
        .rounded();

    let mut taxes_outputs = Vec::new();
    if record.apply_vat {
        taxes_outputs.push(TaxLine {
            tax_type_code: TAX_TYPE_VAT.into(),
            rate: record.vat_pct,
            base: breakdown.net_base,
            amount: breakdown.vat,
        });
    }

    let mut taxes_withheld = Vec::new();
    if breakdown.withholding > Decimal::ZERO {
        taxes_withheld.push(TaxLine {
            tax_type_code: TAX_TYPE_IRPF.into(),
            rate: record.withholding_pct,
            base: breakdown.net_base,
            amount: breakdown.withholding,
        });
    }

    let mut items: Vec<ItemLine> = record
        .lines
        .iter()
        .map(|line| {
            let total = line.line_total();
            ItemLine {
                description: line.description.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                total_cost: total,
                gross_amount: total,
                taxes: if record.apply_vat {
                    vec![TaxLine {
                        tax_type_code: TAX_TYPE_VAT.into(),
                        rate: record.vat_pct,
                        base: total,
                        amount: total * record.vat_pct / dec!(100),
                    }]
                } else {
                    Vec::new()
                },
            }
        })
        .collect();

    // Provision excess over the taxable base becomes an explicit negative
    // refund line instead of a negative base.
    if breakdown.provision_refund > Decimal::ZERO {
        items.push(ItemLine {
            description: "Devolución de provisiones de fondos no aplicadas".into(),
            quantity: Decimal::ONE,
            unit_price: -breakdown.provision_refund,
            total_cost: -breakdown.provision_refund,
            gross_amount: -breakdown.provision_refund,
            taxes: Vec::new(),
        });
    }

    let mut legal_literals = Vec::new();
    if breakdown.withholding > Decimal::ZERO {
        legal_literals.push(format!(
            "Retención IRPF del {}% practicada sobre la base imponible.",
            format_decimal(record.withholding_pct)
        ));
    }
    if breakdown.provisions_applied > Decimal::ZERO {
        legal_literals.push(format!(
            "Provisiones de fondos aplicadas por importe de {} EUR.",
            format_decimal(breakdown.provisions_applied)
        ));
    }
    if !record.apply_vat {
        legal_literals.push("Operación exenta de IVA.".into());
    }

    let mut related_documents = Vec::new();
    if let Some(reason) = &record.cancel_reason {
        related_documents.push(format!("Factura anulada: {reason}"));
    }

    let derived_total = breakdown.net_base + breakdown.vat - breakdown.withholding;

    FacturaeDocument {
        header: FileHeader {
            schema_version: config.schema_version.clone(),
            modality: Modality::Individual,
            issuer_type: IssuerType::Seller,
        },
        parties: Parties {
            seller: record.issuer.clone(),
            buyer: record.recipient.clone(),
        },
        invoices: vec![InvoiceDocument {
            header: InvoiceHeader {
                number: record.number.clone(),
                series_code: record.series_code.clone(),
                document_type: DocumentType::Complete,
                class: InvoiceClass::Original,
            },
            issue_data: IssueData {
                issue_date: record.issue_date,
                operation_date: record.operation_date,
                currency: config.currency.clone(),
                language: config.language.clone(),
            },
            taxes_outputs,
            taxes_withheld,
            totals: InvoiceTotals {
                gross_amount: breakdown.net_base,
                total_tax_outputs: breakdown.vat,
                total_taxes_withheld: breakdown.withholding,
                // Derived from the rounded components: the document must
                // reconcile to the cent.
                invoice_total: derived_total,
                outstanding: derived_total,
                executable: derived_total,
            },
            items,
            legal_literals,
            related_documents,
        }],
    }
}

fn calculation_input(record: &InvoiceRecord) -> crate::core::CalculationInput<'_> {
    crate::core::CalculationInput {
        lines: &record.lines,
        discount_pct: record.discount_pct,
        withholding_pct: record.withholding_pct,
        vat_pct: record.vat_pct,
        apply_vat: record.apply_vat,
        provisions: &record.provisions,
    }
}

fn zero_breakdown() -> TaxBreakdown {
    TaxBreakdown {
        gross_base: Decimal::ZERO,
        discount_amount: Decimal::ZERO,
        provisions_applied: Decimal::ZERO,
        provision_refund: Decimal::ZERO,
        net_base: Decimal::ZERO,
        vat: Decimal::ZERO,
        withholding: Decimal::ZERO,
        total: Decimal::ZERO,
    }
}

/// Serialize the document tree to Facturae XML.
///
/// Child ordering is fixed so the output is canonical for signing:
/// identical trees serialize to byte-identical XML.
pub fn to_xml(document: &FacturaeDocument, config: &FacturaeConfig) -> XmlResult {
    let mut w = XmlWriter::new()?;

    w.start_element_with_attrs("fe:Facturae", &[("xmlns:fe", config.namespace.as_str())])?;

    w.start_element("FileHeader")?;
    w.text_element("SchemaVersion", &document.header.schema_version)?;
    w.text_element("Modality", document.header.modality.code())?;
    w.text_element("InvoiceIssuerType", document.header.issuer_type.code())?;
    w.end_element("FileHeader")?;

    w.start_element("Parties")?;
    write_party(&mut w, &document.parties.seller, "SellerParty")?;
    write_party(&mut w, &document.parties.buyer, "BuyerParty")?;
    w.end_element("Parties")?;

    w.start_element("Invoices")?;
    for invoice in &document.invoices {
        write_invoice(&mut w, invoice)?;
    }
    w.end_element("Invoices")?;

    w.end_element("fe:Facturae")?;
    w.into_string()
}

fn write_party(w: &mut XmlWriter, party: &PartyIdentity, tag: &str) -> Result<(), EfacturaError> {
    w.start_element(tag)?;

    w.start_element("TaxIdentification")?;
    w.text_element("PersonTypeCode", party.person_type_code())?;
    w.text_element("ResidenceTypeCode", party.residence.code())?;
    w.text_element("TaxIdentificationNumber", &party.tax_id)?;
    w.end_element("TaxIdentification")?;

    match &party.kind {
        PartyKind::LegalEntity {
            corporate_name,
            trade_name,
        } => {
            w.start_element("LegalEntity")?;
            w.text_element("CorporateName", corporate_name)?;
            if let Some(trade) = trade_name {
                w.text_element("TradeName", trade)?;
            }
            write_address(w, party)?;
            write_contact(w, party)?;
            w.end_element("LegalEntity")?;
        }
        PartyKind::Individual {
            first_name,
            surname,
            second_surname,
        } => {
            w.start_element("Individual")?;
            w.text_element("Name", first_name)?;
            w.text_element("FirstSurname", surname)?;
            if let Some(s2) = second_surname {
                w.text_element("SecondSurname", s2)?;
            }
            write_address(w, party)?;
            write_contact(w, party)?;
            w.end_element("Individual")?;
        }
    }

    w.end_element(tag)?;
    Ok(())
}

fn write_address(w: &mut XmlWriter, party: &PartyIdentity) -> Result<(), EfacturaError> {
    let address = &party.address;
    let tag = if address.country_code == "ESP" {
        "AddressInSpain"
    } else {
        "OverseasAddress"
    };
    w.start_element(tag)?;
    w.text_element("Address", &address.street)?;
    w.text_element("PostCode", &address.post_code)?;
    w.text_element("Town", &address.town)?;
    w.text_element("Province", &address.province)?;
    w.text_element("CountryCode", &address.country_code)?;
    w.end_element(tag)?;
    Ok(())
}

fn write_contact(w: &mut XmlWriter, party: &PartyIdentity) -> Result<(), EfacturaError> {
    if let Some(contact) = &party.contact {
        w.start_element("ContactDetails")?;
        if let Some(phone) = &contact.phone {
            w.text_element("Telephone", phone)?;
        }
        if let Some(email) = &contact.email {
            w.text_element("ElectronicMail", email)?;
        }
        w.end_element("ContactDetails")?;
    }
    Ok(())
}

fn write_invoice(w: &mut XmlWriter, invoice: &InvoiceDocument) -> Result<(), EfacturaError> {
    w.start_element("Invoice")?;

    w.start_element("InvoiceHeader")?;
    w.text_element("InvoiceNumber", &invoice.header.number)?;
    if let Some(series) = &invoice.header.series_code {
        w.text_element("InvoiceSeriesCode", series)?;
    }
    w.text_element("InvoiceDocumentType", invoice.header.document_type.code())?;
    w.text_element("InvoiceClass", invoice.header.class.code())?;
    w.end_element("InvoiceHeader")?;

    w.start_element("InvoiceIssueData")?;
    w.text_element("IssueDate", &invoice.issue_data.issue_date.to_string())?;
    if let Some(op) = &invoice.issue_data.operation_date {
        w.text_element("OperationDate", &op.to_string())?;
    }
    w.text_element("InvoiceCurrencyCode", &invoice.issue_data.currency)?;
    w.text_element("LanguageName", &invoice.issue_data.language)?;
    w.end_element("InvoiceIssueData")?;

    write_tax_block(w, "TaxesOutputs", &invoice.taxes_outputs)?;
    write_tax_block(w, "TaxesWithheld", &invoice.taxes_withheld)?;

    w.start_element("InvoiceTotals")?;
    w.amount_element("TotalGrossAmount", invoice.totals.gross_amount)?;
    w.amount_element("TotalTaxOutputs", invoice.totals.total_tax_outputs)?;
    w.amount_element("TotalTaxesWithheld", invoice.totals.total_taxes_withheld)?;
    w.amount_element("InvoiceTotal", invoice.totals.invoice_total)?;
    w.amount_element("TotalOutstandingAmount", invoice.totals.outstanding)?;
    w.amount_element("TotalExecutableAmount", invoice.totals.executable)?;
    w.end_element("InvoiceTotals")?;

    w.start_element("Items")?;
    for item in &invoice.items {
        w.start_element("InvoiceLine")?;
        w.text_element("ItemDescription", &item.description)?;
        w.amount_element("Quantity", item.quantity)?;
        w.amount_element("UnitPriceWithoutTax", item.unit_price)?;
        w.amount_element("TotalCost", item.total_cost)?;
        w.amount_element("GrossAmount", item.gross_amount)?;
        write_tax_block(w, "TaxesOutputs", &item.taxes)?;
        w.end_element("InvoiceLine")?;
    }
    w.end_element("Items")?;

    if !invoice.legal_literals.is_empty() {
        w.start_element("LegalLiterals")?;
        for literal in &invoice.legal_literals {
            w.text_element("LegalReference", literal)?;
        }
        w.end_element("LegalLiterals")?;
    }

    if !invoice.related_documents.is_empty() {
        w.start_element("AdditionalData")?;
        w.start_element("RelatedDocuments")?;
        for doc in &invoice.related_documents {
            w.text_element("RelatedDocument", doc)?;
        }
        w.end_element("RelatedDocuments")?;
        w.end_element("AdditionalData")?;
    }

    w.end_element("Invoice")?;
    Ok(())
}

fn write_tax_block(w: &mut XmlWriter, tag: &str, taxes: &[TaxLine]) -> Result<(), EfacturaError> {
    if taxes.is_empty() {
        return Ok(());
    }
    w.start_element(tag)?;
    for tax in taxes {
        w.start_element("Tax")?;
        w.text_element("TaxTypeCode", &tax.tax_type_code)?;
        w.amount_element("TaxRate", tax.rate)?;
        w.start_element("TaxableBase")?;
        w.amount_element("TotalAmount", tax.base)?;
        w.end_element("TaxableBase")?;
        w.start_element("TaxAmount")?;
        w.amount_element("TotalAmount", tax.amount)?;
        w.end_element("TaxAmount")?;
        w.end_element("Tax")?;
    }
    w.end_element(tag)?;
    Ok(())
}

/// Pipe-delimited verification payload consumed by the rendering
/// collaborator (QR generation): `NIF:…|NUM:…|FEC:yyyy-mm-dd|IMP:…`.
pub fn verification_payload(record: &InvoiceRecord) -> String {
    let total = record
        .breakdown
        .as_ref()
        .map(|b| b.rounded().total)
        .unwrap_or(Decimal::ZERO);
    format!(
        "NIF:{}|NUM:{}|FEC:{}|IMP:{}",
        record.issuer.tax_id,
        record.number,
        record.issue_date,
        format_decimal(total)
    )
}
