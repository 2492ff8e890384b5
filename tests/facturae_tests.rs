#![cfg(feature = "facturae")]

use chrono::NaiveDate;
use efactura::core::*;
use efactura::facturae;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn issuer() -> PartyIdentity {
    PartyBuilder::legal_entity("B12345678", "Despacho Ejemplo SL")
        .trade_name("Ejemplo Abogados")
        .address("Calle Mayor 1", "28001", "Madrid", "Madrid")
        .contact(Some("+34 910 000 000".into()), Some("admin@ejemplo.es".into()))
        .build()
}

fn recipient() -> PartyIdentity {
    PartyBuilder::individual("12345678Z", "Ana", "García")
        .address("Gran Vía 2", "28013", "Madrid", "Madrid")
        .build()
}

fn record() -> InvoiceRecord {
    InvoiceDraftBuilder::new(date(2025, 3, 1))
        .operation_date(date(2025, 2, 20))
        .series_code("FAC")
        .issuer(issuer())
        .recipient(recipient())
        .line("Asesoramiento mercantil", dec!(10), dec!(120))
        .line("Escrito de alegaciones", dec!(1), dec!(350.50))
        .withholding(dec!(15))
        .build()
        .unwrap()
        .into_record("FAC-2025-0001".into(), InvoiceState::Emitida)
}

#[test]
fn assembly_is_deterministic() {
    let config = FacturaeConfig::default();
    let record = record();
    let first = facturae::to_xml(&facturae::build_document(&record, &config), &config).unwrap();
    let second = facturae::to_xml(&facturae::build_document(&record, &config), &config).unwrap();
    assert_eq!(first, second);
}

#[test]
fn document_structure() {
    let config = FacturaeConfig::default();
    let document = facturae::build_document(&record(), &config);

    assert_eq!(document.header.schema_version, "3.2.2");
    assert_eq!(document.invoices.len(), 1);
    let invoice = &document.invoices[0];
    assert_eq!(invoice.header.number, "FAC-2025-0001");
    assert_eq!(invoice.header.series_code.as_deref(), Some("FAC"));
    assert_eq!(invoice.items.len(), 2);
    assert_eq!(invoice.taxes_outputs.len(), 1);
    assert_eq!(invoice.taxes_withheld.len(), 1);

    // Withholding produces a legal literal.
    assert!(!invoice.legal_literals.is_empty());

    let totals = &invoice.totals;
    assert_eq!(
        totals.invoice_total,
        totals.gross_amount + totals.total_tax_outputs - totals.total_taxes_withheld
    );
}

#[test]
fn roundtrip_recovers_items_totals_and_parties() {
    let config = FacturaeConfig::default();
    let record = record();
    let document = facturae::build_document(&record, &config);
    let xml = facturae::to_xml(&document, &config).unwrap();
    let reparsed = facturae::from_xml(&xml).unwrap();

    assert_eq!(reparsed.invoices.len(), document.invoices.len());
    let (a, b) = (&document.invoices[0], &reparsed.invoices[0]);
    assert_eq!(a.items.len(), b.items.len());
    assert_eq!(a.totals, b.totals);
    assert_eq!(a.header.number, b.header.number);
    assert_eq!(a.taxes_outputs, b.taxes_outputs);
    assert_eq!(a.taxes_withheld, b.taxes_withheld);

    assert_eq!(
        document.parties.seller.tax_id,
        reparsed.parties.seller.tax_id
    );
    assert_eq!(
        document.parties.seller.display_name(),
        reparsed.parties.seller.display_name()
    );
    assert_eq!(
        document.parties.buyer.tax_id,
        reparsed.parties.buyer.tax_id
    );
    assert_eq!(
        document.parties.buyer.display_name(),
        reparsed.parties.buyer.display_name()
    );
}

#[test]
fn amounts_serialize_as_fixed_decimal_text() {
    let config = FacturaeConfig::default();
    let record = record();
    let xml = facturae::to_xml(&facturae::build_document(&record, &config), &config).unwrap();

    assert!(xml.contains("<TotalGrossAmount>1550.50</TotalGrossAmount>"));
    assert!(!xml.to_lowercase().contains("e+"));
    assert!(!xml.to_lowercase().contains("e-1"));
}

#[test]
fn provision_excess_renders_negative_refund_line() {
    let provision = AdvancePaymentProvision::new(dec!(500));
    let record = InvoiceDraftBuilder::new(date(2025, 3, 1))
        .issuer(issuer())
        .recipient(recipient())
        .line("Consulta", dec!(1), dec!(200))
        .provision(provision)
        .build()
        .unwrap()
        .into_record("FAC-2025-0002".into(), InvoiceState::Emitida);

    let config = FacturaeConfig::default();
    let document = facturae::build_document(&record, &config);
    let invoice = &document.invoices[0];

    let refund = invoice.items.last().unwrap();
    assert!(refund.total_cost < dec!(0));

    let xml = facturae::to_xml(&document, &config).unwrap();
    assert!(xml.contains("<TotalCost>-300.00</TotalCost>"));
}

#[test]
fn assembler_fills_defaults_and_never_rejects() {
    // A record with no breakdown and no lines still assembles; emptiness
    // is a validator concern.
    let mut record = record();
    record.lines.clear();
    record.breakdown = None;

    let config = FacturaeConfig::default();
    let document = facturae::build_document(&record, &config);
    assert!(document.invoices[0].items.is_empty());
    assert!(facturae::to_xml(&document, &config).is_ok());
}

#[test]
fn verification_payload_format() {
    let record = record();
    let payload = facturae::verification_payload(&record);
    assert_eq!(
        payload,
        "NIF:B12345678|NUM:FAC-2025-0001|FEC:2025-03-01|IMP:1643.53"
    );
}
