use chrono::NaiveDate;
use efactura::core::*;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn issuer() -> PartyIdentity {
    PartyBuilder::legal_entity("B12345678", "Despacho Ejemplo SL")
        .address("Calle Mayor 1", "28001", "Madrid", "Madrid")
        .contact(Some("+34 910 000 000".into()), Some("admin@ejemplo.es".into()))
        .build()
}

fn recipient() -> PartyIdentity {
    PartyBuilder::individual("12345678Z", "Ana", "García")
        .second_surname("Pérez")
        .address("Gran Vía 2", "28013", "Madrid", "Madrid")
        .build()
}

fn draft() -> InvoiceDraft {
    InvoiceDraftBuilder::new(date(2025, 3, 1))
        .issuer(issuer())
        .recipient(recipient())
        .line("Asesoramiento mercantil", dec!(10), dec!(120))
        .build()
        .unwrap()
}

// --- Calculation ---

#[test]
fn reference_calculation() {
    let lines = [InvoiceLineItem::new("Servicio", dec!(1), dec!(100))];
    let breakdown = calculate(&CalculationInput::new(&lines).discount(dec!(10))).unwrap();
    assert_eq!(breakdown.net_base, dec!(90));
    assert_eq!(breakdown.vat, dec!(18.9));
    assert_eq!(breakdown.withholding, dec!(0));
    assert_eq!(breakdown.total, dec!(108.9));
}

#[test]
fn full_chain_reconciles() {
    let lines = [
        InvoiceLineItem::new("Asesoramiento", dec!(10), dec!(120)),
        InvoiceLineItem::new("Escrito de alegaciones", dec!(1), dec!(350.50)),
    ];
    let provisions = [AdvancePaymentProvision::new(dec!(200))];
    let breakdown = calculate(
        &CalculationInput::new(&lines)
            .discount(dec!(5))
            .withholding(dec!(15))
            .provisions(&provisions),
    )
    .unwrap();

    assert_eq!(breakdown.gross_base, dec!(1550.50));
    assert!(breakdown.reconciles());
    let rounded = breakdown.rounded();
    assert!((rounded.total - (rounded.net_base + rounded.vat - rounded.withholding)).abs() <= dec!(0.01));
}

#[test]
fn calculation_is_pure() {
    let lines = [InvoiceLineItem::new("Servicio", dec!(2), dec!(75))];
    let input = CalculationInput::new(&lines).withholding(dec!(7));
    let first = calculate(&input).unwrap();
    let second = calculate(&input).unwrap();
    assert_eq!(first, second);
}

// --- Builder ---

#[test]
fn builder_requires_parties() {
    let result = InvoiceDraftBuilder::new(date(2025, 3, 1))
        .line("Servicio", dec!(1), dec!(100))
        .build();
    assert!(matches!(result, Err(EfacturaError::InputValidation(_))));
}

#[test]
fn builder_rejects_empty_lines() {
    let result = InvoiceDraftBuilder::new(date(2025, 3, 1))
        .issuer(issuer())
        .recipient(recipient())
        .build();
    assert!(matches!(result, Err(EfacturaError::InputValidation(_))));
}

#[test]
fn draft_materializes_with_breakdown() {
    let record = draft().into_record("FAC-2025-0001".into(), InvoiceState::Borrador);
    let breakdown = record.breakdown.as_ref().unwrap();
    assert_eq!(breakdown.gross_base, dec!(1200));
    assert_eq!(record.document_version, 1);
    assert!(!record.signed);
}

// --- Provisions ---

#[test]
fn provision_links_exclusively() {
    let mut provision = AdvancePaymentProvision::new(dec!(500));
    let first = uuid::Uuid::new_v4();
    let second = uuid::Uuid::new_v4();

    provision.apply_to(first).unwrap();
    // Re-applying to the same invoice is a no-op.
    provision.apply_to(first).unwrap();
    // A different invoice is rejected.
    assert!(provision.apply_to(second).is_err());
    assert_eq!(provision.applied_to, Some(first));
}

// --- Lifecycle ---

#[test]
fn update_on_anulada_conflicts() {
    let mut record = draft().into_record("FAC-2025-0001".into(), InvoiceState::Emitida);
    cancel(&mut record, "Error en datos").unwrap();
    assert_eq!(record.state, InvoiceState::Anulada);

    let err = ensure_editable(&record, "update").unwrap_err();
    assert!(matches!(err, EfacturaError::StateConflict { .. }));
}

#[test]
fn cancel_on_aceptada_conflicts() {
    let mut record = draft().into_record("FAC-2025-0001".into(), InvoiceState::Aceptada);
    let err = cancel(&mut record, "Error en datos").unwrap_err();
    assert!(matches!(err, EfacturaError::StateConflict { .. }));
}

#[test]
fn cancel_stores_reason() {
    let mut record = draft().into_record("FAC-2025-0001".into(), InvoiceState::Emitida);
    cancel(&mut record, "Error en datos").unwrap();
    assert_eq!(record.cancel_reason.as_deref(), Some("Error en datos"));
}

#[test]
fn signature_invalidation_bumps_version() {
    let mut record = draft().into_record("FAC-2025-0001".into(), InvoiceState::Emitida);
    record.signed = true;
    record.signed_xml = Some("<signed/>".into());

    record.invalidate_signature();
    assert!(!record.signed);
    assert!(record.signed_xml.is_none());
    assert_eq!(record.document_version, 2);

    // Idempotent when nothing is signed.
    record.invalidate_signature();
    assert_eq!(record.document_version, 2);
}

// --- Numbering ---

#[test]
fn sequence_allocation() {
    assert_eq!(next_in_sequence([], "FAC", 2025).unwrap(), "FAC-2025-0001");
    let existing = ["FAC-2025-0001", "FAC-2025-0002"];
    assert_eq!(
        next_in_sequence(existing, "FAC", 2025).unwrap(),
        "FAC-2025-0003"
    );
}

// --- Audit ---

#[test]
fn audit_event_carries_context() {
    let mut sink = MemoryAuditSink::new();
    let record = draft().into_record("FAC-2025-0001".into(), InvoiceState::Borrador);
    sink.record(
        AuditEvent::new(record.id, "user-7", AuditAction::StatusChanged, "issued")
            .with_field("state", "borrador", "emitida"),
    );

    let events = sink.for_invoice(record.id);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].acting_user_id, "user-7");
    assert_eq!(events[0].action.as_str(), "status_changed");
    assert_eq!(events[0].old_value.as_deref(), Some("borrador"));
}
