//! End-to-end invoice orchestration over external boundaries.
//!
//! The pipeline executes strictly in order for a given document version:
//! calculate → assemble → sign → validate → deliver. The lifecycle state
//! machine gates every mutation, and every accepted mutation emits exactly
//! one audit event.
//!
//! The persistence collaborator must guarantee at-most-one in-flight
//! mutation per invoice id; the pipeline relies on that external
//! serialization for its exactly-one-envelope and state-gating invariants.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use chrono::Datelike;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::core::{
    AuditAction, AuditEvent, AuditSink, EfacturaError, FacturaeConfig, InvoiceDraft,
    InvoiceLineItem, InvoiceRecord, InvoiceState, calculate, cancel, ensure_editable,
    next_in_sequence, transition,
};
use crate::facturae;
use crate::validate::{Mode, Profile, validate_business, validate_profile, validate_signed_document};
use crate::xades::{
    Certificate, RevocationProvider, SigningKey, TimestampProvider, XadesLevel, XadesSigner,
};

/// Persistence boundary for invoice records.
pub trait InvoiceStore {
    fn load(&self, id: Uuid) -> Result<InvoiceRecord, EfacturaError>;
    fn save(&mut self, record: &InvoiceRecord) -> Result<(), EfacturaError>;
    /// Every number already issued under `{prefix}-{year}-`.
    fn list_by_year_prefix(&self, prefix: &str, year: i32) -> Result<Vec<String>, EfacturaError>;
    fn delete(&mut self, id: Uuid) -> Result<(), EfacturaError>;
}

/// Result of handing a document to a receiving authority.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub success: bool,
    pub external_id: Option<String>,
    pub errors: Vec<String>,
}

/// Outbound delivery boundary. Only ever called with a profile-valid,
/// signed document.
pub trait DeliveryAdapter {
    fn send(
        &mut self,
        document: &str,
        profile: Profile,
    ) -> impl Future<Output = Result<DeliveryReceipt, EfacturaError>>;
}

/// Delivery retry budget (total attempts).
const DELIVERY_ATTEMPTS: u32 = 3;

/// Partial content update applied to an editable invoice.
#[derive(Debug, Clone, Default)]
pub struct InvoiceUpdate {
    pub lines: Option<Vec<InvoiceLineItem>>,
    pub discount_pct: Option<Decimal>,
    pub withholding_pct: Option<Decimal>,
    pub vat_pct: Option<Decimal>,
    pub apply_vat: Option<bool>,
}

/// Orchestrator over the store, delivery, and audit boundaries.
pub struct InvoicePipeline<S, D, A> {
    store: S,
    delivery: D,
    audit: A,
    config: FacturaeConfig,
}

impl<S, D, A> InvoicePipeline<S, D, A>
where
    S: InvoiceStore,
    D: DeliveryAdapter,
    A: AuditSink,
{
    pub fn new(store: S, delivery: D, audit: A, config: FacturaeConfig) -> Self {
        Self {
            store,
            delivery,
            audit,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn audit(&self) -> &A {
        &self.audit
    }

    pub fn config(&self) -> &FacturaeConfig {
        &self.config
    }

    /// Create an invoice from a draft: allocate the next number in its
    /// series, compute the breakdown, link provisions exclusively, and
    /// assemble the unsigned document.
    pub fn create_invoice(
        &mut self,
        user: &str,
        draft: InvoiceDraft,
        issue: bool,
    ) -> Result<InvoiceRecord, EfacturaError> {
        // Surfaces bad input before anything is allocated.
        calculate(&draft.calculation_input())?;

        let prefix = draft
            .series_code
            .clone()
            .unwrap_or_else(|| self.config.series_prefix.clone());
        let year = draft.issue_date.year();
        let existing = self.store.list_by_year_prefix(&prefix, year)?;
        let number = next_in_sequence(existing.iter().map(String::as_str), &prefix, year)?;

        let state = if issue {
            InvoiceState::Emitida
        } else {
            InvoiceState::Borrador
        };
        let mut record = draft.into_record(number, state);

        let record_id = record.id;
        for provision in &mut record.provisions {
            provision.apply_to(record_id)?;
        }

        self.assemble(&mut record)?;
        self.store.save(&record)?;
        self.audit.record(AuditEvent::new(
            record.id,
            user,
            AuditAction::Created,
            format!("invoice {} created in state {}", record.number, record.state),
        ));
        tracing::info!(invoice = %record.number, state = %record.state, "invoice created");
        Ok(record)
    }

    /// Apply a content update to an editable invoice. Recalculates,
    /// re-assembles, and invalidates any existing signature.
    pub fn update_invoice(
        &mut self,
        user: &str,
        id: Uuid,
        update: InvoiceUpdate,
    ) -> Result<InvoiceRecord, EfacturaError> {
        let mut record = self.store.load(id)?;
        ensure_editable(&record, "update")?;

        let mut changed: Vec<(String, String, String)> = Vec::new();
        if let Some(lines) = update.lines {
            changed.push((
                "lines".into(),
                record.lines.len().to_string(),
                lines.len().to_string(),
            ));
            record.lines = lines;
        }
        if let Some(pct) = update.discount_pct {
            changed.push(("discount_pct".into(), record.discount_pct.to_string(), pct.to_string()));
            record.discount_pct = pct;
        }
        if let Some(pct) = update.withholding_pct {
            changed.push((
                "withholding_pct".into(),
                record.withholding_pct.to_string(),
                pct.to_string(),
            ));
            record.withholding_pct = pct;
        }
        if let Some(pct) = update.vat_pct {
            changed.push(("vat_pct".into(), record.vat_pct.to_string(), pct.to_string()));
            record.vat_pct = pct;
        }
        if let Some(apply) = update.apply_vat {
            changed.push(("apply_vat".into(), record.apply_vat.to_string(), apply.to_string()));
            record.apply_vat = apply;
        }

        record.breakdown = Some(calculate(&calculation_input(&record))?);
        record.invalidate_signature();
        self.assemble(&mut record)?;
        self.store.save(&record)?;

        let mut event = AuditEvent::new(
            record.id,
            user,
            AuditAction::Updated,
            format!("invoice {} updated", record.number),
        );
        if let [(field, old, new)] = changed.as_slice() {
            event = event.with_field(field.clone(), old.clone(), new.clone());
        }
        self.audit.record(event);
        Ok(record)
    }

    /// Issue a draft invoice (`borrador → emitida`).
    pub fn issue_invoice(&mut self, user: &str, id: Uuid) -> Result<InvoiceRecord, EfacturaError> {
        let mut record = self.store.load(id)?;
        let old_state = record.state;
        transition(&mut record, InvoiceState::Emitida)?;
        self.store.save(&record)?;
        self.record_status_change(user, &record, old_state);
        Ok(record)
    }

    /// Sign (or re-sign) the invoice at the requested level.
    ///
    /// A signing attempt either fully completes the requested level or the
    /// prior persisted signature is left untouched — nothing half-signed
    /// is ever stored.
    pub async fn sign_invoice<T, R>(
        &mut self,
        user: &str,
        id: Uuid,
        signer: &XadesSigner<T, R>,
        cert: &Certificate,
        key: &SigningKey,
        level: XadesLevel,
    ) -> Result<InvoiceRecord, EfacturaError>
    where
        T: TimestampProvider,
        R: RevocationProvider,
    {
        let mut record = self.store.load(id)?;
        if !record.state.is_signable() {
            return Err(EfacturaError::state_conflict(
                record.id.to_string(),
                record.state.code(),
                "sign",
            ));
        }
        if record.unsigned_xml.is_none() {
            self.assemble(&mut record)?;
        }
        let xml = record.unsigned_xml.as_deref().ok_or_else(|| {
            EfacturaError::StructuralDocument("invoice has no assembled document".into())
        })?;

        let signed = signer.sign(xml, cert, key, level).await?;
        record.signed_xml = Some(signed);
        record.signed = true;
        self.store.save(&record)?;
        self.audit.record(
            AuditEvent::new(
                record.id,
                user,
                AuditAction::Updated,
                format!("invoice {} signed at level {}", record.number, level),
            )
            .with_field("signature", "-", level.name()),
        );
        Ok(record)
    }

    /// Validate against the profile and deliver. Transient adapter errors
    /// are retried within a fixed budget, then surfaced as terminal.
    pub async fn deliver(
        &mut self,
        user: &str,
        id: Uuid,
        profile: Profile,
    ) -> Result<DeliveryReceipt, EfacturaError> {
        let mut record = self.store.load(id)?;
        if !matches!(
            record.state,
            InvoiceState::Emitida | InvoiceState::Enviada | InvoiceState::Rechazada
        ) {
            return Err(EfacturaError::state_conflict(
                record.id.to_string(),
                record.state.code(),
                "deliver",
            ));
        }

        let xml = record
            .signed_xml
            .clone()
            .filter(|_| record.signed)
            .ok_or_else(|| EfacturaError::ExternalProfile {
                profile: profile.name().into(),
                count: 1,
                summary: "document must be signed before delivery".into(),
            })?;

        // Business rules block delivery even when a lenient validation run
        // only warned about them.
        let business = validate_business(&xml, &self.config, Mode::Strict);
        if !business.is_valid {
            return Err(EfacturaError::BusinessRule {
                count: business.errors.len(),
                summary: business
                    .errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            });
        }

        let report = validate_profile(&xml, profile);
        if !report.is_valid {
            return Err(EfacturaError::ExternalProfile {
                profile: profile.name().into(),
                count: report.errors.len(),
                summary: report
                    .errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            });
        }

        let mut last_error = None;
        for attempt in 1..=DELIVERY_ATTEMPTS {
            let outcome = self.delivery.send(&xml, profile).await;
            match outcome {
                Ok(receipt) => {
                    if receipt.success {
                        let old_state = record.state;
                        record.external_id = receipt.external_id.clone();
                        if record.state != InvoiceState::Enviada {
                            transition(&mut record, InvoiceState::Enviada)?;
                        }
                        self.store.save(&record)?;
                        self.record_status_change(user, &record, old_state);
                    } else {
                        tracing::warn!(
                            invoice = %record.number,
                            profile = profile.name(),
                            errors = ?receipt.errors,
                            "delivery rejected by authority"
                        );
                    }
                    return Ok(receipt);
                }
                Err(e) => {
                    tracing::warn!(
                        invoice = %record.number,
                        attempt,
                        error = %e,
                        "delivery attempt failed"
                    );
                    last_error = Some(e);
                    if attempt < DELIVERY_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(200 * u64::from(attempt))).await;
                    }
                }
            }
        }

        Err(EfacturaError::Delivery {
            profile: profile.name().into(),
            attempts: DELIVERY_ATTEMPTS,
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts made".into()),
        })
    }

    /// Record the authority's asynchronous response
    /// (`notificada`, `aceptada`, or `rechazada`).
    pub fn record_authority_response(
        &mut self,
        user: &str,
        id: Uuid,
        response: InvoiceState,
        external_id: Option<String>,
    ) -> Result<InvoiceRecord, EfacturaError> {
        if !matches!(
            response,
            InvoiceState::Notificada | InvoiceState::Aceptada | InvoiceState::Rechazada
        ) {
            return Err(EfacturaError::InputValidation(format!(
                "'{response}' is not an authority response state"
            )));
        }
        let mut record = self.store.load(id)?;
        let old_state = record.state;
        transition(&mut record, response)?;
        if let Some(ext) = external_id {
            record.external_id = Some(ext);
        }
        self.store.save(&record)?;
        self.record_status_change(user, &record, old_state);
        Ok(record)
    }

    /// Cancel with a reason. `anulada` is terminal.
    pub fn cancel_invoice(
        &mut self,
        user: &str,
        id: Uuid,
        reason: &str,
    ) -> Result<InvoiceRecord, EfacturaError> {
        let mut record = self.store.load(id)?;
        let old_state = record.state;
        cancel(&mut record, reason)?;
        self.store.save(&record)?;
        self.record_status_change(user, &record, old_state);
        Ok(record)
    }

    /// Hard-delete a draft. Anything past `borrador` is retained forever.
    pub fn delete_invoice(&mut self, user: &str, id: Uuid) -> Result<(), EfacturaError> {
        let record = self.store.load(id)?;
        if record.state != InvoiceState::Borrador {
            return Err(EfacturaError::state_conflict(
                record.id.to_string(),
                record.state.code(),
                "delete",
            ));
        }
        self.store.delete(id)?;
        self.audit.record(AuditEvent::new(
            id,
            user,
            AuditAction::Deleted,
            format!("draft invoice {} deleted", record.number),
        ));
        Ok(())
    }

    /// Full validation of the stored document (structural + business +
    /// signature structure when present).
    pub fn validate_invoice(&self, id: Uuid, mode: Mode) -> Result<crate::validate::ValidationReport, EfacturaError> {
        let record = self.store.load(id)?;
        let xml = record.current_xml().ok_or_else(|| {
            EfacturaError::StructuralDocument("invoice has no assembled document".into())
        })?;
        Ok(validate_signed_document(xml, &self.config, mode))
    }

    /// Pipe-delimited payload for the rendering collaborator.
    pub fn verification_payload(&self, id: Uuid) -> Result<String, EfacturaError> {
        let record = self.store.load(id)?;
        Ok(facturae::verification_payload(&record))
    }

    fn assemble(&self, record: &mut InvoiceRecord) -> Result<(), EfacturaError> {
        let document = facturae::build_document(record, &self.config);
        record.unsigned_xml = Some(facturae::to_xml(&document, &self.config)?);
        Ok(())
    }

    fn record_status_change(&mut self, user: &str, record: &InvoiceRecord, old_state: InvoiceState) {
        self.audit.record(
            AuditEvent::new(
                record.id,
                user,
                AuditAction::StatusChanged,
                format!(
                    "invoice {} moved from {} to {}",
                    record.number, old_state, record.state
                ),
            )
            .with_field("state", old_state.code(), record.state.code()),
        );
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

/// In-memory store for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<Uuid, InvoiceRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl InvoiceStore for MemoryStore {
    fn load(&self, id: Uuid) -> Result<InvoiceRecord, EfacturaError> {
        self.records
            .get(&id)
            .cloned()
            .ok_or_else(|| EfacturaError::Store(format!("invoice {id} not found")))
    }

    fn save(&mut self, record: &InvoiceRecord) -> Result<(), EfacturaError> {
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    fn list_by_year_prefix(&self, prefix: &str, year: i32) -> Result<Vec<String>, EfacturaError> {
        let needle = format!("{prefix}-{year}-");
        Ok(self
            .records
            .values()
            .filter(|r| r.number.starts_with(&needle))
            .map(|r| r.number.clone())
            .collect())
    }

    fn delete(&mut self, id: Uuid) -> Result<(), EfacturaError> {
        self.records
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| EfacturaError::Store(format!("invoice {id} not found")))
    }
}
