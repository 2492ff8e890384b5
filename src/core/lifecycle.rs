use serde::{Deserialize, Serialize};

use super::error::EfacturaError;
use super::types::InvoiceRecord;

/// Invoice lifecycle state.
///
/// Content mutation is only permitted in the editable set
/// (`borrador`, `emitida`); `anulada` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceState {
    Borrador,
    Emitida,
    Enviada,
    Notificada,
    Aceptada,
    Rechazada,
    Anulada,
}

impl InvoiceState {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Borrador => "borrador",
            Self::Emitida => "emitida",
            Self::Enviada => "enviada",
            Self::Notificada => "notificada",
            Self::Aceptada => "aceptada",
            Self::Rechazada => "rechazada",
            Self::Anulada => "anulada",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "borrador" => Some(Self::Borrador),
            "emitida" => Some(Self::Emitida),
            "enviada" => Some(Self::Enviada),
            "notificada" => Some(Self::Notificada),
            "aceptada" => Some(Self::Aceptada),
            "rechazada" => Some(Self::Rechazada),
            "anulada" => Some(Self::Anulada),
            _ => None,
        }
    }

    /// Content mutation allowed.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Borrador | Self::Emitida)
    }

    /// Cancellation allowed.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Borrador | Self::Emitida | Self::Enviada)
    }

    /// Signing and re-signing allowed.
    pub fn is_signable(&self) -> bool {
        matches!(self, Self::Borrador | Self::Emitida | Self::Enviada)
    }

    /// No further state transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Anulada)
    }
}

impl std::fmt::Display for InvoiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Allowed forward transitions. Cancellation to `anulada` is handled
/// separately by [`cancel`] because it carries a reason.
const TRANSITIONS: &[(InvoiceState, InvoiceState)] = &[
    (InvoiceState::Borrador, InvoiceState::Emitida),
    (InvoiceState::Emitida, InvoiceState::Enviada),
    (InvoiceState::Enviada, InvoiceState::Notificada),
    (InvoiceState::Enviada, InvoiceState::Aceptada),
    (InvoiceState::Enviada, InvoiceState::Rechazada),
    (InvoiceState::Notificada, InvoiceState::Aceptada),
    (InvoiceState::Notificada, InvoiceState::Rechazada),
    // A rejected invoice may be corrected and re-sent.
    (InvoiceState::Rechazada, InvoiceState::Enviada),
];

/// Whether `from → to` is an allowed transition.
pub fn can_transition(from: InvoiceState, to: InvoiceState) -> bool {
    TRANSITIONS.contains(&(from, to))
}

/// Move the record to `to`, or fail with a state conflict.
pub fn transition(record: &mut InvoiceRecord, to: InvoiceState) -> Result<(), EfacturaError> {
    if !can_transition(record.state, to) {
        return Err(EfacturaError::state_conflict(
            record.id.to_string(),
            record.state.code(),
            format!("transition to '{}'", to.code()),
        ));
    }
    record.state = to;
    Ok(())
}

/// Fail unless the record permits content mutation.
pub fn ensure_editable(record: &InvoiceRecord, operation: &str) -> Result<(), EfacturaError> {
    if !record.state.is_editable() {
        return Err(EfacturaError::state_conflict(
            record.id.to_string(),
            record.state.code(),
            operation,
        ));
    }
    Ok(())
}

/// Cancel the record with a reason (trimmed length ≥ 3).
///
/// `anulada` is terminal: only metadata may change afterwards, and the
/// record is never hard-deleted once delivered.
pub fn cancel(record: &mut InvoiceRecord, reason: &str) -> Result<(), EfacturaError> {
    if !record.state.is_cancellable() {
        return Err(EfacturaError::state_conflict(
            record.id.to_string(),
            record.state.code(),
            "cancel",
        ));
    }
    let reason = reason.trim();
    if reason.len() < 3 {
        return Err(EfacturaError::InputValidation(
            "cancellation reason must be at least 3 characters".into(),
        ));
    }
    record.state = InvoiceState::Anulada;
    record.cancel_reason = Some(reason.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::{InvoiceDraftBuilder, PartyBuilder};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn record_in(state: InvoiceState) -> InvoiceRecord {
        let draft = InvoiceDraftBuilder::new(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
            .issuer(
                PartyBuilder::legal_entity("B12345678", "Despacho Ejemplo SL")
                    .address("Calle Mayor 1", "28001", "Madrid", "Madrid")
                    .build(),
            )
            .recipient(
                PartyBuilder::individual("12345678Z", "Ana", "García")
                    .address("Gran Vía 2", "28013", "Madrid", "Madrid")
                    .build(),
            )
            .line("Asesoramiento", dec!(1), dec!(100))
            .build()
            .unwrap();
        let mut record = draft.into_record("FAC-2025-0001".into(), state);
        record.breakdown = None;
        record
    }

    #[test]
    fn editable_set_is_borrador_and_emitida() {
        assert!(InvoiceState::Borrador.is_editable());
        assert!(InvoiceState::Emitida.is_editable());
        for s in [
            InvoiceState::Enviada,
            InvoiceState::Notificada,
            InvoiceState::Aceptada,
            InvoiceState::Rechazada,
            InvoiceState::Anulada,
        ] {
            assert!(!s.is_editable(), "{s} should not be editable");
        }
    }

    #[test]
    fn cancel_requires_reason() {
        let mut record = record_in(InvoiceState::Emitida);
        assert!(cancel(&mut record, "  ").is_err());
        assert!(cancel(&mut record, "ok").is_err());
        cancel(&mut record, "Error en datos").unwrap();
        assert_eq!(record.state, InvoiceState::Anulada);
        assert_eq!(record.cancel_reason.as_deref(), Some("Error en datos"));
    }

    #[test]
    fn cancel_rejected_on_aceptada() {
        let mut record = record_in(InvoiceState::Aceptada);
        let err = cancel(&mut record, "Error en datos").unwrap_err();
        assert!(matches!(err, EfacturaError::StateConflict { .. }));
        assert_eq!(record.state, InvoiceState::Aceptada);
    }

    #[test]
    fn anulada_blocks_edits() {
        let mut record = record_in(InvoiceState::Emitida);
        cancel(&mut record, "Error en datos").unwrap();
        let err = ensure_editable(&record, "update").unwrap_err();
        assert!(matches!(err, EfacturaError::StateConflict { .. }));
    }

    #[test]
    fn transition_table() {
        assert!(can_transition(InvoiceState::Borrador, InvoiceState::Emitida));
        assert!(can_transition(InvoiceState::Emitida, InvoiceState::Enviada));
        assert!(can_transition(InvoiceState::Enviada, InvoiceState::Aceptada));
        assert!(!can_transition(InvoiceState::Aceptada, InvoiceState::Borrador));
        assert!(!can_transition(InvoiceState::Anulada, InvoiceState::Emitida));
    }
}
