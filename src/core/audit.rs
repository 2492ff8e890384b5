use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of accepted mutation an audit event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Updated,
    Deleted,
    StatusChanged,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::StatusChanged => "status_changed",
        }
    }
}

/// Append-only audit record. One event per accepted mutation; events are
/// never deleted and remain readable in every lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub acting_user_id: String,
    pub action: AuditAction,
    pub field_name: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        invoice_id: Uuid,
        acting_user_id: impl Into<String>,
        action: AuditAction,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            invoice_id,
            acting_user_id: acting_user_id.into(),
            action,
            field_name: None,
            old_value: None,
            new_value: None,
            description: description.into(),
            timestamp: Utc::now(),
        }
    }

    /// Attach the mutated field with its old and new values.
    pub fn with_field(
        mut self,
        field_name: impl Into<String>,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        self.field_name = Some(field_name.into());
        self.old_value = Some(old_value.into());
        self.new_value = Some(new_value.into());
        self
    }
}

/// Destination for audit events (database table, message bus, …).
pub trait AuditSink {
    fn record(&mut self, event: AuditEvent);
}

/// In-memory sink for tests and embedded use. Append-only by construction.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Vec<AuditEvent>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    /// Events for a single invoice, in emission order.
    pub fn for_invoice(&self, invoice_id: Uuid) -> Vec<&AuditEvent> {
        self.events
            .iter()
            .filter(|e| e.invoice_id == invoice_id)
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_preserves_order() {
        let mut sink = MemoryAuditSink::new();
        let invoice_id = Uuid::new_v4();
        sink.record(AuditEvent::new(
            invoice_id,
            "user-1",
            AuditAction::Created,
            "invoice created",
        ));
        sink.record(
            AuditEvent::new(invoice_id, "user-1", AuditAction::Updated, "discount changed")
                .with_field("discount_pct", "0", "10"),
        );

        let events = sink.for_invoice(invoice_id);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, AuditAction::Created);
        assert_eq!(events[1].field_name.as_deref(), Some("discount_pct"));
    }

    #[test]
    fn action_codes() {
        assert_eq!(AuditAction::StatusChanged.as_str(), "status_changed");
        assert_eq!(AuditAction::Deleted.as_str(), "deleted");
    }
}
