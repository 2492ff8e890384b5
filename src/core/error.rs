use thiserror::Error;

/// Errors that can occur during invoice calculation, assembly, signing,
/// validation, or lifecycle transitions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EfacturaError {
    /// Calculation input rejected (empty items, negative quantity/price,
    /// percentage out of range).
    #[error("invalid calculation input: {0}")]
    InputValidation(String),

    /// Document does not have the required Facturae structure.
    #[error("document structure error: {0}")]
    StructuralDocument(String),

    /// One or more business rules failed in strict mode.
    #[error("business rules failed ({count} issue(s)): {summary}")]
    BusinessRule { count: usize, summary: String },

    /// A receiving-authority profile is missing mandated evidence.
    #[error("profile {profile} requirements not met ({count} missing): {summary}")]
    ExternalProfile {
        profile: String,
        count: usize,
        summary: String,
    },

    /// The requested signature level needs an endpoint that was not configured.
    #[error("signature level {level} requires {missing}")]
    SignatureConfiguration { level: String, missing: String },

    /// Signature envelope is malformed or inconsistent with its claimed level.
    #[error("signature structure error: {0}")]
    SignatureStructural(String),

    /// A TSA/OCSP call failed after exhausting the retry budget.
    #[error("signature evidence for level {level} unavailable after {attempts} attempt(s): {reason}")]
    Evidence {
        level: String,
        attempts: u32,
        reason: String,
    },

    /// Mutation attempted outside the state set that permits it.
    #[error("invoice {invoice_id} in state '{state}' does not permit {operation}")]
    StateConflict {
        invoice_id: String,
        state: String,
        operation: String,
    },

    /// Certificate is expired, not yet valid, or unreadable.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// Invoice number sequencing error.
    #[error("numbering error: {0}")]
    Numbering(String),

    /// Persistence collaborator failure (missing record, write error).
    #[error("store error: {0}")]
    Store(String),

    /// XML generation or parsing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Delivery failed after exhausting the retry budget.
    #[error("delivery to {profile} failed after {attempts} attempt(s): {reason}")]
    Delivery {
        profile: String,
        attempts: u32,
        reason: String,
    },
}

impl EfacturaError {
    /// Build a state-conflict error for an invoice operation.
    pub fn state_conflict(
        invoice_id: impl Into<String>,
        state: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self::StateConflict {
            invoice_id: invoice_id.into(),
            state: state.into(),
            operation: operation.into(),
        }
    }
}

/// A single validation finding with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dot-separated path to the offending field (e.g. "invoices[0].totals.invoice_total").
    pub field: String,
    /// Human-readable description.
    pub message: String,
    /// Rule identifier if applicable (e.g. "FE-TOT-01").
    pub rule: Option<String>,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(rule) = &self.rule {
            write!(f, "[{}] {}: {}", rule, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl ValidationIssue {
    /// Create an issue without a rule ID.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: None,
        }
    }

    /// Create an issue with a rule ID.
    pub fn with_rule(
        field: impl Into<String>,
        message: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: Some(rule.into()),
        }
    }
}
