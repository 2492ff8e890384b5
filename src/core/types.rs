use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lifecycle::InvoiceState;

/// A persisted invoice with its computed tax breakdown and lifecycle state.
///
/// The invariant `total ≈ net_base + vat − withholding` (tolerance 0.01)
/// holds for every record whose breakdown has been computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Stable record identity, independent of the invoice number.
    pub id: Uuid,
    /// Invoice number in `{prefix}-{year}-{4-digit seq}` form.
    pub number: String,
    /// Optional series code carried into the document header.
    pub series_code: Option<String>,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Operation date, when it differs from the issue date.
    pub operation_date: Option<NaiveDate>,
    /// Seller party.
    pub issuer: PartyIdentity,
    /// Buyer party.
    pub recipient: PartyIdentity,
    /// Invoice lines.
    pub lines: Vec<InvoiceLineItem>,
    /// Global discount percentage applied to the gross base.
    pub discount_pct: Decimal,
    /// IRPF withholding percentage applied to the net base.
    pub withholding_pct: Decimal,
    /// VAT percentage.
    pub vat_pct: Decimal,
    /// Whether VAT is charged at all (false for exempt operations).
    pub apply_vat: bool,
    /// Advance-payment provisions offset against the taxable base.
    pub provisions: Vec<AdvancePaymentProvision>,
    /// Computed tax breakdown (set by the calculation engine).
    pub breakdown: Option<TaxBreakdown>,
    /// Lifecycle state.
    pub state: InvoiceState,
    /// Orthogonal signed marker: true while `signed_xml` holds a valid envelope.
    pub signed: bool,
    /// Cancellation reason, set when the record reaches `anulada`.
    pub cancel_reason: Option<String>,
    /// Document version, bumped whenever signed content is mutated.
    pub document_version: u32,
    /// Assembled unsigned Facturae XML.
    pub unsigned_xml: Option<String>,
    /// Signed Facturae XML for the current document version.
    pub signed_xml: Option<String>,
    /// Identifier returned by the receiving authority on delivery.
    pub external_id: Option<String>,
}

impl InvoiceRecord {
    /// True while content mutation is permitted by the lifecycle.
    pub fn is_editable(&self) -> bool {
        self.state.is_editable()
    }

    /// Invalidate any existing signature after a content mutation.
    ///
    /// Bumps the document version so a stale envelope can never be
    /// delivered against the new content.
    pub fn invalidate_signature(&mut self) {
        if self.signed || self.signed_xml.is_some() {
            self.signed = false;
            self.signed_xml = None;
            self.document_version += 1;
        }
    }

    /// The document to validate/deliver: signed if present, else unsigned.
    pub fn current_xml(&self) -> Option<&str> {
        self.signed_xml.as_deref().or(self.unsigned_xml.as_deref())
    }
}

/// A single invoice line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    /// Concept description.
    pub description: String,
    /// Quantity, must be ≥ 0.
    pub quantity: Decimal,
    /// Unit price without tax, must be ≥ 0.
    pub unit_price: Decimal,
}

impl InvoiceLineItem {
    pub fn new(description: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
        }
    }

    /// Derived line total (`quantity × unit_price`), unrounded.
    pub fn line_total(&self) -> Decimal {
        self.quantity * self.unit_price
    }
}

/// Seller or buyer identity.
///
/// Exactly one of the individual / legal-entity variants applies — the
/// `kind` enum makes the xor structural rather than conventional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyIdentity {
    /// NIF/CIF tax identifier.
    pub tax_id: String,
    /// Residence type code.
    pub residence: ResidenceCode,
    /// Individual or legal entity.
    pub kind: PartyKind,
    /// Postal address.
    pub address: Address,
    /// Optional contact block.
    pub contact: Option<Contact>,
}

impl PartyIdentity {
    /// Display name: corporate name or "surname, given name".
    pub fn display_name(&self) -> String {
        match &self.kind {
            PartyKind::LegalEntity { corporate_name, .. } => corporate_name.clone(),
            PartyKind::Individual {
                first_name,
                surname,
                second_surname,
            } => match second_surname {
                Some(s2) => format!("{surname} {s2}, {first_name}"),
                None => format!("{surname}, {first_name}"),
            },
        }
    }

    /// Facturae PersonTypeCode: "F" for individuals, "J" for legal entities.
    pub fn person_type_code(&self) -> &'static str {
        match self.kind {
            PartyKind::Individual { .. } => "F",
            PartyKind::LegalEntity { .. } => "J",
        }
    }
}

/// Individual or legal-entity variant of a party.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartyKind {
    Individual {
        first_name: String,
        surname: String,
        second_surname: Option<String>,
    },
    LegalEntity {
        corporate_name: String,
        trade_name: Option<String>,
    },
}

/// Facturae ResidenceTypeCode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResidenceCode {
    /// R — resident in Spain.
    Resident,
    /// U — resident in another EU member state.
    EuResident,
    /// E — resident outside the EU.
    Foreign,
}

impl ResidenceCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Resident => "R",
            Self::EuResident => "U",
            Self::Foreign => "E",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "R" => Some(Self::Resident),
            "U" => Some(Self::EuResident),
            "E" => Some(Self::Foreign),
            _ => None,
        }
    }
}

/// Postal address. Country code is ISO 3166-1 alpha-3 as Facturae requires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub post_code: String,
    pub town: String,
    pub province: String,
    /// ISO 3166-1 alpha-3 (e.g. "ESP").
    pub country_code: String,
}

/// Optional contact block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// A pre-paid amount held against a client/case, offsettable against a
/// future invoice's taxable base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancePaymentProvision {
    pub id: Uuid,
    /// Provision amount, must be ≥ 0.
    pub amount: Decimal,
    /// The invoice this provision is exclusively linked to, once applied.
    pub applied_to: Option<Uuid>,
}

impl AdvancePaymentProvision {
    pub fn new(amount: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount,
            applied_to: None,
        }
    }

    /// Link the provision to an invoice. A provision belongs to at most
    /// one invoice; re-linking to a different one is rejected.
    pub fn apply_to(&mut self, invoice_id: Uuid) -> Result<(), super::EfacturaError> {
        match self.applied_to {
            None => {
                self.applied_to = Some(invoice_id);
                Ok(())
            }
            Some(existing) if existing == invoice_id => Ok(()),
            Some(existing) => Err(super::EfacturaError::InputValidation(format!(
                "provision {} is already applied to invoice {existing}",
                self.id
            ))),
        }
    }
}

/// Computed tax breakdown for an invoice.
///
/// All fields are unrounded; call [`TaxBreakdown::rounded`] at
/// presentation boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    /// Σ quantity × unit price over all lines.
    pub gross_base: Decimal,
    /// Amount removed by the global discount.
    pub discount_amount: Decimal,
    /// Σ provision amounts actually offset against the base.
    pub provisions_applied: Decimal,
    /// Provision excess over the discounted base, surfaced as a refund.
    /// Zero unless provisions exceeded the base.
    pub provision_refund: Decimal,
    /// Taxable base after discount and provisions, clamped at zero.
    pub net_base: Decimal,
    /// VAT amount (zero when VAT is not applied).
    pub vat: Decimal,
    /// IRPF withholding amount.
    pub withholding: Decimal,
    /// net_base + vat − withholding.
    pub total: Decimal,
}

impl TaxBreakdown {
    /// Copy with every monetary field rounded to 2 decimal places, half-up.
    pub fn rounded(&self) -> Self {
        let r = |d: Decimal| {
            d.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
        };
        Self {
            gross_base: r(self.gross_base),
            discount_amount: r(self.discount_amount),
            provisions_applied: r(self.provisions_applied),
            provision_refund: r(self.provision_refund),
            net_base: r(self.net_base),
            vat: r(self.vat),
            withholding: r(self.withholding),
            total: r(self.total),
        }
    }

    /// Check the reconciliation invariant `total ≈ net_base + vat − withholding`.
    pub fn reconciles(&self) -> bool {
        let expected = self.net_base + self.vat - self.withholding;
        (self.total - expected).abs() <= Decimal::new(1, 2)
    }
}
