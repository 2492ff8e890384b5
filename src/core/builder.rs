use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use super::calc::{self, CalculationInput};
use super::error::EfacturaError;
use super::lifecycle::InvoiceState;
use super::types::*;

/// Invoice content before a number and lifecycle state are assigned.
///
/// ```
/// use chrono::NaiveDate;
/// use efactura::core::*;
/// use rust_decimal_macros::dec;
///
/// let draft = InvoiceDraftBuilder::new(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
///     .issuer(PartyBuilder::legal_entity("B12345678", "Despacho Ejemplo SL")
///         .address("Calle Mayor 1", "28001", "Madrid", "Madrid")
///         .build())
///     .recipient(PartyBuilder::individual("12345678Z", "Ana", "García")
///         .address("Gran Vía 2", "28013", "Madrid", "Madrid")
///         .build())
///     .line("Asesoramiento mercantil", dec!(10), dec!(120))
///     .withholding(dec!(15))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    pub issue_date: NaiveDate,
    pub operation_date: Option<NaiveDate>,
    pub series_code: Option<String>,
    pub issuer: PartyIdentity,
    pub recipient: PartyIdentity,
    pub lines: Vec<InvoiceLineItem>,
    pub discount_pct: Decimal,
    pub withholding_pct: Decimal,
    pub vat_pct: Decimal,
    pub apply_vat: bool,
    pub provisions: Vec<AdvancePaymentProvision>,
}

impl InvoiceDraft {
    /// Calculation input view over this draft.
    pub fn calculation_input(&self) -> CalculationInput<'_> {
        CalculationInput {
            lines: &self.lines,
            discount_pct: self.discount_pct,
            withholding_pct: self.withholding_pct,
            vat_pct: self.vat_pct,
            apply_vat: self.apply_vat,
            provisions: &self.provisions,
        }
    }

    /// Materialize a record with a fresh id, the given number, and state.
    pub fn into_record(self, number: String, state: InvoiceState) -> InvoiceRecord {
        let breakdown = calc::calculate(&self.calculation_input()).ok();
        InvoiceRecord {
            id: Uuid::new_v4(),
            number,
            series_code: self.series_code,
            issue_date: self.issue_date,
            operation_date: self.operation_date,
            issuer: self.issuer,
            recipient: self.recipient,
            lines: self.lines,
            discount_pct: self.discount_pct,
            withholding_pct: self.withholding_pct,
            vat_pct: self.vat_pct,
            apply_vat: self.apply_vat,
            provisions: self.provisions,
            breakdown,
            state,
            signed: false,
            cancel_reason: None,
            document_version: 1,
            unsigned_xml: None,
            signed_xml: None,
            external_id: None,
        }
    }
}

/// Builder for [`InvoiceDraft`].
pub struct InvoiceDraftBuilder {
    issue_date: NaiveDate,
    operation_date: Option<NaiveDate>,
    series_code: Option<String>,
    issuer: Option<PartyIdentity>,
    recipient: Option<PartyIdentity>,
    lines: Vec<InvoiceLineItem>,
    discount_pct: Decimal,
    withholding_pct: Decimal,
    vat_pct: Decimal,
    apply_vat: bool,
    provisions: Vec<AdvancePaymentProvision>,
}

impl InvoiceDraftBuilder {
    pub fn new(issue_date: NaiveDate) -> Self {
        Self {
            issue_date,
            operation_date: None,
            series_code: None,
            issuer: None,
            recipient: None,
            lines: Vec::new(),
            discount_pct: Decimal::ZERO,
            withholding_pct: Decimal::ZERO,
            vat_pct: dec!(21),
            apply_vat: true,
            provisions: Vec::new(),
        }
    }

    pub fn operation_date(mut self, date: NaiveDate) -> Self {
        self.operation_date = Some(date);
        self
    }

    pub fn series_code(mut self, code: impl Into<String>) -> Self {
        self.series_code = Some(code.into());
        self
    }

    pub fn issuer(mut self, party: PartyIdentity) -> Self {
        self.issuer = Some(party);
        self
    }

    pub fn recipient(mut self, party: PartyIdentity) -> Self {
        self.recipient = Some(party);
        self
    }

    pub fn line(
        mut self,
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> Self {
        self.lines
            .push(InvoiceLineItem::new(description, quantity, unit_price));
        self
    }

    pub fn discount(mut self, pct: Decimal) -> Self {
        self.discount_pct = pct;
        self
    }

    pub fn withholding(mut self, pct: Decimal) -> Self {
        self.withholding_pct = pct;
        self
    }

    pub fn vat(mut self, pct: Decimal) -> Self {
        self.vat_pct = pct;
        self
    }

    pub fn without_vat(mut self) -> Self {
        self.apply_vat = false;
        self
    }

    pub fn provision(mut self, provision: AdvancePaymentProvision) -> Self {
        self.provisions.push(provision);
        self
    }

    /// Build the draft, validating parties and calculation inputs.
    pub fn build(self) -> Result<InvoiceDraft, EfacturaError> {
        let issuer = self
            .issuer
            .ok_or_else(|| EfacturaError::InputValidation("issuer is required".into()))?;
        let recipient = self
            .recipient
            .ok_or_else(|| EfacturaError::InputValidation("recipient is required".into()))?;

        let draft = InvoiceDraft {
            issue_date: self.issue_date,
            operation_date: self.operation_date,
            series_code: self.series_code,
            issuer,
            recipient,
            lines: self.lines,
            discount_pct: self.discount_pct,
            withholding_pct: self.withholding_pct,
            vat_pct: self.vat_pct,
            apply_vat: self.apply_vat,
            provisions: self.provisions,
        };

        // Surface bad lines/percentages at build time rather than later.
        calc::calculate(&draft.calculation_input())?;
        Ok(draft)
    }
}

/// Builder for [`PartyIdentity`].
pub struct PartyBuilder {
    tax_id: String,
    residence: ResidenceCode,
    kind: PartyKind,
    address: Option<Address>,
    contact: Option<Contact>,
}

impl PartyBuilder {
    /// Start a natural-person party.
    pub fn individual(
        tax_id: impl Into<String>,
        first_name: impl Into<String>,
        surname: impl Into<String>,
    ) -> Self {
        Self {
            tax_id: tax_id.into(),
            residence: ResidenceCode::Resident,
            kind: PartyKind::Individual {
                first_name: first_name.into(),
                surname: surname.into(),
                second_surname: None,
            },
            address: None,
            contact: None,
        }
    }

    /// Start a legal-entity party.
    pub fn legal_entity(tax_id: impl Into<String>, corporate_name: impl Into<String>) -> Self {
        Self {
            tax_id: tax_id.into(),
            residence: ResidenceCode::Resident,
            kind: PartyKind::LegalEntity {
                corporate_name: corporate_name.into(),
                trade_name: None,
            },
            address: None,
            contact: None,
        }
    }

    pub fn residence(mut self, residence: ResidenceCode) -> Self {
        self.residence = residence;
        self
    }

    pub fn second_surname(mut self, surname: impl Into<String>) -> Self {
        if let PartyKind::Individual { second_surname, .. } = &mut self.kind {
            *second_surname = Some(surname.into());
        }
        self
    }

    pub fn trade_name(mut self, name: impl Into<String>) -> Self {
        if let PartyKind::LegalEntity { trade_name, .. } = &mut self.kind {
            *trade_name = Some(name.into());
        }
        self
    }

    pub fn address(
        mut self,
        street: impl Into<String>,
        post_code: impl Into<String>,
        town: impl Into<String>,
        province: impl Into<String>,
    ) -> Self {
        self.address = Some(Address {
            street: street.into(),
            post_code: post_code.into(),
            town: town.into(),
            province: province.into(),
            country_code: "ESP".into(),
        });
        self
    }

    pub fn country(mut self, code: impl Into<String>) -> Self {
        if let Some(address) = &mut self.address {
            address.country_code = code.into();
        }
        self
    }

    pub fn contact(mut self, phone: Option<String>, email: Option<String>) -> Self {
        self.contact = Some(Contact { phone, email });
        self
    }

    pub fn build(self) -> PartyIdentity {
        PartyIdentity {
            tax_id: self.tax_id,
            residence: self.residence,
            kind: self.kind,
            address: self.address.unwrap_or(Address {
                street: String::new(),
                post_code: String::new(),
                town: String::new(),
                province: String::new(),
                country_code: "ESP".into(),
            }),
            contact: self.contact,
        }
    }
}
