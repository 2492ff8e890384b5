use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::PartyIdentity;

/// Facturae tax type codes used by this model.
pub const TAX_TYPE_VAT: &str = "01";
pub const TAX_TYPE_IRPF: &str = "04";

/// Normalized hierarchical Facturae document.
///
/// This is the typed view-model the assembler renders and the parser
/// rebuilds; rendering is a structured traversal, never string templating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacturaeDocument {
    pub header: FileHeader,
    pub parties: Parties,
    pub invoices: Vec<InvoiceDocument>,
}

/// FileHeader block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHeader {
    pub schema_version: String,
    pub modality: Modality,
    pub issuer_type: IssuerType,
}

/// Facturae Modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modality {
    /// I — single invoice.
    Individual,
    /// L — batch.
    Batch,
}

impl Modality {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Individual => "I",
            Self::Batch => "L",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "I" => Some(Self::Individual),
            "L" => Some(Self::Batch),
            _ => None,
        }
    }
}

/// Facturae InvoiceIssuerType.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssuerType {
    /// EM — issued by the seller.
    Seller,
    /// RE — issued by the buyer.
    Buyer,
    /// TE — issued by a third party.
    Third,
}

impl IssuerType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Seller => "EM",
            Self::Buyer => "RE",
            Self::Third => "TE",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "EM" => Some(Self::Seller),
            "RE" => Some(Self::Buyer),
            "TE" => Some(Self::Third),
            _ => None,
        }
    }
}

/// Parties block. Party identities are the core model's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parties {
    pub seller: PartyIdentity,
    pub buyer: PartyIdentity,
}

/// One invoice inside the Invoices block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDocument {
    pub header: InvoiceHeader,
    pub issue_data: IssueData,
    pub taxes_outputs: Vec<TaxLine>,
    pub taxes_withheld: Vec<TaxLine>,
    pub totals: InvoiceTotals,
    pub items: Vec<ItemLine>,
    pub legal_literals: Vec<String>,
    pub related_documents: Vec<String>,
}

/// InvoiceHeader block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceHeader {
    pub number: String,
    pub series_code: Option<String>,
    pub document_type: DocumentType,
    pub class: InvoiceClass,
}

/// Facturae InvoiceDocumentType.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    /// FC — complete invoice.
    Complete,
    /// FA — abbreviated invoice.
    Abbreviated,
    /// AF — self-invoice.
    SelfInvoice,
}

impl DocumentType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Complete => "FC",
            Self::Abbreviated => "FA",
            Self::SelfInvoice => "AF",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "FC" => Some(Self::Complete),
            "FA" => Some(Self::Abbreviated),
            "AF" => Some(Self::SelfInvoice),
            _ => None,
        }
    }
}

/// Facturae InvoiceClass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceClass {
    /// OO — original.
    Original,
    /// OR — corrective original.
    CorrectiveOriginal,
    /// OC — summary original.
    SummaryOriginal,
}

impl InvoiceClass {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Original => "OO",
            Self::CorrectiveOriginal => "OR",
            Self::SummaryOriginal => "OC",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "OO" => Some(Self::Original),
            "OR" => Some(Self::CorrectiveOriginal),
            "OC" => Some(Self::SummaryOriginal),
            _ => None,
        }
    }
}

/// InvoiceIssueData block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueData {
    pub issue_date: NaiveDate,
    pub operation_date: Option<NaiveDate>,
    pub currency: String,
    pub language: String,
}

/// A tax output or withholding line (invoice- or item-level).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxLine {
    /// Facturae TaxTypeCode ("01" VAT, "04" IRPF).
    pub tax_type_code: String,
    pub rate: Decimal,
    pub base: Decimal,
    pub amount: Decimal,
}

/// InvoiceTotals block. The reconciliation rule is
/// `gross_amount + total_tax_outputs − total_taxes_withheld ≈ invoice_total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub gross_amount: Decimal,
    pub total_tax_outputs: Decimal,
    pub total_taxes_withheld: Decimal,
    pub invoice_total: Decimal,
    pub outstanding: Decimal,
    pub executable: Decimal,
}

/// One invoice line. Negative amounts (provision refunds) keep their sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemLine {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_cost: Decimal,
    pub gross_amount: Decimal,
    pub taxes: Vec<TaxLine>,
}
