//! Facturae document assembly and parsing.
//!
//! Builds the normalized hierarchical document from a calculated
//! [`InvoiceRecord`](crate::core::InvoiceRecord), serializes it
//! deterministically (required for canonical signing), and parses it back.
//!
//! # Example
//!
//! ```no_run
//! use efactura::core::*;
//! use efactura::facturae;
//!
//! let record: InvoiceRecord = todo!(); // build via InvoiceDraftBuilder
//! let config = FacturaeConfig::default();
//! let document = facturae::build_document(&record, &config);
//! let xml = facturae::to_xml(&document, &config).unwrap();
//! let reparsed = facturae::from_xml(&xml).unwrap();
//! ```

mod assemble;
mod model;
mod parse;
pub(crate) mod xml_utils;

pub use assemble::{build_document, to_xml, verification_payload};
pub use model::*;
pub use parse::from_xml;
pub use xml_utils::format_decimal;
