//! # efactura
//!
//! Spanish e-invoicing compliance library covering the full pipeline:
//! tax calculation, Facturae assembly, tiered XAdES signatures,
//! AEAT/FACE/GENERAL validation profiles, and the invoice lifecycle.
//!
//! All monetary values use [`rust_decimal::Decimal`] — never floating point.
//! The document model conforms to the Facturae 3.2.2 schema.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use efactura::core::*;
//! use rust_decimal_macros::dec;
//!
//! let draft = InvoiceDraftBuilder::new(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
//!     .issuer(PartyBuilder::legal_entity("B12345678", "Despacho Ejemplo SL")
//!         .address("Calle Mayor 1", "28001", "Madrid", "Madrid")
//!         .build())
//!     .recipient(PartyBuilder::individual("12345678Z", "Ana", "García")
//!         .address("Gran Vía 2", "28013", "Madrid", "Madrid")
//!         .build())
//!     .line("Asesoramiento mercantil", dec!(1), dec!(100))
//!     .discount(dec!(10))
//!     .build()
//!     .unwrap();
//!
//! let breakdown = calculate(&draft.calculation_input()).unwrap();
//! assert_eq!(breakdown.net_base, dec!(90));
//! assert_eq!(breakdown.total, dec!(108.9));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Invoice types, calculation engine, lifecycle, numbering, audit |
//! | `facturae` | Facturae 3.2.2 document assembly & parsing |
//! | `xades` | Tiered XAdES signature pipeline (BES/T/C/X/XL) |
//! | `profiles` | Structural/business/profile validation (AEAT, FACE, GENERAL) |
//! | `pipeline` | End-to-end orchestration over store/delivery/audit boundaries |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "facturae")]
pub mod facturae;

#[cfg(feature = "xades")]
pub mod xades;

#[cfg(feature = "profiles")]
pub mod validate;

#[cfg(feature = "pipeline")]
pub mod pipeline;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
