//! Core invoice types, calculation engine, lifecycle, numbering, and audit.
//!
//! Monetary values are always [`rust_decimal::Decimal`] — rounding happens
//! only at presentation and serialization boundaries.

mod audit;
mod builder;
mod calc;
mod config;
mod error;
mod lifecycle;
mod numbering;
mod types;

pub use audit::*;
pub use builder::*;
pub use calc::{CalculationInput, calculate};
pub use config::FacturaeConfig;
pub use error::*;
pub use lifecycle::*;
pub use numbering::{format_number, next_in_sequence, parse_number};
pub use types::*;
