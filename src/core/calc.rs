use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::error::EfacturaError;
use super::types::{AdvancePaymentProvision, InvoiceLineItem, TaxBreakdown};

/// Input to the calculation engine.
///
/// Percentages are whole numbers (21 means 21%). Defaults match Spanish
/// practice: no discount, no withholding, 21% VAT, VAT applied.
#[derive(Debug, Clone)]
pub struct CalculationInput<'a> {
    pub lines: &'a [InvoiceLineItem],
    pub discount_pct: Decimal,
    pub withholding_pct: Decimal,
    pub vat_pct: Decimal,
    pub apply_vat: bool,
    pub provisions: &'a [AdvancePaymentProvision],
}

impl<'a> CalculationInput<'a> {
    pub fn new(lines: &'a [InvoiceLineItem]) -> Self {
        Self {
            lines,
            discount_pct: Decimal::ZERO,
            withholding_pct: Decimal::ZERO,
            vat_pct: dec!(21),
            apply_vat: true,
            provisions: &[],
        }
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

    pub fn provisions(mut self, provisions: &'a [AdvancePaymentProvision]) -> Self {
        self.provisions = provisions;
        self
    }
}

/// Compute the tax breakdown for an invoice. Pure function, no side effects.
///
/// Chain: gross base → global discount → provision offset → VAT and
/// withholding over the net base. All arithmetic is exact decimal;
/// nothing is rounded here — see [`TaxBreakdown::rounded`].
///
/// When provisions exceed the discounted base, the net base is clamped at
/// zero and the excess is surfaced in `provision_refund` so the document
/// can carry an explicit negative refund line instead of a negative base.
pub fn calculate(input: &CalculationInput<'_>) -> Result<TaxBreakdown, EfacturaError> {
    validate_input(input)?;

    let gross_base: Decimal = input.lines.iter().map(InvoiceLineItem::line_total).sum();
    let discount_amount = gross_base * input.discount_pct / dec!(100);
    let discounted_base = gross_base - discount_amount;

    let provision_sum: Decimal = input.provisions.iter().map(|p| p.amount).sum();
    let (net_base, provisions_applied, provision_refund) = if provision_sum > discounted_base {
        (Decimal::ZERO, discounted_base, provision_sum - discounted_base)
    } else {
        (discounted_base - provision_sum, provision_sum, Decimal::ZERO)
    };

    let vat = if input.apply_vat {
        net_base * input.vat_pct / dec!(100)
    } else {
        Decimal::ZERO
    };
    let withholding = net_base * input.withholding_pct / dec!(100);
    let total = net_base + vat - withholding;

    Ok(TaxBreakdown {
        gross_base,
        discount_amount,
        provisions_applied,
        provision_refund,
        net_base,
        vat,
        withholding,
        total,
    })
}

fn validate_input(input: &CalculationInput<'_>) -> Result<(), EfacturaError> {
    if input.lines.is_empty() {
        return Err(EfacturaError::InputValidation(
            "at least one line item is required".into(),
        ));
    }

    for (i, line) in input.lines.iter().enumerate() {
        if line.quantity.is_sign_negative() {
            return Err(EfacturaError::InputValidation(format!(
                "lines[{i}].quantity must not be negative, got {}",
                line.quantity
            )));
        }
        if line.unit_price.is_sign_negative() {
            return Err(EfacturaError::InputValidation(format!(
                "lines[{i}].unit_price must not be negative, got {}",
                line.unit_price
            )));
        }
    }

    for (name, pct) in [
        ("discount", input.discount_pct),
        ("withholding", input.withholding_pct),
        ("vat", input.vat_pct),
    ] {
        if pct.is_sign_negative() || pct > dec!(100) {
            return Err(EfacturaError::InputValidation(format!(
                "{name} percentage must be between 0 and 100, got {pct}"
            )));
        }
    }

    for (i, provision) in input.provisions.iter().enumerate() {
        if provision.amount.is_sign_negative() {
            return Err(EfacturaError::InputValidation(format!(
                "provisions[{i}].amount must not be negative, got {}",
                provision.amount
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(qty: Decimal, price: Decimal) -> InvoiceLineItem {
        InvoiceLineItem::new("Servicio", qty, price)
    }

    #[test]
    fn reference_case() {
        let lines = [line(dec!(1), dec!(100))];
        let breakdown = calculate(&CalculationInput::new(&lines).discount(dec!(10))).unwrap();
        assert_eq!(breakdown.net_base, dec!(90));
        assert_eq!(breakdown.vat, dec!(18.9));
        assert_eq!(breakdown.total, dec!(108.9));
        assert!(breakdown.reconciles());
    }

    #[test]
    fn withholding_reduces_total() {
        let lines = [line(dec!(10), dec!(100))];
        let breakdown =
            calculate(&CalculationInput::new(&lines).withholding(dec!(15))).unwrap();
        assert_eq!(breakdown.net_base, dec!(1000));
        assert_eq!(breakdown.vat, dec!(210));
        assert_eq!(breakdown.withholding, dec!(150));
        assert_eq!(breakdown.total, dec!(1060));
    }

    #[test]
    fn vat_can_be_disabled() {
        let lines = [line(dec!(1), dec!(500))];
        let breakdown = calculate(&CalculationInput::new(&lines).without_vat()).unwrap();
        assert_eq!(breakdown.vat, Decimal::ZERO);
        assert_eq!(breakdown.total, dec!(500));
    }

    #[test]
    fn provisions_offset_base() {
        let lines = [line(dec!(1), dec!(1000))];
        let provisions = [AdvancePaymentProvision::new(dec!(300))];
        let breakdown =
            calculate(&CalculationInput::new(&lines).provisions(&provisions)).unwrap();
        assert_eq!(breakdown.net_base, dec!(700));
        assert_eq!(breakdown.provisions_applied, dec!(300));
        assert_eq!(breakdown.provision_refund, Decimal::ZERO);
    }

    #[test]
    fn provision_excess_clamps_and_refunds() {
        let lines = [line(dec!(1), dec!(200))];
        let provisions = [AdvancePaymentProvision::new(dec!(350))];
        let breakdown =
            calculate(&CalculationInput::new(&lines).provisions(&provisions)).unwrap();
        assert_eq!(breakdown.net_base, Decimal::ZERO);
        assert_eq!(breakdown.provisions_applied, dec!(200));
        assert_eq!(breakdown.provision_refund, dec!(150));
        assert_eq!(breakdown.vat, Decimal::ZERO);
        assert_eq!(breakdown.total, Decimal::ZERO);
    }

    #[test]
    fn empty_lines_rejected() {
        let err = calculate(&CalculationInput::new(&[])).unwrap_err();
        assert!(matches!(err, EfacturaError::InputValidation(_)));
    }

    #[test]
    fn negative_price_rejected() {
        let lines = [line(dec!(1), dec!(-5))];
        let err = calculate(&CalculationInput::new(&lines)).unwrap_err();
        assert!(matches!(err, EfacturaError::InputValidation(_)));
    }

    #[test]
    fn percentage_over_100_rejected() {
        let lines = [line(dec!(1), dec!(100))];
        let err = calculate(&CalculationInput::new(&lines).discount(dec!(101))).unwrap_err();
        assert!(matches!(err, EfacturaError::InputValidation(_)));
    }

    #[test]
    fn rounding_only_at_presentation() {
        let lines = [line(dec!(3), dec!(33.333))];
        let breakdown = calculate(&CalculationInput::new(&lines).discount(dec!(7))).unwrap();
        // Internal values keep full precision.
        assert_eq!(breakdown.gross_base, dec!(99.999));
        let rounded = breakdown.rounded();
        assert_eq!(rounded.gross_base, dec!(100.00));
        assert!(breakdown.reconciles());
        assert!(rounded.reconciles());
    }
}
