use efactura::core::*;
use proptest::prelude::*;
use rust_decimal::Decimal;

fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

proptest! {
    /// The reconciliation invariant holds for every computable invoice:
    /// total = net_base + vat − withholding, exactly on the unrounded
    /// breakdown and within a cent on the rounded one.
    #[test]
    fn breakdown_always_reconciles(
        qty_cents in 0i64..=1_000_000,
        price_cents in 0i64..=10_000_000,
        discount in 0u32..=100,
        withholding in 0u32..=100,
        vat in 0u32..=100,
        apply_vat in any::<bool>(),
    ) {
        let lines = [InvoiceLineItem::new("Servicio", money(qty_cents), money(price_cents))];
        let mut input = CalculationInput::new(&lines)
            .discount(Decimal::from(discount))
            .withholding(Decimal::from(withholding))
            .vat(Decimal::from(vat));
        if !apply_vat {
            input = input.without_vat();
        }

        let breakdown = calculate(&input).unwrap();
        prop_assert!(breakdown.reconciles());
        prop_assert_eq!(
            breakdown.total,
            breakdown.net_base + breakdown.vat - breakdown.withholding
        );

        let rounded = breakdown.rounded();
        let diff = (rounded.total - (rounded.net_base + rounded.vat - rounded.withholding)).abs();
        prop_assert!(diff <= Decimal::new(2, 2), "rounded drift {diff} too large");
    }

    /// Provisions never drive the taxable base negative; the excess is
    /// fully accounted for as a refund.
    #[test]
    fn provisions_clamp_and_refund(
        price_cents in 0i64..=1_000_000,
        provision_cents in 0i64..=2_000_000,
    ) {
        let lines = [InvoiceLineItem::new("Servicio", Decimal::ONE, money(price_cents))];
        let provisions = [AdvancePaymentProvision::new(money(provision_cents))];
        let breakdown = calculate(
            &CalculationInput::new(&lines).provisions(&provisions),
        )
        .unwrap();

        prop_assert!(breakdown.net_base >= Decimal::ZERO);
        prop_assert!(breakdown.provision_refund >= Decimal::ZERO);
        prop_assert_eq!(
            breakdown.provisions_applied + breakdown.provision_refund,
            money(provision_cents)
        );
    }

    /// Number formatting and parsing are inverse for the 4-digit range.
    #[test]
    fn numbering_roundtrip(year in 2000i32..=2100, seq in 1u32..=9999) {
        let number = format_number("FAC", year, seq);
        let parsed = parse_number(&number);
        prop_assert_eq!(parsed, Some(("FAC", year, seq)));
    }
}
