use criterion::{Criterion, black_box, criterion_group, criterion_main};
use efactura::core::*;
use rust_decimal_macros::dec;

fn bench_calculate(c: &mut Criterion) {
    let lines: Vec<InvoiceLineItem> = (0..100)
        .map(|i| InvoiceLineItem::new(format!("Concepto {i}"), dec!(2.5), dec!(120.30)))
        .collect();
    let provisions = [AdvancePaymentProvision::new(dec!(500))];

    c.bench_function("calculate_100_lines", |b| {
        b.iter(|| {
            let input = CalculationInput::new(black_box(&lines))
                .discount(dec!(5))
                .withholding(dec!(15))
                .provisions(&provisions);
            calculate(&input).unwrap()
        })
    });

    let single = [InvoiceLineItem::new("Asesoramiento", dec!(1), dec!(100))];
    c.bench_function("calculate_single_line", |b| {
        b.iter(|| calculate(&CalculationInput::new(black_box(&single))).unwrap())
    });
}

criterion_group!(benches, bench_calculate);
criterion_main!(benches);
