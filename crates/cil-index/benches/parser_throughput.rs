use cil_parser::parse_exprs;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn synthetic_policy(rules: usize) -> String {
    let mut out = String::new();
    for i in 0..rules {
        out.push_str(&format!("(allow type_{i}_t type_{}_t (tcp_socket (name_bind read write)))\n", i + 1));
    }
    out
}

fn bench_parse(c: &mut Criterion) {
    let small = synthetic_policy(100);
    let large = synthetic_policy(5_000);

    c.bench_function("parse_100_rules", |b| {
        b.iter(|| parse_exprs(black_box(&small)).unwrap())
    });
    c.bench_function("parse_5000_rules", |b| {
        b.iter(|| parse_exprs(black_box(&large)).unwrap())
    });
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
