//! Benchmarks for reasoning operations

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use tenet::{parse_clauses, Engine, StratifiedManual};

fn program(facts: usize) -> String {
    let mut src = String::new();
    for i in 0..facts {
        src.push_str(&format!("(bird{} is-a bird)\n", i));
    }
    src.push_str(
        "#stratum\n\
         (rule may-fly (<s> is-a bird) -(<s> fly _) => (<s> fly-prepare can))\n\
         #stratum\n\
         (rule fly (<s> fly-prepare can) => (<s> fly can))\n",
    );
    src
}

fn parse_benchmark(c: &mut Criterion) {
    let small = program(4);
    let large = program(64);

    let mut group = c.benchmark_group("parse_clauses");
    group.bench_with_input(BenchmarkId::new("small", "4 facts"), &small, |b, src| {
        b.iter(|| black_box(parse_clauses(src).unwrap().len()));
    });
    group.bench_with_input(BenchmarkId::new("large", "64 facts"), &large, |b, src| {
        b.iter(|| black_box(parse_clauses(src).unwrap().len()));
    });
    group.finish();
}

fn run_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_to_fixed_point");
    for facts in [8usize, 32] {
        let src = program(facts);
        group.bench_with_input(
            BenchmarkId::from_parameter(facts),
            &src,
            |b, src| {
                b.iter(|| {
                    let mut engine = Engine::new();
                    engine.set_strategy(Box::new(StratifiedManual::new()));
                    engine.set_max_cycles(facts * 4);
                    engine.load_str(src).unwrap();
                    black_box(engine.run().cycles)
                });
            },
        );
    }
    group.finish();
}

fn retract_benchmark(c: &mut Criterion) {
    c.bench_function("retract_with_cascade", |b| {
        b.iter(|| {
            let mut engine = Engine::new();
            engine.set_strategy(Box::new(StratifiedManual::new()));
            engine.set_max_cycles(64);
            engine.load_str(&program(8)).unwrap();
            engine.run();
            engine.retract("bird0", "is-a", "bird").unwrap();
            black_box(engine.matcher.wme_count())
        });
    });
}

criterion_group!(benches, parse_benchmark, run_benchmark, retract_benchmark);
criterion_main!(benches);
