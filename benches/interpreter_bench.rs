use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pilang::{Config, Interpreter, parse_str, tokenize};

// Bindings are global, so recursion carries its state in parameters that are
// rebound left to right.
const BENCH_INPUT: &str = r#"
[set sum [func [k acc] [if k [call sum [sub k 1] [add acc k]] acc]]]
[set fact [func [k acc] [if k [call fact [sub k 1] [mul acc [add k 1]]] acc]]]
[set digits [list 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16]]
[set middle [range digits 4 12]]
[edit middle 0 [call sum 200 0]]
[set total [add [index digits 4] [call fact 20 1]]]
[set squares [func [k] [if k [add [mul k k] [call squares [sub k 1]]] 0]]]
[call squares 100]
"#;

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("Front end");
    group.bench_with_input(
        BenchmarkId::new("tokenize", "program"),
        &BENCH_INPUT,
        |b, input| b.iter(|| tokenize(black_box(input))),
    );
    group.bench_with_input(
        BenchmarkId::new("parse_str", "program"),
        &BENCH_INPUT,
        |b, input| b.iter(|| parse_str(black_box(input))),
    );
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let forms = match parse_str(BENCH_INPUT) {
        Ok(forms) => forms,
        Err(e) => panic!("benchmark program does not parse: {}", e),
    };
    let mut group = c.benchmark_group("Evaluator");
    group.bench_with_input(
        BenchmarkId::new("execute", "recursion_and_lists"),
        &forms,
        |b, forms| {
            b.iter(|| {
                let mut interpreter = Interpreter::new(std::io::sink(), Config::default());
                interpreter.execute(black_box(forms))
            })
        },
    );
    group.finish();
}

criterion_group!(benches, bench_tokenize, bench_evaluate);
criterion_main!(benches);
