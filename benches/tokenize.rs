use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use laxjson::reader::TextReader;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::fmt::Write as _;

// Builds a pseudo-random document of roughly `target_len` bytes mixing the
// scalar kinds the tokenizer distinguishes.
fn generate_document(rng: &mut StdRng, target_len: usize) -> String {
    let mut out = String::with_capacity(target_len + 64);
    out.push('[');

    let mut first = true;
    while out.len() < target_len {
        if !first {
            out.push(',');
        }
        first = false;

        match rng.gen_range(0..6) {
            0 => {
                let _ = write!(out, "{}", rng.gen_range(-1_000_000..1_000_000i64));
            }
            1 => {
                let _ = write!(out, "{:.6}", rng.gen::<f64>() * 1e6);
            }
            2 => {
                let _ = write!(out, "\"value with some length {}\"", rng.gen_range(0..10_000));
            }
            3 => out.push_str("true"),
            4 => out.push_str("null"),
            _ => {
                let _ = write!(
                    out,
                    "{{\"id\":{},\"tag\":\"t{}\"}}",
                    rng.gen_range(0..1_000_000_000i64),
                    rng.gen_range(0..100)
                );
            }
        }
    }

    out.push(']');
    out
}

fn generate_integers(rng: &mut StdRng, count: usize) -> String {
    let mut out = String::with_capacity(count * 8);
    out.push('[');
    for i in 0..count {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{}", rng.gen_range(0..1_000_000));
    }
    out.push(']');
    out
}

fn read_all(text: &str) -> usize {
    let mut reader = TextReader::new(text.chars());
    let mut count = 0;

    while reader.read().unwrap() {
        count += 1;
    }

    count
}

fn bench_read(c: &mut Criterion) {
    const LEN: usize = 1024 * 1024;

    let mut rng = StdRng::seed_from_u64(0x6c61786a);
    let doc = generate_document(&mut rng, LEN);

    let mut group = c.benchmark_group("read");
    group.throughput(Throughput::Bytes(doc.len() as u64));
    group.sample_size(20);

    group.bench_function("mixed document", |b| {
        b.iter(|| black_box(read_all(&doc)));
    });

    group.finish();
}

fn bench_typed_reads(c: &mut Criterion) {
    const COUNT: usize = 100_000;

    let mut rng = StdRng::seed_from_u64(0x6c61786b);
    let ints = generate_integers(&mut rng, COUNT);

    let mut group = c.benchmark_group("typed");
    group.throughput(Throughput::Bytes(ints.len() as u64));
    group.sample_size(20);

    group.bench_function("read_as_i32 over integers", |b| {
        b.iter(|| {
            let mut reader = TextReader::new(ints.chars());
            reader.read().unwrap();

            let mut sum = 0i64;
            while let Some(n) = reader.read_as_i32().unwrap() {
                sum += n as i64;
            }
            black_box(sum)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_read, bench_typed_reads);
criterion_main!(benches);
