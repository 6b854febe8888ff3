use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use securehash::{
    hash_with_charset, Blake2b256Hasher, Charset, ProtectedString, ProtectedText, RingHasher,
    Sha256Hasher,
};

const SIZES: [usize; 3] = [16, 256, 4096];

fn secret_of(size: usize) -> ProtectedString {
    // Mix of one, two, three and four byte UTF-8 sequences
    let text: String = "aé\u{16E5}\u{1F8AB}".chars().cycle().take(size).collect();
    ProtectedString::from_string(text).unwrap()
}

fn bench_charsets(c: &mut Criterion) {
    let hasher = Sha256Hasher::new();
    let mut group = c.benchmark_group("hash_by_charset");

    for size in SIZES {
        let secret = secret_of(size);
        group.throughput(Throughput::Elements(secret.len() as u64));

        for charset in Charset::ALL {
            group.bench_with_input(BenchmarkId::new(charset.as_str(), size), &secret, |b, s| {
                b.iter(|| hash_with_charset(Some(s), Some(&hasher), Some(&charset)).unwrap())
            });
        }
    }

    group.finish();
}

fn bench_hashers(c: &mut Criterion) {
    let secret = secret_of(256);
    let mut group = c.benchmark_group("hash_by_function");

    group.bench_function("sha2_sha256", |b| {
        let hasher = Sha256Hasher::new();
        b.iter(|| hash_with_charset(Some(&secret), Some(&hasher), Some(&Charset::Utf8)).unwrap())
    });

    group.bench_function("ring_sha256", |b| {
        let hasher = RingHasher::sha256();
        b.iter(|| hash_with_charset(Some(&secret), Some(&hasher), Some(&Charset::Utf8)).unwrap())
    });

    group.bench_function("blake2b_256", |b| {
        let hasher = Blake2b256Hasher::new();
        b.iter(|| hash_with_charset(Some(&secret), Some(&hasher), Some(&Charset::Utf8)).unwrap())
    });

    group.finish();
}

fn bench_secret_access(c: &mut Criterion) {
    let secret = secret_of(32);

    c.bench_function("protected_string_with_code_units", |b| {
        b.iter(|| secret.with_code_units(|units| Ok(units.len())).unwrap())
    });
}

criterion_group!(benches, bench_charsets, bench_hashers, bench_secret_access);
criterion_main!(benches);
