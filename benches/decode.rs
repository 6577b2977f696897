//! Decoding benchmarks
//!
//! Measures the two decompression engines and the cipher over synthetic
//! regions that mix literals and overlapping back-references.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use ndsfw::key1::Key1;
use ndsfw::source::ByteSource;
use ndsfw::{lz77, part345};
use std::hint::black_box;

const IDCODE: u32 = u32::from_le_bytes(*b"MACP");

/// A compressible region: repeated text encoded as literals plus maximal
/// back-references, in either decoder's token grammar.
fn synthetic_region(decoded_len: usize, lsb_flags: bool) -> Vec<u8> {
    let word = 0x10u32 | ((decoded_len as u32) << 8);
    let mut region = word.to_le_bytes().to_vec();

    // Seed 8 literals, then reference them over and over.
    region.push(0x00);
    region.extend_from_slice(b"firmware");
    let mut produced = 8;
    while produced < decoded_len {
        // 8 copy tokens per flag byte, each (len 18, dist 8).
        region.push(0xFF);
        for _ in 0..8 {
            if lsb_flags {
                region.extend_from_slice(&[0x00, 0x07, 0x00]);
            } else {
                region.extend_from_slice(&[0xF0, 0x07]);
            }
            produced += 0x12;
        }
    }
    while region.len() % 8 != 0 {
        region.push(0);
    }
    region
}

fn bench_lz77(c: &mut Criterion) {
    let region = synthetic_region(64 * 1024, false);
    let mut group = c.benchmark_group("lz77");
    group.throughput(Throughput::Bytes(64 * 1024));
    group.bench_function("decompress_64k", |b| {
        b.iter(|| {
            let mut source = ByteSource::plain(black_box(&region), 0).unwrap();
            lz77::decompress_bytes(&mut source).unwrap()
        })
    });
    group.finish();
}

fn bench_lz77_encrypted(c: &mut Criterion) {
    let key = Key1::new(IDCODE, 2);
    let mut region = synthetic_region(64 * 1024, false);
    for chunk in region.chunks_exact_mut(8) {
        let block: &mut [u8; 8] = chunk.try_into().unwrap();
        key.encrypt_block(block);
    }

    let mut group = c.benchmark_group("lz77_encrypted");
    group.throughput(Throughput::Bytes(64 * 1024));
    group.bench_function("decompress_64k", |b| {
        b.iter(|| {
            let mut source = ByteSource::encrypted(black_box(&region), 0, &key).unwrap();
            lz77::decompress_bytes(&mut source).unwrap()
        })
    });
    group.finish();
}

fn bench_part345(c: &mut Criterion) {
    let region = synthetic_region(64 * 1024, true);
    let mut group = c.benchmark_group("part345");
    group.throughput(Throughput::Bytes(64 * 1024));
    group.bench_function("decompress_64k", |b| {
        b.iter(|| part345::decompress_bytes(black_box(&region)).unwrap())
    });
    group.finish();
}

fn bench_key_schedule(c: &mut Criterion) {
    c.bench_function("key1_schedule", |b| {
        b.iter(|| Key1::new(black_box(IDCODE), black_box(2)))
    });
}

criterion_group!(
    benches,
    bench_lz77,
    bench_lz77_encrypted,
    bench_part345,
    bench_key_schedule
);
criterion_main!(benches);
