//! 추출/코덱 처리량 벤치마크

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use band_stream::{
    decode, encode, BandPowerExtractor, BandPowerRecord, ExtractorConfig, SampleTable,
    SyntheticSource,
};

fn synthetic_table(len: usize) -> SampleTable {
    SyntheticSource::new(256.0, 1).take(len).collect()
}

fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    let table = synthetic_table(256 * 60);

    for window in [128usize, 256, 512] {
        let extractor = match BandPowerExtractor::new(ExtractorConfig::new(window, window / 2)) {
            Ok(extractor) => extractor,
            Err(e) => panic!("extractor: {}", e),
        };
        group.throughput(Throughput::Elements(table.len() as u64));

        group.bench_with_input(BenchmarkId::new("sequential", window), &window, |b, _| {
            b.iter(|| black_box(extractor.extract_all(black_box(&table))));
        });
        group.bench_with_input(BenchmarkId::new("parallel", window), &window, |b, _| {
            b.iter(|| black_box(extractor.extract_all_par(black_box(&table))));
        });
    }

    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    let record = BandPowerRecord::new(41.0, 86.0, 31.0, 12.0);
    let packet = encode(&record);

    group.throughput(Throughput::Elements(1));
    group.bench_function("encode", |b| b.iter(|| black_box(encode(black_box(&record)))));
    group.bench_function("decode", |b| b.iter(|| black_box(decode(black_box(&packet)))));

    group.finish();
}

criterion_group!(benches, bench_extraction, bench_codec);
criterion_main!(benches);
