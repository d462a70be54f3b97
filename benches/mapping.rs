//! Benchmarks for module mapping
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pixelflow_rs::mapping::{
    generate, FrameMappingTransform, MapFlip, MapOrientation, MapStart, MapType, MappingParams,
};
use pixelflow_rs::pipeline::{Frame, FrameBatch};

const GRIDS: [(u32, u32); 3] = [(8, 8), (32, 16), (64, 64)];

fn serpentine() -> MappingParams {
    MappingParams::new(
        MapType::Serpentine,
        MapOrientation::Vertical,
        MapStart::BottomRight,
        MapFlip::Horizontal,
    )
}

fn batch(width: u32, height: u32) -> FrameBatch {
    let frames = (0..width * height)
        .map(|i| Frame::filled(3, i as u8))
        .collect();
    FrameBatch::new(width, height, frames)
}

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    let params = serpentine();

    for (w, h) in GRIDS {
        group.throughput(Throughput::Elements((w * h) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", w, h)),
            &(w, h),
            |b, &(w, h)| b.iter(|| generate(black_box(&params), w, h)),
        );
    }

    group.finish();
}

fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");
    let params = serpentine();

    for (w, h) in GRIDS {
        let input = batch(w, h);
        group.throughput(Throughput::Elements((w * h) as u64));

        group.bench_with_input(BenchmarkId::new("cached", format!("{}x{}", w, h)), &input, |b, input| {
            let mut transform = FrameMappingTransform::new();
            b.iter(|| transform.apply(black_box(&params), input.clone()))
        });

        group.bench_with_input(
            BenchmarkId::new("identity", format!("{}x{}", w, h)),
            &input,
            |b, input| {
                let mut transform = FrameMappingTransform::new();
                b.iter(|| transform.apply(black_box(&MappingParams::IDENTITY), input.clone()))
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_generate, bench_transform);
criterion_main!(benches);
