//! Palette Benchmarks
//!
//! Benchmarks for shared palette construction, quantization and GIF encoding.
//!
//! Run with: `cargo bench --bench palette_ops`

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tweetstudio::{build_palette, encode_gif, quantize, Bitmap, IndexedFrame};

fn card_frame(size: u32, seed: u32) -> Bitmap {
    let mut data = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            data.extend_from_slice(&[
                ((x * 255) / size) as u8,
                ((y * 255) / size) as u8,
                ((x + y + seed) % 256) as u8,
                255,
            ]);
        }
    }
    Bitmap::from_rgba(size, size, data).unwrap()
}

fn flat_frame(size: u32, shade: u8) -> Bitmap {
    let mut bitmap = Bitmap::filled(size, size, [255, 255, 255, 255]);
    bitmap.fill_rect(size / 8, size / 8, size / 2, size / 16, [shade, shade, shade, 255]);
    bitmap
}

fn bench_build_palette(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_palette");
    group.sample_size(10);

    for size in [64u32, 256, 512] {
        let rich: Vec<Bitmap> = (0..4).map(|i| card_frame(size, i * 17)).collect();
        group.bench_with_input(BenchmarkId::new("neuquant", size), &rich, |bench, frames| {
            bench.iter(|| black_box(build_palette(frames.iter(), 256).unwrap()));
        });

        let flat: Vec<Bitmap> = (0..12).map(|i| flat_frame(size, (i * 20) as u8)).collect();
        group.bench_with_input(BenchmarkId::new("exact", size), &flat, |bench, frames| {
            bench.iter(|| black_box(build_palette(frames.iter(), 256).unwrap()));
        });
    }

    group.finish();
}

fn bench_quantize(c: &mut Criterion) {
    let mut group = c.benchmark_group("quantize");

    for size in [128u32, 512] {
        let frame = card_frame(size, 3);
        let palette = build_palette([&frame], 256).unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &(frame, palette),
            |bench, (frame, palette)| {
                bench.iter(|| black_box(quantize(black_box(frame), palette)));
            },
        );
    }

    group.finish();
}

fn bench_encode_gif(c: &mut Criterion) {
    let size = 256u32;
    let frames: Vec<Bitmap> = (0..12).map(|i| flat_frame(size, (i * 20) as u8)).collect();
    let palette = build_palette(frames.iter(), 256).unwrap();
    let indexed: Vec<IndexedFrame> = frames
        .iter()
        .map(|f| IndexedFrame {
            indices: quantize(f, &palette),
            delay_ms: 200,
        })
        .collect();

    c.bench_function("encode_gif_12_frames", |bench| {
        bench.iter(|| black_box(encode_gif(&indexed, &palette, size, size, true).unwrap()));
    });
}

criterion_group!(benches, bench_build_palette, bench_quantize, bench_encode_gif);
criterion_main!(benches);
