use std::f64::consts::PI;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use skinoval::{
    annotation, fit_ellipse_direct, fit_ellipse_record, render, select_largest_contour,
    ChainApprox, Mask,
};

/// 512² skin-like mask: a tilted ellipse plus stray specks.
fn make_skin_mask(seed: u64) -> Mask {
    let mut rng = StdRng::seed_from_u64(seed);
    let (cx, cy, a, b, angle) = (256.0f64, 270.0f64, 190.0f64, 150.0f64, 0.12f64);
    let (sa, ca) = angle.sin_cos();
    let mut img = GrayImage::from_fn(512, 512, |x, y| {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        let xr = ca * dx + sa * dy;
        let yr = -sa * dx + ca * dy;
        let rho = (xr / a).powi(2) + (yr / b).powi(2);
        Luma([if rho <= 1.0 { 255 } else { 0 }])
    });
    for _ in 0..400 {
        let x = rng.gen_range(0..512);
        let y = rng.gen_range(0..512);
        img.put_pixel(x, y, Luma([255]));
    }
    Mask::from_luma(&img)
}

fn make_ellipse_points(n: usize) -> Vec<[f64; 2]> {
    let (cx, cy, a, b, angle) = (512.0f64, 512.0f64, 380.0f64, 300.0f64, 0.12f64);
    let (sin_a, cos_a) = angle.sin_cos();
    let mut rng = StdRng::seed_from_u64(12345);
    (0..n)
        .map(|i| {
            let t = 2.0 * PI * (i as f64) / (n as f64);
            let ex = a * t.cos();
            let ey = b * t.sin();
            [
                cx + cos_a * ex - sin_a * ey + rng.gen_range(-0.5f64..0.5f64),
                cy + sin_a * ex + cos_a * ey + rng.gen_range(-0.5f64..0.5f64),
            ]
        })
        .collect()
}

fn bench_region(c: &mut Criterion) {
    let mask = make_skin_mask(7);
    c.bench_function("largest_contour_512_simple", |b| {
        b.iter(|| {
            let contour = select_largest_contour(black_box(&mask), ChainApprox::Simple)
                .expect("fixture has a region");
            black_box(contour.points.len())
        })
    });
    c.bench_function("largest_contour_512_none", |b| {
        b.iter(|| {
            let contour = select_largest_contour(black_box(&mask), ChainApprox::None)
                .expect("fixture has a region");
            black_box(contour.points.len())
        })
    });
}

fn bench_ellipse_fit(c: &mut Criterion) {
    let points = make_ellipse_points(2000);
    c.bench_function("ellipse_fit_2000pts", |b| {
        b.iter(|| {
            let fit = fit_ellipse_direct(black_box(&points))
                .expect("deterministic fixture should always fit");
            black_box(fit)
        })
    });
}

fn bench_render(c: &mut Criterion) {
    let record = fit_ellipse_record(&make_ellipse_points(400)).expect("fixture fits");
    c.bench_function("oval_mask_1024", |b| {
        b.iter(|| black_box(render::oval_mask(1024, 1024, black_box(&record))))
    });
    c.bench_function("encode_decode_record", |b| {
        b.iter(|| annotation::decode(&annotation::encode(black_box(&record))))
    });
}

criterion_group!(hotpaths, bench_region, bench_ellipse_fit, bench_render);
criterion_main!(hotpaths);
