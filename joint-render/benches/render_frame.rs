use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use joint_core::{compute_quad, Palette, Side, StandardPhase, StimulusState, Viewport};
use joint_render::{Scene, SkiaRenderer};
use joint_timing::HighPrecisionTimer;

fn harness() -> (SkiaRenderer, Vec<u8>, HighPrecisionTimer) {
    let width = 1280u32;
    let height = 720u32;
    let r = SkiaRenderer::new(width, height).expect("renderer");
    let fb = vec![0u8; (width * height * 4) as usize];
    (r, fb, HighPrecisionTimer::new())
}

pub fn bench_session_frame(c: &mut Criterion) {
    let colors = Palette::default().colors(0).expect("palette");
    let mut g = c.benchmark_group("render_frame");
    g.sample_size(40);

    g.bench_function("session_frame", |b| {
        b.iter_batched(
            harness,
            |(mut r, mut fb, mut t)| {
                let phase = StandardPhase::FirstSession;
                let stim = StimulusState::new(-12.5, Side::Right, 2.0);
                let scene = Scene {
                    phase: &phase,
                    stimulus: Some(&stim),
                    colors,
                    progress: Some((10, 50)),
                    input_enabled: true,
                };
                let stats = r.render_frame(&scene, &mut fb, &mut t);
                black_box(stats).ok();
            },
            BatchSize::SmallInput,
        )
    });

    g.finish();
}

pub fn bench_compute_quad(c: &mut Criterion) {
    let viewport = Viewport::new(0.0, 0.0, 1280.0, 634.0);
    c.bench_function("compute_quad", |b| {
        b.iter(|| compute_quad(black_box(&viewport), black_box(17.5), black_box(Side::Left)))
    });
}

criterion_group!(benches, bench_session_frame, bench_compute_quad);
criterion_main!(benches);
