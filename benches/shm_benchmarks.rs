//! Performance benchmarks for popstack
//!
//! These benchmarks cover the hot paths of painting: creating a mapped
//! backing file and flat-filling it, and the press cycle that allocates and
//! frees a popup.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use popstack::input::{ButtonState, MouseButton, PointerEvent};
use popstack::protocol::recording::RecordingProtocol;
use popstack::{App, GrabMode, PopstackConfig, ShmAllocator};
use tempfile::tempdir;

/// Benchmark flat fills of buffers at the sizes the client uses
fn bench_flat_fill(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let allocator = ShmAllocator::new(dir.path());
    let mut group = c.benchmark_group("flat_fill");

    for (width, height) in [(50, 50), (60, 60), (480, 360), (1920, 1080)].iter() {
        let mut buffer = allocator.allocate(*width, *height).unwrap();
        group.bench_function(format!("fill_{}x{}", width, height), |b| {
            b.iter(|| buffer.fill(black_box(0x00FF_FF00)));
        });
    }

    group.finish();
}

/// Benchmark allocation of a mapped, unlinked backing file
fn bench_allocate(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let allocator = ShmAllocator::new(dir.path());
    let mut group = c.benchmark_group("shm_allocate");

    for edge in [50, 480].iter() {
        group.bench_function(format!("allocate_{}x{}", edge, edge), |b| {
            b.iter(|| black_box(allocator.allocate(*edge, *edge).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark a full grab cycle: create two popups, then pop the top one
fn bench_press_cycle(c: &mut Criterion) {
    let dir = tempdir().unwrap();

    c.bench_function("press_cycle_with_grab", |b| {
        b.iter_batched(
            || {
                let mut app = App::new(
                    &PopstackConfig::default(),
                    GrabMode::WithGrab,
                    ShmAllocator::new(dir.path()),
                )
                .unwrap();
                let mut proto = RecordingProtocol::new();
                let main = app.start(&mut proto).unwrap();
                app.on_configure(main, 1, &mut proto).unwrap();
                (app, proto)
            },
            |(mut app, mut proto)| {
                for serial in 2..5 {
                    let press = PointerEvent::Button {
                        serial,
                        time: 0,
                        button: MouseButton::Left,
                        state: ButtonState::Pressed,
                    };
                    black_box(app.on_pointer(press, &mut proto).unwrap());
                    if let Some(top) = app.popups().top() {
                        let _ = app.on_configure(top, serial + 100, &mut proto);
                    }
                }
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_flat_fill, bench_allocate, bench_press_cycle);
criterion_main!(benches);
