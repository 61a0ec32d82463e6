use std::hint::black_box;
use std::time::Instant;

use spinfield_common::{GenerationParams, TransformMode};
use spinfield_instances::{InstanceModel, InstanceStack};

fn bench_generate(count: u32, iterations: usize) {
    let params = GenerationParams::default();
    let start = Instant::now();
    for i in 0..iterations {
        let _ = black_box(InstanceStack::generate(black_box(count), &params, i as u64));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!("  generate ({count} instances, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}");
}

fn bench_host_recompute(count: u32, iterations: usize) {
    let stack = InstanceStack::generate(count, &GenerationParams::default(), 42);
    let mut model = InstanceModel::new(stack, TransformMode::HostComputed);

    let start = Instant::now();
    for i in 0..iterations {
        // one simulated 60Hz frame of spin per iteration
        let angle = i as f32 * 0.2 * std::f32::consts::TAU / 60.0;
        black_box(model.update(black_box(angle)));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    let bytes = model.host_transforms().map_or(0, |h| h.as_bytes().len());
    println!(
        "  host recompute ({count} instances, {bytes} bytes/frame, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn bench_device_update(count: u32, iterations: usize) {
    let stack = InstanceStack::generate(count, &GenerationParams::default(), 42);
    let mut model = InstanceModel::new(stack, TransformMode::DeviceComputed);

    let start = Instant::now();
    for i in 0..iterations {
        black_box(model.update(black_box(i as f32)));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!("  device update ({count} instances, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}");
}

fn main() {
    println!("=== Instance Transform Benchmarks ===\n");

    println!("Stack generation:");
    bench_generate(10_000, 20);
    bench_generate(200_000, 3);

    println!("\nHost-computed transforms:");
    bench_host_recompute(1_000, 10_000);
    bench_host_recompute(100_000, 100);
    bench_host_recompute(800_000, 10);

    println!("\nDevice-computed transforms (host side):");
    bench_device_update(800_000, 10_000);

    println!("\n=== Done ===");
}
