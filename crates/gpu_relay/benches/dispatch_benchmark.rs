//! # Dispatch Benchmark
//!
//! Measures what the emulated CPU thread pays per call:
//! 1. Deferred list submission (append + signal)
//! 2. Inline invalidate while idle (no worker round trip)
//! 3. Blocking swap (full round trip through the worker)
//!
//! Target: deferred submission well under a microsecond.

#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gpu_relay::{
    Backend, CommandList, FramebufferConfig, GpuThread, GuestAddr, HeadlessContext, RelayConfig,
};

/// Backend that does nothing, so only relay overhead is measured.
struct NullBackend;

impl Backend for NullBackend {
    fn push_command_list(&self, list: CommandList) {
        black_box(list);
    }
    fn dispatch_calls(&self) {}
    fn swap_buffers(&self, framebuffer: Option<FramebufferConfig>) {
        black_box(framebuffer);
    }
    fn flush_region(&self, addr: GuestAddr, size: u64) {
        black_box((addr, size));
    }
    fn invalidate_region(&self, addr: GuestAddr, size: u64) {
        black_box((addr, size));
    }
    fn flush_and_invalidate_region(&self, addr: GuestAddr, size: u64) {
        black_box((addr, size));
    }
}

fn relay() -> GpuThread<NullBackend> {
    GpuThread::spawn(Arc::new(NullBackend), HeadlessContext, RelayConfig::default())
        .expect("spawn GPU relay")
}

/// Fire-and-forget list submission at various batch sizes.
fn bench_submit_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_list_deferred");
    let gpu = relay();

    for batch in [1usize, 16, 256] {
        let words: Vec<u64> = (0..batch as u64).collect();
        let list = CommandList::from_words(&words);

        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("lists", batch), &batch, |b, &batch| {
            b.iter(|| {
                for _ in 0..batch {
                    gpu.submit_list(black_box(list.clone()));
                }
            });
        });
        gpu.wait_for_idle();
    }

    group.finish();
}

/// Relaxed invalidate while idle runs on the caller.
fn bench_inline_invalidate(c: &mut Criterion) {
    let gpu = relay();
    gpu.wait_for_idle();

    c.bench_function("invalidate_region_inline", |b| {
        b.iter(|| gpu.invalidate_region(black_box(GuestAddr::new(0x1000)), black_box(0x200)));
    });
}

/// Swap always goes through the worker and waits for it.
fn bench_swap_round_trip(c: &mut Criterion) {
    let gpu = relay();

    c.bench_function("swap_buffers_round_trip", |b| {
        b.iter(|| gpu.swap_buffers(black_box(None)));
    });
}

criterion_group!(
    benches,
    bench_submit_list,
    bench_inline_invalidate,
    bench_swap_round_trip
);
criterion_main!(benches);
