//! Region begin/end overhead benchmarks
//!
//! Measures what instrumentation adds to the code it measures: a bare
//! begin/end pair on an explicit profiler, the guard path through the
//! thread's active session, and the no-session fast path.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use cycleprof::config::SessionConfig;
use cycleprof::session::{ProfileBlock, Session};
use cycleprof::{BlockId, CallSite, Profiler};
use std::time::Duration;

const SITE: CallSite = CallSite::new("bench", "bench_fn", "benches/block_overhead.rs", 12);

/// Benchmark: begin/end pair on an explicitly owned profiler
fn bench_explicit_profiler(c: &mut Criterion) {
    let mut group = c.benchmark_group("explicit_profiler");
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(1));

    let mut profiler = Profiler::new(4096).unwrap();
    group.bench_function("begin_end", |b| {
        b.iter(|| {
            if let Some(open) = profiler.begin(black_box(&SITE), 0) {
                profiler.end(open);
            }
        })
    });

    group.finish();
}

/// Benchmark: scoped guard against the active session
fn bench_session_guard(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_guard");
    group.measurement_time(Duration::from_secs(5));

    let session = Session::open(SessionConfig::in_memory().with_cpu_freq(1)).unwrap();
    for depth in [1usize, 4, 16].iter() {
        let sites: Vec<CallSite> = (0..*depth)
            .map(|i| CallSite::with_id(BlockId::from_raw(i as u32 + 1), "nested", "f", "b.rs", 0))
            .collect();
        group.throughput(Throughput::Elements(*depth as u64));
        group.bench_with_input(BenchmarkId::new("nested", depth), &sites, |b, sites| {
            b.iter(|| {
                let guards: Vec<ProfileBlock> =
                    sites.iter().map(|s| ProfileBlock::new(s, 0)).collect();
                // Innermost region closes first
                for guard in guards.into_iter().rev() {
                    drop(black_box(guard));
                }
            })
        });
    }
    let _ = session.close();

    group.finish();
}

/// Benchmark: guard creation with no session open (baseline)
fn bench_no_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("no_session");
    group.measurement_time(Duration::from_secs(3));

    group.bench_function("guard_noop", |b| {
        b.iter(|| {
            let guard = ProfileBlock::new(black_box(&SITE), 0);
            black_box(guard.is_recording())
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_explicit_profiler,
    bench_session_guard,
    bench_no_session
);
criterion_main!(benches);
