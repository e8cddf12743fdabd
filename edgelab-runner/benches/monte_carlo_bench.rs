//! Criterion benchmarks for the simulation hot loops.
//!
//! Run with: `cargo bench -p edgelab-runner`
//!
//! These benchmarks measure:
//! - Single path simulation
//! - Full Monte Carlo runs at increasing trial counts
//! - One optimal-f fraction (a short sweep)
//! - The risk pruning solver on a 10-asset portfolio

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use edgelab_core::domain::{CorrelationLevel, CorrelationMatrix, RPool};
use edgelab_core::rng::RngSampler;
use edgelab_core::stats::SystemMetrics;
use edgelab_runner::allocation::prune_risk_allocation;
use edgelab_runner::monte_carlo::{run_monte_carlo, SimulationConfig};
use edgelab_runner::optimal_f::{OptimalFConfig, OptimalFSearch, RiskGrid};
use edgelab_runner::path::simulate_path;

/// Synthetic pool: 40% winners at 2R, losers at -1R, a few scratches.
fn generate_pool(size: usize) -> RPool {
    let values = (0..size.max(1))
        .map(|i| match i % 10 {
            0..=3 => 2.0,
            4 => 0.0,
            _ => -1.0,
        })
        .collect();
    RPool::from_values(values).expect("synthetic pool is finite and non-empty")
}

fn bench_single_path(c: &mut Criterion) {
    let pool = generate_pool(200);
    let mut sampler = RngSampler::seeded(7);

    c.bench_function("simulate_path_100_trades", |b| {
        b.iter(|| {
            let _ = simulate_path(black_box(&pool), 100, &mut sampler);
        });
    });
}

fn bench_monte_carlo(c: &mut Criterion) {
    let mut group = c.benchmark_group("monte_carlo");
    group.sample_size(10);

    let pool = generate_pool(200);
    let metrics = SystemMetrics::compute(pool.values(), pool.len(), None);

    for sims in [1_000usize, 10_000].iter() {
        let config = SimulationConfig::new(*sims, 100);
        group.bench_with_input(BenchmarkId::from_parameter(sims), sims, |b, _| {
            b.iter(|| {
                let _ = run_monte_carlo(black_box(&pool), &metrics, &config, 42);
            });
        });
    }

    group.finish();
}

fn bench_optimal_f_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimal_f");
    group.sample_size(10);

    let pool = generate_pool(200);
    let search = OptimalFSearch::new(OptimalFConfig::default()).with_grid(RiskGrid {
        start_pct: 1.0,
        step_pct: 1.0,
        steps: 5,
    });

    group.bench_function("five_fractions_default_config", |b| {
        b.iter(|| {
            let _ = search.run(black_box(&pool), None);
        });
    });

    group.finish();
}

fn bench_allocation(c: &mut Criterion) {
    let names: Vec<String> = (0..10).map(|i| format!("A{i}")).collect();
    let mut matrix = CorrelationMatrix::uniform(10, CorrelationLevel::Medium).unwrap();
    for i in 0..9 {
        matrix.set(i, i + 1, CorrelationLevel::Strong).unwrap();
    }
    matrix.set(0, 9, CorrelationLevel::StrongHedge).unwrap();

    c.bench_function("prune_10_assets", |b| {
        b.iter(|| {
            let _ = prune_risk_allocation(black_box(&names), &matrix, 2.0, 8.0, true);
        });
    });
}

criterion_group!(
    benches,
    bench_single_path,
    bench_monte_carlo,
    bench_optimal_f_steps,
    bench_allocation
);
criterion_main!(benches);
