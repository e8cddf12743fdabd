//! Monte Carlo engine integration tests.
//!
//! Uses proptest to verify:
//! 1. Average path shape — length T + 1, starting at 0
//! 2. Extremal curves are simulated paths verbatim
//! 3. Distribution counts match the number of trials

use edgelab_core::domain::RPool;
use edgelab_core::rng::RngHierarchy;
use edgelab_core::stats::SystemMetrics;
use edgelab_runner::monte_carlo::{
    run_monte_carlo, CurveKind, SimulationConfig, MONTE_CARLO_STREAM,
};
use edgelab_runner::path::simulate_path;
use proptest::prelude::*;

fn arb_pool() -> impl Strategy<Value = RPool> {
    prop::collection::vec((-3.0..5.0_f64).prop_map(|r| (r * 4.0).round() / 4.0), 1..20)
        .prop_map(|values| RPool::from_values(values).unwrap())
}

fn pool(values: &[f64]) -> RPool {
    RPool::from_values(values.to_vec()).unwrap()
}

fn metrics_for(pool: &RPool) -> SystemMetrics {
    SystemMetrics::compute(pool.values(), pool.len(), None)
}

/// Re-run every trial the engine ran, in trial order.
fn regenerate_paths(pool: &RPool, config: &SimulationConfig, seed: u64) -> Vec<Vec<f64>> {
    let hierarchy = RngHierarchy::new(seed);
    (0..config.total_simulations)
        .map(|trial| {
            let mut sampler = hierarchy.sampler_for(MONTE_CARLO_STREAM, 0, trial as u64);
            simulate_path(pool, config.trades_per_simulation, &mut sampler).path
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn average_path_shape(
        pool in arb_pool(),
        sims in 1usize..300,
        trades in 1usize..60,
        seed in any::<u64>(),
    ) {
        let config = SimulationConfig::new(sims, trades);
        let results = run_monte_carlo(&pool, &metrics_for(&pool), &config, seed);
        let avg = results.average_path();
        prop_assert_eq!(avg.len(), trades + 1);
        prop_assert_eq!(avg[0], 0.0);
    }

    #[test]
    fn extremal_curves_are_simulated_paths(
        pool in arb_pool(),
        sims in 1usize..600,
        trades in 1usize..40,
        seed in any::<u64>(),
    ) {
        let config = SimulationConfig::new(sims, trades);
        let results = run_monte_carlo(&pool, &metrics_for(&pool), &config, seed);
        let paths = regenerate_paths(&pool, &config, seed);

        for kind in CurveKind::EXTREMAL {
            let curve = results.curve(kind).unwrap();
            prop_assert!(
                paths.iter().any(|p| *p == curve.path),
                "{} is not a simulated path", kind
            );
        }
    }

    #[test]
    fn distributions_count_every_trial(
        pool in arb_pool(),
        sims in 1usize..300,
        seed in any::<u64>(),
    ) {
        let config = SimulationConfig::new(sims, 25);
        let results = run_monte_carlo(&pool, &metrics_for(&pool), &config, seed);
        let d = &results.distributions;
        prop_assert_eq!(d.final_result.total_count(), sims);
        prop_assert_eq!(d.max_drawdown.total_count(), sims);
        prop_assert_eq!(d.max_profit.total_count(), sims);
        prop_assert_eq!(d.max_consecutive_losses.total_count(), sims);
        prop_assert_eq!(d.max_consecutive_wins.total_count(), sims);
    }
}

#[test]
fn best_curve_is_first_found_maximum() {
    let pool = pool(&[2.0, -1.0, 0.5, -0.5]);
    let config = SimulationConfig::new(700, 30);
    let seed = 11;
    let results = run_monte_carlo(&pool, &metrics_for(&pool), &config, seed);
    let paths = regenerate_paths(&pool, &config, seed);

    let finals: Vec<f64> = paths.iter().map(|p| *p.last().unwrap()).collect();
    let best = finals.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let first = finals.iter().position(|&f| f == best).unwrap();

    assert_eq!(results.curve(CurveKind::BestFinal).unwrap().path, paths[first]);
}

#[test]
fn average_path_matches_regenerated_mean() {
    let pool = pool(&[1.0, -1.0, 3.0]);
    let config = SimulationConfig::new(50, 10);
    let seed = 3;
    let results = run_monte_carlo(&pool, &metrics_for(&pool), &config, seed);
    let paths = regenerate_paths(&pool, &config, seed);

    for step in 0..=config.trades_per_simulation {
        let expected = paths.iter().map(|p| p[step]).sum::<f64>() / paths.len() as f64;
        assert!((results.average_path()[step] - expected).abs() < 1e-9);
    }
}

#[test]
fn results_serialize_to_json() {
    let pool = pool(&[1.5, -1.0]);
    let config = SimulationConfig::new(20, 5);
    let results = run_monte_carlo(&pool, &metrics_for(&pool), &config, 1);
    let json = serde_json::to_string(&results).unwrap();
    let back: edgelab_runner::SimulationResults = serde_json::from_str(&json).unwrap();
    assert_eq!(back.equity_curves.len(), 7);
}
