//! EdgeLab CLI — system statistics, Monte Carlo, optimal-f and risk allocation.
//!
//! Commands:
//! - `stats` — system metrics for an R-multiple pool
//! - `simulate` — Monte Carlo resampling with extremal equity curves
//! - `optimal-f` — sweep per-trade risk under six objectives
//! - `allocate` — prune correlated per-asset risk to a heat budget
//!
//! Every pool command takes exactly one of `--pnl FILE` (raw dollar P&L),
//! `--r-multiples FILE` or `--freq "R:count,..."`. Reports go to stdout,
//! progress and logs to stderr.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use edgelab_core::domain::{FrequencyRow, RPool};
use edgelab_core::ingest::{ingest_raw_pnl, parse_tokens};
use edgelab_core::stats::SystemMetrics;
use edgelab_runner::allocation::{prune_risk_allocation, AllocationReport};
use edgelab_runner::config::AnalysisConfig;
use edgelab_runner::monte_carlo::{run_monte_carlo, CurveKind, SimulationResults};
use edgelab_runner::optimal_f::{OptimalFReport, OptimalFSearch, RiskMode};

#[derive(Parser)]
#[command(
    name = "edgelab",
    about = "EdgeLab CLI — R-multiple risk analysis engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print system metrics for a pool.
    Stats {
        #[command(flatten)]
        pool: PoolArgs,

        /// Emit JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run a Monte Carlo simulation over a pool.
    Simulate {
        #[command(flatten)]
        pool: PoolArgs,

        /// Number of simulated trials. Defaults to 10000.
        #[arg(long)]
        sims: Option<usize>,

        /// Trades per trial. Defaults to 100.
        #[arg(long)]
        trades: Option<usize>,

        /// Master seed.
        #[arg(long)]
        seed: Option<u64>,

        /// TOML analysis config; flags override its [monte_carlo] section.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Emit JSON instead of a summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Sweep the per-trade risk fraction from 0.1% to 30%.
    OptimalF {
        #[command(flatten)]
        pool: PoolArgs,

        /// Final gain (%) that counts as success.
        #[arg(long)]
        success: Option<f64>,

        /// Drawdown (%, negative) that counts as ruin.
        #[arg(long, allow_hyphen_values = true)]
        failure: Option<f64>,

        /// Trades per trial (100–1000).
        #[arg(long)]
        trades: Option<usize>,

        /// Trials per fraction (10000–100000).
        #[arg(long)]
        sims: Option<usize>,

        /// Position sizing mode.
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Master seed.
        #[arg(long)]
        seed: Option<u64>,

        /// TOML analysis config; flags override its [optimal_f] section.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Emit JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Allocate risk across correlated assets from a TOML config.
    Allocate {
        /// TOML analysis config with an [allocation] section.
        #[arg(long)]
        config: PathBuf,

        /// Emit JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("pool_source")
        .required(true)
        .args(["pnl", "r_multiples", "freq"])
))]
struct PoolArgs {
    /// File of raw P&L values (newline, comma or semicolon separated).
    #[arg(long)]
    pnl: Option<PathBuf>,

    /// File of R-multiples (same separators as --pnl).
    #[arg(long)]
    r_multiples: Option<PathBuf>,

    /// Frequency table, e.g. "-1:5,2:3".
    #[arg(long, allow_hyphen_values = true)]
    freq: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    FixedFractional,
    FixedInitial,
}

impl From<ModeArg> for RiskMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::FixedFractional => RiskMode::FixedFractional,
            ModeArg::FixedInitial => RiskMode::FixedInitial,
        }
    }
}

/// A pool ready for the engines, plus the SQN sample size to use with it.
struct LoadedPool {
    pool: RPool,
    sample_size: usize,
    r_unit: Option<f64>,
}

impl LoadedPool {
    fn metrics(&self) -> SystemMetrics {
        SystemMetrics::compute(self.pool.values(), self.sample_size, self.r_unit)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Stats { pool, json } => run_stats(&pool, json),
        Commands::Simulate {
            pool,
            sims,
            trades,
            seed,
            config,
            json,
        } => run_simulate(&pool, sims, trades, seed, config.as_deref(), json),
        Commands::OptimalF {
            pool,
            success,
            failure,
            trades,
            sims,
            mode,
            seed,
            config,
            json,
        } => {
            let overrides = OptimalFOverrides {
                success,
                failure,
                trades,
                sims,
                mode,
            };
            run_optimal_f_cmd(&pool, overrides, seed, config.as_deref(), json)
        }
        Commands::Allocate { config, json } => run_allocate(&config, json),
    }
}

// ─── Pool loading ────────────────────────────────────────────────────

fn load_pool(args: &PoolArgs) -> Result<LoadedPool> {
    if let Some(path) = &args.pnl {
        let text = read_text(path)?;
        let raw = ingest_raw_pnl(&text)
            .with_context(|| format!("ingest raw P&L from {}", path.display()))?;
        debug!(
            valid = raw.valid_count,
            r_unit = raw.r_unit,
            sample_size = raw.sample_size,
            "raw P&L ingested"
        );
        return Ok(LoadedPool {
            pool: RPool::from_values(raw.pool)?,
            sample_size: raw.sample_size,
            r_unit: Some(raw.r_unit),
        });
    }

    let pool = if let Some(path) = &args.r_multiples {
        RPool::from_values(parse_tokens(&read_text(path)?))?
    } else if let Some(table) = &args.freq {
        RPool::from_frequencies(&parse_frequencies(table)?)?
    } else {
        bail!("one of --pnl, --r-multiples or --freq is required");
    };

    let sample_size = pool.len();
    debug!(values = sample_size, "pool loaded");
    Ok(LoadedPool {
        pool,
        sample_size,
        r_unit: None,
    })
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

/// Parse `"R:count,R:count"` into frequency rows.
fn parse_frequencies(table: &str) -> Result<Vec<FrequencyRow>> {
    table
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| -> Result<FrequencyRow> {
            let Some((r, count)) = entry.split_once(':') else {
                bail!("frequency entry '{entry}' is not R:count");
            };
            let r: f64 = r
                .trim()
                .parse()
                .with_context(|| format!("bad R-multiple in '{entry}'"))?;
            let count: u32 = count
                .trim()
                .parse()
                .with_context(|| format!("bad count in '{entry}'"))?;
            Ok(FrequencyRow::new(r, count))
        })
        .collect()
}

fn load_analysis_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::from_file(path)
            .with_context(|| format!("load config {}", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

fn render_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", render_json(value)?);
    Ok(())
}

// ─── Commands ────────────────────────────────────────────────────────

fn run_stats(args: &PoolArgs, json: bool) -> Result<()> {
    let pool = load_pool(args)?;
    let metrics = pool.metrics();
    if json {
        return print_json(&metrics);
    }
    println!();
    println!("=== System Metrics ===");
    println!("Trades:         {}", pool.pool.len());
    print_metrics(&metrics);
    println!();
    Ok(())
}

fn print_metrics(m: &SystemMetrics) {
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Expectancy:     {:.3}R", m.expectancy);
    println!("Std Deviation:  {:.3}R", m.standard_deviation);
    println!("SQN:            {:.2} (n = {})", m.sqn, m.n);
    println!("Worst R:        {:.2}R", m.worst_r);
    if let Some(r_unit) = m.r_unit_size {
        println!("R Unit:         {r_unit:.2}");
    }
}

fn run_simulate(
    args: &PoolArgs,
    sims: Option<usize>,
    trades: Option<usize>,
    seed: Option<u64>,
    config_path: Option<&Path>,
    json: bool,
) -> Result<()> {
    let analysis = load_analysis_config(config_path)?;
    let mut config = analysis.monte_carlo.unwrap_or_default();
    if let Some(sims) = sims {
        config.total_simulations = sims;
    }
    if let Some(trades) = trades {
        config.trades_per_simulation = trades;
    }
    config.validate()?;
    let seed = seed.unwrap_or(analysis.seed);

    let pool = load_pool(args)?;
    let metrics = pool.metrics();
    let results = run_monte_carlo(&pool.pool, &metrics, &config, seed);

    if json {
        return print_json(&results);
    }
    print_simulation(&results);
    Ok(())
}

fn print_simulation(results: &SimulationResults) {
    let rm = &results.risk_metrics;
    println!();
    println!("=== Monte Carlo ===");
    println!(
        "Trials:         {} x {} trades",
        results.config.total_simulations, results.config.trades_per_simulation
    );
    print_metrics(&results.system_metrics);
    println!();
    println!("--- Risk ---");
    println!("P(profit):      {:.1}%", rm.probability_of_profit);
    println!("P95 DD length:  {} trades", rm.p95_drawdown_duration);
    println!("Reward/Risk:    {:.2}", rm.reward_risk_ratio);
    println!();
    println!(
        "{:<18} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "Distribution", "Avg", "Median", "P5", "P95", "Max"
    );
    println!("{}", "-".repeat(68));
    let d = &results.distributions;
    for (name, h) in [
        ("Final Result", &d.final_result),
        ("Max Drawdown", &d.max_drawdown),
        ("Max Profit", &d.max_profit),
        ("Losing Streak", &d.max_consecutive_losses),
        ("Winning Streak", &d.max_consecutive_wins),
    ] {
        let s = &h.stats;
        println!(
            "{:<18} {:>9.2} {:>9.2} {:>9.2} {:>9.2} {:>9.2}",
            name, s.avg, s.median, s.p5, s.p95, s.max
        );
    }
    println!();
    println!("{:<28} {:>10} {:>10}", "Curve", "Value", "End");
    println!("{}", "-".repeat(50));
    for curve in &results.equity_curves {
        let end = curve.path.last().copied().unwrap_or(0.0);
        let value = if curve.kind == CurveKind::Average {
            end
        } else {
            curve.value
        };
        println!("{:<28} {:>10.2} {:>10.2}", curve.kind.label(), value, end);
    }
    println!();
}

struct OptimalFOverrides {
    success: Option<f64>,
    failure: Option<f64>,
    trades: Option<usize>,
    sims: Option<usize>,
    mode: Option<ModeArg>,
}

fn run_optimal_f_cmd(
    args: &PoolArgs,
    overrides: OptimalFOverrides,
    seed: Option<u64>,
    config_path: Option<&Path>,
    json: bool,
) -> Result<()> {
    let analysis = load_analysis_config(config_path)?;
    let mut config = analysis.optimal_f.unwrap_or_default();
    if let Some(v) = overrides.success {
        config.success_threshold_pct = v;
    }
    if let Some(v) = overrides.failure {
        config.failure_threshold_pct = v;
    }
    if let Some(v) = overrides.trades {
        config.trades_per_sim = v;
    }
    if let Some(v) = overrides.sims {
        config.total_sims = v;
    }
    if let Some(mode) = overrides.mode {
        config.risk_mode = mode.into();
    }
    let seed = seed.unwrap_or(analysis.seed);

    let pool = load_pool(args)?;
    let search = OptimalFSearch::new(config).with_seed(seed);
    for change in search.clamped_fields() {
        eprintln!("WARNING: {change}");
    }

    let stream = search.spawn(pool.pool).context("start optimal-f worker")?;
    let report = stream.wait(|pct| {
        eprint!("\rSweeping risk fractions... {pct:>3}%");
        let _ = std::io::stderr().flush();
    });
    eprintln!();
    let Some(report) = report else {
        bail!("optimal-f sweep ended without a report");
    };

    if json {
        return print_json(&report);
    }
    print_optimal_f(&report);
    Ok(())
}

fn print_optimal_f(report: &OptimalFReport) {
    println!();
    println!("=== Optimal f ===");
    println!(
        "Trials:         {} x {} trades ({:?})",
        report.config.total_sims, report.config.trades_per_sim, report.config.risk_mode
    );
    println!(
        "Success / Ruin: +{}% / {}%",
        report.config.success_threshold_pct, report.config.failure_threshold_pct
    );
    println!();
    println!(
        "{:<28} {:>7} {:>9} {:>8} {:>9} {:>9}",
        "Approach", "Risk", "Success", "Ruin", "Avg", "Median"
    );
    println!("{}", "-".repeat(75));
    for row in &report.rows {
        match &row.point {
            Some(p) => println!(
                "{:<28} {:>6.1}% {:>8.2}% {:>7.2}% {:>8.1}% {:>8.1}%",
                row.approach,
                p.risk_pct,
                p.prob_success_pct,
                p.prob_ruin_pct,
                p.avg_gain_pct,
                p.median_gain_pct
            ),
            None => println!("{:<28} {:>7}", row.approach, "n/a"),
        }
    }
    println!();
}

fn run_allocate(config_path: &Path, json: bool) -> Result<()> {
    let analysis = load_analysis_config(Some(config_path))?;
    let Some(alloc) = analysis.allocation else {
        bail!("{} has no [allocation] section", config_path.display());
    };
    let matrix = alloc.build_matrix()?;
    let report = prune_risk_allocation(
        &alloc.assets,
        &matrix,
        alloc.max_single_risk,
        alloc.total_heat,
        alloc.allow_over_allocation,
    )?;

    if json {
        return print_json(&report);
    }
    print_allocation(&report);
    Ok(())
}

fn print_allocation(report: &AllocationReport) {
    println!();
    println!("=== Risk Allocation ===");
    println!("Heat Budget:    {:.2}%", report.effective_heat);
    println!(
        "Iterations:     {}{}",
        report.iterations,
        if report.converged { "" } else { " (not converged)" }
    );
    println!("Nominal Sum:    {:.2}%", report.nominal_sum);
    println!("Portfolio Risk: {:.2}%", report.portfolio_risk);
    println!();
    println!("{:<12} {:>9} {:>9}  {}", "Asset", "Initial", "Final", "Constraint");
    println!("{}", "-".repeat(46));
    for a in &report.allocations {
        println!(
            "{:<12} {:>8.2}% {:>8.2}%  {}",
            a.name, a.initial_risk, a.final_risk, a.constraint_label
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frequency_table() {
        let rows = parse_frequencies("-1:5, 2:3,0.5:0").unwrap();
        assert_eq!(
            rows,
            vec![
                FrequencyRow::new(-1.0, 5),
                FrequencyRow::new(2.0, 3),
                FrequencyRow::new(0.5, 0),
            ]
        );
    }

    #[test]
    fn rejects_malformed_frequency_entry() {
        assert!(parse_frequencies("-1;5").is_err());
        assert!(parse_frequencies("x:5").is_err());
        assert!(parse_frequencies("1:-2").is_err());
    }

    #[test]
    fn frequency_pool_uses_unclamped_sample_size() {
        let args = PoolArgs {
            pnl: None,
            r_multiples: None,
            freq: Some("-1:100,2:50".into()),
        };
        let pool = load_pool(&args).unwrap();
        assert_eq!(pool.pool.len(), 150);
        assert_eq!(pool.sample_size, 150);
        assert_eq!(pool.r_unit, None);
    }

    #[test]
    fn raw_pnl_file_loads_into_validated_pool() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let losses = vec!["-100"; 20].join("\n");
        let wins = vec!["250"; 15].join("\n");
        writeln!(file, "{losses}\n{wins}").unwrap();

        let args = PoolArgs {
            pnl: Some(file.path().to_path_buf()),
            r_multiples: None,
            freq: None,
        };
        let loaded = load_pool(&args).unwrap();
        assert_eq!(loaded.pool.len(), 35);
        assert_eq!(loaded.r_unit, Some(100.0));
        assert!(loaded.pool.has_losses());
    }

    #[test]
    fn metrics_render_as_json() {
        let args = PoolArgs {
            pnl: None,
            r_multiples: None,
            freq: Some("-1:5,2:3".into()),
        };
        let metrics = load_pool(&args).unwrap().metrics();
        let json = render_json(&metrics).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["n"], 8);
        assert!(value.get("win_rate").is_some());
    }

    #[test]
    fn cli_parses_optimal_f_flags() {
        let cli = Cli::try_parse_from([
            "edgelab",
            "optimal-f",
            "--freq",
            "-1:5,2:3",
            "--failure",
            "-30",
            "--mode",
            "fixed-initial",
        ])
        .unwrap();
        match cli.command {
            Commands::OptimalF { failure, mode, .. } => {
                assert_eq!(failure, Some(-30.0));
                assert!(matches!(mode, Some(ModeArg::FixedInitial)));
            }
            _ => panic!("expected optimal-f"),
        }
    }

    #[test]
    fn cli_requires_one_pool_source() {
        assert!(Cli::try_parse_from(["edgelab", "stats"]).is_err());
        assert!(Cli::try_parse_from([
            "edgelab",
            "stats",
            "--freq",
            "1:1",
            "--pnl",
            "a.txt"
        ])
        .is_err());
    }
}
