use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

use super::targets::target_portfolio;
use super::types::{
    Config, FinalValueStats, MonteCarloSummary, PercentileBands, round_cents,
};

pub const DEFAULT_SIMULATIONS: u32 = 1_000;
pub const DEFAULT_RETURN_VOLATILITY: f64 = 0.15;
pub const DEFAULT_SEED: u64 = 42;
pub const MAX_YEARS: u32 = 30;
pub const SIMULATION_LIMIT: u32 = 100_000;
pub const YEAR_LIMIT: u32 = 150;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    #[error("num_simulations must be >= 1")]
    NoSimulations,
    #[error("num_simulations must be <= {limit}, got {requested}")]
    TooManySimulations { requested: u32, limit: u32 },
    #[error("years must be <= {limit}, got {requested}")]
    TooManyYears { requested: u32, limit: u32 },
    #[error("invalid return distribution (mean {mean}, volatility {volatility}): {reason}")]
    InvalidDistribution {
        mean: f64,
        volatility: f64,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonteCarloSettings {
    pub num_simulations: u32,
    pub years: u32,
    pub return_volatility: f64,
    pub seed: u64,
}

impl MonteCarloSettings {
    /// Defaults for `config`: a thousand runs over at most thirty years.
    pub fn for_config(config: &Config) -> Self {
        Self {
            num_simulations: DEFAULT_SIMULATIONS,
            years: MAX_YEARS.min(config.default_horizon()),
            return_volatility: DEFAULT_RETURN_VOLATILITY,
            seed: DEFAULT_SEED,
        }
    }
}

/// Accumulation-only trajectories with normally distributed annual returns.
///
/// Each simulation draws from its own generator seeded from `settings.seed`
/// and the simulation index, so the summary is reproducible.
pub fn run_monte_carlo(
    config: &Config,
    settings: &MonteCarloSettings,
) -> Result<MonteCarloSummary, SimulationError> {
    if settings.num_simulations == 0 {
        return Err(SimulationError::NoSimulations);
    }
    if settings.num_simulations > SIMULATION_LIMIT {
        return Err(SimulationError::TooManySimulations {
            requested: settings.num_simulations,
            limit: SIMULATION_LIMIT,
        });
    }
    if settings.years > YEAR_LIMIT {
        return Err(SimulationError::TooManyYears {
            requested: settings.years,
            limit: YEAR_LIMIT,
        });
    }
    // rand_distr accepts a negative standard deviation and mirrors the draws.
    if !settings.return_volatility.is_finite() || settings.return_volatility < 0.0 {
        return Err(SimulationError::InvalidDistribution {
            mean: config.growth_rate,
            volatility: settings.return_volatility,
            reason: "volatility must be finite and >= 0".to_string(),
        });
    }
    let returns = Normal::new(config.growth_rate, settings.return_volatility).map_err(|e| {
        SimulationError::InvalidDistribution {
            mean: config.growth_rate,
            volatility: settings.return_volatility,
            reason: e.to_string(),
        }
    })?;

    let points = settings.years as usize + 1;
    let trajectories = (0..settings.num_simulations)
        .map(|sim| {
            let mut rng = StdRng::seed_from_u64(derive_seed(settings.seed, sim));
            simulate_trajectory(config, &returns, &mut rng, points)
        })
        .collect::<Vec<_>>();

    let mut column = Vec::with_capacity(trajectories.len());
    let mut bands = PercentileBands {
        p10: Vec::with_capacity(points),
        p25: Vec::with_capacity(points),
        p50: Vec::with_capacity(points),
        p75: Vec::with_capacity(points),
        p90: Vec::with_capacity(points),
    };
    for year in 0..points {
        column.clear();
        column.extend(trajectories.iter().map(|t| t[year]));
        bands.p10.push(percentile(&mut column, 10.0));
        bands.p25.push(percentile(&mut column, 25.0));
        bands.p50.push(percentile(&mut column, 50.0));
        bands.p75.push(percentile(&mut column, 75.0));
        bands.p90.push(percentile(&mut column, 90.0));
    }

    let mut final_values = trajectories
        .iter()
        .map(|t| t[points - 1])
        .collect::<Vec<_>>();
    let target = target_portfolio(config, None);
    let successes = final_values.iter().filter(|v| **v >= target).count();
    let success_rate =
        (successes as f64 / f64::from(settings.num_simulations) * 1_000.0).round() / 10.0;

    let n = final_values.len() as f64;
    let mean = final_values.iter().sum::<f64>() / n;
    let variance = final_values
        .iter()
        .map(|v| (v - mean).powi(2))
        .sum::<f64>()
        / n;
    let median = percentile(&mut final_values, 50.0);

    debug!(
        simulations = settings.num_simulations,
        years = settings.years,
        success_rate,
        "monte carlo finished"
    );

    Ok(MonteCarloSummary {
        success_rate,
        percentiles: bands,
        final_values: FinalValueStats {
            mean: round_cents(mean),
            median: round_cents(median),
            std: round_cents(variance.sqrt()),
        },
        target_portfolio: round_cents(target),
        years: settings.years,
        num_simulations: settings.num_simulations,
    })
}

fn simulate_trajectory(
    config: &Config,
    returns: &Normal<f64>,
    rng: &mut StdRng,
    points: usize,
) -> Vec<f64> {
    let mut portfolio_value = config.total_portfolio();
    let mut trajectory = Vec::with_capacity(points);
    trajectory.push(portfolio_value);
    for _ in 1..points {
        let annual_return = returns.sample(rng);
        portfolio_value = portfolio_value * (1.0 + annual_return) + config.annual_contribution;
        trajectory.push(portfolio_value);
    }
    trajectory
}

fn derive_seed(base_seed: u64, simulation: u32) -> u64 {
    splitmix64(base_seed ^ (u64::from(simulation) << 32))
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Linear interpolation between closest ranks; sorts `values` in place.
fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}
