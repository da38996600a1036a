mod config;
mod engine;
mod monte_carlo;
mod scenarios;
mod targets;
mod types;

pub use config::{ConfigError, ConfigWarning, PreparedConfig, prepare_config};
pub use engine::{
    no_contribution_projections, part_time_projections, yearly_projections, years_to_fire,
};
pub use monte_carlo::{
    DEFAULT_RETURN_VOLATILITY, DEFAULT_SEED, DEFAULT_SIMULATIONS, MonteCarloSettings,
    SimulationError, run_monte_carlo,
};
pub use scenarios::compare_scenarios;
pub use targets::{
    all_fire_targets, readiness, target_portfolio, target_portfolio_with_social_security,
};
pub use types::{
    Config, ExpenseFunding, FinalValueStats, FireTarget, FireType, FundingStrategy, LargeExpense,
    MonteCarloSummary, PartTimePlan, PartTimeYearRecord, PercentileBands, ReadinessCheck,
    ScenarioKind, ScenarioSummary, Windfall, YearRecord,
};
