use clap::{Args, ValueEnum};
use serde::{Deserialize, Deserializer, de};

use super::error::{ApiError, ApiResult};
use crate::core::{
    Config, FireType, FundingStrategy, LargeExpense, MonteCarloSettings, PartTimePlan,
    PreparedConfig, Windfall, prepare_config,
};

const DEFAULT_PART_TIME_START_AGE: u32 = 55;
const DEFAULT_PART_TIME_END_AGE: u32 = 62;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliFireType {
    Lean,
    Coast,
    Barista,
    Regular,
    Fat,
}

impl From<CliFireType> for FireType {
    fn from(value: CliFireType) -> Self {
        match value {
            CliFireType::Lean => FireType::Lean,
            CliFireType::Coast => FireType::Coast,
            CliFireType::Barista => FireType::Barista,
            CliFireType::Regular => FireType::Regular,
            CliFireType::Fat => FireType::Fat,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliFundingStrategy {
    ReduceContributions,
    PortfolioWithdrawal,
    MixedApproach,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ApiFireType {
    Lean,
    Coast,
    Barista,
    Regular,
    Fat,
}

impl From<ApiFireType> for CliFireType {
    fn from(value: ApiFireType) -> Self {
        match value {
            ApiFireType::Lean => CliFireType::Lean,
            ApiFireType::Coast => CliFireType::Coast,
            ApiFireType::Barista => CliFireType::Barista,
            ApiFireType::Regular => CliFireType::Regular,
            ApiFireType::Fat => CliFireType::Fat,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ApiFundingStrategy {
    ReduceContributions,
    #[default]
    PortfolioWithdrawal,
    MixedApproach,
}

impl From<ApiFundingStrategy> for CliFundingStrategy {
    fn from(value: ApiFundingStrategy) -> Self {
        match value {
            ApiFundingStrategy::ReduceContributions => CliFundingStrategy::ReduceContributions,
            ApiFundingStrategy::PortfolioWithdrawal => CliFundingStrategy::PortfolioWithdrawal,
            ApiFundingStrategy::MixedApproach => CliFundingStrategy::MixedApproach,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioType {
    NoContributions,
    PartTime,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct WindfallPayload {
    age: u32,
    amount: f64,
}

#[derive(Debug, Clone, Copy)]
enum LargeExpensePayload {
    Tagged(TaggedExpensePayload),
    Legacy(LegacyExpensePayload),
}

/// The legacy shape is only tried when the object carries no `type` key, so a
/// malformed tagged expense is an error rather than a silent legacy read.
impl<'de> Deserialize<'de> for LargeExpensePayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let parsed = if value.get("type").is_some() {
            serde_json::from_value(value).map(LargeExpensePayload::Tagged)
        } else {
            serde_json::from_value(value).map(LargeExpensePayload::Legacy)
        };
        parsed.map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TaggedExpensePayload {
    Single {
        target_age: u32,
        amount: f64,
        #[serde(default)]
        funding_strategy: ApiFundingStrategy,
        #[serde(default)]
        max_contribution_reduction: f64,
    },
    #[serde(alias = "multi_year")]
    Multi {
        start_age: u32,
        end_age: u32,
        annual_amount: f64,
        #[serde(default)]
        funding_strategy: ApiFundingStrategy,
        #[serde(default)]
        max_annual_contribution_reduction: f64,
    },
}

/// Older clients send a bare `{target_age, amount, contribution_reduction}`.
#[derive(Debug, Clone, Copy, Deserialize)]
struct LegacyExpensePayload {
    target_age: u32,
    amount: f64,
    #[serde(default)]
    contribution_reduction: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PlanPayload {
    current_age: Option<u32>,
    current_portfolio_taxable: Option<f64>,
    current_portfolio_tax_deferred: Option<f64>,
    annual_contribution: Option<f64>,
    expected_annual_spending: Option<f64>,
    growth_rate: Option<f64>,
    inflation_rate: Option<f64>,
    withdrawal_rate: Option<f64>,
    social_security_income: Option<f64>,
    social_security_age: Option<u32>,
    desired_retirement_age: Option<u32>,
    life_expectancy: Option<u32>,
    fire_type: Option<ApiFireType>,
    windfalls: Vec<WindfallPayload>,
    large_expense: Option<LargeExpensePayload>,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioPayload {
    #[serde(flatten)]
    pub plan: PlanPayload,
    pub scenario_type: ScenarioType,
    #[serde(default)]
    pub reduced_spending: Option<f64>,
    #[serde(default)]
    pub part_time_income: Option<f64>,
    #[serde(default)]
    pub part_time_start_age: Option<u32>,
    #[serde(default)]
    pub part_time_end_age: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct MonteCarloPayload {
    #[serde(flatten)]
    pub plan: PlanPayload,
    #[serde(default)]
    pub num_simulations: Option<u32>,
    #[serde(default)]
    pub years: Option<u32>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub return_volatility: Option<f64>,
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[arg(long)]
    pub current_age: u32,
    #[arg(long, default_value_t = 0.0)]
    pub taxable_portfolio: f64,
    #[arg(long, default_value_t = 0.0)]
    pub tax_deferred_portfolio: f64,
    #[arg(long, default_value_t = 0.0)]
    pub annual_contribution: f64,
    #[arg(long)]
    pub expected_annual_spending: f64,
    #[arg(long, default_value_t = 7.0, help = "Expected annual return in percent, e.g. 7")]
    pub growth_rate: f64,
    #[arg(long, default_value_t = 3.0, help = "Annual inflation in percent")]
    pub inflation_rate: f64,
    #[arg(long, default_value_t = 4.0, help = "Safe withdrawal rate in percent")]
    pub withdrawal_rate: f64,
    #[arg(long, default_value_t = 0.0)]
    pub social_security_income: f64,
    #[arg(long, default_value_t = 67)]
    pub social_security_age: u32,
    #[arg(long)]
    pub desired_retirement_age: Option<u32>,
    #[arg(long, default_value_t = 85)]
    pub life_expectancy: u32,
    #[arg(long, value_enum, default_value_t = CliFireType::Regular)]
    pub fire_type: CliFireType,
    #[arg(
        long = "windfall",
        value_parser = parse_windfall,
        help = "One-time inflow as AGE:AMOUNT; repeatable"
    )]
    pub windfalls: Vec<Windfall>,
    #[arg(long, help = "Age of a single expense, or first age of a multi-year one")]
    pub expense_age: Option<u32>,
    #[arg(long, help = "Last age of a multi-year expense; omit for a single expense")]
    pub expense_end_age: Option<u32>,
    #[arg(long, default_value_t = 0.0, help = "Expense amount (per year when multi-year)")]
    pub expense_amount: f64,
    #[arg(long, value_enum, default_value_t = CliFundingStrategy::PortfolioWithdrawal)]
    pub funding_strategy: CliFundingStrategy,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Cap on the contribution cut per expense year for mixed-approach funding"
    )]
    pub max_contribution_reduction: f64,
}

#[derive(Args, Debug, Clone)]
pub struct MonteCarloArgs {
    #[command(flatten)]
    pub plan: PlanArgs,
    #[arg(long, default_value_t = crate::core::DEFAULT_SIMULATIONS)]
    pub num_simulations: u32,
    #[arg(long, help = "Years to simulate; defaults to min(30, life expectancy - age)")]
    pub years: Option<u32>,
    #[arg(long, default_value_t = 15.0, help = "Annual return volatility in percent")]
    pub return_volatility: f64,
    #[arg(long, default_value_t = crate::core::DEFAULT_SEED)]
    pub seed: u64,
}

fn parse_windfall(raw: &str) -> Result<Windfall, String> {
    let (age, amount) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected AGE:AMOUNT, got '{raw}'"))?;
    let age = age
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid windfall age '{age}': {e}"))?;
    let amount = amount
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid windfall amount '{amount}': {e}"))?;
    Ok(Windfall { age, amount })
}

fn funding_from_args(strategy: CliFundingStrategy, max_reduction: f64) -> FundingStrategy {
    match strategy {
        CliFundingStrategy::ReduceContributions => FundingStrategy::ReduceContributions,
        CliFundingStrategy::PortfolioWithdrawal => FundingStrategy::PortfolioWithdrawal,
        CliFundingStrategy::MixedApproach => FundingStrategy::MixedApproach { max_reduction },
    }
}

/// Converts whole-number percentages to fractions and validates the result.
pub fn build_config(args: PlanArgs) -> ApiResult<PreparedConfig> {
    let large_expense = match (args.expense_age, args.expense_end_age) {
        (None, None) => None,
        (None, Some(_)) => {
            return Err(ApiError::InvalidField {
                field: "expense_end_age",
                message: "requires expense_age".to_string(),
            });
        }
        (Some(target_age), None) => Some(LargeExpense::Single {
            target_age,
            amount: args.expense_amount,
            funding: funding_from_args(args.funding_strategy, args.max_contribution_reduction),
        }),
        (Some(start_age), Some(end_age)) => Some(LargeExpense::MultiYear {
            start_age,
            end_age,
            annual_amount: args.expense_amount,
            funding: funding_from_args(args.funding_strategy, args.max_contribution_reduction),
        }),
    };

    let config = Config {
        current_age: args.current_age,
        taxable_portfolio: args.taxable_portfolio,
        tax_deferred_portfolio: args.tax_deferred_portfolio,
        annual_contribution: args.annual_contribution,
        expected_annual_spending: args.expected_annual_spending,
        growth_rate: args.growth_rate / 100.0,
        inflation_rate: args.inflation_rate / 100.0,
        withdrawal_rate: args.withdrawal_rate / 100.0,
        social_security_income: args.social_security_income,
        social_security_age: args.social_security_age,
        desired_retirement_age: args.desired_retirement_age,
        life_expectancy: args.life_expectancy,
        fire_type: args.fire_type.into(),
        windfalls: args.windfalls,
        large_expense,
    };
    Ok(prepare_config(config)?)
}

pub fn monte_carlo_settings(args: &MonteCarloArgs, config: &Config) -> MonteCarloSettings {
    let defaults = MonteCarloSettings::for_config(config);
    MonteCarloSettings {
        num_simulations: args.num_simulations,
        years: args.years.unwrap_or(defaults.years),
        return_volatility: args.return_volatility / 100.0,
        seed: args.seed,
    }
}

pub fn part_time_plan(payload: &ScenarioPayload) -> ApiResult<PartTimePlan> {
    Ok(PartTimePlan {
        reduced_spending: payload
            .reduced_spending
            .ok_or(ApiError::MissingField("reduced_spending"))?,
        part_time_income: payload
            .part_time_income
            .ok_or(ApiError::MissingField("part_time_income"))?,
        start_age: payload
            .part_time_start_age
            .unwrap_or(DEFAULT_PART_TIME_START_AGE),
        end_age: payload.part_time_end_age.unwrap_or(DEFAULT_PART_TIME_END_AGE),
    })
}

pub fn plan_args_from_payload(payload: PlanPayload) -> ApiResult<PlanArgs> {
    let mut args = default_plan_args_for_api(
        payload
            .current_age
            .ok_or(ApiError::MissingField("current_age"))?,
        payload
            .expected_annual_spending
            .ok_or(ApiError::MissingField("expected_annual_spending"))?,
    );
    args.taxable_portfolio = payload
        .current_portfolio_taxable
        .ok_or(ApiError::MissingField("current_portfolio_taxable"))?;
    args.tax_deferred_portfolio = payload
        .current_portfolio_tax_deferred
        .ok_or(ApiError::MissingField("current_portfolio_tax_deferred"))?;

    if let Some(v) = payload.annual_contribution {
        args.annual_contribution = v;
    }
    if let Some(v) = payload.growth_rate {
        args.growth_rate = v;
    }
    if let Some(v) = payload.inflation_rate {
        args.inflation_rate = v;
    }
    if let Some(v) = payload.withdrawal_rate {
        args.withdrawal_rate = v;
    }
    if let Some(v) = payload.social_security_income {
        args.social_security_income = v;
    }
    if let Some(v) = payload.social_security_age {
        args.social_security_age = v;
    }
    if let Some(v) = payload.life_expectancy {
        args.life_expectancy = v;
    }
    if let Some(v) = payload.fire_type {
        args.fire_type = v.into();
    }
    // Zero means "not set" for older clients.
    args.desired_retirement_age = payload.desired_retirement_age.filter(|age| *age > 0);
    args.windfalls = payload
        .windfalls
        .into_iter()
        .map(|w| Windfall {
            age: w.age,
            amount: w.amount,
        })
        .collect();

    if let Some(expense) = payload.large_expense {
        apply_large_expense(&mut args, expense);
    }

    Ok(args)
}

fn apply_large_expense(args: &mut PlanArgs, expense: LargeExpensePayload) {
    match expense {
        LargeExpensePayload::Tagged(TaggedExpensePayload::Single {
            target_age,
            amount,
            funding_strategy,
            max_contribution_reduction,
        }) => {
            args.expense_age = Some(target_age);
            args.expense_amount = amount;
            args.funding_strategy = funding_strategy.into();
            args.max_contribution_reduction = max_contribution_reduction;
        }
        LargeExpensePayload::Tagged(TaggedExpensePayload::Multi {
            start_age,
            end_age,
            annual_amount,
            funding_strategy,
            max_annual_contribution_reduction,
        }) => {
            args.expense_age = Some(start_age);
            args.expense_end_age = Some(end_age);
            args.expense_amount = annual_amount;
            args.funding_strategy = funding_strategy.into();
            args.max_contribution_reduction = max_annual_contribution_reduction;
        }
        LargeExpensePayload::Legacy(LegacyExpensePayload {
            target_age,
            amount,
            contribution_reduction,
        }) => {
            args.expense_age = Some(target_age);
            args.expense_amount = amount;
            if contribution_reduction == 0.0 {
                args.funding_strategy = CliFundingStrategy::PortfolioWithdrawal;
            } else {
                args.funding_strategy = CliFundingStrategy::MixedApproach;
                args.max_contribution_reduction = contribution_reduction;
            }
        }
    }
}

pub fn monte_carlo_args_from_payload(payload: MonteCarloPayload) -> ApiResult<MonteCarloArgs> {
    let plan = plan_args_from_payload(payload.plan)?;
    let defaults = default_monte_carlo_args_for_api(plan);
    Ok(MonteCarloArgs {
        num_simulations: payload.num_simulations.unwrap_or(defaults.num_simulations),
        years: payload.years.or(defaults.years),
        return_volatility: payload
            .return_volatility
            .unwrap_or(defaults.return_volatility),
        seed: payload.seed.unwrap_or(defaults.seed),
        plan: defaults.plan,
    })
}

fn default_plan_args_for_api(current_age: u32, expected_annual_spending: f64) -> PlanArgs {
    PlanArgs {
        current_age,
        taxable_portfolio: 0.0,
        tax_deferred_portfolio: 0.0,
        annual_contribution: 0.0,
        expected_annual_spending,
        growth_rate: 7.0,
        inflation_rate: 3.0,
        withdrawal_rate: 4.0,
        social_security_income: 0.0,
        social_security_age: 67,
        desired_retirement_age: None,
        life_expectancy: 85,
        fire_type: CliFireType::Regular,
        windfalls: Vec::new(),
        expense_age: None,
        expense_end_age: None,
        expense_amount: 0.0,
        funding_strategy: CliFundingStrategy::PortfolioWithdrawal,
        max_contribution_reduction: 0.0,
    }
}

fn default_monte_carlo_args_for_api(plan: PlanArgs) -> MonteCarloArgs {
    MonteCarloArgs {
        plan,
        num_simulations: crate::core::DEFAULT_SIMULATIONS,
        years: None,
        return_volatility: crate::core::DEFAULT_RETURN_VOLATILITY * 100.0,
        seed: crate::core::DEFAULT_SEED,
    }
}
