use tracing::warn;

use super::types::{Config, FundingStrategy, LargeExpense};

const SINGLE_EXPENSE_PORTFOLIO_RATIO: f64 = 2.0;
const MULTI_EXPENSE_PORTFOLIO_RATIO: f64 = 3.0;
pub const AGE_LIMIT: u32 = 150;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("withdrawal rate must be > 0, got {0}")]
    NonPositiveWithdrawalRate(f64),
    #[error("life expectancy ({life_expectancy}) must be greater than current age ({current_age})")]
    HorizonNotAfterCurrentAge {
        current_age: u32,
        life_expectancy: u32,
    },
    #[error("{field} must be a finite amount >= 0, got {value}")]
    InvalidAmount { field: &'static str, value: f64 },
    #[error("{field} must be finite, got {value}")]
    NonFiniteRate { field: &'static str, value: f64 },
    #[error("large expense end age ({end_age}) must be >= start age ({start_age})")]
    ExpenseWindowInverted { start_age: u32, end_age: u32 },
    #[error("{field} must be <= {limit}, got {value}")]
    AgeOutOfRange {
        field: &'static str,
        value: u32,
        limit: u32,
    },
}

/// Non-fatal findings surfaced while preparing a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigWarning {
    #[error(
        "contribution reduction ({requested:.0}) exceeds annual contribution; clamped to {allowed:.0}"
    )]
    ReductionClamped { requested: f64, allowed: f64 },
    #[error(
        "large expense total ({total_expense:.0}) is much larger than current portfolio ({portfolio:.0})"
    )]
    ExpenseDwarfsPortfolio { total_expense: f64, portfolio: f64 },
    #[error("annual expense amount ({annual_amount:.0}) exceeds annual contribution ({contribution:.0})")]
    AnnualExpenseExceedsContribution { annual_amount: f64, contribution: f64 },
}

#[derive(Debug, Clone)]
pub struct PreparedConfig {
    pub config: Config,
    pub warnings: Vec<ConfigWarning>,
}

/// Rejects configurations the engine cannot run and clamps the ones it can
/// run once adjusted.
///
/// Contribution reductions are absolute currency amounts. A negative cap is
/// rejected; a cap above the nominal annual contribution is clamped down to it.
pub fn prepare_config(mut config: Config) -> Result<PreparedConfig, ConfigError> {
    if !config.withdrawal_rate.is_finite() || config.withdrawal_rate <= 0.0 {
        return Err(ConfigError::NonPositiveWithdrawalRate(config.withdrawal_rate));
    }

    let ages = [
        ("life_expectancy", Some(config.life_expectancy)),
        ("desired_retirement_age", config.desired_retirement_age),
    ];
    for (field, age) in ages {
        if let Some(value) = age.filter(|age| *age > AGE_LIMIT) {
            return Err(ConfigError::AgeOutOfRange {
                field,
                value,
                limit: AGE_LIMIT,
            });
        }
    }

    if config.life_expectancy <= config.current_age {
        return Err(ConfigError::HorizonNotAfterCurrentAge {
            current_age: config.current_age,
            life_expectancy: config.life_expectancy,
        });
    }

    for (field, rate) in [
        ("growth_rate", config.growth_rate),
        ("inflation_rate", config.inflation_rate),
    ] {
        if !rate.is_finite() {
            return Err(ConfigError::NonFiniteRate { field, value: rate });
        }
    }

    for (field, value) in [
        ("taxable_portfolio", config.taxable_portfolio),
        ("tax_deferred_portfolio", config.tax_deferred_portfolio),
        ("annual_contribution", config.annual_contribution),
        ("expected_annual_spending", config.expected_annual_spending),
        ("social_security_income", config.social_security_income),
    ] {
        check_amount(field, value)?;
    }

    for windfall in &config.windfalls {
        check_amount("windfall amount", windfall.amount)?;
    }

    let mut warnings = Vec::new();
    if let Some(expense) = config.large_expense {
        config.large_expense = Some(prepare_large_expense(
            expense,
            config.annual_contribution,
            config.total_portfolio(),
            &mut warnings,
        )?);
    }

    for warning in &warnings {
        warn!(%warning, "configuration adjusted");
    }

    Ok(PreparedConfig { config, warnings })
}

fn check_amount(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidAmount { field, value });
    }
    Ok(())
}

fn prepare_large_expense(
    expense: LargeExpense,
    annual_contribution: f64,
    portfolio: f64,
    warnings: &mut Vec<ConfigWarning>,
) -> Result<LargeExpense, ConfigError> {
    let prepared = match expense {
        LargeExpense::Single {
            target_age,
            amount,
            funding,
        } => {
            check_amount("large expense amount", amount)?;
            if amount > portfolio * SINGLE_EXPENSE_PORTFOLIO_RATIO {
                warnings.push(ConfigWarning::ExpenseDwarfsPortfolio {
                    total_expense: amount,
                    portfolio,
                });
            }
            LargeExpense::Single {
                target_age,
                amount,
                funding: clamp_funding(funding, annual_contribution, warnings)?,
            }
        }
        LargeExpense::MultiYear {
            start_age,
            end_age,
            annual_amount,
            funding,
        } => {
            if end_age < start_age {
                return Err(ConfigError::ExpenseWindowInverted { start_age, end_age });
            }
            check_amount("large expense annual amount", annual_amount)?;

            let total_expense = expense.total_amount();
            if total_expense > portfolio * MULTI_EXPENSE_PORTFOLIO_RATIO {
                warnings.push(ConfigWarning::ExpenseDwarfsPortfolio {
                    total_expense,
                    portfolio,
                });
            }
            if annual_amount > annual_contribution {
                warnings.push(ConfigWarning::AnnualExpenseExceedsContribution {
                    annual_amount,
                    contribution: annual_contribution,
                });
            }
            LargeExpense::MultiYear {
                start_age,
                end_age,
                annual_amount,
                funding: clamp_funding(funding, annual_contribution, warnings)?,
            }
        }
    };
    Ok(prepared)
}

fn clamp_funding(
    funding: FundingStrategy,
    annual_contribution: f64,
    warnings: &mut Vec<ConfigWarning>,
) -> Result<FundingStrategy, ConfigError> {
    let FundingStrategy::MixedApproach { max_reduction } = funding else {
        return Ok(funding);
    };

    check_amount("max contribution reduction", max_reduction)?;
    if max_reduction > annual_contribution {
        warnings.push(ConfigWarning::ReductionClamped {
            requested: max_reduction,
            allowed: annual_contribution,
        });
        return Ok(FundingStrategy::MixedApproach {
            max_reduction: annual_contribution,
        });
    }
    Ok(funding)
}
