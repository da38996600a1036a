use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FireType {
    Lean,
    Coast,
    Barista,
    Regular,
    Fat,
}

impl FireType {
    pub const ALL: [FireType; 5] = [
        FireType::Lean,
        FireType::Coast,
        FireType::Barista,
        FireType::Regular,
        FireType::Fat,
    ];

    /// Share of the configured spending this flavour of independence has to cover.
    pub fn multiplier(self) -> f64 {
        match self {
            FireType::Lean => 0.6,
            FireType::Coast => 1.0,
            FireType::Barista => 0.8,
            FireType::Regular => 1.0,
            FireType::Fat => 1.8,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FireType::Lean => "Lean FIRE",
            FireType::Coast => "Coast FIRE",
            FireType::Barista => "Barista FIRE",
            FireType::Regular => "Regular FIRE",
            FireType::Fat => "Fat FIRE",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Windfall {
    pub age: u32,
    pub amount: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Default, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum FundingStrategy {
    ReduceContributions,
    #[default]
    PortfolioWithdrawal,
    /// `max_reduction` is per expense year: the whole single expense, or each
    /// year of a multi-year expense.
    MixedApproach { max_reduction: f64 },
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LargeExpense {
    Single {
        target_age: u32,
        amount: f64,
        funding: FundingStrategy,
    },
    MultiYear {
        start_age: u32,
        end_age: u32,
        annual_amount: f64,
        funding: FundingStrategy,
    },
}

impl LargeExpense {
    pub fn funding(&self) -> FundingStrategy {
        match self {
            LargeExpense::Single { funding, .. } | LargeExpense::MultiYear { funding, .. } => {
                *funding
            }
        }
    }

    pub fn amount_at_age(&self, age: u32) -> f64 {
        match *self {
            LargeExpense::Single {
                target_age, amount, ..
            } if age == target_age => amount,
            LargeExpense::MultiYear {
                start_age,
                end_age,
                annual_amount,
                ..
            } if (start_age..=end_age).contains(&age) => annual_amount,
            _ => 0.0,
        }
    }

    pub fn total_amount(&self) -> f64 {
        match *self {
            LargeExpense::Single { amount, .. } => amount,
            LargeExpense::MultiYear {
                start_age,
                end_age,
                annual_amount,
                ..
            } => annual_amount * f64::from(end_age.saturating_sub(start_age) + 1),
        }
    }

    /// Splits this year's expense between forgone contributions and a portfolio draw.
    pub fn funding_for_age(&self, age: u32, annual_contribution: f64) -> ExpenseFunding {
        let amount = self.amount_at_age(age);
        if amount <= 0.0 {
            return ExpenseFunding::default();
        }

        let contribution_reduction = match self.funding() {
            FundingStrategy::ReduceContributions => amount.min(annual_contribution),
            FundingStrategy::PortfolioWithdrawal => 0.0,
            FundingStrategy::MixedApproach { max_reduction } => {
                amount.min(max_reduction).min(annual_contribution)
            }
        }
        .max(0.0);

        ExpenseFunding {
            contribution_reduction,
            portfolio_withdrawal: (amount - contribution_reduction).max(0.0),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ExpenseFunding {
    pub contribution_reduction: f64,
    pub portfolio_withdrawal: f64,
}

impl ExpenseFunding {
    pub fn total(self) -> f64 {
        self.contribution_reduction + self.portfolio_withdrawal
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub current_age: u32,
    pub taxable_portfolio: f64,
    pub tax_deferred_portfolio: f64,
    pub annual_contribution: f64,
    pub expected_annual_spending: f64,
    pub growth_rate: f64,
    pub inflation_rate: f64,
    pub withdrawal_rate: f64,
    pub social_security_income: f64,
    pub social_security_age: u32,
    pub desired_retirement_age: Option<u32>,
    pub life_expectancy: u32,
    pub fire_type: FireType,
    pub windfalls: Vec<Windfall>,
    pub large_expense: Option<LargeExpense>,
}

impl Config {
    pub fn total_portfolio(&self) -> f64 {
        self.taxable_portfolio + self.tax_deferred_portfolio
    }

    pub fn default_horizon(&self) -> u32 {
        self.life_expectancy.saturating_sub(self.current_age)
    }

    pub fn windfall_at_age(&self, age: u32) -> f64 {
        self.windfalls
            .iter()
            .filter(|w| w.age == age)
            .map(|w| w.amount)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearRecord {
    pub year: u32,
    pub age: u32,
    pub portfolio_value: f64,
    pub target_portfolio: f64,
    pub inflation_adjusted_spending: f64,
    pub social_security_income: f64,
    pub net_spending_need: f64,
    pub sustainable_withdrawal: f64,
    pub annual_contribution: f64,
    pub part_time_income: f64,
    pub windfall: f64,
    pub contribution_reduction: f64,
    pub portfolio_withdrawal: f64,
    pub total_expense: f64,
    pub fire_achieved: bool,
    pub surplus_deficit: f64,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PartTimePlan {
    pub reduced_spending: f64,
    pub part_time_income: f64,
    pub start_age: u32,
    pub end_age: u32,
}

impl PartTimePlan {
    pub fn covers(&self, age: u32) -> bool {
        (self.start_age..=self.end_age).contains(&age)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartTimeYearRecord {
    #[serde(flatten)]
    pub record: YearRecord,
    pub net_withdrawal_needed: f64,
    pub fire_achieved_year: Option<u32>,
    pub is_part_time: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FireTarget {
    pub target_portfolio: f64,
    pub name: &'static str,
    pub multiplier: f64,
    pub annual_spending: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReadinessCheck {
    Undetermined {
        reason: String,
    },
    Assessed {
        on_track: bool,
        years_to_desired_retirement: u32,
        portfolio_at_retirement: f64,
        target_portfolio: f64,
        shortfall: f64,
        message: String,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    Conservative,
    Optimistic,
    HigherContributions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioSummary {
    pub years_to_fire: Option<u32>,
    pub target_portfolio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileBands {
    pub p10: Vec<f64>,
    pub p25: Vec<f64>,
    pub p50: Vec<f64>,
    pub p75: Vec<f64>,
    pub p90: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalValueStats {
    pub mean: f64,
    pub median: f64,
    pub std: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonteCarloSummary {
    pub success_rate: f64,
    pub percentiles: PercentileBands,
    pub final_values: FinalValueStats,
    pub target_portfolio: f64,
    pub years: u32,
    pub num_simulations: u32,
}

pub(crate) fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
