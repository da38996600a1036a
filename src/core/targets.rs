use std::collections::BTreeMap;

use super::types::{Config, FireTarget, FireType, ReadinessCheck, round_cents};

pub fn target_portfolio(config: &Config, fire_type: Option<FireType>) -> f64 {
    adjusted_spending(config, fire_type) / config.withdrawal_rate
}

/// Social security is netted from spending before dividing; a benefit larger
/// than spending means nothing has to be saved.
pub fn target_portfolio_with_social_security(config: &Config, fire_type: Option<FireType>) -> f64 {
    let net_spending_need = adjusted_spending(config, fire_type) - config.social_security_income;
    (net_spending_need / config.withdrawal_rate).max(0.0)
}

pub fn all_fire_targets(config: &Config) -> BTreeMap<FireType, FireTarget> {
    FireType::ALL
        .into_iter()
        .map(|fire_type| {
            (
                fire_type,
                FireTarget {
                    target_portfolio: target_portfolio(config, Some(fire_type)),
                    name: fire_type.label(),
                    multiplier: fire_type.multiplier(),
                    annual_spending: adjusted_spending(config, Some(fire_type)),
                },
            )
        })
        .collect()
}

/// Flat compounding to the desired retirement age. Expenses, windfalls and
/// inflation are ignored here; the yearly projector covers those.
pub fn readiness(config: &Config) -> ReadinessCheck {
    let Some(retirement_age) = config.desired_retirement_age else {
        return ReadinessCheck::Undetermined {
            reason: "No desired retirement age specified".to_string(),
        };
    };
    if retirement_age <= config.current_age {
        return ReadinessCheck::Undetermined {
            reason: "Desired retirement age is in the past or current".to_string(),
        };
    }

    let years = retirement_age - config.current_age;
    let mut portfolio = config.total_portfolio();
    for _ in 0..years {
        portfolio = portfolio * (1.0 + config.growth_rate) + config.annual_contribution;
    }

    let target = if retirement_age >= config.social_security_age
        && config.social_security_income > 0.0
    {
        target_portfolio_with_social_security(config, None)
    } else {
        target_portfolio(config, None)
    };

    let on_track = portfolio >= target;
    let status = if on_track { "On track" } else { "Not on track" };
    ReadinessCheck::Assessed {
        on_track,
        years_to_desired_retirement: years,
        portfolio_at_retirement: round_cents(portfolio),
        target_portfolio: round_cents(target),
        shortfall: round_cents((target - portfolio).max(0.0)),
        message: format!("{status} for retirement at age {retirement_age}"),
    }
}

fn adjusted_spending(config: &Config, fire_type: Option<FireType>) -> f64 {
    let fire_type = fire_type.unwrap_or(config.fire_type);
    config.expected_annual_spending * fire_type.multiplier()
}
