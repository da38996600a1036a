use std::collections::BTreeMap;

use super::engine::years_to_fire;
use super::targets::target_portfolio;
use super::types::{Config, ScenarioKind, ScenarioSummary};

const CONSERVATIVE_GROWTH: f64 = 0.05;
const CONSERVATIVE_INFLATION: f64 = 0.04;
const OPTIMISTIC_GROWTH: f64 = 0.09;
const OPTIMISTIC_INFLATION: f64 = 0.02;
const HIGHER_CONTRIBUTION_FACTOR: f64 = 1.5;

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 3] = [
        ScenarioKind::Conservative,
        ScenarioKind::Optimistic,
        ScenarioKind::HigherContributions,
    ];

    /// The base configuration with this scenario's assumptions swapped in.
    /// Everything else, windfalls and large expenses included, carries over.
    pub fn apply(self, config: &Config) -> Config {
        let mut adjusted = config.clone();
        match self {
            ScenarioKind::Conservative => {
                adjusted.growth_rate = CONSERVATIVE_GROWTH;
                adjusted.inflation_rate = CONSERVATIVE_INFLATION;
            }
            ScenarioKind::Optimistic => {
                adjusted.growth_rate = OPTIMISTIC_GROWTH;
                adjusted.inflation_rate = OPTIMISTIC_INFLATION;
            }
            // A mixed-approach cap stays as prepared against the base
            // contribution; it is never raised to the scaled amount.
            ScenarioKind::HigherContributions => {
                adjusted.annual_contribution *= HIGHER_CONTRIBUTION_FACTOR;
            }
        }
        adjusted
    }
}

pub fn compare_scenarios(config: &Config) -> BTreeMap<ScenarioKind, ScenarioSummary> {
    ScenarioKind::ALL
        .into_iter()
        .map(|kind| {
            let adjusted = kind.apply(config);
            let summary = ScenarioSummary {
                years_to_fire: years_to_fire(&adjusted),
                target_portfolio: target_portfolio(&adjusted, None),
            };
            (kind, summary)
        })
        .collect()
}
