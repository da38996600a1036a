mod error;
mod payload;

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::{
    Router,
    extract::{Json, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{debug, info};

pub use error::{ApiError, ApiResult};
pub use payload::{
    MonteCarloArgs, MonteCarloPayload, PlanArgs, PlanPayload, ScenarioPayload, ScenarioType,
    build_config,
};

use crate::core::{
    FireTarget, FireType, MonteCarloSummary, PartTimeYearRecord, PreparedConfig, ReadinessCheck,
    ScenarioKind, ScenarioSummary, YearRecord, all_fire_targets, compare_scenarios,
    no_contribution_projections, part_time_projections, readiness, run_monte_carlo,
    target_portfolio, yearly_projections, years_to_fire,
};

#[derive(Parser, Debug)]
#[command(
    name = "fire-calc",
    about = "FIRE calculator: target portfolio, yearly projections, scenarios and Monte Carlo"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Print the full calculation as JSON
    Calculate(PlanArgs),
    /// Print a Monte Carlo summary as JSON
    MonteCarlo(MonteCarloArgs),
}

#[derive(Debug, Serialize)]
pub struct CalculateResponse {
    target_portfolio: f64,
    years_to_fire: Option<u32>,
    fire_age: Option<u32>,
    projections: Vec<YearRecord>,
    scenarios: BTreeMap<ScenarioKind, ScenarioSummary>,
    retirement_readiness: ReadinessCheck,
    fire_targets: BTreeMap<FireType, FireTarget>,
    current_fire_type: FireType,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ScenarioProjections {
    NoContributions(Vec<YearRecord>),
    PartTime(Vec<PartTimeYearRecord>),
}

#[derive(Debug, Serialize)]
struct ScenarioResponse {
    projections: ScenarioProjections,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub async fn run_cli(cli: Cli) -> ApiResult<()> {
    match cli.command {
        Command::Serve { port } => run_http_server(port).await?,
        Command::Calculate(args) => {
            let response = calculate(build_config(args)?);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::MonteCarlo(args) => {
            let summary = monte_carlo(&args)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/calculate", post(calculate_handler))
        .route("/api/scenario", post(scenario_handler))
        .route("/api/monte-carlo", post(monte_carlo_handler))
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "FIRE calculator API listening");
    info!("local access: http://127.0.0.1:{port}/health");

    axum::serve(listener, router()).await
}

pub fn calculate(prepared: PreparedConfig) -> CalculateResponse {
    let config = &prepared.config;
    let years_to_fire = years_to_fire(config);
    CalculateResponse {
        target_portfolio: target_portfolio(config, None),
        years_to_fire,
        fire_age: years_to_fire.map(|years| config.current_age + years),
        projections: yearly_projections(config, None),
        scenarios: compare_scenarios(config),
        retirement_readiness: readiness(config),
        fire_targets: all_fire_targets(config),
        current_fire_type: config.fire_type,
        warnings: warning_messages(&prepared),
    }
}

fn monte_carlo(args: &MonteCarloArgs) -> ApiResult<MonteCarloSummary> {
    let prepared = build_config(args.plan.clone())?;
    let settings = payload::monte_carlo_settings(args, &prepared.config);
    Ok(run_monte_carlo(&prepared.config, &settings)?)
}

fn scenario(payload: ScenarioPayload) -> ApiResult<ScenarioResponse> {
    let plan = match payload.scenario_type {
        ScenarioType::NoContributions => None,
        ScenarioType::PartTime => Some(payload::part_time_plan(&payload)?),
    };
    let prepared = build_config(payload::plan_args_from_payload(payload.plan)?)?;
    let config = &prepared.config;
    let horizon = config.default_horizon();

    let projections = match plan {
        None => ScenarioProjections::NoContributions(no_contribution_projections(config, horizon)),
        Some(plan) => {
            ScenarioProjections::PartTime(part_time_projections(config, &plan, horizon))
        }
    };
    Ok(ScenarioResponse {
        projections,
        warnings: warning_messages(&prepared),
    })
}

fn warning_messages(prepared: &PreparedConfig) -> Vec<String> {
    prepared.warnings.iter().map(ToString::to_string).collect()
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn calculate_handler(payload: Result<Json<PlanPayload>, JsonRejection>) -> Response {
    let result = parse(payload)
        .and_then(payload::plan_args_from_payload)
        .and_then(build_config)
        .map(calculate);
    match result {
        Ok(response) => {
            debug!(
                years_to_fire = ?response.years_to_fire,
                warnings = response.warnings.len(),
                "calculate"
            );
            json_response(StatusCode::OK, response)
        }
        Err(err) => err.into_response(),
    }
}

async fn scenario_handler(payload: Result<Json<ScenarioPayload>, JsonRejection>) -> Response {
    match parse(payload).and_then(scenario) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => err.into_response(),
    }
}

async fn monte_carlo_handler(payload: Result<Json<MonteCarloPayload>, JsonRejection>) -> Response {
    let result = parse(payload)
        .and_then(payload::monte_carlo_args_from_payload)
        .and_then(|args| monte_carlo(&args));
    match result {
        Ok(summary) => json_response(StatusCode::OK, summary),
        Err(err) => err.into_response(),
    }
}

fn parse<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|rejection| ApiError::InvalidJson(rejection.body_text()))
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
