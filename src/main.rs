use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use assignment_tester::config::{Config, ConfigOverrides};
use assignment_tester::dispatch::{dispatch, AssignmentService, HttpAssignmentService};
use assignment_tester::lead::{
    parse_appointment_date, parse_appointment_time, AlgorithmParams, AssignmentRequest, LeadError,
    LeadInput, ParamOverrides, DEFAULT_APPOINTMENT_TIME,
};
use assignment_tester::output::csv::{params_to_csv, ranking_to_csv};
use assignment_tester::output::render_json;
use assignment_tester::output::table::{
    render_logs_table, render_params_table, render_ranking_table, render_result_panel,
    render_score_bars,
};
use assignment_tester::response::AssignmentResult;
use assignment_tester::server::{run_server, AppState};
use assignment_tester::summary::{
    result_score_bars, summarize, ScoreBar, SubmissionContext, Summary,
};
use assignment_tester::telemetry;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "assignment-tester",
    about = "Submit sample leads to the salesperson assignment service and inspect the result"
)]
struct Cli {
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[arg(short, long, global = true)]
    endpoint: Option<String>,
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    /// Candidates shown in the ranking (5 by default, 3 for a compact view)
    #[arg(short, long, global = true)]
    top: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args, Clone)]
struct LeadArgs {
    #[arg(long = "first-name")]
    first_name: String,
    #[arg(long = "last-name")]
    last_name: String,
    #[arg(long)]
    phone: String,
    #[arg(long, default_value = "")]
    address: String,
    #[arg(long)]
    city: String,
    #[arg(long = "postal-code", default_value = "")]
    postal_code: String,
    /// Appointment date, YYYY-MM-DD
    #[arg(long)]
    date: Option<String>,
    /// Appointment time, HH:MM
    #[arg(long, default_value = DEFAULT_APPOINTMENT_TIME)]
    time: String,
    /// Send no appointment time at all
    #[arg(long = "no-time", conflicts_with = "time")]
    no_time: bool,
}

impl TryFrom<LeadArgs> for LeadInput {
    type Error = LeadError;

    fn try_from(value: LeadArgs) -> Result<Self, Self::Error> {
        let appointment_date = value
            .date
            .as_deref()
            .map(parse_appointment_date)
            .transpose()?;
        let appointment_time = if value.no_time {
            None
        } else {
            Some(parse_appointment_time(&value.time)?)
        };
        Ok(Self {
            first_name: value.first_name,
            last_name: value.last_name,
            phone: value.phone,
            address: value.address,
            city: value.city,
            postal_code: value.postal_code,
            appointment_date,
            appointment_time,
        })
    }
}

#[derive(Debug, clap::Args, Clone, Default)]
struct ParamArgs {
    #[arg(long = "max-travel-minutes")]
    max_travel_time_minutes: Option<u32>,
    #[arg(long = "max-appointments")]
    max_appointments_per_day: Option<u32>,
    #[arg(long = "max-new-assignments")]
    max_new_assignments_per_day: Option<u32>,
    #[arg(long = "min-gap-minutes")]
    min_time_gap_minutes: Option<u32>,
    #[arg(long = "weight-performance")]
    performance: Option<f64>,
    #[arg(long = "weight-proximity")]
    proximity: Option<f64>,
    #[arg(long = "weight-capacity")]
    capacity: Option<f64>,
    #[arg(long = "weight-route-efficiency")]
    route_efficiency: Option<f64>,
}

impl From<ParamArgs> for ParamOverrides {
    fn from(value: ParamArgs) -> Self {
        Self {
            max_travel_time_minutes: value.max_travel_time_minutes,
            max_appointments_per_day: value.max_appointments_per_day,
            max_new_assignments_per_day: value.max_new_assignments_per_day,
            min_time_gap_minutes: value.min_time_gap_minutes,
            performance: value.performance,
            proximity: value.proximity,
            capacity: value.capacity,
            route_efficiency: value.route_efficiency,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Send one lead to the assignment service
    Submit {
        #[command(flatten)]
        lead: LeadArgs,
        #[command(flatten)]
        params: ParamArgs,
        /// Send the configured algorithm parameters even without overrides
        #[arg(long)]
        with_params: bool,
    },
    /// Render a saved service response without contacting the service
    Summarize {
        file: PathBuf,
        #[arg(long)]
        city: Option<String>,
    },
    /// Show the algorithm configuration that would be sent
    Params {
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Serve the browser form and JSON API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeView<'a> {
    result: &'a AssignmentResult,
    summary: &'a Summary,
    score_bars: Vec<ScoreBar>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ParamsView {
    #[serde(flatten)]
    params: AlgorithmParams,
    weight_sum: f64,
    balanced: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(config_path.as_path()))?;
    let (host, port) = match &cli.command {
        Commands::Serve { host, port } => (host.clone(), *port),
        _ => (None, None),
    };
    config.apply_overrides(ConfigOverrides {
        endpoint_url: cli.endpoint.clone(),
        top_n: cli.top,
        host,
        port,
    });
    telemetry::init(&config.logging.level)?;

    match &cli.command {
        Commands::Submit {
            lead,
            params,
            with_params,
        } => {
            let lead = LeadInput::try_from(lead.clone())?;
            let overrides = ParamOverrides::from(params.clone());
            let algorithm_params = if *with_params || !overrides.is_empty() {
                Some(overrides.apply(config.algorithm_params()))
            } else {
                None
            };
            let request = AssignmentRequest::new(lead, algorithm_params)?;
            let service = build_service(&config)?;
            let result = dispatch(&service, &request).await;
            let summary = summarize(
                SubmissionContext::from(&request),
                &result,
                &config.summary_options(),
                Utc::now(),
            );
            let limits = request
                .algorithm_params
                .unwrap_or_else(|| config.algorithm_params());
            print_outcome(&result, &summary, &limits, cli.output)?;
        }
        Commands::Summarize { file, city } => {
            let result = AssignmentResult::load(file)?;
            let context = SubmissionContext {
                city: city.as_deref().unwrap_or_default(),
                sent_params: None,
            };
            let summary = summarize(context, &result, &config.summary_options(), Utc::now());
            print_outcome(&result, &summary, &config.algorithm_params(), cli.output)?;
        }
        Commands::Params { params } => {
            let effective = ParamOverrides::from(params.clone()).apply(config.algorithm_params());
            if !effective.weights.is_balanced() {
                warn!(
                    "scoring weights sum to {:.2}, the service expects 1.00",
                    effective.weights.sum()
                );
            }
            print_params(&effective, cli.output)?;
        }
        Commands::Serve { .. } => {
            let bind = format!("{}:{}", config.server.host, config.server.port);
            let addr: SocketAddr = bind
                .parse()
                .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
            let service: Arc<dyn AssignmentService> = Arc::new(build_service(&config)?);
            let state = AppState::new(
                service,
                config.algorithm_params(),
                config.summary_options(),
            );
            return run_server(state, addr).await;
        }
        Commands::Config { init, show } => {
            handle_config_command(*init, *show, &config, &config_path)?;
        }
    }

    Ok(())
}

fn build_service(config: &Config) -> Result<HttpAssignmentService> {
    info!("using assignment endpoint {}", config.endpoint.url);
    HttpAssignmentService::new(config.endpoint.url.clone(), config.connect_timeout())
        .context("failed building HTTP client")
}

fn handle_config_command(init: bool, show: bool, config: &Config, config_path: &Path) -> Result<()> {
    if init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn print_outcome(
    result: &AssignmentResult,
    summary: &Summary,
    limits: &AlgorithmParams,
    format: OutputFormat,
) -> Result<()> {
    let score_bars = result_score_bars(result);
    match format {
        OutputFormat::Table => {
            println!("{}", render_result_panel(result, limits));
            if !score_bars.is_empty() {
                println!("\nAssignment Scores\n{}", render_score_bars(&score_bars));
            }
            if !summary.logs.is_empty() {
                println!("\nAssignment Process\n{}", render_logs_table(&summary.logs));
            }
            if !summary.ranking.is_empty() {
                println!("\nTop Candidates\n{}", render_ranking_table(&summary.ranking));
            }
        }
        OutputFormat::Json => {
            let view = OutcomeView {
                result,
                summary,
                score_bars,
            };
            println!("{}", render_json(&view)?);
        }
        OutputFormat::Csv => println!("{}", ranking_to_csv(&summary.ranking)?),
    }
    Ok(())
}

fn print_params(params: &AlgorithmParams, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_params_table(params)),
        OutputFormat::Json => {
            let view = ParamsView {
                params: *params,
                weight_sum: params.weights.sum(),
                balanced: params.weights.is_balanced(),
            };
            println!("{}", render_json(&view)?);
        }
        OutputFormat::Csv => println!("{}", params_to_csv(params)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEAD: [&str; 9] = [
        "--first-name",
        "John",
        "--last-name",
        "Smith",
        "--phone",
        "416-555-0123",
        "--city",
        "Toronto",
        "--with-params",
    ];

    #[test]
    fn output_and_top_are_accepted_after_the_subcommand() {
        let args = ["assignment-tester", "submit"]
            .into_iter()
            .chain(LEAD)
            .chain(["--output", "json", "--top", "3"]);
        let cli = Cli::try_parse_from(args).expect("parse");
        assert!(matches!(cli.output, OutputFormat::Json));
        assert_eq!(cli.top, Some(3));
        assert!(matches!(cli.command, Commands::Submit { with_params: true, .. }));
    }

    #[test]
    fn output_is_accepted_before_the_subcommand() {
        let cli = Cli::try_parse_from(["assignment-tester", "-o", "csv", "params"]).expect("parse");
        assert!(matches!(cli.output, OutputFormat::Csv));
        assert_eq!(cli.top, None);
    }
}
