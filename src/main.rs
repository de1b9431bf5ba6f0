//! Wreckognizer - accident severity prediction service
//!
//! Predicts whether a hypothetical road accident in Zurich would be minor or
//! severe, attributing each prediction to a nearby road segment.
//!
//! Usage:
//!   wreckognizer predict --lat 47.37 --lon 8.54 --date 2023-06-15 --hour 17 \
//!       --accident-type at2 [--pedestrian] [--bicycle] [--motorcycle] [--count N]
//!   wreckognizer serve --port 8080
//!   wreckognizer --help
//!
//! Environment:
//!   WRECKOGNIZER_CONFIG - path to the TOML configuration (default wreckognizer.toml)
//!   RUST_LOG            - log filter, e.g. `wreckognizer=debug`

use chrono::{Datelike, NaiveDate};
use clap::{Args, Parser, Subcommand};
use std::process;
use std::sync::Arc;

use wreckognizer::config;
use wreckognizer::endpoint;
use wreckognizer::labels::{self, AccidentType};
use wreckognizer::model::{AccidentQuery, GeoPoint, PredictionReport};
use wreckognizer::pipeline::Predictor;

#[derive(Parser, Debug)]
#[command(name = "wreckognizer", version, about = "Accident severity prediction for Zurich")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Run one prediction and print the report
    Predict(PredictArgs),
    /// Serve the HTTP prediction endpoint
    Serve {
        #[arg(long)]
        port: u16,
    },
}

/// Arguments of the `predict` subcommand
#[derive(Args, Debug, PartialEq)]
struct PredictArgs {
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,
    #[arg(long, allow_negative_numbers = true)]
    lon: f64,
    /// Accident date, YYYY-MM-DD
    #[arg(long)]
    date: NaiveDate,
    /// Hour of day, 0-23
    #[arg(long)]
    hour: u32,
    /// Accident type code (e.g. at2) or description
    #[arg(long, value_parser = parse_accident_type)]
    accident_type: AccidentType,
    #[arg(long)]
    pedestrian: bool,
    #[arg(long)]
    bicycle: bool,
    #[arg(long)]
    motorcycle: bool,
    /// Number of nearby road segments to predict for
    #[arg(long, default_value_t = 1)]
    count: usize,
}

fn parse_accident_type(raw: &str) -> Result<AccidentType, String> {
    AccidentType::parse(raw).ok_or_else(|| format!("unknown accident type: {}", raw))
}

fn print_report(report: &PredictionReport) {
    let weekday = labels::weekday_name(report.timestamp.weekday().number_from_monday());
    println!("Prediction for {} ({})", report.timestamp.format("%Y-%m-%d %H:%M"), weekday);

    println!("\nWeather at the accident hour:");
    for (variable, value) in &report.weather {
        match value {
            Some(v) => println!("  {:<18} {}", variable, v),
            None => println!("  {:<18} n/a", variable),
        }
    }

    println!("\nPredictions:");
    for (i, p) in report.predictions.iter().enumerate() {
        println!(
            "  {:>2}. {:<6} at ({:.5}, {:.5}) on {} ({})",
            i + 1,
            p.severity.label(),
            p.location.lat,
            p.location.lon,
            p.road_type_description,
            p.road_type
        );
    }
    println!(
        "\n{} severe, {} minor",
        report.severe_count(),
        report.minor_count()
    );
}

fn run(command: Command) -> Result<(), String> {
    let config = config::load_config().map_err(|e| e.to_string())?;
    let predictor = Predictor::from_config(&config).map_err(|e| format!("Initialization failed: {}", e))?;

    match command {
        Command::Predict(args) => {
            let query = AccidentQuery::new(
                GeoPoint::new(args.lon, args.lat),
                args.date,
                args.hour,
                args.accident_type,
            )
            .map_err(|e| e.to_string())?
            .with_involvements(args.pedestrian, args.bicycle, args.motorcycle);

            let report = predictor.predict(&query, args.count).map_err(|e| e.to_string())?;
            print_report(&report);
            Ok(())
        }
        Command::Serve { port } => endpoint::start_endpoint_server(port, Arc::new(predictor)),
    }
}

fn main() {
    dotenv::dotenv().ok();
    pretty_env_logger::init_custom_env("RUST_LOG");

    let cli = Cli::parse();

    if let Err(e) = run(cli.command) {
        log::error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_command(args: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("wreckognizer").chain(args.iter().copied())).map(|cli| cli.command)
    }

    #[test]
    fn test_parse_predict_command() {
        let command = parse_command(&[
            "predict", "--lat", "47.37", "--lon", "8.54", "--date", "2023-06-15", "--hour", "17",
            "--accident-type", "at2", "--bicycle", "--count", "3",
        ])
        .unwrap();

        assert_eq!(
            command,
            Command::Predict(PredictArgs {
                lat: 47.37,
                lon: 8.54,
                date: NaiveDate::from_ymd_opt(2023, 6, 15).unwrap(),
                hour: 17,
                accident_type: AccidentType::RearEndCollision,
                pedestrian: false,
                bicycle: true,
                motorcycle: false,
                count: 3,
            })
        );
    }

    #[test]
    fn test_parse_predict_defaults_count() {
        let command = parse_command(&[
            "predict", "--lat", "47.37", "--lon", "8.54", "--date", "2023-06-15", "--hour", "0",
            "--accident-type", "Accident with rear-end collision",
        ])
        .unwrap();
        match command {
            Command::Predict(args) => {
                assert_eq!(args.count, 1);
                assert_eq!(args.hour, 0);
                assert!(!args.pedestrian);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_predict_requires_location() {
        assert!(parse_command(&[
            "predict", "--lon", "8.54", "--date", "2023-06-15", "--hour", "17", "--accident-type", "at2",
        ])
        .is_err());
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        let base = ["predict", "--lat", "47.37", "--lon", "8.54", "--hour", "17"];
        let with = |extra: &[&'static str]| {
            let mut args: Vec<&str> = base.to_vec();
            args.extend_from_slice(extra);
            parse_command(&args)
        };

        assert!(with(&["--date", "15.06.2023", "--accident-type", "at2"]).is_err());
        assert!(with(&["--date", "2023-06-15", "--accident-type", "at77"]).is_err());
        assert!(with(&["--date", "2023-06-15", "--accident-type", "at2", "--verbose"]).is_err());
        assert!(with(&["--date", "2023-06-15", "--accident-type", "at2", "--count", "many"]).is_err());
    }

    #[test]
    fn test_parse_serve_command() {
        assert_eq!(parse_command(&["serve", "--port", "8080"]).unwrap(), Command::Serve { port: 8080 });
        assert!(parse_command(&["serve"]).is_err());
        assert!(parse_command(&["serve", "--port", "http"]).is_err());
        assert!(parse_command(&[]).is_err());
    }
}
