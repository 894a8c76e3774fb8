//! Developer utility to score a hypothetical application against a tracker file.

use std::path::PathBuf;

use huntlog::config;
use huntlog::logging;
use huntlog::ml::features::CandidateApplication;
use huntlog::ml::forest::{Outlook, TrainOptions, train_outcome_forest};
use huntlog::tracker::{TrackerStore, parse_applied_on};
use time::{Date, OffsetDateTime};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let cli = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }

    let config = config::load_or_default().map_err(|err| err.to_string())?;
    let store = open_store(cli.store.as_ref().or(config.data_root.as_ref()))?;
    let user = cli.user.unwrap_or(config.default_user);
    let table = store.load(&user).map_err(|err| err.to_string())?;

    let options = TrainOptions::from(&config.training);
    let (forest, report) =
        train_outcome_forest(table.records(), &options).map_err(|err| err.to_string())?;

    let candidate = CandidateApplication {
        applied_on: cli.applied_on.unwrap_or_else(today),
        employment_type: cli.employment_type,
        sector: cli.sector,
    };
    let prediction = forest.predict_candidate(&candidate);

    println!(
        "model: {} rows, cross-validated accuracy {:.4}",
        report.rows_used, report.cv_accuracy
    );
    let percent = prediction.probability * 100.0;
    match prediction.outlook {
        Outlook::LikelySuccess => {
            println!("You have a {percent:.2}% chance of being hired. Keep it up!");
        }
        Outlook::KeepGoing => {
            println!("You have a {percent:.2}% chance of being hired. Don't give up!");
        }
    }

    Ok(())
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

#[derive(Debug, Clone)]
struct CliOptions {
    user: Option<String>,
    store: Option<PathBuf>,
    applied_on: Option<Date>,
    employment_type: String,
    sector: String,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut user: Option<String> = None;
    let mut store: Option<PathBuf> = None;
    let mut applied_on: Option<Date> = None;
    let mut employment_type: Option<String> = None;
    let mut sector: Option<String> = None;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--user" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--user requires a value".to_string())?;
                user = Some(value.clone());
            }
            "--store" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--store requires a value".to_string())?;
                store = Some(PathBuf::from(value));
            }
            "--applied-on" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--applied-on requires a value".to_string())?;
                applied_on = Some(
                    parse_applied_on(value)
                        .map_err(|_| format!("Invalid --applied-on date (want YYYY-MM-DD): {value}"))?,
                );
            }
            "--employment-type" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--employment-type requires a value".to_string())?;
                employment_type = Some(value.clone());
            }
            "--sector" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--sector requires a value".to_string())?;
                sector = Some(value.clone());
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let employment_type = employment_type.ok_or_else(|| help_text())?;
    let sector = sector.ok_or_else(|| help_text())?;
    Ok(CliOptions {
        user,
        store,
        applied_on,
        employment_type,
        sector,
    })
}

fn open_store(root: Option<&PathBuf>) -> Result<TrackerStore, String> {
    let store = match root {
        Some(root) => TrackerStore::open(root),
        None => TrackerStore::open_default(),
    };
    store.map_err(|err| err.to_string())
}

fn help_text() -> String {
    [
        "huntlog-predict",
        "",
        "Trains the outcome classifier from a tracker file, then scores one hypothetical application.",
        "",
        "Usage:",
        "  huntlog-predict --employment-type <text> --sector <text> [options]",
        "",
        "Options:",
        "  --employment-type <text>  Employment type of the hypothetical application (required).",
        "  --sector <text>           Sector of the hypothetical application (required).",
        "  --applied-on <date>       Application date, YYYY-MM-DD (default: today).",
        "  --user <key>              Tracker to load (default: the configured default user).",
        "  --store <dir>             Directory holding tracker files (default: config data_root or the app dir).",
    ]
    .join("\n")
}
