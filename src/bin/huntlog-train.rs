//! Developer utility to train and evaluate the outcome forest from a tracker file.

use std::path::PathBuf;

use huntlog::config;
use huntlog::logging;
use huntlog::ml::forest::{TrainOptions, train_outcome_forest};
use huntlog::ml::metrics::precision_recall_by_class;
use huntlog::tracker::TrackerStore;

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

    let mut options = TrainOptions::from(&config.training);
    if let Some(trees) = cli.trees {
        options.trees = trees;
    }
    if let Some(seed) = cli.seed {
        options.seed = seed;
    }

    let (_forest, report) =
        train_outcome_forest(table.records(), &options).map_err(|err| err.to_string())?;

    println!(
        "user {user}: trained on {} rows ({} dropped for bad dates)",
        report.rows_used, report.rows_dropped
    );
    println!("cross-validated accuracy: {:.4}", report.cv_accuracy);
    println!("holdout accuracy: {:.4}", report.holdout_accuracy);
    for (idx, stats) in precision_recall_by_class(&report.confusion)
        .iter()
        .enumerate()
    {
        println!(
            "class {:>2} {:<12}  precision={:.3}  recall={:.3}  support={}",
            idx, report.classes[idx], stats.precision, stats.recall, stats.support
        );
    }
    println!("holdout confusion matrix (rows=true, cols=pred):");
    for truth in 0..report.confusion.n_classes {
        let mut row = String::new();
        for pred in 0..report.confusion.n_classes {
            row.push_str(&format!("{:6}", report.confusion.get(truth, pred)));
        }
        println!("{row}");
    }

    Ok(())
}

#[derive(Debug, Clone)]
struct CliOptions {
    user: Option<String>,
    store: Option<PathBuf>,
    trees: Option<usize>,
    seed: Option<u64>,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut user: Option<String> = None;
    let mut store: Option<PathBuf> = None;
    let mut trees: Option<usize> = None;
    let mut seed: Option<u64> = None;

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
            "--trees" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--trees requires a value".to_string())?;
                trees = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| format!("Invalid --trees value: {value}"))?,
                );
            }
            "--seed" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--seed requires a value".to_string())?;
                seed = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("Invalid --seed value: {value}"))?,
                );
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    Ok(CliOptions {
        user,
        store,
        trees,
        seed,
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
        "huntlog-train",
        "",
        "Trains the bagged-tree outcome classifier from a tracker file and prints its evaluation.",
        "",
        "Usage:",
        "  huntlog-train [--user <key>] [--store <dir>] [options]",
        "",
        "Options:",
        "  --user <key>   Tracker to load (default: the configured default user).",
        "  --store <dir>  Directory holding tracker files (default: config data_root or the app dir).",
        "  --trees <n>    Number of bagged trees (default: from config, 100).",
        "  --seed <n>     Training seed (default: from config, 42).",
    ]
    .join("\n")
}
