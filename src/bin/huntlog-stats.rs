//! Developer utility to print or export the chart summaries for a tracker file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use huntlog::config;
use huntlog::logging;
use huntlog::tracker::{TrackerStore, summarize};

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
    let summary = summarize(&table);

    if let Some(path) = &cli.out {
        let data = serde_json::to_vec_pretty(&summary)
            .map_err(|err| format!("Serialize summary failed: {err}"))?;
        std::fs::write(path, data).map_err(|err| format!("Write summary failed: {err}"))?;
        println!("wrote {}", path.display());
        return Ok(());
    }
    if cli.json {
        let text = serde_json::to_string_pretty(&summary)
            .map_err(|err| format!("Serialize summary failed: {err}"))?;
        println!("{text}");
        return Ok(());
    }

    println!("user: {user}");
    println!(
        "rows: {} ({} dated, {} undated)",
        summary.total, summary.dated, summary.undated
    );
    print_counts("status", &summary.status_counts);
    print_counts("employment type", &summary.employment_type_counts);
    print_counts("sector", &summary.sector_counts);
    print_counts("source", &summary.source_counts);
    println!("applications by day:");
    for daily in &summary.applications_by_day {
        println!("  {}  {}", daily.date, daily.count);
    }

    Ok(())
}

fn print_counts(title: &str, counts: &BTreeMap<String, usize>) {
    println!("{title}:");
    for (key, count) in counts {
        println!("  {key:<24} {count}");
    }
}

#[derive(Debug, Clone)]
struct CliOptions {
    user: Option<String>,
    store: Option<PathBuf>,
    json: bool,
    out: Option<PathBuf>,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut user: Option<String> = None;
    let mut store: Option<PathBuf> = None;
    let mut json = false;
    let mut out: Option<PathBuf> = None;

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
            "--json" => json = true,
            "--out" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--out requires a value".to_string())?;
                out = Some(PathBuf::from(value));
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    Ok(CliOptions {
        user,
        store,
        json,
        out,
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
        "huntlog-stats",
        "",
        "Prints the chart summaries for a tracker file, or exports them as JSON.",
        "",
        "Usage:",
        "  huntlog-stats [--user <key>] [--store <dir>] [--json | --out <file>]",
        "",
        "Options:",
        "  --user <key>   Tracker to load (default: the configured default user).",
        "  --store <dir>  Directory holding tracker files (default: config data_root or the app dir).",
        "  --json         Print the summary as pretty JSON instead of text.",
        "  --out <file>   Write the JSON summary to a file.",
    ]
    .join("\n")
}
