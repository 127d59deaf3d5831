mod engine;
mod partition;
mod util;

use anyhow::{Context, Result};
use clap::Parser;
use engine::FailurePolicy;
use pairwise_dedup::datasets::ProviderKind;
use pairwise_dedup::error::DedupError;
use pairwise_dedup::evaluation::Evaluation;
use pairwise_dedup::report::{make_report_payload, Status};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, subscriber::set_global_default, Level};
use tracing_subscriber::EnvFilter;
use util::{run_evaluation, RunConfig};

#[derive(Parser, Debug)]
#[command(
    name = "pairwise-dedup",
    version,
    about = "Brute-force pairwise deduplication with gold-standard evaluation"
)]
struct Cli {
    /// Legacy settings: n=<workers>, dataset=<path>, goldStandard=<path>
    #[arg(value_name = "KEY=VALUE")]
    settings: Vec<String>,

    /// Dataset similarity provider
    #[arg(long, default_value = "cora")]
    provider: ProviderKind,

    /// What to do when the provider fails on a pair
    #[arg(long, default_value = "lenient")]
    failure_policy: FailurePolicy,

    /// Febrl identifier declaration (JSON)
    #[arg(long)]
    identifiers: Option<String>,

    /// Write the detected pairs to this TSV file
    #[arg(long, value_name = "TSV")]
    pairs_out: Option<PathBuf>,

    /// Print the report payload as JSON
    #[arg(long)]
    json: bool,

    /// Size of the worker thread pool (default: hardware parallelism)
    #[arg(long)]
    threads: Option<usize>,

    /// Increase verbosity (-v, -vv, -vvv). Default WARN.
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    quiet: u8,
}

/// Values of the `key=value` settings.
#[derive(Debug, Default, PartialEq)]
struct Settings {
    workers: Option<usize>,
    dataset: Option<PathBuf>,
    gold_standard: Option<PathBuf>,
}

fn parse_settings(settings: &[String]) -> Result<Settings, DedupError> {
    let mut parsed = Settings::default();
    for setting in settings {
        let (key, value) = setting.split_once('=').ok_or_else(|| {
            DedupError::config(format!("expected KEY=VALUE, got '{}'", setting))
        })?;
        match key {
            "n" => {
                let workers: usize = value.parse().map_err(|_| {
                    DedupError::config(format!("n must be a positive integer, got '{}'", value))
                })?;
                if workers == 0 {
                    return Err(DedupError::config("n must be a positive integer, got '0'"));
                }
                parsed.workers = Some(workers);
            }
            "dataset" => parsed.dataset = Some(PathBuf::from(value)),
            "goldStandard" => parsed.gold_standard = Some(PathBuf::from(value)),
            other => {
                return Err(DedupError::config(format!(
                    "unknown setting '{}', expected n, dataset or goldStandard",
                    other
                )))
            }
        }
    }
    Ok(parsed)
}

fn init_tracing(verbosity: i16) {
    let level = match verbosity {
        i16::MIN..=0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let env_filter = EnvFilter::from_default_env().add_directive(level.into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();
    let _ = set_global_default(subscriber);
}

fn run_config(cli: &Cli) -> Result<RunConfig, DedupError> {
    let settings = parse_settings(&cli.settings)?;
    let mut config = RunConfig::for_provider(cli.provider);
    if let Some(workers) = settings.workers {
        config.workers = workers;
    }
    if let Some(dataset) = settings.dataset {
        config.dataset = dataset;
    }
    if let Some(gold_standard) = settings.gold_standard {
        config.gold_standard = gold_standard;
    }
    config.identifiers = cli.identifiers.clone();
    config.policy = cli.failure_policy;
    config.threads = cli.threads;
    config.pairs_out = cli.pairs_out.clone();
    Ok(config)
}

fn run(cli: &Cli) -> Result<Evaluation> {
    let config = run_config(cli)?;
    info!(
        "Running {} with {} workers on {}",
        config.provider,
        config.workers,
        config.dataset.display()
    );
    run_evaluation(&config, None).with_context(|| {
        format!(
            "evaluating {} against {}",
            config.dataset.display(),
            config.gold_standard.display()
        )
    })
}

/// Exit status of a failed run, taken from the first library error in the chain.
fn failure_status(err: &anyhow::Error) -> Status {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<DedupError>())
        .map(Status::from_error)
        .unwrap_or(Status::InternalError)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(i16::from(cli.verbose) - i16::from(cli.quiet));

    let result = run(&cli);
    let status = match &result {
        Ok(_) => Status::Ok,
        Err(err) => failure_status(err),
    };

    if cli.json {
        let payload = make_report_payload(
            result
                .as_ref()
                .map(Evaluation::clone)
                .map_err(|err| DedupError::parse(format!("{:#}", err))),
        );
        match payload {
            Ok(mut value) => {
                value["status"] = status.code().into();
                println!("{}", value);
            }
            Err(err) => {
                eprintln!("error: {}", err);
                return ExitCode::from(Status::InternalError.code());
            }
        }
    } else {
        match &result {
            Ok(evaluation) => println!("{}", evaluation),
            Err(err) => eprintln!("error: {:#}", err),
        }
    }
    ExitCode::from(status.code())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn legacy_settings_are_parsed() {
        let settings =
            parse_settings(&strings(&["n=4", "dataset=/tmp/a.tsv", "goldStandard=/tmp/g.tsv"]))
                .unwrap();
        assert_eq!(
            settings,
            Settings {
                workers: Some(4),
                dataset: Some(PathBuf::from("/tmp/a.tsv")),
                gold_standard: Some(PathBuf::from("/tmp/g.tsv")),
            }
        );
        assert_eq!(parse_settings(&[]).unwrap(), Settings::default());
    }

    #[test]
    fn bad_settings_are_config_errors() {
        for bad in ["n=0", "n=many", "threads=4", "dataset"] {
            assert!(
                matches!(parse_settings(&strings(&[bad])), Err(DedupError::Config(_))),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn cli_flags_reach_the_run_config() {
        let cli = Cli::parse_from([
            "pairwise-dedup",
            "n=3",
            "--provider",
            "febrl",
            "--failure-policy",
            "strict",
            "--threads",
            "2",
            "-vv",
        ]);
        assert_eq!(cli.verbose, 2);
        let config = run_config(&cli).unwrap();
        assert_eq!(config.provider, ProviderKind::Febrl);
        assert_eq!(config.workers, 3);
        assert_eq!(config.policy, FailurePolicy::Strict);
        assert_eq!(config.threads, Some(2));
        assert!(config.dataset.ends_with("febrl/febrl.tsv"));
    }

    #[test]
    fn unknown_provider_is_rejected_by_the_parser() {
        assert!(Cli::try_parse_from(["pairwise-dedup", "--provider", "census"]).is_err());
    }

    #[test]
    fn exit_status_comes_from_the_root_error() {
        let err = anyhow::Error::new(DedupError::config("bad")).context("running");
        assert_eq!(failure_status(&err), Status::ConfigError);
        let err = anyhow::anyhow!("something else");
        assert_eq!(failure_status(&err), Status::InternalError);
    }
}
