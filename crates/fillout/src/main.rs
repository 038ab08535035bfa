mod config;
mod interviews;
mod record;
mod ui;

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;

use fillout_core::DEFAULT_MAX_STEPS;
use fillout_logging::{init_tracing, LogFormat, Logger};

use config::FillConfig;
use interviews::{
    AnswerSourceSetting, RunSettings, DEFAULT_CONCURRENCY, DEFAULT_REPLAY_FILE, DEFAULT_STAGGER,
};
use record::{RecordSettings, DEFAULT_PORT};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Exit status for configuration errors
const CONFIG_ERROR_EXIT: i32 = 2;
/// Debug output for fillout itself, warnings from the HTTP stack
const DEBUG_DIRECTIVES: &str =
    "warn,fillout=debug,fillout_core=debug,fillout_transport=debug,fillout_questions=debug,tower_http=debug";

#[derive(Parser, Debug)]
#[command(
    name = "fillout",
    about = "Fill out online interviews automatically, or record and replay them",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Timeout on requests [default: 30s]
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    request_timeout: Option<Duration>,

    /// Enable verbose output for debugging purposes
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format [default: pretty]
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatChoice>,

    /// Also write every event as a JSON line to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Write diagnostics to this file instead of stderr
    #[arg(long, global = true)]
    trace_file: Option<PathBuf>,

    /// Output the final result as JSON
    #[arg(long, global = true)]
    json_output: bool,

    /// Configuration file [default: ./fillout.toml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Complete interviews based on a link (default command)
    Complete(CompleteArgs),
    /// Record an interview for later playback
    Record(RecordArgs),
    /// Replay interviews based on a replay file
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
struct CompleteArgs {
    /// The number of completes to generate
    count: usize,

    /// The url to the interview to complete
    url: String,

    #[command(flatten)]
    run: RunArgs,

    /// printf-style format for a respondent key appended to the url, e.g. resp%04d
    #[arg(long)]
    respondent_key: Option<String>,
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// The number of replays to generate
    count: usize,

    /// The url to the interview to complete
    url: String,

    /// Replay file to determine responses [default: interview.replay]
    replay_file: Option<PathBuf>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Maximum number of concurrent interviews [default: 10]
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Wait time between answering questions [default: 0]
    #[arg(long, value_parser = humantime::parse_duration)]
    wait_time: Option<Duration>,

    /// Delay between worker starts [default: the wait time, or 50ms]
    #[arg(long, value_parser = humantime::parse_duration)]
    stagger: Option<Duration>,

    /// Give up on an interview after this many answers [default: 500]
    #[arg(long)]
    max_steps: Option<usize>,
}

#[derive(Args, Debug)]
struct RecordArgs {
    /// The number of completes to record
    count: usize,

    /// The url to the interview to complete
    url: String,

    /// Output file to write the recording to [default: interview.replay]
    #[arg(short = 'r', long)]
    replay_file: Option<PathBuf>,

    /// Local port for the recording proxy [default: 8080]
    #[arg(long)]
    port: Option<u16>,

    /// Do not open the proxy in a browser
    #[arg(long)]
    no_browser: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

const SUBCOMMANDS: [&str; 4] = ["complete", "record", "replay", "help"];
/// Flags whose value is the next argument
const VALUE_FLAGS: [&str; 12] = [
    "--request-timeout",
    "--log-format",
    "--log-file",
    "--trace-file",
    "--config",
    "-c",
    "--concurrency",
    "--wait-time",
    "--stagger",
    "--max-steps",
    "--respondent-key",
    "--port",
];

/// Insert `complete` when the first positional argument is not a subcommand,
/// so `fillout 10 <url>` means `fillout complete 10 <url>`.
fn with_default_command(args: Vec<OsString>) -> Vec<OsString> {
    let mut expects_value = false;

    for arg in args.iter().skip(1) {
        let text = arg.to_string_lossy();
        if expects_value {
            expects_value = false;
            continue;
        }
        if text.starts_with('-') {
            expects_value = VALUE_FLAGS.contains(&text.as_ref());
            continue;
        }
        if SUBCOMMANDS.contains(&text.as_ref()) {
            return args;
        }

        let mut completed = args;
        completed.insert(1, OsString::from("complete"));
        return completed;
    }

    args
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse_from(with_default_command(std::env::args_os().collect()));

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".bright_red().bold(), e);
            std::process::exit(CONFIG_ERROR_EXIT);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let file = FillConfig::load(cli.config.as_deref(), &working_dir)?.unwrap_or_default();

    let verbose = cli.verbose || file.verbose.unwrap_or(false);
    let log_format = match (cli.log_format, file.log_format.as_deref()) {
        (Some(choice), _) => choice.into(),
        (None, Some(name)) => name
            .parse::<LogFormat>()
            .map_err(anyhow::Error::msg)
            .context("Invalid log_format in config file")?,
        (None, None) => LogFormat::Pretty,
    };

    let trace_file = cli.trace_file.clone().or_else(|| file.trace_file.clone());
    let level = if verbose || trace_file.is_some() {
        DEBUG_DIRECTIVES
    } else {
        "error"
    };
    let _guard = init_tracing(level, log_format, trace_file.as_deref());

    let logger = match cli.log_file.as_ref().or(file.log_file.as_ref()) {
        Some(path) => Logger::with_file(log_format, path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(log_format),
    };
    let logger = Arc::new(logger.verbose(verbose));

    let request_timeout = cli
        .request_timeout
        .or(file.request_timeout)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
    let default_replay_file = file
        .replay_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REPLAY_FILE));

    match cli.command {
        Command::Complete(args) => {
            let mut settings =
                run_settings(args.count, args.url, &args.run, &file, request_timeout, verbose);
            settings.respondent_key = args.respondent_key.or(file.run.respondent_key.clone());

            let report =
                interviews::run_interviews(settings, AnswerSourceSetting::Synthesize, logger)
                    .await?;
            finish_run(&report, cli.json_output)
        }
        Command::Replay(args) => {
            let settings =
                run_settings(args.count, args.url, &args.run, &file, request_timeout, verbose);
            let replay_file = args.replay_file.unwrap_or(default_replay_file);

            let report = interviews::run_interviews(
                settings,
                AnswerSourceSetting::ReplayFile(replay_file),
                logger,
            )
            .await?;
            finish_run(&report, cli.json_output)
        }
        Command::Record(args) => {
            let settings = RecordSettings {
                target: args.count,
                entry_url: args.url,
                replay_file: args.replay_file.unwrap_or(default_replay_file),
                port: args.port.or(file.record.port).unwrap_or(DEFAULT_PORT),
                open_browser: !args.no_browser && file.record.open_browser.unwrap_or(true),
                request_timeout,
            };

            let summary = record::handle_record_command(settings, logger).await?;
            if cli.json_output {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Ok(summary.exit_code())
        }
    }
}

fn run_settings(
    count: usize,
    url: String,
    args: &RunArgs,
    file: &FillConfig,
    request_timeout: Duration,
    verbose: bool,
) -> RunSettings {
    let wait_time = args
        .wait_time
        .or(file.run.wait_time)
        .unwrap_or(Duration::ZERO);
    let stagger = args.stagger.or(file.run.stagger).unwrap_or(if wait_time.is_zero() {
        DEFAULT_STAGGER
    } else {
        wait_time
    });

    RunSettings {
        target: count,
        url,
        concurrency: args
            .concurrency
            .or(file.run.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY),
        wait_time,
        stagger,
        max_steps: args
            .max_steps
            .or(file.run.max_steps)
            .unwrap_or(DEFAULT_MAX_STEPS),
        respondent_key: None,
        request_timeout,
        verbose,
    }
}

fn finish_run(report: &fillout_core::RunReport, json_output: bool) -> Result<i32> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        ui::print_final_summary(report);
    }
    Ok(report.exit_code())
}
