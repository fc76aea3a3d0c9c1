//! CLI argument parsing for the trace oracle.
//!
//! The CLI only collects inputs; thresholds and detection rules live in the
//! core modules.
use crate::detect::TriggerKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "toracle",
    version,
    about = "Behavioral oracle for recorded mobile-app exploration traces",
    after_help = "Commands:\n  check --trace-root <dir> --app <app> --run <id>   Judge every detected trigger\n  detect --trace-root <dir> --app <app> --run <id>  List triggers and affected screens\n  config                                            Print a config file stub\n\nExamples:\n  toracle check --trace-root /data/traces --app com.example.mail --run 12\n  toracle check --trace-root /data/traces --app com.example.mail --run 12 --kind theme_toggle --json\n  toracle detect --trace-root /data/traces --app com.example.mail --run 12",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Check(CheckArgs),
    Detect(DetectArgs),
    /// Print a config stub with every default spelled out
    Config,
}

/// Which recorded run to read.
#[derive(Args, Debug, Clone)]
pub struct TraceArgs {
    /// Directory holding one sub-directory per recorded run
    #[arg(long, value_name = "DIR")]
    pub trace_root: PathBuf,

    /// Application identifier the trace belongs to
    #[arg(long, value_name = "APP")]
    pub app: String,

    /// Run identifier (`<trace-root>/<run>/Execution-<run>.json`)
    #[arg(long, value_name = "RUN")]
    pub run: String,

    /// Restrict to these trigger kinds (repeatable; default from config)
    #[arg(long = "kind", value_name = "KIND", value_enum)]
    pub kinds: Vec<TriggerKind>,

    /// Config file (default: <trace-root>/<run>/oracle.json, then user config)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log progress at debug level on stderr
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Detect triggers and judge the screens they affect")]
pub struct CheckArgs {
    #[command(flatten)]
    pub trace: TraceArgs,

    /// OCR command line; `{image}` is replaced with the capture path
    #[arg(long, value_name = "CMD")]
    pub ocr: Option<String>,

    /// Language identification command (text on stdin, JSON guesses on stdout)
    #[arg(long, value_name = "CMD", conflicts_with = "lang_url")]
    pub lang_id: Option<String>,

    /// LibreTranslate-compatible language detection endpoint
    #[arg(long, value_name = "URL")]
    pub lang_url: Option<String>,

    /// Condense diagnostic lists to their first entries
    #[arg(long)]
    pub brief: bool,

    /// Emit the JSON report on stdout
    #[arg(long)]
    pub json: bool,

    /// Also write the JSON report to this path
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "List triggers, affected screens and skipped steps without judging them")]
pub struct DetectArgs {
    #[command(flatten)]
    pub trace: TraceArgs,

    /// OCR command used for steps without a UI tree dump
    #[arg(long, value_name = "CMD")]
    pub ocr: Option<String>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}
