use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;

mod assets;
mod backends;
mod cli;
mod color;
mod config;
mod correlate;
mod detect;
mod error;
mod metric;
mod pipeline;
mod report;
mod templates;
mod trace;
mod uitree;
mod verdict;

use crate::assets::TraceAssets;
use crate::backends::image::ImageBackend;
use crate::backends::language::{CommandLanguageId, HttpLanguageId, UnconfiguredLanguageId};
use crate::backends::ocr::CommandOcr;
use crate::backends::{Backends, LanguageIdentification, LanguageNames};
use crate::cli::{CheckArgs, Command, DetectArgs, RootArgs, TraceArgs};
use crate::config::{OracleConfig, LANG_COMMAND_ENV};
use crate::detect::TriggerKind;
use crate::metric::MetricContext;
use crate::pipeline::{PipelineOptions, RunScreens};
use crate::trace::Trace;

fn main() -> Result<()> {
    let args = RootArgs::parse();

    match args.command {
        Command::Check(args) => cmd_check(args),
        Command::Detect(args) => cmd_detect(args),
        Command::Config => cmd_config(),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn validate_identifier(label: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("--{label} must not be empty"));
    }
    if value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(anyhow!("--{label} {value:?} must not contain path separators"));
    }
    Ok(())
}

/// Everything a command needs once the inputs are known to be usable.
struct RunInputs {
    assets: TraceAssets,
    config: OracleConfig,
    trace: Trace,
    kinds: Vec<TriggerKind>,
}

fn load_run(args: &TraceArgs) -> Result<RunInputs> {
    if !args.trace_root.is_dir() {
        return Err(anyhow!(
            "trace root {} is not a directory",
            args.trace_root.display()
        ));
    }
    validate_identifier("app", &args.app)?;
    validate_identifier("run", &args.run)?;

    let assets = TraceAssets::new(&args.trace_root, &args.run);
    let execution = assets.execution_path();
    if !execution.is_file() {
        return Err(anyhow!(
            "execution document {} not found",
            execution.display()
        ));
    }

    let (config, source) = config::resolve_config(args.config.as_deref(), &assets)?;
    match &source {
        Some(path) => tracing::info!(config = %path.display(), "loaded config"),
        None => tracing::debug!("no config file, using defaults"),
    }

    let trace = trace::load_trace(&execution, &args.run)
        .with_context(|| format!("load trace {}", execution.display()))?;
    tracing::info!(run = %args.run, steps = trace.steps.len(), "trace loaded");

    let mut kinds = if args.kinds.is_empty() {
        config.kinds.clone()
    } else {
        args.kinds.clone()
    };
    kinds.sort();
    kinds.dedup();

    Ok(RunInputs {
        assets,
        config,
        trace,
        kinds,
    })
}

fn language_names(config: &OracleConfig) -> Result<LanguageNames> {
    match &config.language.names_path {
        Some(path) => LanguageNames::load(path),
        None => LanguageNames::bundled(),
    }
}

/// Flags beat the config file, which beats the environment.
fn language_backend(
    args: &CheckArgs,
    config: &OracleConfig,
) -> Result<Box<dyn LanguageIdentification>> {
    if let Some(command) = &args.lang_id {
        return Ok(Box::new(CommandLanguageId::new(command)?));
    }
    if let Some(url) = &args.lang_url {
        return Ok(Box::new(HttpLanguageId::new(url)));
    }
    if let Some(command) = &config.language.command {
        return Ok(Box::new(CommandLanguageId::new(command)?));
    }
    if let Some(url) = &config.language.url {
        return Ok(Box::new(HttpLanguageId::new(url)));
    }
    match config::resolve_command(None, None, LANG_COMMAND_ENV) {
        Some(command) => Ok(Box::new(
            CommandLanguageId::new(&command).with_context(|| format!("${LANG_COMMAND_ENV}"))?,
        )),
        None => Ok(Box::new(UnconfiguredLanguageId)),
    }
}

fn cmd_check(args: CheckArgs) -> Result<()> {
    init_logging(args.trace.verbose);
    let run = load_run(&args.trace)?;

    let image = ImageBackend::new(
        run.config.image.settings(),
        run.config.keyboard.command.as_deref(),
    )?;
    let ocr = CommandOcr::new(&config::ocr_command(args.ocr.as_deref(), &run.config))
        .context("ocr command")?;
    let language = language_backend(&args, &run.config).context("language identification")?;
    let names = language_names(&run.config)?;

    let screens = RunScreens::new(&run.assets, &ocr);
    let ctx = MetricContext {
        assets: &run.assets,
        backends: Backends {
            image: &image,
            ocr: &ocr,
            language: language.as_ref(),
            names: &names,
        },
    };
    let options = PipelineOptions {
        kinds: run.kinds,
        language_scope: run.config.language_scope,
        detailed: run.config.detailed && !args.brief,
    };
    let verdicts = pipeline::evaluate(&run.trace, &screens, &ctx, &options);

    let report = report::build_report(
        &args.trace.app,
        &run.trace.source,
        &args.trace.trace_root,
        &verdicts,
    )?;
    if let Some(out) = &args.out {
        report::write_json(out, &report)?;
        tracing::info!(path = %out.display(), "report written");
    }
    if args.json {
        let text = serde_json::to_string_pretty(&report).context("serialize report")?;
        println!("{text}");
    } else {
        print!("{}", report::render_text(&args.trace.app, &verdicts));
        if let Some(out) = &args.out {
            println!("\nreport: {}", display_out(out));
        }
    }
    Ok(())
}

fn display_out(path: &Path) -> String {
    let cwd = std::env::current_dir().ok();
    report::display_path(path, cwd.as_deref())
}

fn cmd_detect(args: DetectArgs) -> Result<()> {
    init_logging(args.trace.verbose);
    let run = load_run(&args.trace)?;

    let ocr = CommandOcr::new(&config::ocr_command(args.ocr.as_deref(), &run.config))
        .context("ocr command")?;
    let screens = RunScreens::new(&run.assets, &ocr);
    let options = PipelineOptions {
        kinds: run.kinds,
        language_scope: run.config.language_scope,
        detailed: run.config.detailed,
    };
    let detection = pipeline::detect(&run.trace, &screens, &options);

    if args.json {
        let text = serde_json::to_string_pretty(&detection).context("serialize detection")?;
        println!("{text}");
    } else {
        print!("{}", report::render_detection_text(&detection));
    }
    Ok(())
}

fn cmd_config() -> Result<()> {
    init_logging(false);
    println!("{}", config::config_stub()?);
    Ok(())
}
