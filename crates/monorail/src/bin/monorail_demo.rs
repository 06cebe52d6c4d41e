//! # Monorail Demo
//!
//! Enters the region, runs the producer/consumer pipeline as the main
//! logical thread, joins it and exits with its result.
//!
//! ```text
//! monorail_demo [--strategy lock|transactional|elision] [--config FILE]
//!               [--producers N] [--consumers N] [--messages N] [--capacity N]
//! ```
//!
//! Exit codes: `0` consistent run, `1` inconsistent run, `2` usage or
//! runtime error.

use std::process::ExitCode;

use monorail::{run_pipeline, PipelineConfig, Runtime, RuntimeConfig, StrategyKind};

const USAGE: &str = "usage: monorail_demo [--strategy lock|transactional|elision] [--config FILE] \
                     [--producers N] [--consumers N] [--messages N] [--capacity N]";

/// Runtime settings; everything else is left for the main routine.
fn runtime_config(args: &mut Vec<String>) -> Result<RuntimeConfig, String> {
    let mut config = match take_option(args, "--config")? {
        Some(path) => RuntimeConfig::from_toml_file(path).map_err(|e| e.to_string())?,
        None => RuntimeConfig::default(),
    };
    if let Some(name) = take_option(args, "--strategy")? {
        config.strategy = name.parse::<StrategyKind>().map_err(|e| e.to_string())?;
    }
    Ok(config)
}

/// Removes `--flag VALUE` from `args`.
fn take_option(args: &mut Vec<String>, flag: &str) -> Result<Option<String>, String> {
    let Some(at) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    if at + 1 >= args.len() {
        return Err(format!("{flag} needs a value"));
    }
    let value = args.remove(at + 1);
    args.remove(at);
    Ok(Some(value))
}

fn parse_count<T: std::str::FromStr>(args: &mut Vec<String>, flag: &str, default: T) -> Result<T, String> {
    match take_option(args, flag)? {
        Some(raw) => raw
            .parse()
            .map_err(|_| format!("{flag} expects a number, got `{raw}`")),
        None => Ok(default),
    }
}

/// Pipeline settings from what is left of the command line.
fn pipeline_config(args: &mut Vec<String>) -> Result<PipelineConfig, String> {
    let defaults = PipelineConfig::default();
    let config = PipelineConfig {
        producers: parse_count(args, "--producers", defaults.producers)?,
        consumers: parse_count(args, "--consumers", defaults.consumers)?,
        messages_per_producer: parse_count(args, "--messages", defaults.messages_per_producer)?,
        channel_capacity: parse_count(args, "--capacity", defaults.channel_capacity)?,
    };
    if let Some(unknown) = args.first() {
        return Err(format!("unexpected argument `{unknown}`"));
    }
    if config.consumers == 0 || config.channel_capacity == 0 {
        return Err(String::from("--consumers and --capacity must be positive"));
    }
    Ok(config)
}

/// The main routine, run as the first logical thread.
fn demo_main(runtime: &Runtime, mut args: Vec<String>) -> u8 {
    let config = match pipeline_config(&mut args) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{message}\n{USAGE}");
            return 2;
        }
    };

    match run_pipeline(runtime, &config) {
        Ok(report) => {
            println!(
                "strategy={} sent={} drained={} stolen={} consistent={}",
                runtime.strategy(),
                report.sent,
                report.drained,
                report.stats.stolen,
                report.is_consistent()
            );
            u8::from(!report.is_consistent())
        }
        Err(e) => {
            eprintln!("pipeline failed: {e}");
            2
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let config = match runtime_config(&mut args) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{message}\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let runtime = match Runtime::new(config) {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let main_runtime = runtime.clone();
    match runtime.run(move || demo_main(&main_runtime, args)) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(2)
        }
    }
}
