//! Memory latency sweep CLI.
//!
//! Usage:
//!   membench               # write membench.csv
//!   membench out.csv       # write out.csv
//!   membench --help        # show help
//!
//! Sweep parameters come from `MEMBENCH_*` environment variables.

use std::env;
use std::process::ExitCode;

use membench::config::Config;
use membench::error::MembenchError;
use membench::runner::{parse_args, Command};
use membench::tui;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("membench");

    match run(args.get(1..).unwrap_or(&[]), program) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            if matches!(err, MembenchError::Usage(_)) {
                tui::print_help(program);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String], program: &str) -> Result<(), MembenchError> {
    let output = match parse_args(args)? {
        Command::Help => {
            tui::print_help(program);
            return Ok(());
        }
        Command::Run(output) => output,
    };

    let mut config = Config::from_env()?;
    if let Some(path) = output {
        config.output = path;
    }

    tui::print_header();
    let summary = membench::run(&config)?;
    tui::print_summary(&summary, &config.output);
    Ok(())
}
