//! rexe-ctl - run a program under pinned memory and CPU-time limits

mod cli;
mod commands;
mod logging;
mod runner;

use clap::Parser;
use cli::{Cli, Commands};
use commands::{show_limits, show_report};
use runner::{RunConfig, run_guarded_program};

fn main() {
    let cli = Cli::parse();

    logging::init_logger(cli.verbose);

    let code = match cli.command {
        Commands::Run {
            memory,
            time,
            output,
            config,
            program,
            args,
        } => run_guarded_program(RunConfig {
            memory,
            time,
            output,
            config,
            program,
            args,
        }),
        Commands::Limits => show_limits(),
        Commands::Report { output } => show_report(&output),
    };

    std::process::exit(code);
}
