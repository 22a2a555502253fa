use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rexe-ctl")]
#[command(version, long_about = None)]
#[command(about = "Run programs under pinned memory and CPU-time limits")]
#[command(after_help = "EXAMPLES:
    # 256 MiB memory, 5 CPU-seconds, usage written to ./rusage.txt
    rexe-ctl run --memory 256M --time 5 -- ./solution < input.txt

    # Limits from a JSON file, usage written elsewhere
    rexe-ctl run --config guard.json --output /tmp/usage.txt -- python3 main.py

    # Inspect the current process limits and a finished run
    rexe-ctl limits
    rexe-ctl report --output /tmp/usage.txt

EXIT STATUS (run):
    program's own code   program exited normally
    128 + N              program killed by signal N (no usage recorded)
    125                  limits could not be applied or verified
    127                  program could not be started
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a program with pinned limits and record its usage
    Run {
        /// Memory limit (256, 256M, 1G); a bare number is MiB
        #[arg(short, long, value_name = "SIZE")]
        memory: Option<String>,

        /// CPU time limit in seconds
        #[arg(short, long, value_name = "SECONDS")]
        time: Option<u64>,

        /// Usage artifact path [default: rusage.txt]
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// JSON guard config (memory_limit_mib, time_limit_sec, usage_path)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Program to run
        program: String,

        /// Program arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Show the current soft/hard limits of this process
    Limits,

    /// Read a usage artifact left by a previous run
    Report {
        /// Usage artifact path
        #[arg(short, long, value_name = "PATH", default_value = "rusage.txt")]
        output: PathBuf,
    },
}
