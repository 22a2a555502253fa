//! stderr logging for rexe-ctl
//!
//! Log lines share stderr with the run summary, so each one carries the time
//! since startup and the module that emitted it.

use console::{StyledObject, style};
use env_logger::{Builder, Env, Target};
use log::Level;
use std::io::Write;
use std::time::Instant;

fn default_filter(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "warn" }
}

/// Five columns wide so messages line up
fn level_tag(level: Level) -> StyledObject<&'static str> {
    match level {
        Level::Error => style("error").red().bold(),
        Level::Warn => style(" warn").yellow().bold(),
        Level::Info => style(" info").green(),
        Level::Debug => style("debug").cyan(),
        Level::Trace => style("trace").dim(),
    }
}

/// `rexe_rlimit::enforcer` -> `rlimit::enforcer`
fn short_target(target: &str) -> &str {
    target.strip_prefix("rexe_").unwrap_or(target)
}

/// Initialize logger; RUST_LOG wins over the verbose flag
pub fn init_logger(verbose: bool) {
    let started = Instant::now();

    Builder::from_env(Env::default().filter_or("RUST_LOG", default_filter(verbose)))
        .target(Target::Stderr)
        .format(move |buf, record| {
            let elapsed = started.elapsed();
            let stamp = format!("+{}.{:03}s", elapsed.as_secs(), elapsed.subsec_millis());
            writeln!(
                buf,
                "{} {} {} {}",
                style(stamp).dim(),
                level_tag(record.level()),
                style(short_target(record.target())).dim(),
                record.args()
            )
        })
        .init();
}
