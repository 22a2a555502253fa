use console::style;
use log::info;
use std::path::Path;

use rexe_guard::{GuardError, HostProcess, ProcessLimits, ResourceKind, UsageArtifact};

/// Exit status of `report` when no artifact exists
pub const EXIT_LIMIT_EXCEEDED: i32 = 2;
/// Exit status of `report` when the artifact cannot be parsed
pub const EXIT_MALFORMED: i32 = 3;

fn format_ceiling(kind: ResourceKind, value: u64) -> String {
    if value == u64::MAX {
        "unlimited".to_string()
    } else {
        format!("{} {}", value, kind.unit())
    }
}

pub fn show_limits() -> i32 {
    info!("Reading current resource limits");
    println!("Current resource limits:\n");

    let host = HostProcess;
    let mut code = 0;
    for kind in ResourceKind::ALL {
        match host.limit(kind) {
            Ok(ceiling) => {
                let pinned = if ceiling.soft == ceiling.hard {
                    style("pinned").green()
                } else {
                    style("raisable").yellow()
                };
                println!(
                    "  {:13} soft={:<20} hard={:<20} {}",
                    kind.name(),
                    format_ceiling(kind, ceiling.soft),
                    format_ceiling(kind, ceiling.hard),
                    pinned
                );
            }
            Err(e) => {
                println!("  {:13} {}", kind.name(), style(e).red());
                code = 1;
            }
        }
    }
    code
}

pub fn show_report(path: &Path) -> i32 {
    info!("Reading usage artifact {}", path.display());

    match UsageArtifact::new(path).read() {
        Ok(Some(record)) => {
            println!(
                "{}={} | {}={}",
                style("cpu_time_ms").dim(),
                style(record.cpu_time_millis).bold(),
                style("peak_memory_kib").dim(),
                style(record.peak_memory_kib).bold(),
            );
            0
        }
        Ok(None) => {
            println!(
                "{} no usage recorded at {}; the run did not reach orderly exit",
                style("limit exceeded:").red().bold(),
                path.display()
            );
            EXIT_LIMIT_EXCEEDED
        }
        Err(GuardError::MalformedArtifact(msg)) => {
            eprintln!("{} {}", style("malformed:").red().bold(), msg);
            EXIT_MALFORMED
        }
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            1
        }
    }
}
