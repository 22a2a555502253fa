//! Enforcement and reporting against the real process limit table
//!
//! Limits cannot be raised back once pinned, so every test that applies them
//! forks a child, arms the limits there, and reports through its exit status.
//! They do NOT require root.

use std::sync::Mutex;
use std::time::Duration;

use rexe_core::GuardConfig;
use rexe_rlimit::{
    HostProcess, LimitEnforcer, LimitPlan, ProcessUsage, ResourceKind, UsageArtifact,
    UsageRecord, UsageReporter, UsageScope, enforce_or_abort,
};

static FORK_LOCK: Mutex<()> = Mutex::new(());

/// Run `child` in a forked process and return the raw waitpid status.
///
/// Forks one at a time: a child burning CPU or memory next to another
/// test's child skews both.
fn fork_and_wait(child: impl FnOnce() -> i32) -> i32 {
    let _lock = FORK_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
    unsafe {
        let pid = libc::fork();
        assert!(pid >= 0, "fork failed: {}", std::io::Error::last_os_error());

        if pid == 0 {
            let code = child();
            libc::_exit(code);
        }

        let mut status: i32 = 0;
        libc::waitpid(pid, &mut status, 0);
        status
    }
}

fn assert_exited_zero(status: i32, what: &str) {
    assert!(libc::WIFEXITED(status), "{}: child did not exit normally", what);
    assert_eq!(libc::WEXITSTATUS(status), 0, "{}", what);
}

fn burn_cpu(target: Duration) {
    let mut acc = 0u64;
    loop {
        for i in 0..100_000u64 {
            acc = acc.wrapping_mul(31).wrapping_add(i);
        }
        std::hint::black_box(acc);
        match HostProcess.usage(UsageScope::SelfProcess) {
            Ok(usage) if usage.user_time >= target => return,
            Ok(_) => {}
            Err(_) => return,
        }
    }
}

/// memoryLimitMiB=256, timeLimitSec=5: every kind reads back soft == hard == request.
#[test]
fn enforced_limits_read_back_pinned() {
    let plan = LimitPlan::from_config(&GuardConfig::new(256, 5)).unwrap();

    let status = fork_and_wait(|| {
        let mut host = HostProcess;
        if LimitEnforcer::new(&mut host).enforce(&plan).is_err() {
            return 99;
        }

        let expected = [
            (libc::RLIMIT_AS, 268435456),
            (libc::RLIMIT_DATA, 268435456),
            (libc::RLIMIT_STACK, 268435456),
            (libc::RLIMIT_CPU, 5),
        ];
        for (resource, value) in expected {
            let mut rlim: libc::rlimit = unsafe { std::mem::zeroed() };
            if unsafe { libc::getrlimit(resource, &mut rlim) } != 0 {
                return 98;
            }
            if rlim.rlim_cur != value || rlim.rlim_max != value {
                return 1;
            }
        }
        0
    });

    assert_exited_zero(status, "getrlimit should reflect the pinned values");
}

/// Pinned limits cannot be raised again by the guarded code.
#[test]
fn pinned_limit_cannot_be_raised() {
    if unsafe { libc::geteuid() } == 0 {
        // CAP_SYS_RESOURCE lets root raise hard limits
        return;
    }
    let plan = LimitPlan::from_config(&GuardConfig::new(1024, 5)).unwrap();

    let status = fork_and_wait(|| {
        enforce_or_abort(&mut HostProcess, &plan);
        let rlim = libc::rlimit {
            rlim_cur: 10,
            rlim_max: 10,
        };
        if unsafe { libc::setrlimit(libc::RLIMIT_CPU, &rlim) } == 0 {
            1
        } else {
            0
        }
    });

    assert_exited_zero(status, "raising RLIMIT_CPU above the pinned value must fail");
}

/// A 300 MiB allocation under a 256 MiB cap gets the process terminated.
#[test]
fn allocation_over_memory_cap_terminates() {
    let plan = LimitPlan::from_config(&GuardConfig::new(256, 5)).unwrap();

    let status = fork_and_wait(|| {
        enforce_or_abort(&mut HostProcess, &plan);
        let block = vec![1u8; 300 * 1024 * 1024];
        std::hint::black_box(&block);
        0
    });

    assert!(
        libc::WIFSIGNALED(status),
        "allocating past RLIMIT_AS should kill the process, got status {:#x}",
        status
    );
}

/// Exceeding the CPU ceiling is delivered as a signal, bypassing teardown.
#[test]
fn cpu_ceiling_kills_busy_process() {
    let plan = LimitPlan::from_config(&GuardConfig::new(1024, 1)).unwrap();

    let status = fork_and_wait(|| {
        enforce_or_abort(&mut HostProcess, &plan);
        let mut acc = 0u64;
        loop {
            acc = acc.wrapping_mul(6364136223846793005).wrapping_add(1);
            std::hint::black_box(acc);
        }
    });

    assert!(libc::WIFSIGNALED(status), "busy loop should be signalled");
    let sig = libc::WTERMSIG(status);
    assert!(
        sig == libc::SIGXCPU || sig == libc::SIGKILL,
        "expected SIGXCPU or SIGKILL, got {}",
        sig
    );
}

/// After a normal exit the artifact holds two non-negative numbers.
#[test]
fn reporter_writes_parseable_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rusage.txt");
    let plan = LimitPlan::from_config(&GuardConfig::new(4096, 5)).unwrap();
    let reporter = UsageReporter::new(UsageArtifact::new(&path));

    let status = fork_and_wait(|| {
        enforce_or_abort(&mut HostProcess, &plan);
        burn_cpu(Duration::from_millis(200));
        match reporter.report(&HostProcess) {
            Ok(_) => 0,
            Err(_) => 1,
        }
    });
    assert_exited_zero(status, "reporting should succeed");

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.matches(',').count(), 1);
    let record: UsageRecord = content.parse().unwrap();
    assert!(record.cpu_time_millis >= 200.0, "{}", content);
    assert!(record.peak_memory_kib > 0.0, "{}", content);
}

#[test]
fn enforcement_order_is_memory_then_cpu() {
    let plan = LimitPlan::from_config(&GuardConfig::new(8, 1)).unwrap();
    let kinds: Vec<ResourceKind> = plan.limits().iter().map(|l| l.kind).collect();
    assert_eq!(kinds.last(), Some(&ResourceKind::CpuTime));
}
