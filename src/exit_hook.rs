//! Usage reporting from `exit(3)`
//!
//! `std::process::exit` skips destructors, so a guarded program that exits
//! that way would never reach [`GuardSession`](crate::GuardSession)'s drop.
//! A host session therefore also parks its reporter here; an `atexit`
//! handler reports whatever is still parked when the process exits.
//! Signal kills bypass `atexit` as well, so the kill gap is unchanged.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, Once};

use log::{debug, warn};

use rexe_rlimit::{HostProcess, UsageReporter};

static PENDING: Mutex<Option<(u64, UsageReporter)>> = Mutex::new(None);
static NEXT_TICKET: AtomicU64 = AtomicU64::new(1);
static REGISTER: Once = Once::new();

fn pending() -> MutexGuard<'static, Option<(u64, UsageReporter)>> {
    PENDING.lock().unwrap_or_else(|poison| poison.into_inner())
}

extern "C" fn report_at_exit() {
    let Some((ticket, reporter)) = pending().take() else {
        return;
    };
    debug!("Reporting usage from exit handler (session {})", ticket);
    if let Err(e) = reporter.report(&HostProcess) {
        warn!("Usage report failed at exit: {}", e);
    }
}

/// Park `reporter` until [`disarm`] or process exit. Returns the ticket that
/// identifies this session's slot.
pub(crate) fn arm(reporter: UsageReporter) -> u64 {
    REGISTER.call_once(|| {
        if unsafe { libc::atexit(report_at_exit) } != 0 {
            warn!("atexit registration failed; exit() will skip the usage report");
        }
    });

    let ticket = NEXT_TICKET.fetch_add(1, Ordering::Relaxed);
    *pending() = Some((ticket, reporter));
    ticket
}

/// Release the slot if it still belongs to `ticket`.
pub(crate) fn disarm(ticket: u64) {
    let mut slot = pending();
    if matches!(slot.as_ref(), Some((owner, _)) if *owner == ticket) {
        *slot = None;
    }
}

#[cfg(test)]
pub(crate) fn armed_ticket() -> Option<u64> {
    pending().as_ref().map(|(ticket, _)| *ticket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rexe_rlimit::UsageArtifact;

    static SLOT_LOCK: Mutex<()> = Mutex::new(());

    fn serial_guard() -> MutexGuard<'static, ()> {
        SLOT_LOCK.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    #[test]
    fn disarm_clears_own_ticket() {
        let _lock = serial_guard();
        let ticket = arm(UsageReporter::new(UsageArtifact::new("unused.txt")));
        assert_eq!(armed_ticket(), Some(ticket));

        disarm(ticket);
        assert_eq!(armed_ticket(), None);
    }

    #[test]
    fn stale_ticket_does_not_clear_newer_session() {
        let _lock = serial_guard();
        let older = arm(UsageReporter::new(UsageArtifact::new("old.txt")));
        let newer = arm(UsageReporter::new(UsageArtifact::new("new.txt")));

        disarm(older);
        assert_eq!(armed_ticket(), Some(newer));

        disarm(newer);
        assert_eq!(armed_ticket(), None);
    }
}
