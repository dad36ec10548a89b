//! The job table: a fixed-capacity record of background and stopped jobs.
//!
//! Mutations and reads happen under `job_control::BlockAllSignals`, which
//! makes the single-threaded-plus-asynchronous-signal-handler access pattern
//! safe without a real lock. Every public method establishes its own
//! critical section; the `_locked` variants exist for the `SIGCHLD` handler,
//! which has already blocked signals and must not re-block (signal masks
//! don't nest via `sigprocmask` the way a mutex would).

use std::cell::UnsafeCell;
use std::sync::OnceLock;

use crate::job_control::BlockAllSignals;

/// Matches `original_source/myshell.c`'s `MAXJOBS`.
pub const MAX_JOBS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Invalid,
    Bg,
    Fg,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct JobRecord {
    pub jid: i32,
    pub pid: libc::pid_t,
    pub pgid: libc::pid_t,
    pub state: JobState,
    pub cmdline: String,
}

impl JobRecord {
    fn empty() -> Self {
        JobRecord {
            jid: 0,
            pid: 0,
            pgid: 0,
            state: JobState::Invalid,
            cmdline: String::new(),
        }
    }
}

pub struct JobTable {
    slots: [JobRecord; MAX_JOBS],
    next_jid: i32,
}

impl JobTable {
    fn new() -> Self {
        JobTable {
            slots: std::array::from_fn(|_| JobRecord::empty()),
            next_jid: 1,
        }
    }

    /// Insert a new job, allocating the next jid (wrapping back to 1 past
    /// `i32::MAX`, though `MAX_JOBS` will force reuse long before that).
    /// Returns `None` if the table is full.
    pub fn add_locked(
        &mut self,
        pid: libc::pid_t,
        pgid: libc::pid_t,
        state: JobState,
        cmdline: String,
    ) -> Option<i32> {
        let slot = self.slots.iter_mut().find(|s| s.state == JobState::Invalid)?;
        let jid = self.next_jid;
        self.next_jid = self.next_jid.wrapping_add(1).max(1);
        *slot = JobRecord {
            jid,
            pid,
            pgid,
            state,
            cmdline,
        };
        Some(jid)
    }

    pub fn remove_by_pid_locked(&mut self, pid: libc::pid_t) -> Option<JobRecord> {
        let slot = self.slots.iter_mut().find(|s| s.state != JobState::Invalid && s.pid == pid)?;
        let record = slot.clone();
        *slot = JobRecord::empty();
        self.next_jid = self.max_jid_locked().map(|m| m + 1).unwrap_or(1);
        Some(record)
    }

    pub fn by_pid_locked(&mut self, pid: libc::pid_t) -> Option<&mut JobRecord> {
        self.slots
            .iter_mut()
            .find(|s| s.state != JobState::Invalid && s.pid == pid)
    }

    pub fn by_jid_locked(&mut self, jid: i32) -> Option<&mut JobRecord> {
        self.slots
            .iter_mut()
            .find(|s| s.state != JobState::Invalid && s.jid == jid)
    }

    /// Highest jid currently in the table, for the `fg`/`bg` "most recent"
    /// default.
    pub fn max_jid_locked(&self) -> Option<i32> {
        self.slots
            .iter()
            .filter(|s| s.state != JobState::Invalid)
            .map(|s| s.jid)
            .max()
    }

    /// All occupied slots, jid ascending, for `jobs`.
    pub fn all_locked(&self) -> Vec<JobRecord> {
        let mut v: Vec<JobRecord> = self
            .slots
            .iter()
            .filter(|s| s.state != JobState::Invalid)
            .cloned()
            .collect();
        v.sort_by_key(|j| j.jid);
        v
    }
}

struct GlobalCell(UnsafeCell<JobTable>);

// SAFETY: every access path — normal shell code and the SIGCHLD handler —
// goes through `BlockAllSignals` (or the handler's own pre-established
// block), so there is never a preempted partial mutation visible to a
// concurrent reader. This is a single thread with asynchronous signal
// preemption, not true concurrency.
unsafe impl Sync for GlobalCell {}

static TABLE: OnceLock<GlobalCell> = OnceLock::new();

/// Must be called once, before signal handlers are installed.
pub fn init() {
    TABLE.get_or_init(|| GlobalCell(UnsafeCell::new(JobTable::new())));
}

/// Direct access for the `SIGCHLD` handler, which has already blocked all
/// signals itself and must not call `BlockAllSignals::new()` again.
///
/// # Safety
/// Caller must hold the signal block for the duration of the borrow.
pub unsafe fn global_locked() -> &'static mut JobTable {
    let cell = TABLE.get().expect("jobs::init() not called");
    unsafe { &mut *cell.0.get() }
}

/// Run `f` with the job table borrowed under a fresh signal block. Safe to
/// call from ordinary (non-handler) code.
pub fn with_table<R>(f: impl FnOnce(&mut JobTable) -> R) -> R {
    let _guard = BlockAllSignals::new();
    // SAFETY: signals are blocked for the lifetime of `_guard`.
    let table = unsafe { global_locked() };
    f(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_lookup() {
        let mut t = JobTable::new();
        let jid = t
            .add_locked(100, 100, JobState::Bg, "sleep 5".to_string())
            .unwrap();
        assert_eq!(jid, 1);
        assert!(t.by_pid_locked(100).is_some());
        assert!(t.by_jid_locked(jid).is_some());
    }

    #[test]
    fn remove_frees_slot() {
        let mut t = JobTable::new();
        t.add_locked(100, 100, JobState::Bg, "a".to_string()).unwrap();
        assert!(t.remove_by_pid_locked(100).is_some());
        assert!(t.by_pid_locked(100).is_none());
    }

    #[test]
    fn table_full_returns_none() {
        let mut t = JobTable::new();
        for i in 0..MAX_JOBS as libc::pid_t {
            assert!(t
                .add_locked(100 + i, 100 + i, JobState::Bg, "x".to_string())
                .is_some());
        }
        assert!(t
            .add_locked(9999, 9999, JobState::Bg, "overflow".to_string())
            .is_none());
    }

    #[test]
    fn max_jid_and_listing() {
        let mut t = JobTable::new();
        t.add_locked(1, 1, JobState::Bg, "a".to_string()).unwrap();
        let j2 = t.add_locked(2, 2, JobState::Bg, "b".to_string()).unwrap();
        assert_eq!(t.max_jid_locked(), Some(j2));
        assert_eq!(t.all_locked().len(), 2);
    }
}
