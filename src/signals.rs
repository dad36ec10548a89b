//! Signal handler installation and the foreground-wait predicate.
//!
//! `SIGCHLD`, `SIGINT`, and `SIGTSTP` are caught by the shell itself (it
//! never transfers terminal ownership, see `job_control`): `SIGCHLD` drains
//! finished/stopped children into the job table, while `SIGINT`/`SIGTSTP`
//! are forwarded to whatever process group is currently in the foreground.
//! Handlers are only ever async-signal-safe operations: no allocation, no
//! `println!`/`eprintln!` (they'd take the stdout/stderr lock), only raw
//! `libc::write`, `waitpid`, `kill`, and the job-table's `_locked` methods
//! under the block already established by signal delivery itself.

use std::sync::atomic::{AtomicI32, Ordering};

use crate::jobs::{self, JobState};

/// pid of the job currently occupying the foreground, or 0 if none.
/// `i32` rather than `libc::pid_t` directly so `AtomicI32` is available on
/// every target; the two are the same width on all platforms we build for.
static FOREGROUND_PID: AtomicI32 = AtomicI32::new(0);

/// Exit code of the most recently reaped foreground job, read by
/// `main::fork_and_run` once `waitfg()` returns.
static FOREGROUND_EXIT_STATUS: AtomicI32 = AtomicI32::new(0);

pub fn set_foreground_pid(pid: libc::pid_t) {
    FOREGROUND_PID.store(pid, Ordering::SeqCst);
}

pub fn take_foreground_exit_status() -> i32 {
    FOREGROUND_EXIT_STATUS.load(Ordering::SeqCst)
}

pub fn clear_foreground_pid() {
    FOREGROUND_PID.store(0, Ordering::SeqCst);
}

pub fn foreground_pid() -> libc::pid_t {
    FOREGROUND_PID.load(Ordering::SeqCst)
}

/// Install handlers for `SIGCHLD`, `SIGINT`, `SIGTSTP` with `SA_RESTART` so
/// interrupted blocking syscalls (notably `read` on stdin) resume instead of
/// failing with `EINTR` at the top-level read loop.
pub fn install_handlers() -> std::io::Result<()> {
    unsafe {
        install_one(libc::SIGCHLD, handle_sigchld)?;
        install_one(libc::SIGINT, handle_sigint)?;
        install_one(libc::SIGTSTP, handle_sigtstp)?;
    }
    Ok(())
}

unsafe fn install_one(
    signum: libc::c_int,
    handler: extern "C" fn(libc::c_int),
) -> std::io::Result<()> {
    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    action.sa_sigaction = handler as usize;
    unsafe { libc::sigemptyset(&mut action.sa_mask) };
    action.sa_flags = libc::SA_RESTART;

    let rc = unsafe { libc::sigaction(signum, &action, std::ptr::null_mut()) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Reset `SIGCHLD`/`SIGINT`/`SIGTSTP` to `SIG_DFL`. Every forked child calls
/// this before `eval()` runs: without it, a grandchild forked internally by
/// `eval::eval_pipe` would inherit the shell's `SIGCHLD` handler and that
/// handler's `waitpid(-1, ...)` could steal the exit status `eval_pipe`'s
/// own blocking wait is expecting.
pub fn reset_default_dispositions() {
    unsafe {
        libc::signal(libc::SIGCHLD, libc::SIG_DFL);
        libc::signal(libc::SIGINT, libc::SIG_DFL);
        libc::signal(libc::SIGTSTP, libc::SIG_DFL);
    }
}

extern "C" fn handle_sigchld(_signum: libc::c_int) {
    reap_all();
}

extern "C" fn handle_sigint(_signum: libc::c_int) {
    let pid = foreground_pid();
    if pid != 0 {
        unsafe {
            libc::kill(-pid, libc::SIGINT);
        }
    }
}

extern "C" fn handle_sigtstp(_signum: libc::c_int) {
    let pid = foreground_pid();
    if pid != 0 {
        unsafe {
            libc::kill(-pid, libc::SIGTSTP);
        }
    }
}

/// Drain every exited/stopped child with a non-blocking `waitpid(-1, ...)`
/// loop, updating (or removing) its job-table entry. Called directly by the
/// `SIGCHLD` handler — signals are already blocked by the kernel for the
/// duration of handler execution, so this uses the table's `_locked` entry
/// points directly rather than `jobs::with_table`, which would try to block
/// signals a second time.
pub fn reap_all() {
    // SAFETY: called only from the SIGCHLD handler (signals already blocked)
    // or with signals already blocked by the caller.
    let table = unsafe { jobs::global_locked() };

    loop {
        let mut raw_status: libc::c_int = 0;
        let pid = unsafe { libc::waitpid(-1, &mut raw_status, libc::WNOHANG | libc::WUNTRACED) };
        if pid <= 0 {
            break;
        }

        if unsafe { libc::WIFSTOPPED(raw_status) } {
            if let Some(job) = table.by_pid_locked(pid) {
                job.state = JobState::Stopped;
                async_safe_note(job.jid, pid, "Stopped");
            }
            if foreground_pid() == pid {
                let stop_signal = unsafe { libc::WSTOPSIG(raw_status) };
                FOREGROUND_EXIT_STATUS.store(128 + stop_signal, Ordering::SeqCst);
                clear_foreground_pid();
            }
            continue;
        }

        if let Some(job) = table.remove_by_pid_locked(pid) {
            if job.state == JobState::Bg {
                async_safe_note(job.jid, pid, "Done");
            }
        }
        if foreground_pid() == pid {
            let code = crate::status::exit_code_from_wait_status(raw_status).unwrap_or(1);
            FOREGROUND_EXIT_STATUS.store(code, Ordering::SeqCst);
            clear_foreground_pid();
        }
    }
}

/// Write `[<jid>] (<pid>) <what>\n` with raw `write(2)`, the only
/// async-signal-safe way to produce output from inside a handler.
fn async_safe_note(jid: i32, pid: libc::pid_t, what: &str) {
    let line = format!("[{jid}] ({pid}) {what}\n");
    unsafe {
        libc::write(
            libc::STDOUT_FILENO,
            line.as_ptr() as *const libc::c_void,
            line.len(),
        );
    }
}

/// Block until `foreground_pid()` reads 0, using `sigsuspend` so the
/// unblock-and-wait is atomic: without it, a `SIGCHLD` delivered between
/// checking the pid and suspending would be missed (the classic lost-wakeup
/// race this design is built to avoid).
pub fn waitfg() {
    unsafe {
        let mut block_chld: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut block_chld);
        libc::sigaddset(&mut block_chld, libc::SIGCHLD);

        let mut previous: libc::sigset_t = std::mem::zeroed();
        libc::sigprocmask(libc::SIG_BLOCK, &block_chld, &mut previous);

        while foreground_pid() != 0 {
            libc::sigsuspend(&previous);
        }

        libc::sigprocmask(libc::SIG_SETMASK, &previous, std::ptr::null_mut());
    }
}
