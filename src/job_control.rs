//! Process-group primitives and the signal-blocking critical section.

use std::io;

/// Blocks every signal for the lifetime of the guard, restoring the prior
/// mask on drop. Used to protect job-table reads/mutations from a `SIGCHLD`
/// handler running mid-access. Nesting is safe: `sigprocmask(SIG_SETMASK)`
/// on drop restores whatever mask was active when this guard was created,
/// so an inner guard's drop is a no-op against an outer one's block.
pub(crate) struct BlockAllSignals {
    previous: libc::sigset_t,
}

impl BlockAllSignals {
    pub(crate) fn new() -> Self {
        unsafe {
            let mut all: libc::sigset_t = std::mem::zeroed();
            libc::sigfillset(&mut all);
            let mut previous: libc::sigset_t = std::mem::zeroed();
            libc::sigprocmask(libc::SIG_SETMASK, &all, &mut previous);
            BlockAllSignals { previous }
        }
    }
}

impl Drop for BlockAllSignals {
    fn drop(&mut self) {
        unsafe {
            libc::sigprocmask(libc::SIG_SETMASK, &self.previous, std::ptr::null_mut());
        }
    }
}

pub(crate) fn set_process_group(pid: libc::pid_t, pgid: libc::pid_t) -> io::Result<()> {
    loop {
        let rc = unsafe { libc::setpgid(pid, pgid) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EINTR => continue,
            Some(code) if code == libc::EACCES || code == libc::ESRCH => return Ok(()),
            _ => return Err(err),
        }
    }
}

/// `kill(-pgid, sig)`: deliver `sig` to every process in the group.
pub(crate) fn forward_signal_to_group(pgid: libc::pid_t, sig: libc::c_int) -> io::Result<()> {
    if pgid <= 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "invalid pgid"));
    }
    loop {
        let rc = unsafe { libc::kill(-pgid, sig) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EINTR => continue,
            Some(code) if code == libc::ESRCH => return Ok(()),
            _ => return Err(err),
        }
    }
}

pub(crate) fn send_continue_to_group(pgid: libc::pid_t) -> io::Result<()> {
    forward_signal_to_group(pgid, libc::SIGCONT)
}

/// Thin `fork()` wrapper. `Ok(0)` means "this is the child".
pub(crate) fn fork() -> io::Result<libc::pid_t> {
    let rc = unsafe { libc::fork() };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(rc)
}

/// `_exit(2)`: bypasses atexit handlers and stdio flushing, the correct
/// exit path for a forked child after an `execvp` failure or a builtin run
/// to completion in a subprocess.
pub(crate) fn exit_now(code: i32) -> ! {
    unsafe { libc::_exit(code) }
}

/// Blocking `waitpid` on a specific pid, tolerating `EINTR`. Used for
/// pipeline-internal children, where the shell's own `SIGCHLD` handler has
/// already been reset to `SIG_DFL` (see `signals::reset_default_dispositions`)
/// so this wait is never stolen by it.
pub(crate) fn wait_for_pid(pid: libc::pid_t) -> io::Result<i32> {
    let mut raw_status: libc::c_int = 0;
    loop {
        let rc = unsafe { libc::waitpid(pid, &mut raw_status, 0) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(err);
        }
        return Ok(crate::status::exit_code_from_wait_status(raw_status).unwrap_or(1));
    }
}
