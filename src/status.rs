/// Convert a raw `waitpid` status into shell-style exit code semantics.
///
/// A process terminated by a signal maps to `128 + signal`, matching the
/// convention shells use so `$?` (and this crate's exit-code reporting)
/// distinguishes a clean exit from a signal death.
pub fn exit_code_from_wait_status(raw_status: libc::c_int) -> Option<i32> {
    if unsafe { libc::WIFEXITED(raw_status) } {
        return Some(unsafe { libc::WEXITSTATUS(raw_status) });
    }

    if unsafe { libc::WIFSIGNALED(raw_status) } {
        let signal = unsafe { libc::WTERMSIG(raw_status) };
        return Some(128 + signal);
    }

    None
}
