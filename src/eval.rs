//! Maps a parsed command tree to process creation: pipes, redirection, and
//! process-group control. `eval()` itself only ever runs inside an
//! already-forked, already-`setpgid`'d child (see `main::fork_and_run`); the
//! shell process's own dispatch decision (fork at all, or run a builtin
//! in-process) lives in `main::dispatch`.

use std::ffi::CString;
use std::io;

use crate::ast::{Command, OutputMode};
use crate::job_control;
use crate::state::ShellState;

/// Run `node` to completion in the current (already-forked) process and
/// return the exit code the parent should see via `_exit`.
pub fn eval(node: &Command, umask_value: libc::mode_t) -> i32 {
    match node {
        Command::Exec(exec) => eval_exec(&exec.argv, umask_value),
        Command::Pipe(pipe) => eval_pipe(&pipe.left, &pipe.right, umask_value),
        Command::Redir(redir) => eval_redir(redir, umask_value),
    }
}

fn eval_exec(argv: &[String], umask_value: libc::mode_t) -> i32 {
    if let Some(builtin) = crate::builtins::lookup(&argv[0]) {
        let mut state = ShellState::for_child(umask_value);
        return builtin(argv, &mut state);
    }
    run_external(argv)
}

/// `execvp` in place. On success this never returns. On failure it maps
/// errno the way the teacher's `command_error` convention does: "command
/// not found" (127) for a missing executable, "permission denied" or any
/// other OS error (126) otherwise.
fn run_external(argv: &[String]) -> i32 {
    let Ok(c_argv) = to_cstrings(argv) else {
        eprintln!("mjsh: {}: invalid argument (embedded NUL)", argv[0]);
        return 126;
    };

    let mut raw_argv: Vec<*const libc::c_char> = c_argv.iter().map(|s| s.as_ptr()).collect();
    raw_argv.push(std::ptr::null());

    unsafe {
        libc::execvp(c_argv[0].as_ptr(), raw_argv.as_ptr());
    }

    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(code) if code == libc::ENOENT => {
            eprintln!("mjsh: {}: command not found", argv[0]);
            127
        }
        _ => {
            eprintln!("mjsh: {}: {err}", argv[0]);
            126
        }
    }
}

/// `exec` builtin's non-builtin path: replace the calling process's image
/// outright. Only returns (with an error code) if `execvp` itself fails.
pub fn exec_replace(argv: &[String]) -> i32 {
    run_external(argv)
}

fn to_cstrings(argv: &[String]) -> Result<Vec<CString>, std::ffi::NulError> {
    argv.iter().map(|s| CString::new(s.as_str())).collect()
}

/// Fork both sides of the pipe, wire stdout/stdin through an OS pipe, and
/// block for both children. Each side resets its own signal dispositions to
/// default before recursing into `eval`: without that, a handler inherited
/// from the shell (or from a job-leader's already-reset state, which is
/// itself already `SIG_DFL`) could steal the `waitpid` below.
fn eval_pipe(left: &Command, right: &Command, umask_value: libc::mode_t) -> i32 {
    let (reader, writer) = match os_pipe::pipe() {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("mjsh: pipe: {e}");
            return 1;
        }
    };

    let left_pid = match job_control::fork() {
        Ok(0) => {
            drop(reader);
            dup_onto(writer, libc::STDOUT_FILENO);
            crate::signals::reset_default_dispositions();
            let code = eval(left, umask_value);
            job_control::exit_now(code);
        }
        Ok(pid) => pid,
        Err(e) => {
            eprintln!("mjsh: fork: {e}");
            return 1;
        }
    };

    let right_pid = match job_control::fork() {
        Ok(0) => {
            drop(writer);
            dup_onto(reader, libc::STDIN_FILENO);
            crate::signals::reset_default_dispositions();
            let code = eval(right, umask_value);
            job_control::exit_now(code);
        }
        Ok(pid) => pid,
        Err(e) => {
            eprintln!("mjsh: fork: {e}");
            drop(reader);
            drop(writer);
            let _ = job_control::wait_for_pid(left_pid);
            return 1;
        }
    };

    drop(reader);
    drop(writer);

    // Both children are reaped here for fd/zombie safety, but the pipe
    // frame itself always reports success: neither side's status
    // propagates to whatever wraps this `Pipe` node.
    let _ = job_control::wait_for_pid(left_pid);
    let _ = job_control::wait_for_pid(right_pid);
    0
}

fn dup_onto<F: std::os::unix::io::IntoRawFd>(handle: F, target_fd: libc::c_int) {
    let fd = handle.into_raw_fd();
    unsafe {
        libc::dup2(fd, target_fd);
        libc::close(fd);
    }
}

/// Open the redirection target(s), wire them onto stdin/stdout, and recurse
/// into the wrapped command. A failure to open is a non-fatal diagnostic:
/// it's printed, the exit code reflects the failure, but the process does
/// not abort before reporting it (there is nothing else useful to run).
fn eval_redir(redir: &crate::ast::RedirCmd, umask_value: libc::mode_t) -> i32 {
    if let Some(infile) = &redir.infile {
        match open_cstring(infile, libc::O_RDONLY, 0) {
            Ok(fd) => {
                unsafe {
                    libc::dup2(fd, libc::STDIN_FILENO);
                    libc::close(fd);
                }
            }
            Err(e) => eprintln!("mjsh: {infile}: {e}"),
        }
    }

    if let Some(outfile) = &redir.outfile {
        let flags = libc::O_WRONLY
            | libc::O_CREAT
            | match redir.mode {
                OutputMode::Truncate => libc::O_TRUNC,
                OutputMode::Append => libc::O_APPEND,
            };
        let create_mode = 0o777 & !umask_value;
        match open_cstring(outfile, flags, create_mode) {
            Ok(fd) => {
                unsafe {
                    libc::dup2(fd, libc::STDOUT_FILENO);
                    libc::close(fd);
                }
            }
            Err(e) => eprintln!("mjsh: {outfile}: {e}"),
        }
    }

    // Errors opening either side are diagnostics, not aborts: whichever
    // side failed simply keeps its inherited fd, and the inner command
    // still runs.
    eval(&redir.inner, umask_value)
}

fn open_cstring(path: &str, flags: libc::c_int, mode: libc::mode_t) -> io::Result<libc::c_int> {
    let c_path = CString::new(path)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "embedded NUL in path"))?;
    let fd = unsafe { libc::open(c_path.as_ptr(), flags, mode as libc::c_uint) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(fd)
}
