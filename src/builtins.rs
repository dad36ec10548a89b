//! Built-in command implementations, dispatched by name from `eval::eval_exec`.
//!
//! Concrete semantics are grounded in `original_source/built_in_command.c`.
//! Each builtin gets `argv` (including its own name at index 0) and the
//! shell's process-wide state, and returns an exit code.

use std::io::Write;

use crate::job_control;
use crate::jobs::{self, JobState};
use crate::signals;
use crate::state::ShellState;

pub type Builtin = fn(&[String], &mut ShellState) -> i32;

pub fn lookup(name: &str) -> Option<Builtin> {
    match name {
        "bg" => Some(builtin_bg),
        "cd" => Some(builtin_cd),
        "clr" => Some(builtin_clr),
        "dir" => Some(builtin_dir),
        "echo" => Some(builtin_echo),
        "exec" => Some(builtin_exec),
        "exit" => Some(builtin_exit),
        "fg" => Some(builtin_fg),
        "help" => Some(builtin_help),
        "jobs" => Some(builtin_jobs),
        "pwd" => Some(builtin_pwd),
        "set" => Some(builtin_set),
        "test" => Some(builtin_test),
        "time" => Some(builtin_time),
        "umask" => Some(builtin_umask),
        _ => None,
    }
}

fn builtin_cd(argv: &[String], state: &mut ShellState) -> i32 {
    match argv.get(1) {
        None => {
            println!("{}", state.pwd);
            0
        }
        Some(dir) => {
            let is_dir = std::fs::metadata(dir).map(|m| m.is_dir()).unwrap_or(false);
            if !is_dir {
                eprintln!("cd: {dir}: no such file or directory");
                return 1;
            }
            if let Err(e) = std::env::set_current_dir(dir) {
                eprintln!("cd: {dir}: {e}");
                return 1;
            }
            if let Err(e) = state.refresh_pwd() {
                eprintln!("cd: {e}");
                return 1;
            }
            0
        }
    }
}

fn builtin_dir(argv: &[String], state: &mut ShellState) -> i32 {
    let path = argv.get(1).cloned().unwrap_or_else(|| state.pwd.clone());
    let entries = match std::fs::read_dir(&path) {
        Ok(e) => e,
        Err(_) => {
            eprintln!("dir: {path}: not a directory");
            return 1;
        }
    };

    let mut names = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy().into_owned();
        if name == "." || name == ".." {
            continue;
        }
        names.push(name);
    }
    println!("{}", names.join(" "));
    0
}

fn builtin_echo(argv: &[String], _state: &mut ShellState) -> i32 {
    println!("{}", argv[1..].join(" "));
    0
}

/// Query the terminal's row count and push the cursor back to the top
/// without actually clearing visible content — a no-op (single newline) if
/// stdin isn't a tty, matching a headless/piped invocation.
fn builtin_clr(_argv: &[String], _state: &mut ShellState) -> i32 {
    let rows = unsafe {
        let mut size: libc::winsize = std::mem::zeroed();
        if libc::ioctl(libc::STDIN_FILENO, libc::TIOCGWINSZ, &mut size) == -1 {
            0
        } else {
            size.ws_row
        }
    };

    if rows == 0 {
        println!();
        return 0;
    }

    for _ in 0..rows {
        println!();
    }
    print!("\x1b[{rows}A");
    let _ = std::io::stdout().flush();
    0
}

fn builtin_time(_argv: &[String], _state: &mut ShellState) -> i32 {
    unsafe {
        let now = libc::time(std::ptr::null_mut());
        let mut tm: libc::tm = std::mem::zeroed();
        libc::localtime_r(&now, &mut tm);
        let mut buf = [0i8; 64];
        libc::asctime_r(&tm, buf.as_mut_ptr());
        let cstr = std::ffi::CStr::from_ptr(buf.as_ptr());
        print!("{}", cstr.to_string_lossy());
    }
    0
}

fn builtin_help(_argv: &[String], _state: &mut ShellState) -> i32 {
    println!("The following commands are built in:");
    println!();
    println!("help         this usage banner");
    println!("bg [jid]     resume a stopped job in the background");
    println!("fg [jid]     resume a job in the foreground");
    println!("exit [code]  terminate the shell");
    println!("pwd          print the working directory");
    println!("cd [dir]     change the working directory");
    println!("jobs         list tracked jobs");
    println!("umask [mode] print or set the file creation mask");
    println!("test [expr]  evaluate a predicate expression");
    println!("time         print the current time");
    println!("echo [args]  print arguments");
    println!("dir [path]   list directory contents");
    println!("set          print all environment variables");
    println!("clr          clear the screen");
    println!("exec cmd     replace a builtin dispatch with an external command");
    0
}

fn builtin_set(_argv: &[String], _state: &mut ShellState) -> i32 {
    for (key, value) in std::env::vars() {
        println!("{key}={value}");
    }
    0
}

fn builtin_umask(argv: &[String], state: &mut ShellState) -> i32 {
    match argv.get(1) {
        None => {
            println!("{:04o}", state.umask_value);
            0
        }
        Some(arg) => {
            if arg.len() > 4 || arg.is_empty() || !arg.bytes().all(|b| (b'0'..=b'7').contains(&b))
            {
                eprintln!("umask: {arg}: invalid mode (1-4 octal digits required)");
                return 1;
            }
            let value = u32::from_str_radix(arg, 8).unwrap_or(0) as libc::mode_t;
            unsafe {
                libc::umask(value);
            }
            state.umask_value = value;
            0
        }
    }
}

fn builtin_pwd(_argv: &[String], state: &mut ShellState) -> i32 {
    println!("{}", state.pwd);
    0
}

fn builtin_exit(argv: &[String], _state: &mut ShellState) -> i32 {
    match argv.get(1) {
        None => job_control::exit_now(0),
        Some(s) => match s.parse::<i32>() {
            Ok(code) => job_control::exit_now(code),
            Err(_) => {
                eprintln!("exit: {s}: numeric argument required");
                job_control::exit_now(2)
            }
        },
    }
}

fn builtin_jobs(_argv: &[String], _state: &mut ShellState) -> i32 {
    jobs::with_table(|table| {
        for job in table.all_locked() {
            let label = match job.state {
                JobState::Bg => "Running",
                JobState::Fg => "Running",
                JobState::Stopped => "Stopped",
                JobState::Invalid => continue,
            };
            println!("[{}] ({}) {}  {}", job.jid, job.pid, label, job.cmdline);
        }
    });
    0
}

/// Parse a `fg`/`bg` target: `%N`, bare `N`, or none (most recent).
fn resolve_target(argv: &[String]) -> Option<ResolveBy> {
    match argv.get(1) {
        None => None,
        Some(s) => {
            let digits = s.strip_prefix('%').unwrap_or(s);
            digits.parse::<i32>().ok().map(ResolveBy::Jid)
        }
    }
}

enum ResolveBy {
    Jid(i32),
}

fn builtin_fg(argv: &[String], _state: &mut ShellState) -> i32 {
    let target = resolve_target(argv);
    let resolved = jobs::with_table(|table| {
        let jid = match target {
            Some(ResolveBy::Jid(jid)) => jid,
            None => match table.max_jid_locked() {
                Some(jid) => jid,
                None => return None,
            },
        };
        let job = table.by_jid_locked(jid)?;
        let pgid = job.pgid;
        let pid = job.pid;
        job.state = JobState::Fg;
        Some((jid, pid, pgid))
    });

    let Some((_jid, pid, pgid)) = resolved else {
        eprintln!("fg: no such job");
        return 1;
    };

    if let Err(e) = job_control::send_continue_to_group(pgid) {
        eprintln!("fg: {e}");
        return 1;
    }
    signals::set_foreground_pid(pid);
    signals::waitfg();
    0
}

fn builtin_bg(argv: &[String], _state: &mut ShellState) -> i32 {
    let target = resolve_target(argv);
    let resolved = jobs::with_table(|table| {
        let jid = match target {
            Some(ResolveBy::Jid(jid)) => jid,
            None => table
                .all_locked()
                .iter()
                .filter(|j| j.state == JobState::Stopped)
                .map(|j| j.jid)
                .max()?,
        };
        let job = table.by_jid_locked(jid)?;
        let pgid = job.pgid;
        job.state = JobState::Bg;
        Some((jid, job.pid, pgid, job.cmdline.clone()))
    });

    let Some((jid, pid, pgid, cmdline)) = resolved else {
        eprintln!("bg: no such job");
        return 1;
    };

    if let Err(e) = job_control::send_continue_to_group(pgid) {
        eprintln!("bg: {e}");
        return 1;
    }
    println!("[{jid}] ({pid}) {cmdline}");
    0
}

/// Minimal POSIX-subset predicate evaluator: unary file/string tests and
/// binary string/numeric comparisons. No `-a`/`-o`/bracket syntax — the
/// tokenizer has no `[` handling, and the non-bracket form is all `test`
/// needs to claim the name usefully.
fn builtin_test(argv: &[String], _state: &mut ShellState) -> i32 {
    let args = &argv[1..];
    let result = match args {
        [op, operand] => eval_unary(op, operand),
        [lhs, op, rhs] => eval_binary(lhs, op, rhs),
        [] => false,
        _ => {
            eprintln!("test: unsupported expression");
            return 2;
        }
    };
    if result { 0 } else { 1 }
}

fn eval_unary(op: &str, operand: &str) -> bool {
    match op {
        "-e" => std::fs::metadata(operand).is_ok(),
        "-f" => std::fs::metadata(operand).map(|m| m.is_file()).unwrap_or(false),
        "-d" => std::fs::metadata(operand).map(|m| m.is_dir()).unwrap_or(false),
        "-z" => operand.is_empty(),
        "-n" => !operand.is_empty(),
        _ => {
            eprintln!("test: {op}: unknown unary operator");
            false
        }
    }
}

fn eval_binary(lhs: &str, op: &str, rhs: &str) -> bool {
    match op {
        "=" => lhs == rhs,
        "!=" => lhs != rhs,
        "-eq" | "-ne" | "-lt" | "-le" | "-gt" | "-ge" => {
            let (Ok(a), Ok(b)) = (lhs.parse::<i64>(), rhs.parse::<i64>()) else {
                eprintln!("test: {lhs} or {rhs}: not a number");
                return false;
            };
            match op {
                "-eq" => a == b,
                "-ne" => a != b,
                "-lt" => a < b,
                "-le" => a <= b,
                "-gt" => a > b,
                "-ge" => a >= b,
                _ => unreachable!(),
            }
        }
        _ => {
            eprintln!("test: {op}: unknown binary operator");
            false
        }
    }
}

/// `exec cmd args...`: strip the builtin's own name and redispatch. If the
/// remainder names another builtin, run it in place; otherwise hand off to
/// `eval::exec_replace`, which never returns on success.
fn builtin_exec(argv: &[String], state: &mut ShellState) -> i32 {
    if argv.len() < 2 {
        eprintln!("exec: usage: exec command [args...]");
        return 1;
    }
    let rest = &argv[1..];
    if let Some(builtin) = lookup(&rest[0]) {
        return builtin(rest, state);
    }
    crate::eval::exec_replace(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_unary_and_binary() {
        let mut state = ShellState::for_child(0o022);
        assert_eq!(
            builtin_test(&["test".into(), "-z".into(), "".into()], &mut state),
            0
        );
        assert_eq!(
            builtin_test(
                &["test".into(), "1".into(), "-lt".into(), "2".into()],
                &mut state
            ),
            0
        );
        assert_eq!(
            builtin_test(
                &["test".into(), "abc".into(), "=".into(), "abc".into()],
                &mut state
            ),
            0
        );
        assert_eq!(
            builtin_test(
                &["test".into(), "abc".into(), "!=".into(), "xyz".into()],
                &mut state
            ),
            0
        );
    }

    #[test]
    fn umask_rejects_bad_digits() {
        let mut state = ShellState::for_child(0o022);
        assert_eq!(
            builtin_umask(&["umask".into(), "999".into()], &mut state),
            1
        );
        assert_eq!(
            builtin_umask(&["umask".into(), "027".into()], &mut state),
            0
        );
        assert_eq!(state.umask_value, 0o027);
    }

    #[test]
    fn all_names_resolve() {
        const NAMES: &[&str] = &[
            "bg", "cd", "clr", "dir", "echo", "exec", "exit", "fg", "help", "jobs", "pwd", "set",
            "test", "time", "umask",
        ];
        for name in NAMES {
            assert!(lookup(name).is_some(), "{name} missing from dispatch table");
        }
    }
}
