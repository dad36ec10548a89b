mod ast;
mod builtins;
mod eval;
mod job_control;
mod jobs;
mod parser;
mod signals;
mod state;
mod status;

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};

use ast::{Command, CommandTree};
use state::ShellState;

fn main() {
    jobs::init();
    if let Err(e) = signals::install_handlers() {
        eprintln!("mjsh: failed to install signal handlers: {e}");
        std::process::exit(1);
    }

    let mut state = match ShellState::new() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("mjsh: {e}");
            std::process::exit(1);
        }
    };

    let args: Vec<String> = std::env::args().collect();
    let exit_code = match args.get(1) {
        None => run_interactive(&mut state),
        Some(path) => run_batch(path, &mut state),
    };

    std::process::exit(exit_code);
}

fn run_interactive(state: &mut ShellState) -> i32 {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{}$ ", state.pwd);
        if stdout.flush().is_err() {
            return state.last_status;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return state.last_status,
            Ok(_) => run_line(&line, state),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                eprintln!("mjsh: {e}");
                return 1;
            }
        }
    }
}

fn run_batch(path: &str, state: &mut ShellState) -> i32 {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("mjsh: {path}: {e}");
            return 1;
        }
    };

    for line in BufReader::new(file).lines() {
        match line {
            Ok(line) => run_line(&line, state),
            Err(e) => {
                eprintln!("mjsh: {path}: {e}");
                return 1;
            }
        }
    }

    0
}

fn run_line(line: &str, state: &mut ShellState) {
    let tree = match parser::parse(line) {
        Ok(Some(tree)) => tree,
        Ok(None) => return,
        Err(e) => {
            eprintln!("{e}");
            state.last_status = 2;
            return;
        }
    };

    state.last_status = dispatch(tree, state);
}

/// Decide whether the root command can run directly in the shell process
/// (a bare builtin invocation, not backgrounded, not wrapped in a pipe or
/// redirection) or must go through `fork_and_run`.
fn dispatch(tree: CommandTree, state: &mut ShellState) -> i32 {
    if !tree.fg_bg {
        if let Command::Exec(exec) = &tree.root {
            if let Some(builtin) = builtins::lookup(&exec.program()) {
                return builtin(&exec.argv, state);
            }
        }
    }

    fork_and_run(&tree, state)
}

fn fork_and_run(tree: &CommandTree, state: &mut ShellState) -> i32 {
    // Signals stay blocked from just before `fork()` until the new job is
    // in the table: otherwise a fast-exiting child can be reaped by
    // `SIGCHLD` before `add_locked` runs, and for the foreground case that
    // reap happens before `foreground_pid` is even set, so `waitfg()` would
    // then block forever waiting for a `SIGCHLD` that already fired.
    let guard = job_control::BlockAllSignals::new();

    // SAFETY: fork() is unsafe in the sense that the child may only call
    // async-signal-safe functions before exec/_exit; everything on the
    // child branch below is either that or a call into `eval`, which
    // itself only uses raw syscalls and owns its own process image.
    match job_control::fork() {
        Ok(0) => {
            // The child has nothing left to protect with the block; drop it
            // immediately so the process it's about to become (or `eval`'s
            // own forks) don't inherit a fully blocked signal mask.
            drop(guard);
            job_control::set_process_group(0, 0).ok();
            signals::reset_default_dispositions();
            let code = eval::eval(&tree.root, state.umask_value);
            job_control::exit_now(code);
        }
        Ok(child_pid) => {
            job_control::set_process_group(child_pid, child_pid).ok();

            // SAFETY: signals are blocked for the lifetime of `guard`.
            let table = unsafe { jobs::global_locked() };
            if tree.fg_bg {
                let jid = table.add_locked(child_pid, child_pid, jobs::JobState::Bg, tree.line.clone());
                drop(guard);
                if let Some(jid) = jid {
                    println!("[{jid}] ({child_pid}) {}", tree.line);
                }
                0
            } else {
                table.add_locked(child_pid, child_pid, jobs::JobState::Fg, tree.line.clone());
                signals::set_foreground_pid(child_pid);
                drop(guard);
                signals::waitfg();
                signals::take_foreground_exit_status()
            }
        }
        Err(e) => {
            drop(guard);
            eprintln!("mjsh: fork: {e}");
            1
        }
    }
}
