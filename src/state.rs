//! Process-wide shell state: the working directory and file-creation mask
//! the built-ins read and mutate.

use std::io;

pub struct ShellState {
    pub pwd: String,
    pub umask_value: libc::mode_t,
    pub last_status: i32,
}

impl ShellState {
    /// Established once at startup, mirroring `original_source/myshell.c`'s
    /// `main()`: read `PWD` from the environment (falling back to
    /// `getcwd` if it's unset, which the original assumes is always there),
    /// then set `SHELL` to the same value.
    pub fn new() -> io::Result<Self> {
        let pwd = match std::env::var("PWD") {
            Ok(p) => p,
            Err(_) => std::env::current_dir()?.display().to_string(),
        };
        unsafe {
            std::env::set_var("SHELL", &pwd);
        }

        let umask_value = unsafe {
            let current = libc::umask(0o022);
            libc::umask(current);
            current
        };

        Ok(ShellState {
            pwd,
            umask_value,
            last_status: 0,
        })
    }

    /// A throwaway copy for a builtin running inside a forked child (e.g. a
    /// pipeline segment or a backgrounded bare builtin): mutations like `cd`
    /// or `umask` only affect that child's own process image and vanish
    /// when it exits, matching the documented limitation that these
    /// built-ins have no lasting effect off the shell's own command line.
    pub fn for_child(umask_value: libc::mode_t) -> Self {
        let pwd = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        ShellState {
            pwd,
            umask_value,
            last_status: 0,
        }
    }

    pub fn refresh_pwd(&mut self) -> io::Result<()> {
        self.pwd = std::env::current_dir()?.display().to_string();
        unsafe {
            std::env::set_var("PWD", &self.pwd);
        }
        Ok(())
    }
}
