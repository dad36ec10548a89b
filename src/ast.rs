//! The command tree: the parsed, executable form of one input line.
//!
//! A node is one of three variants (`Exec`, `Pipe`, `Redir`), matching the
//! grammar in `parser.rs`. `Pipe` owns a left and right child; by
//! construction (see `parser::parse_pipe`) only the right child may itself
//! be a `Pipe`, so `a | b | c` always comes out right-associated.

/// Longest argv a single `Exec` node may carry (15 meaningful tokens).
pub const MAX_ARGV: usize = 15;
/// Longest redirection filename, in bytes.
pub const MAX_FILENAME: usize = 15;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Exec(ExecCmd),
    Pipe(Box<PipeCmd>),
    Redir(Box<RedirCmd>),
}

/// A single program invocation: a non-empty argv.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecCmd {
    pub argv: Vec<String>,
}

impl ExecCmd {
    pub fn program(&self) -> &str {
        &self.argv[0]
    }
}

/// `left | right`. Data flows left's stdout into right's stdin.
#[derive(Debug, Clone, PartialEq)]
pub struct PipeCmd {
    pub left: Command,
    pub right: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Truncate,
    Append,
}

/// Wraps `inner` with up to one input and one output redirection.
/// At least one of `infile`/`outfile` is always present.
#[derive(Debug, Clone, PartialEq)]
pub struct RedirCmd {
    pub inner: Command,
    pub infile: Option<String>,
    pub outfile: Option<String>,
    pub mode: OutputMode,
}

/// The result of parsing one input line: a command tree plus the
/// whole-line properties the parser derived (background flag, original
/// text for job-table display).
#[derive(Debug, Clone, PartialEq)]
pub struct CommandTree {
    pub root: Command,
    /// True iff a trailing `&` was present anywhere on the line.
    /// Only this, the root's flag, is ever consulted.
    pub fg_bg: bool,
    pub line: String,
}

impl Command {
    /// Flatten the tree into its leaf `Exec` nodes, left to right.
    /// Used by tests to check the right-associativity invariant.
    #[cfg(test)]
    pub fn leaves(&self) -> Vec<&ExecCmd> {
        match self {
            Command::Exec(e) => vec![e],
            Command::Pipe(p) => {
                let mut v = p.left.leaves();
                v.extend(p.right.leaves());
                v
            }
            Command::Redir(r) => r.inner.leaves(),
        }
    }
}
