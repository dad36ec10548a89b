//! Single-pass, whitespace- and punctuation-driven recursive-descent parser.
//!
//! ```text
//! line   ::= pipe [ '&' ]
//! pipe   ::= exec [ '|' line ]
//! exec   ::= atom { atom }
//! atom   ::= TOKEN | '<' TOKEN | '>' TOKEN | '>>' TOKEN
//! ```
//!
//! No quoting, escaping, variable expansion, or globbing: tokens are
//! maximal runs of non-whitespace, non-`|`, non-`<`, non-`>`, non-`&`.

use crate::ast::{Command, CommandTree, ExecCmd, OutputMode, PipeCmd, RedirCmd, MAX_ARGV, MAX_FILENAME};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// `|` with nothing (or only redirections) on one side.
    EmptyExec,
    /// A redirection operator with no following token.
    MissingFilename(&'static str),
    /// More than 15 argv entries in one `Exec`.
    ArgvOverflow,
    /// A redirection filename longer than 15 bytes.
    FilenameOverflow,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::EmptyExec => write!(f, "mjsh: syntax error: empty command"),
            ParseError::MissingFilename(op) => {
                write!(f, "mjsh: syntax error: expected filename after '{op}'")
            }
            ParseError::ArgvOverflow => write!(f, "mjsh: too many arguments (max {MAX_ARGV})"),
            ParseError::FilenameOverflow => {
                write!(f, "mjsh: filename too long (max {MAX_FILENAME} bytes)")
            }
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Pipe,
    Lt,
    Gt,
    Append,
    Amp,
}

/// Maximal runs of non-whitespace, non-`|<>&` are words; `|`, `<`, `&` are
/// single-char operators; `>` greedily extends to `>>`.
fn tokenize(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '|' => {
                chars.next();
                tokens.push(Token::Pipe);
            }
            '<' => {
                chars.next();
                tokens.push(Token::Lt);
            }
            '&' => {
                chars.next();
                tokens.push(Token::Amp);
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'>') {
                    chars.next();
                    tokens.push(Token::Append);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c == ' ' || c == '\t' || c == '|' || c == '<' || c == '>' || c == '&' {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }

    tokens
}

/// Parse one input line. Returns `Ok(None)` for an empty (or whitespace-only)
/// line, `Ok(Some(tree))` for a well-formed one, or `Err` for a malformed
/// one — the caller drops the line and re-prompts.
pub fn parse(line: &str) -> Result<Option<CommandTree>, ParseError> {
    let mut tokens = tokenize(line);
    if tokens.is_empty() {
        return Ok(None);
    }

    // Any `&` marks the whole pipeline background; everything at and after
    // the first one is discarded (an `&` must be the final meaningful
    // token, so later tokens on the same line are meaningless).
    let fg_bg = if let Some(amp_pos) = tokens.iter().position(|t| *t == Token::Amp) {
        tokens.truncate(amp_pos);
        true
    } else {
        false
    };

    if tokens.is_empty() {
        return Ok(None);
    }

    let mut pos = 0;
    let root = parse_pipe(&tokens, &mut pos)?;
    debug_assert_eq!(pos, tokens.len());

    Ok(Some(CommandTree {
        root,
        fg_bg,
        line: line.trim().to_string(),
    }))
}

/// `pipe ::= exec [ '|' line ]` — right-associative: the right side of a
/// `|` is parsed as a full `line` (minus background handling, which only
/// applies once, at the top), so `a | b | c` becomes `Pipe(a, Pipe(b, c))`.
fn parse_pipe(tokens: &[Token], pos: &mut usize) -> Result<Command, ParseError> {
    let left = parse_exec(tokens, pos)?;

    if *pos < tokens.len() && tokens[*pos] == Token::Pipe {
        *pos += 1;
        let right = parse_pipe(tokens, pos)?;
        return Ok(Command::Pipe(Box::new(PipeCmd { left, right })));
    }

    Ok(left)
}

/// `exec ::= atom { atom }`, consuming up to (not including) the next `|`
/// or end of input. Wraps in a `Redir` node if any redirection was seen.
fn parse_exec(tokens: &[Token], pos: &mut usize) -> Result<Command, ParseError> {
    let mut argv: Vec<String> = Vec::new();
    let mut infile: Option<String> = None;
    let mut outfile: Option<String> = None;
    let mut mode = OutputMode::Truncate;

    while *pos < tokens.len() && tokens[*pos] != Token::Pipe {
        match &tokens[*pos] {
            Token::Word(w) => {
                if argv.len() >= MAX_ARGV {
                    return Err(ParseError::ArgvOverflow);
                }
                argv.push(w.clone());
                *pos += 1;
            }
            Token::Lt => {
                *pos += 1;
                infile = Some(expect_filename(tokens, pos, "<")?);
            }
            Token::Gt => {
                *pos += 1;
                outfile = Some(expect_filename(tokens, pos, ">")?);
                mode = OutputMode::Truncate;
            }
            Token::Append => {
                *pos += 1;
                outfile = Some(expect_filename(tokens, pos, ">>")?);
                mode = OutputMode::Append;
            }
            Token::Amp | Token::Pipe => unreachable!("stripped or loop-bounded"),
        }
    }

    if argv.is_empty() {
        return Err(ParseError::EmptyExec);
    }

    let exec = Command::Exec(ExecCmd { argv });

    Ok(if infile.is_some() || outfile.is_some() {
        Command::Redir(Box::new(RedirCmd {
            inner: exec,
            infile,
            outfile,
            mode,
        }))
    } else {
        exec
    })
}

fn expect_filename(
    tokens: &[Token],
    pos: &mut usize,
    op: &'static str,
) -> Result<String, ParseError> {
    match tokens.get(*pos) {
        Some(Token::Word(w)) => {
            if w.len() > MAX_FILENAME {
                return Err(ParseError::FilenameOverflow);
            }
            *pos += 1;
            Ok(w.clone())
        }
        _ => Err(ParseError::MissingFilename(op)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Command;

    fn program_of(cmd: &Command) -> &str {
        match cmd {
            Command::Exec(e) => e.program(),
            _ => panic!("expected Exec, got {cmd:?}"),
        }
    }

    #[test]
    fn empty_line_is_none() {
        assert!(parse("").unwrap().is_none());
        assert!(parse("   \t  ").unwrap().is_none());
    }

    #[test]
    fn simple_command() {
        let tree = parse("echo hello world").unwrap().unwrap();
        match &tree.root {
            Command::Exec(e) => assert_eq!(e.argv, vec!["echo", "hello", "world"]),
            other => panic!("expected Exec, got {other:?}"),
        }
        assert!(!tree.fg_bg);
    }

    #[test]
    fn trailing_ampersand_sets_background() {
        let tree = parse("sleep 5 &").unwrap().unwrap();
        assert!(tree.fg_bg);
        match &tree.root {
            Command::Exec(e) => assert_eq!(e.argv, vec!["sleep", "5"]),
            other => panic!("expected Exec, got {other:?}"),
        }
    }

    #[test]
    fn ampersand_anywhere_marks_background_and_truncates() {
        let tree = parse("echo hi & ignored garbage").unwrap().unwrap();
        assert!(tree.fg_bg);
        match &tree.root {
            Command::Exec(e) => assert_eq!(e.argv, vec!["echo", "hi"]),
            other => panic!("expected Exec, got {other:?}"),
        }
    }

    #[test]
    fn pipe_is_right_associative() {
        let tree = parse("a | b | c").unwrap().unwrap();
        let leaves = tree.root.leaves();
        let names: Vec<&str> = leaves.iter().map(|e| e.program()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        match &tree.root {
            Command::Pipe(p) => match &p.right {
                Command::Pipe(_) => {}
                other => panic!("expected nested Pipe on the right, got {other:?}"),
            },
            other => panic!("expected Pipe, got {other:?}"),
        }
    }

    #[test]
    fn redirect_truncate() {
        let tree = parse("sort > out.txt").unwrap().unwrap();
        match &tree.root {
            Command::Redir(r) => {
                assert_eq!(r.outfile.as_deref(), Some("out.txt"));
                assert_eq!(r.mode, OutputMode::Truncate);
                assert!(r.infile.is_none());
                assert_eq!(program_of(&r.inner), "sort");
            }
            other => panic!("expected Redir, got {other:?}"),
        }
    }

    #[test]
    fn redirect_append() {
        let tree = parse("sort >> out.txt").unwrap().unwrap();
        match &tree.root {
            Command::Redir(r) => assert_eq!(r.mode, OutputMode::Append),
            other => panic!("expected Redir, got {other:?}"),
        }
    }

    #[test]
    fn later_output_redirect_wins() {
        let tree = parse("sort > a.txt >> b.txt").unwrap().unwrap();
        match &tree.root {
            Command::Redir(r) => {
                assert_eq!(r.outfile.as_deref(), Some("b.txt"));
                assert_eq!(r.mode, OutputMode::Append);
            }
            other => panic!("expected Redir, got {other:?}"),
        }
    }

    #[test]
    fn both_directions() {
        let tree = parse("sort < in.txt > out.txt").unwrap().unwrap();
        match &tree.root {
            Command::Redir(r) => {
                assert_eq!(r.infile.as_deref(), Some("in.txt"));
                assert_eq!(r.outfile.as_deref(), Some("out.txt"));
            }
            other => panic!("expected Redir, got {other:?}"),
        }
    }

    #[test]
    fn missing_filename_is_error() {
        assert_eq!(parse("echo >"), Err(ParseError::MissingFilename(">")));
    }

    #[test]
    fn empty_pipe_segment_is_error() {
        assert_eq!(parse("echo hi | "), Err(ParseError::EmptyExec));
        assert_eq!(parse(" | echo hi"), Err(ParseError::EmptyExec));
    }

    #[test]
    fn argv_boundary() {
        let fifteen = (0..15).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        let line = format!("cmd {fifteen}");
        assert!(parse(&line).unwrap().is_some());

        let sixteen = (0..16).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        let line = format!("cmd {sixteen}");
        assert_eq!(parse(&line), Err(ParseError::ArgvOverflow));
    }

    #[test]
    fn filename_boundary() {
        let name15 = "a".repeat(15);
        assert!(parse(&format!("sort > {name15}")).unwrap().is_some());

        let name16 = "a".repeat(16);
        assert_eq!(
            parse(&format!("sort > {name16}")),
            Err(ParseError::FilenameOverflow)
        );
    }

    #[test]
    fn pipe_and_redirect_combined() {
        let tree = parse("a < in.txt | b > out.txt").unwrap().unwrap();
        match &tree.root {
            Command::Pipe(p) => {
                match &p.left {
                    Command::Redir(r) => assert_eq!(r.infile.as_deref(), Some("in.txt")),
                    other => panic!("expected Redir, got {other:?}"),
                }
                match &p.right {
                    Command::Redir(r) => assert_eq!(r.outfile.as_deref(), Some("out.txt")),
                    other => panic!("expected Redir, got {other:?}"),
                }
            }
            other => panic!("expected Pipe, got {other:?}"),
        }
    }
}
