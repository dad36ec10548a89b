use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;

fn run_shell(lines: &[&str]) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_mjsh"))
        .env("PWD", std::env::temp_dir())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn mjsh");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        for line in lines {
            writeln!(stdin, "{line}").expect("write line");
        }
    }

    child.wait_with_output().expect("wait output")
}

#[test]
fn echo_prints_its_arguments() {
    let output = run_shell(&["echo hello world", "exit"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hello world"), "stdout was: {stdout}");
}

#[test]
fn pipeline_pipes_builtin_into_external() {
    let output = run_shell(&["echo banana | wc -l", "exit"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains('1'), "stdout was: {stdout}");
}

#[test]
fn output_redirection_creates_and_fills_file() {
    let dir = std::env::temp_dir().join(format!("mjsh_redir_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let out_path = dir.join("out.txt");

    let cmd = format!("echo written > {}", out_path.display());
    let _ = run_shell(&[&cmd, "exit"]);

    let contents = std::fs::read_to_string(&out_path).unwrap_or_default();
    assert!(contents.contains("written"), "file contents: {contents}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn cd_then_pwd_reflects_new_directory() {
    let target = std::env::temp_dir();
    let cmd = format!("cd {}", target.display());
    let output = run_shell(&[&cmd, "pwd", "exit"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.lines().any(|l| l.trim_end() == target.display().to_string()),
        "stdout was: {stdout}"
    );
}

#[test]
fn cd_to_missing_directory_reports_error() {
    let output = run_shell(&["cd /no/such/path/mjsh-test", "exit"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cd:"), "stderr was: {stderr}");
}

#[test]
fn background_job_is_announced_and_reaped() {
    let output = run_shell(&["sleep 1 &", "jobs", "exit"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[1]"), "stdout was: {stdout}");
}

#[test]
fn test_builtin_numeric_comparison() {
    let output = run_shell(&["test 2 -gt 1", "echo DONE:$?", "exit"]);
    // `$?` isn't expanded by this shell's grammar (no variable expansion),
    // so this just exercises that `test` runs without aborting the session.
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("DONE"), "stdout was: {stdout}");
}

#[test]
fn unknown_command_reports_not_found() {
    let output = run_shell(&["definitely-not-a-real-command-xyz", "exit"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("command not found"), "stderr was: {stderr}");
}

#[test]
fn malformed_redirection_is_a_syntax_error() {
    let output = run_shell(&["echo >", "exit"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("syntax error"), "stderr was: {stderr}");
}

#[test]
fn interactive_prompt_includes_working_directory() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_mjsh"))
        .env("PWD", std::env::temp_dir())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn mjsh");

    std::thread::sleep(Duration::from_millis(50));
    drop(child.stdin.take());
    let output = child.wait_with_output().expect("wait output");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains(&std::env::temp_dir().display().to_string()),
        "stdout was: {stdout}"
    );
}
