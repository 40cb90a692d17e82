use std::path::PathBuf;
use std::process::Command;

fn binary_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.push("basprof");
    if cfg!(windows) {
        path.set_extension("exe");
    }
    path
}

fn fixture(parts: &[&str]) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures");
    for p in parts {
        path.push(p);
    }
    path.to_string_lossy().into_owned()
}

fn run_basprof(args: &[&str]) -> (String, String, i32) {
    let bin = binary_path();
    let output = Command::new(&bin)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run {:?}: {}", bin, e));
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);
    (stdout, stderr, code)
}

// ── Source and profiler ──

#[test]
fn source_with_log_is_merged() {
    let (stdout, _, code) = run_basprof(&[&fixture(&["demo", "demo.bas"])]);
    assert_eq!(code, 0);
    assert!(stdout.contains("  program: demo\n"));
    assert!(stdout.contains("  mode: sourceAndProfiler\n"));
    assert!(stdout.contains("- name: Main Program\n"));
    assert!(stdout.contains("- name: lib.inc\n"));
}

#[test]
fn csv_argument_loads_same_program() {
    let (stdout, _, code) = run_basprof(&[&fixture(&["demo", "demo.csv"])]);
    assert_eq!(code, 0);
    assert!(stdout.contains("  mode: sourceAndProfiler\n"));
}

#[test]
fn bare_name_argument() {
    let (stdout, _, code) = run_basprof(&[&fixture(&["demo", "demo"])]);
    assert_eq!(code, 0);
    assert!(stdout.contains("  program: demo\n"));
}

#[test]
fn function_profile_is_inferred() {
    let (stdout, _, _) = run_basprof(&[&fixture(&["demo", "demo"]), "--no-lines"]);
    assert!(stdout.contains("- name: Plot\n  kind: sub\n  at: \"lib.inc:2\"\n  calls: 5\n  avgTimeMicros: 8.4\n"));
    assert!(stdout.contains("- name: Square\n  kind: function\n  at: \"Main Program:11\"\n  calls: 1\n  avgTimeMicros: 6.2\n"));
}

#[test]
fn references_point_at_call_sites() {
    let (stdout, _, _) = run_basprof(&[&fixture(&["demo", "demo"]), "--no-lines"]);
    assert!(stdout.contains("  references:\n  - \"Main Program:7\"\n"));
    assert!(stdout.contains("  references:\n  - \"Main Program:9\"\n"));
}

#[test]
fn file_totals_include_function_averages() {
    let (stdout, _, _) = run_basprof(&[&fixture(&["demo", "demo"]), "--no-lines"]);
    assert!(stdout.contains("- name: Main Program\n  path: demo.bas\n  firstIndex: 0\n"));
    assert!(stdout.contains("  timeMicros: 32.7\n"));
    assert!(stdout.contains("  timeMicros: 8.4\n"));
}

#[test]
fn comments_and_includes_are_not_listed() {
    let (stdout, _, _) = run_basprof(&[&fixture(&["demo", "demo"])]);
    assert!(stdout.contains("lines:\n- file: Main Program\n"));
    assert!(!stdout.contains("demo program"));
    assert!(!stdout.contains("kind: include"));
    assert!(stdout.contains("comment: \"' squared\""));
}

#[test]
fn line_levels_follow_nesting() {
    let (stdout, _, _) = run_basprof(&[&fixture(&["demo", "demo"])]);
    assert!(stdout.contains("  - no: 7\n    kind: code\n    level: 1\n"));
    assert!(stdout.contains("  - no: 8\n    kind: code\n    level: 0\n"));
}

// ── Ordering and layout ──

#[test]
fn sort_by_name() {
    let (stdout, _, _) = run_basprof(&[&fixture(&["demo", "demo"]), "--sort", "name", "--no-lines"]);
    let plot = stdout.find("- name: Plot").unwrap();
    let square = stdout.find("- name: Square").unwrap();
    assert!(plot < square);
}

#[test]
fn top_limits_functions() {
    let (stdout, _, _) = run_basprof(&[&fixture(&["demo", "demo"]), "--sort", "calls", "--top", "1", "--no-lines"]);
    assert!(stdout.contains("- name: Plot"));
    assert!(!stdout.contains("- name: Square"));
}

#[test]
fn outline_groups_functions() {
    let (stdout, _, code) = run_basprof(&[&fixture(&["demo", "demo"]), "--outline"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("outline:\n"));
    assert!(stdout.contains("  - function: Square\n"));
    assert!(stdout.contains("  - function: Plot\n"));
    assert!(!stdout.contains("\nlines:\n"));
}

#[test]
fn json_output() {
    let (stdout, _, code) = run_basprof(&[&fixture(&["demo", "demo"]), "--format", "json", "--no-lines"]);
    assert_eq!(code, 0);
    let trimmed = stdout.trim();
    assert!(trimmed.starts_with('{'));
    assert!(trimmed.ends_with('}'));
    assert!(trimmed.contains("\"mode\":\"sourceAndProfiler\""));
    assert!(trimmed.contains("\"name\":\"Plot\",\"kind\":\"sub\""));
}

#[test]
fn output_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("report.yaml");
    let (stdout, _, code) = run_basprof(&[&fixture(&["demo", "demo"]), "--output", out.to_str().unwrap()]);
    assert_eq!(code, 0);
    assert!(stdout.is_empty());
    let written = std::fs::read_to_string(&out).unwrap();
    assert!(written.contains("mode: sourceAndProfiler"));
}

// ── Log only ──

#[test]
fn log_without_source() {
    let (stdout, _, code) = run_basprof(&[&fixture(&["logonly", "run.csv"])]);
    assert_eq!(code, 0);
    assert!(stdout.contains("  mode: profilerOnly\n"));
    assert!(stdout.contains("- name: lib.inc\n"));
    assert!(stdout.contains("- name: Plot\n"));
}

// ── Errors ──

#[test]
fn missing_program() {
    let (stdout, _, code) = run_basprof(&[&fixture(&["demo", "nothing"])]);
    assert_eq!(code, 1);
    assert!(stdout.contains("error: \"File not found:"));
    assert!(!stdout.contains("files:"));
}

#[test]
fn bad_log_header() {
    let (stdout, _, code) = run_basprof(&[&fixture(&["badlog", "bad"])]);
    assert_eq!(code, 1);
    assert!(stdout.contains("Bad file format"));
}

#[test]
fn missing_include() {
    let (stdout, _, code) = run_basprof(&[&fixture(&["badinclude", "prog.bas"])]);
    assert_eq!(code, 1);
    assert!(stdout.contains("gone.inc"));
}

#[test]
fn verbose_logs_go_to_stderr() {
    let (stdout, stderr, code) = run_basprof(&[&fixture(&["demo", "demo"]), "-v", "--no-lines"]);
    assert_eq!(code, 0);
    assert!(stderr.contains("program loaded"));
    assert!(!stdout.contains("program loaded"));
}

// ── Help and Version ──

#[test]
fn help_flag() {
    let (stdout, _, code) = run_basprof(&["--help"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("--outline"));
}

#[test]
fn version_flag() {
    let (stdout, _, code) = run_basprof(&["--version"]);
    assert_eq!(code, 0);
    assert!(stdout.trim().contains("0.1."));
}

#[test]
fn unknown_flag_fails() {
    let (_, stderr, code) = run_basprof(&["demo", "--bogus"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("--bogus"));
}
