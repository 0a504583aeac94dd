use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

const EXPORT: &str = "tests/fixtures/search_console_export.csv";

fn pagemerger(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pagemerger"))
        .args(args)
        .env_remove("PAGEMERGER_ACCESS_TOKEN")
        .output()
        .expect("run CLI")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn run_to_file(dir: &Path, name: &str, extra: &[&str]) -> (Output, String) {
    let out = dir.join(name);
    let out_str = out.to_str().expect("utf-8 temp path");
    let mut args = vec!["--input", EXPORT, "--output", out_str, "--min-impressions", "50"];
    args.extend_from_slice(extra);

    let output = pagemerger(&args);
    let written = std::fs::read_to_string(&out).unwrap_or_default();
    (output, written)
}

#[test]
fn cli_writes_flat_csv() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (output, written) = run_to_file(dir.path(), "merges.csv", &["--position-threshold", "10"]);

    assert!(
        output.status.success(),
        "cli exited with {}: {}",
        output.status,
        stderr(&output)
    );
    assert_eq!(written, include_str!("fixtures/expected_threshold_10.csv"));
}

#[test]
fn cli_higher_threshold_flags_fewer_pages() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (output, written) = run_to_file(dir.path(), "merges.csv", &["--position-threshold", "20"]);

    assert!(output.status.success(), "{}", stderr(&output));
    let lines: Vec<_> = written.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "cats,/b,/a,100,5,25,100,10,5");
    assert_eq!(lines[2], "birds,/birds/40,/birds/2,700,1,40,900,40,2");
}

#[test]
fn cli_nothing_to_merge_keeps_header() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (output, written) = run_to_file(dir.path(), "merges.csv", &["--position-threshold", "100"]);

    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(written.lines().count(), 1);
    assert!(stderr(&output).contains("Nothing to merge"));
}

#[test]
fn cli_markdown_report() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (output, written) = run_to_file(
        dir.path(),
        "merges.md",
        &["--position-threshold", "10", "--format", "markdown"],
    );

    assert!(output.status.success(), "{}", stderr(&output));
    assert!(written.contains("### birds"));
    assert!(written.contains("**Merge into:** `/birds/2`"));
    assert!(!written.contains("### fish"));
    assert!(!written.contains("### dogs"));
}

#[test]
fn cli_grouped_csv() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (output, written) = run_to_file(
        dir.path(),
        "merges.csv",
        &["--position-threshold", "10", "--group-by-query"],
    );

    assert!(output.status.success(), "{}", stderr(&output));
    let lines: Vec<_> = written.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[2].starts_with("birds,\"/birds/15, /birds/40\""));
}

#[test]
fn cli_reads_stdin_and_writes_stdout() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_pagemerger"))
        .args(["--input", "-", "--output", "-", "--min-impressions", "0", "--quiet"])
        .env_remove("PAGEMERGER_ACCESS_TOKEN")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn CLI");

    child
        .stdin
        .as_mut()
        .expect("stdin open")
        .write_all(b"query,page,impressions,clicks,position\ncats,/a,100,10,5.0\ncats,/b,100,5,25.0\n")
        .expect("write stdin");

    let output = child.wait_with_output().expect("read CLI output");
    assert!(output.status.success(), "{}", stderr(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1], "cats,/b,/a,100,5,25,100,10,5");
}

#[test]
fn cli_rejects_malformed_rows() {
    let dir = tempfile::tempdir().expect("temp dir");
    let out = dir.path().join("merges.csv");
    let output = pagemerger(&[
        "--input",
        "tests/fixtures/malformed.csv",
        "--output",
        out.to_str().expect("utf-8 temp path"),
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("schema error in row 2, field `clicks`"));
    assert!(!out.exists());
}

#[test]
fn cli_rejects_negative_min_impressions() {
    let output = pagemerger(&["--input", EXPORT, "--min-impressions", "-1", "--dry-run"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("min_impressions must be >= 0"));
}

#[test]
fn cli_rejects_zero_position_threshold() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (output, _) = run_to_file(dir.path(), "merges.csv", &["--position-threshold", "0"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("position_threshold must be a positive number"));
}

#[test]
fn cli_dry_run_rejects_bad_position_threshold() {
    for threshold in ["0", "-5"] {
        let output = pagemerger(&[
            "--input",
            EXPORT,
            "--position-threshold",
            threshold,
            "--dry-run",
            "--quiet",
        ]);

        assert_eq!(output.status.code(), Some(1), "threshold {}", threshold);
        assert!(stderr(&output).contains("position_threshold must be a positive number"));
        assert!(!stderr(&output).contains("input is valid"));
    }
}

#[test]
fn cli_fails_on_malformed_default_config() {
    let dir = tempfile::tempdir().expect("temp dir");
    std::fs::write(
        dir.path().join(".pagemerger.toml"),
        "[thresholds]\nmin_impressions = \"fifty\"\n",
    )
    .expect("write config");
    let export = Path::new(env!("CARGO_MANIFEST_DIR")).join(EXPORT);

    let output = Command::new(env!("CARGO_BIN_EXE_pagemerger"))
        .args(["--input", export.to_str().expect("utf-8 path"), "--output", "-", "--quiet"])
        .current_dir(dir.path())
        .env_remove("PAGEMERGER_ACCESS_TOKEN")
        .output()
        .expect("run CLI");

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Failed to parse config file"));
    assert!(output.stdout.is_empty());
}

#[test]
fn cli_fail_on_candidates() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (output, written) = run_to_file(
        dir.path(),
        "merges.csv",
        &["--position-threshold", "10", "--fail-on-candidates"],
    );

    assert_eq!(output.status.code(), Some(2));
    assert!(!written.is_empty());
}

#[test]
fn cli_dry_run_writes_nothing() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (output, written) = run_to_file(dir.path(), "merges.csv", &["--dry-run"]);

    assert!(output.status.success(), "{}", stderr(&output));
    assert!(written.is_empty());
    assert!(stderr(&output).contains("Rows kept: 7"));
}

#[test]
fn cli_requires_a_source() {
    let output = pagemerger(&["--output", "-"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("--input or --site"));
}
