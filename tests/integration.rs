use predicates::prelude::*;
use std::process::Command;

fn cmd() -> assert_cmd::Command {
    assert_cmd::Command::from(Command::new(env!("CARGO_BIN_EXE_docspan")))
}

fn fixture_path(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

// -- stdin mode --

#[test]
fn stdin_mode_emits_json_records() {
    let input = std::fs::read_to_string(fixture_path("sample.py")).unwrap();
    cmd()
        .args(["-l", "python", "-m", &fixture_path("markers.json")])
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""format": "github""#))
        .stdout(predicate::str::contains(r#""user": "Technical Development""#))
        .stdout(predicate::str::contains(r#""target_symbol": 0"#));
}

#[test]
fn stdin_mode_requires_language() {
    cmd()
        .write_stdin("x = 1\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--language"));
}

#[test]
fn stdin_mode_accepts_language_aliases() {
    let input = std::fs::read_to_string(fixture_path("sample.py")).unwrap();
    cmd()
        .args(["-l", "py", "-m", &fixture_path("markers.json"), "-f", "summary"])
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 record(s), 0 diagnostic(s)"));
}

#[test]
fn unknown_language_suggests_alternatives() {
    cmd()
        .args(["-l", "pythn"])
        .write_stdin("x = 1\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("did you mean"));
}

// -- file mode --

#[test]
fn file_mode_infers_language_from_extension() {
    cmd()
        .args([
            &fixture_path("sample.py"),
            "-m",
            &fixture_path("markers.json"),
            "-f",
            "summary",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 record(s), 0 diagnostic(s)"))
        .stdout(predicate::str::contains("[triple_quote] github / cli_doc_db"));
}

#[test]
fn file_mode_scans_fixed_column_sources() {
    cmd()
        .args([&fixture_path("sample.cob"), "-f", "summary"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 record(s), 0 diagnostic(s)"))
        .stdout(predicate::str::contains("[indicator_column]"));
}

#[test]
fn unterminated_carrier_is_reported_not_fatal() {
    cmd()
        .args([&fixture_path("unterminated.js"), "-f", "summary"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 record(s), 1 diagnostic(s)"))
        .stdout(predicate::str::contains("unterminated"));
}

#[test]
fn strict_mode_fails_on_diagnostics() {
    cmd()
        .args([&fixture_path("unterminated.js"), "--strict"])
        .assert()
        .failure();
}

#[test]
fn strict_mode_passes_clean_files() {
    cmd()
        .args([
            &fixture_path("sample.py"),
            "-m",
            &fixture_path("markers.json"),
            "--strict",
        ])
        .assert()
        .success();
}

#[test]
fn missing_input_file_is_an_error() {
    cmd()
        .arg("no/such/file.py")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no files match"));
}

// -- catalog and policy flags --

#[test]
fn custom_catalog_defines_new_language() {
    let input = "## format: github\n## purpose: cli_doc_db\n## user: dev\n";
    cmd()
        .args(["-c", &fixture_path("catalog.json"), "-l", "mn", "-f", "summary"])
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 record(s), 0 diagnostic(s)"))
        .stdout(predicate::str::contains("[hash_doc]"));
}

#[test]
fn unknown_keys_warn_by_default_and_reject_on_request() {
    let input = "def f():\n    \"\"\"\n    format: github\n    purpose: x\n    user: dev\n    notes: extra\n    \"\"\"\n    return 1\n";

    cmd()
        .args(["-l", "python", "-m", &fixture_path("markers.json"), "-f", "summary"])
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 record(s), 0 diagnostic(s)"))
        .stdout(predicate::str::contains("unknown key"));

    cmd()
        .args([
            "-l",
            "python",
            "-m",
            &fixture_path("markers.json"),
            "--unknown-keys",
            "reject",
            "-f",
            "summary",
        ])
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 record(s), 1 diagnostic(s)"));
}
