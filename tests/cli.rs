//! End-to-end tests of the groom binary

use std::fs;
use std::io::Write;
use std::process::{Command, Output, Stdio};

use pretty_assertions::assert_eq;

fn groom(args: &[&str], cwd: &std::path::Path, stdin: Option<&str>) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_groom"))
        .args(args)
        .current_dir(cwd)
        .env_remove("GROOM_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("groom should start");
    {
        let mut input = child.stdin.take().expect("stdin");
        if let Some(text) = stdin {
            input.write_all(text.as_bytes()).expect("write stdin");
        }
    }
    child.wait_with_output().expect("groom should finish")
}

#[test]
fn test_renders_files_with_imports_and_set_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("page.grm"), r#"{{import "greet" .}}!"#).unwrap();
    fs::write(dir.path().join("greet.grm"), "Hello, {{.name}}").unwrap();

    let output = groom(&["--set", "name=Joe", "page.grm"], dir.path(), None);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Hello, Joe!");
}

#[test]
fn test_reads_stdin_relative_to_cwd() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("part.grm"), "part").unwrap();

    let output = groom(&[], dir.path(), Some(r#"[{{import "part"}}]"#));
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "[part]");
}

#[test]
fn test_html_flag_and_data_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("t.grm"), "<b>{{.v}}</b>").unwrap();
    fs::write(dir.path().join("d.json"), r#"{"v": "<i>"}"#).unwrap();

    let output = groom(&["--html", "--data", "d.json", "t.grm"], dir.path(), None);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "<b>&lt;i&gt;</b>");
}

#[test]
fn test_failure_writes_nothing_and_exits_one() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("ok.grm"), "fine").unwrap();
    fs::write(dir.path().join("bad.grm"), "{{.missing}}").unwrap();
    let out_file = dir.path().join("out.txt");

    let output = groom(
        &["-o", out_file.to_str().unwrap(), "ok.grm", "bad.grm"],
        dir.path(),
        None,
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(!out_file.exists());
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing"));
}

#[test]
fn test_entry_selects_one_template() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("lib.grm"),
        r#"{{define "a"}}A{{end}}{{define "b"}}B{{end}}"#,
    )
    .unwrap();

    let output = groom(&["--entry", "b", "lib.grm"], dir.path(), None);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "B");
}
