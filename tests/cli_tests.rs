//! Binary-level tests for the `spicy` CLI: exit codes, diagnostic output,
//! `--check-only`, and `-o` canonical output.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn spicy() -> Command {
    Command::cargo_bin("spicy").expect("spicy binary builds")
}

fn write_program(dir: &TempDir, name: &str, source: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, source).expect("write test program");
    path
}

#[test]
fn test_runs_valid_program() {
    let dir = TempDir::new().unwrap();
    let path = write_program(&dir, "ok.spc", "print(6 * 7);");

    spicy()
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::eq("42\n"));
}

#[test]
fn test_checker_errors_exit_one() {
    let dir = TempDir::new().unwrap();
    let path = write_program(&dir, "bad.spc", "final class F {} class G extends F {}");

    spicy()
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[ExtendsFinalClass]"));
}

#[test]
fn test_missing_file_exits_two() {
    spicy()
        .arg("does-not-exist.spc")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn test_check_only_does_not_execute() {
    let dir = TempDir::new().unwrap();
    let path = write_program(&dir, "quiet.spc", "print(\"should not appear\");");

    spicy()
        .arg(&path)
        .arg("--check-only")
        .assert()
        .success()
        .stdout(predicate::eq(""));

    // --emit=check behaves the same way.
    spicy()
        .arg(&path)
        .arg("--emit=check")
        .assert()
        .success()
        .stdout(predicate::eq(""));
}

#[test]
fn test_uncaught_exception_prints_diagnostic() {
    let dir = TempDir::new().unwrap();
    let path = write_program(&dir, "boom.spc", "raise ValueError(\"boom\");");

    spicy()
        .arg(&path)
        .assert()
        .code(1)
        .stderr(
            predicate::str::contains("error[ValueError]")
                .and(predicate::str::contains("uncaught exception: boom")),
        );
}

#[test]
fn test_output_writes_canonical_form() {
    let dir = TempDir::new().unwrap();
    let path = write_program(&dir, "fmt.spc", "x   =   1;   print( x );");
    let out_path = dir.path().join("canonical.spc");

    spicy()
        .arg(&path)
        .arg("--check-only")
        .arg("-o")
        .arg(&out_path)
        .assert()
        .success();

    let canonical = fs::read_to_string(&out_path).expect("canonical output written");
    assert_eq!(canonical, "x = 1;\nprint(x);\n");
}

#[test]
fn test_verbose_adds_notes() {
    let dir = TempDir::new().unwrap();
    let source = "abstract class A { abstract def m() -> int; } class B extends A {}";
    let path = write_program(&dir, "notes.spc", source);

    // Without -v the note frames stay hidden.
    spicy().arg(&path).assert().code(1).stderr(
        predicate::str::contains("error[ConcreteClassHasAbstractMembers]")
            .and(predicate::str::contains("note:").not()),
    );

    spicy()
        .arg(&path)
        .arg("-v")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("note: missing: def m() -> int"));
}

#[test]
fn test_warnings_do_not_fail_the_run() {
    let dir = TempDir::new().unwrap();
    let source = "\
        class P { def __init__(self) { self.x = 0; } } \
        class C extends P { def __init__(self) { self.y = 1; } } \
        print(C().y);";
    let path = write_program(&dir, "warn.spc", source);

    spicy()
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::eq("1\n"))
        .stderr(predicate::str::contains("warning[MissingSuperInit]"));
}

#[test]
fn test_bom_tolerated() {
    let dir = TempDir::new().unwrap();
    let path = write_program(&dir, "bom.spc", "\u{feff}print(1);");

    spicy()
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::eq("1\n"));
}
