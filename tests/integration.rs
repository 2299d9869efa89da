use assert_cmd::Command;
use pretty_assertions::assert_eq;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

fn smallc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_smallc"))
}

fn source_file(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

macro_rules! smallc_test {
    ($name:tt, $code:expr) => {
        #[test]
        fn $name() {
            let path = Path::new("test_data").join(stringify!($name));
            let expected_stdout =
                fs::read_to_string(path.join("stdout")).expect("Failed to read stdout file");
            let stdin = fs::read_to_string(path.join("stdin")).unwrap_or_default();
            let out = tempfile::tempdir().unwrap();

            smallc()
                .arg("--run")
                .arg("-o")
                .arg(out.path())
                .arg(path.join("input.small"))
                .write_stdin(stdin)
                .assert()
                .code($code)
                .stdout(expected_stdout);
            assert!(out.path().join("input.j").exists());
        }
    };

    ($name:tt) => {
        smallc_test!($name, 0);
    };
}

smallc_test!(hello);
smallc_test!(while_loop);
smallc_test!(until_loop);
smallc_test!(loop_control);
smallc_test!(fizzbuzz);
smallc_test!(text_ops);
smallc_test!(read_input);
smallc_test!(hex_and_shifts);
smallc_test!(divide_by_zero, 1);

#[test]
fn listing_matches_template() {
    let dir = tempfile::tempdir().unwrap();
    let file = source_file(dir.path(), "Hi.small", "print \"Hi\"\n");

    smallc().args(["-o", dir.path().to_str().unwrap(), &file]).assert().success();

    let listing = fs::read_to_string(dir.path().join("Hi.j")).unwrap();
    assert_eq!(
        listing,
        "\
.class public Hi
.super java/lang/Object

.method public <init>()V
  .limit stack 10
  aload_0
  invokespecial java/lang/Object/<init>()V
  return
.end method

.method public static main([Ljava/lang/String;)V
  .limit stack 10
  ldc \"Hi\"
  invokestatic small/Library/print(Ljava/lang/String;)V
  return
  .limit locals 1
.end method
"
    );
}

#[test]
fn comparison_listing_uses_fresh_labels() {
    let dir = tempfile::tempdir().unwrap();
    let file = source_file(dir.path(), "Cmp.small", "b = 1 < 2");

    smallc().args(["-o", dir.path().to_str().unwrap(), &file]).assert().success();

    let listing = fs::read_to_string(dir.path().join("Cmp.j")).unwrap();
    let body: Vec<&str> = listing
        .lines()
        .skip_while(|line| !line.starts_with(".method public static main"))
        .skip(2)
        .take(9)
        .collect();
    assert_eq!(
        body,
        vec![
            "  ldc 1",
            "  ldc 2",
            "  if_icmplt TRUE_VAL#0",
            "  iconst_0",
            "  goto MERGE_VAL#1",
            "TRUE_VAL#0:",
            "  iconst_1",
            "MERGE_VAL#1:",
            "  istore 1",
        ]
    );
}

#[test]
fn parse_errors_skip_code_generation() {
    let dir = tempfile::tempdir().unwrap();
    let file = source_file(dir.path(), "Bad.small", "if then print 1 end");

    smallc()
        .args(["-o", dir.path().to_str().unwrap(), &file])
        .assert()
        .failure()
        .stderr(predicate::str::contains("syntax error"))
        .stderr(predicate::str::contains("errors while parsing"));
    assert!(!dir.path().join("Bad.j").exists());
}

#[test]
fn lexical_errors_name_the_character() {
    let dir = tempfile::tempdir().unwrap();
    let file = source_file(dir.path(), "Lex.small", "x = 1 @");

    smallc()
        .args(["-o", dir.path().to_str().unwrap(), &file])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1:7: lexical error: Unexpected character '@'"))
        .stderr(predicate::str::contains("x = 1 @\n      ^\n"));
}

#[test]
fn syntax_errors_underline_the_token() {
    let dir = tempfile::tempdir().unwrap();
    let file = source_file(dir.path(), "Then.small", "x = 1\nif x print 1 end\n");

    smallc()
        .args(["-o", dir.path().to_str().unwrap(), &file])
        .assert()
        .failure()
        .stderr(predicate::str::contains("2:6: syntax error: Found 'print' when expecting 'then'"))
        .stderr(predicate::str::contains("if x print 1 end\n     ^^^^^\n"));
}

#[test]
fn semantic_errors_still_write_listing() {
    let dir = tempfile::tempdir().unwrap();
    let file = source_file(dir.path(), "Mismatch.small", "x$ = 1\nprint 2\n");

    smallc()
        .args(["-o", dir.path().to_str().unwrap(), &file])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "semantic error: Attempt to assign int value to string variable 'x$'",
        ))
        .stderr(predicate::str::contains("1 errors during code generation"));

    let listing = fs::read_to_string(dir.path().join("Mismatch.j")).unwrap();
    assert!(!listing.contains("store"));
}

#[test]
fn break_outside_loop_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let file = source_file(dir.path(), "Brk.small", "break");

    smallc()
        .args(["-o", dir.path().to_str().unwrap(), &file])
        .assert()
        .failure()
        .stderr(predicate::str::contains("outside a loop").count(1));
}

#[test]
fn one_bad_file_does_not_stop_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("Missing.small");
    let good = source_file(dir.path(), "Good.small", "print 1");

    smallc()
        .args([
            "-o",
            dir.path().to_str().unwrap(),
            missing.to_str().unwrap(),
            &good,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No file called"));
    assert!(dir.path().join("Good.j").exists());
}

#[test]
fn library_class_is_configurable() {
    let dir = tempfile::tempdir().unwrap();
    let file = source_file(dir.path(), "Lib.small", "print 1");

    smallc()
        .args(["-o", dir.path().to_str().unwrap(), "--library", "rt/Io", &file])
        .assert()
        .success();

    let listing = fs::read_to_string(dir.path().join("Lib.j")).unwrap();
    assert!(listing.contains("invokestatic rt/Io/print(I)V"));
}

#[test]
fn assembler_runs_on_clean_listing() {
    let dir = tempfile::tempdir().unwrap();
    let file = source_file(dir.path(), "Asm.small", "print 1");

    smallc()
        .args(["-o", dir.path().to_str().unwrap(), "--assembler", "echo", &file])
        .assert()
        .success()
        .stdout(predicate::str::contains("Asm.j"));
}

#[test]
fn assembler_is_skipped_after_generation_errors() {
    let dir = tempfile::tempdir().unwrap();
    let file = source_file(dir.path(), "Skip.small", "x$ = 1");

    smallc()
        .args(["-o", dir.path().to_str().unwrap(), "--assembler", "false", &file])
        .assert()
        .failure()
        .stderr(predicate::str::contains("errors during code generation"))
        .stderr(predicate::str::contains("assembler").not());
}

#[test]
fn missing_assembler_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let file = source_file(dir.path(), "Asm.small", "print 1");

    smallc()
        .args([
            "-o",
            dir.path().to_str().unwrap(),
            "--assembler",
            "no-such-assembler-xyz",
            &file,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not be started"));
}

#[test]
fn no_files_is_a_usage_error() {
    smallc().assert().failure().stderr(predicate::str::contains("Usage"));
}
