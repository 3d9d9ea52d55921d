use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn cli() -> Command {
    cargo_bin_cmd!("leviso-macho")
}

#[test]
fn help_lists_subcommands() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("deps"))
        .stdout(predicate::str::contains("bundle"));
}

#[test]
fn bundle_requires_dest() {
    cli()
        .args(["bundle", "/bin/sh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--dest"));
}

#[test]
fn deps_missing_root_fails_loudly() {
    cli()
        .args(["deps", "/nonexistent/path/to/seaf-daemon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn bundle_unknown_bare_name_fails() {
    cli()
        .args(["bundle", "--dest", "Frameworks", "definitely-not-a-real-program-name"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found in PATH"));
}

#[test]
fn bundle_missing_root_leaves_no_bundle_dir() {
    let temp = tempdir().unwrap();
    let dest = temp.path().join("Frameworks");
    cli()
        .arg("bundle")
        .arg("--dest")
        .arg(&dest)
        .arg(temp.path().join("ccnet"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("root binary does not exist"));
    assert!(!dest.exists());
}

#[test]
fn bare_root_in_current_dir_is_not_looked_up_in_path() {
    let temp = tempdir().unwrap();
    std::fs::write(temp.path().join("app"), b"app").unwrap();
    cli()
        .current_dir(temp.path())
        .args(["deps", "--otool", "/nonexistent/otool", "app"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found in PATH").not())
        .stderr(predicate::str::contains("failed to inspect app"));
}
