//! Full install/upgrade/switch/uninstall cycle against a local repository.

mod common;

use common::{git, git_at, git_available, TestContext};
use std::fs;
use std::path::Path;
use std::process::Command;

fn commit_script(repo: &Path, version: &str, epoch: i64) {
    fs::write(
        repo.join("hello.sh"),
        format!("#!/bin/sh\necho {}\n", version),
    )
    .unwrap();
    git(repo, &["add", "hello.sh"]);
    git_at(
        repo,
        &["-c", "commit.gpgsign=false", "commit", "-q", "-m", version],
        Some(epoch),
    );
}

fn run_tool(path: &Path) -> String {
    let output = Command::new(path).output().expect("Failed to run built tool");
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[test]
fn test_release_and_edge_lifecycle() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }

    let ctx = TestContext::new();
    let origin = ctx._temp_dir.path().join("origin");
    fs::create_dir_all(&origin).unwrap();
    git(&origin, &["init", "-q"]);
    git(&origin, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    commit_script(&origin, "v1", 1_700_000_000);
    git(&origin, &["-c", "tag.gpgsign=false", "tag", "v1.0.0"]);

    ctx.add_source(
        "local.yaml",
        &format!(
            r#"
name: local
permissions:
  - origins: ["file://"]
repos:
  - name: hello
    url: file://{}
    build: cp hello.sh hello && chmod +x hello
    executable: hello
"#,
            origin.display()
        ),
    );

    // First install lands on the only release.
    ctx.run(&["install", "hello"])
        .assert_success()
        .assert_stdout_contains("hello installed at v1.0.0 (release train)");
    let built = ctx.tool_dir("hello").join("hello");
    assert_eq!(run_tool(&built), "v1");

    let marker = fs::read_to_string(ctx.marker("hello")).unwrap();
    assert!(marker.contains("sourcefile: local"));
    assert!(marker.contains("updates: release"));

    let load = fs::read_to_string(ctx.root_dir.join(".load")).unwrap();
    assert!(load.contains(&format!("alias hello='{}'", built.display())));

    // Nothing new upstream.
    ctx.run(&["install", "hello"])
        .assert_success()
        .assert_stdout_contains("already up to date at v1.0.0");
    assert_eq!(fs::read_to_string(ctx.marker("hello")).unwrap(), marker);

    ctx.run(&["info", "hello", "--check"])
        .assert_success()
        .assert_stdout_contains("update train:   release")
        .assert_stdout_contains("shell alias:    hello -> ")
        .assert_stdout_contains("up to date on the release train");

    // A newer release is picked up by a full upgrade.
    commit_script(&origin, "v2", 1_700_000_100);
    git(&origin, &["-c", "tag.gpgsign=false", "tag", "v2.0.0"]);

    ctx.run(&["upgrade"])
        .assert_success()
        .assert_stdout_contains("Summary: 1 updated, 0 skipped, 0 failed");
    assert_eq!(run_tool(&built), "v2");

    // Untagged work only shows up on the edge train.
    commit_script(&origin, "v3-dev", 1_700_000_200);
    ctx.run(&["upgrade", "hello"])
        .assert_success()
        .assert_stdout_contains("already up to date at v2.0.0");
    assert_eq!(run_tool(&built), "v2");

    ctx.run(&["upgrade", "hello", "--edge"])
        .assert_success()
        .assert_stdout_contains("switched from release to edge train");
    assert_eq!(run_tool(&built), "v3-dev");
    assert!(fs::read_to_string(ctx.marker("hello"))
        .unwrap()
        .contains("updates: edge"));

    ctx.run(&["uninstall", "hello"]).assert_success();
    assert!(!ctx.tool_dir("hello").exists());
    let load = fs::read_to_string(ctx.root_dir.join(".load")).unwrap();
    assert!(!load.contains("alias hello="));
}
