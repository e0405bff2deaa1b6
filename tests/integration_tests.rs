mod common;

use common::{CommandOutput, TestContext};
use std::fs;

const DEFAULT_SOURCE: &str = r#"
name: default
repos:
  - name: k9s
    url: derailed/k9s
    build: make build
    executable: execs/k9s
  - name: bat
    url: sharkdp/bat
"#;

const RESTRICTED_SOURCE: &str = r#"
name: restricted
permissions:
  - origins: ["github.com"]
repos:
  - name: y
    url: https://gitlab.com/x/y
"#;

#[test]
fn test_help_and_version() {
    let ctx = TestContext::new();

    ctx.run(&["--help"])
        .assert_success()
        .assert_stdout_contains("A package manager for tools distributed as Git repositories")
        .assert_stdout_contains("Usage: getgit");

    ctx.run(&["version"])
        .assert_success()
        .assert_stdout_contains("getgit v");
}

#[test]
fn test_config_set_get_and_show_formats() {
    let ctx = TestContext::new();
    let custom_root = ctx._temp_dir.path().join("custom-root");
    let custom_root = custom_root.to_str().unwrap();

    // GETGIT_ROOT would shadow the stored setting.
    let output: CommandOutput = ctx
        .cmd()
        .env_remove("GETGIT_ROOT")
        .args(["config", "set", "Root", custom_root])
        .output()
        .expect("Failed to run getgit")
        .into();
    output.assert_success();

    let output: CommandOutput = ctx
        .cmd()
        .env_remove("GETGIT_ROOT")
        .args(["config", "get", "root"])
        .output()
        .expect("Failed to run getgit")
        .into();
    output.assert_success().assert_stdout_contains(custom_root);

    let output = ctx.run(&["config", "show", "--format", "json"]);
    output.assert_success();
    let _: serde_json::Value =
        serde_json::from_str(&output.stdout).expect("Output was not valid JSON");
    output.assert_stdout_contains("\"root\":");

    let output = ctx.run(&["config", "show", "--format", "yaml"]);
    output.assert_success();
    let _: serde_yaml::Value =
        serde_yaml::from_str(&output.stdout).expect("Output was not valid YAML");
    output.assert_stdout_contains("root:");

    ctx.run(&["config", "set", "colour=blue"]).assert_failure();
    ctx.run(&["config", "show", "--format", "toml"]).assert_failure();
}

#[test]
fn test_info_lists_tools_and_builds_index() {
    let ctx = TestContext::new();
    ctx.add_source("default.yaml", DEFAULT_SOURCE);

    ctx.run(&["info"])
        .assert_success()
        .assert_stdout_contains("k9s (default)")
        .assert_stdout_contains("bat (default)");
    assert!(ctx.cache_dir.join("index.json").exists());

    ctx.run(&["info", "--installed"])
        .assert_success()
        .assert_stdout_contains("No tools installed yet.");

    ctx.run(&["info", "K9S"])
        .assert_success()
        .assert_stdout_contains("https://github.com/derailed/k9s.git")
        .assert_stdout_contains("K9S is not installed");
}

#[test]
fn test_install_unknown_tool_fails() {
    let ctx = TestContext::new();
    ctx.add_source("default.yaml", DEFAULT_SOURCE);

    ctx.run(&["install", "nope"])
        .assert_failure()
        .assert_stderr_contains("tool 'nope' not found in any source");
    assert!(!ctx.tool_dir("nope").exists());
}

#[test]
fn test_install_from_disallowed_origin_touches_nothing() {
    let ctx = TestContext::new();
    ctx.add_source("restricted.yaml", RESTRICTED_SOURCE);

    ctx.run(&["install", "y"])
        .assert_failure()
        .assert_stderr_contains("is not allowed in source 'restricted'");
    assert!(!ctx.tool_dir("y").exists());
}

#[test]
fn test_conflicting_train_flags_are_rejected() {
    let ctx = TestContext::new();
    ctx.add_source("default.yaml", DEFAULT_SOURCE);

    ctx.run(&["install", "k9s", "--edge", "--release"])
        .assert_failure()
        .assert_stderr_contains("cannot be used with");
    assert!(!ctx.tool_dir("k9s").exists());
}

#[test]
fn test_corrupt_marker_is_reported() {
    let ctx = TestContext::new();
    ctx.add_source("default.yaml", DEFAULT_SOURCE);
    fs::create_dir_all(ctx.tool_dir("k9s").join(".git")).unwrap();
    fs::write(
        ctx.marker("k9s"),
        "#!/bin/bash\n\n: <<'EOF'\nsourcefile: \"\"\nupdates: release\nEOF\n",
    )
    .unwrap();

    ctx.run(&["install", "k9s"])
        .assert_failure()
        .assert_stderr_contains("marker of 'k9s' is unusable");
}

#[test]
fn test_upgrade_and_uninstall_without_tools() {
    let ctx = TestContext::new();
    ctx.add_source("default.yaml", DEFAULT_SOURCE);

    ctx.run(&["upgrade"])
        .assert_success()
        .assert_stdout_contains("Summary: 0 updated, 0 skipped, 0 failed");

    ctx.run(&["upgrade", "k9s"])
        .assert_failure()
        .assert_stderr_contains("tool 'k9s' is not installed");

    ctx.run(&["uninstall", "k9s"])
        .assert_failure()
        .assert_stderr_contains("tool 'k9s' is not installed");
}

#[test]
fn test_update_index_only() {
    let ctx = TestContext::new();

    ctx.run(&["update", "--index-only"])
        .assert_failure()
        .assert_stderr_contains("No sources configured");

    ctx.add_source("default.yaml", DEFAULT_SOURCE);
    ctx.run(&["update", "--index-only"])
        .assert_success()
        .assert_stdout_contains("Tool index updated (2 tools)");

    let index = fs::read_to_string(ctx.cache_dir.join("index.json")).unwrap();
    let index: serde_json::Value = serde_json::from_str(&index).unwrap();
    assert_eq!(index["repos"].as_array().unwrap().len(), 2);
}

#[test]
fn test_update_skips_sources_without_origin() {
    let ctx = TestContext::new();
    ctx.add_source("default.yaml", DEFAULT_SOURCE);

    ctx.run(&["update"])
        .assert_success()
        .assert_stdout_contains("Source 'default' has no origin, skipping");
}

#[test]
fn test_broken_source_file_is_named() {
    let ctx = TestContext::new();
    ctx.add_source("default.yaml", DEFAULT_SOURCE);
    ctx.add_source("broken.yaml", "name: [oops");

    ctx.run(&["info"])
        .assert_failure()
        .assert_stderr_contains("broken.yaml");
}

#[test]
fn test_update_continues_past_unreachable_origins() {
    let ctx = TestContext::new();
    for name in ["a", "b"] {
        ctx.add_source(
            &format!("{}.yaml", name),
            &format!(
                "name: {name}\norigin: http://127.0.0.1:1/{name}.yaml\nrepos:\n  - name: tool-{name}\n    url: t/{name}\n"
            ),
        );
    }

    ctx.run(&["update"])
        .assert_failure()
        .assert_stderr_contains("Error updating source 'a'")
        .assert_stderr_contains("Error updating source 'b'")
        .assert_stderr_contains("2 source(s) could not be updated")
        .assert_stdout_contains("Tool index updated (2 tools)");

    let index = fs::read_to_string(ctx.cache_dir.join("index.json")).unwrap();
    let index: serde_json::Value = serde_json::from_str(&index).unwrap();
    assert_eq!(index["repos"].as_array().unwrap().len(), 2);
}

#[test]
fn test_completion_scripts() {
    let ctx = TestContext::new();

    ctx.run(&["completion", "bash"])
        .assert_success()
        .assert_stdout_contains("getgit")
        .assert_stdout_contains("uninstall");
    ctx.run(&["completion", "zsh"])
        .assert_success()
        .assert_stdout_contains("#compdef getgit");
    ctx.run(&["completion", "tcsh"]).assert_failure();

    ctx.add_source("default.yaml", DEFAULT_SOURCE);
    ctx.run(&["update", "--index-only"]).assert_success();
    let script = fs::read_to_string(ctx.root_dir.join(".bash_completion")).unwrap();
    assert!(script.contains("getgit"));
}
