#![allow(
    clippy::expect_used,
    reason = "integration tests prefer expect for expressive failures"
)]

//! End-to-end scenarios for the `gen` command.
//!
//! Each test lays out a small source tree under a temporary directory,
//! points the driver at it with `-C`, and asserts on the exit outcome and
//! the files left under the output directory.

use std::fs;
use std::path::Path;

use clap::Parser;
use kanna::cli::Cli;
use kanna::runner;
use tempfile::TempDir;

fn write_tree(files: &[(&str, &str)]) -> TempDir {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join(".kanna"), "").expect("root marker");
    for (path, content) in files {
        let full = temp.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(&full, content).expect("write");
    }
    temp
}

fn run_gen(root: &Path, extra: &[&str]) -> anyhow::Result<()> {
    let root = root.to_str().expect("utf8 root");
    let mut argv = vec!["kanna", "-C", root, "gen", "out"];
    argv.extend_from_slice(extra);
    let cli = Cli::try_parse_from(argv).expect("parse argv");
    runner::run(&cli)
}

#[test]
fn single_target_generates_rules_and_args_file() {
    let temp = write_tree(&[(
        "Kannafile",
        concat!(
            "targets:\n",
            "  - name: hello\n",
            "    type: executable\n",
            "    sources: [hello.cc, main.cc]\n",
        ),
    )]);
    run_gen(temp.path(), &["--quiet"]).expect("gen succeeds");

    let ninja = fs::read_to_string(temp.path().join("out/build.ninja")).expect("build.ninja");
    assert!(ninja.contains("# //:hello(//build/toolchain:default)"));
    assert!(ninja.contains("build bin/hello: link"));
    let args = fs::read_to_string(temp.path().join("out/args.kanna")).expect("args.kanna");
    assert_eq!(args, "");
}

#[test]
fn public_dep_chain_satisfies_generated_inputs() {
    let temp = write_tree(&[
        (
            "Kannafile",
            concat!(
                "targets:\n",
                "  - name: a\n",
                "    type: executable\n",
                "    sources: [a.cc]\n",
                "    inputs: [\"//out/gen/b.h\"]\n",
                "    public_deps: [\"//gen:b\"]\n",
            ),
        ),
        (
            "gen/Kannafile",
            concat!(
                "targets:\n",
                "  - name: b\n",
                "    type: action\n",
                "    script: make_b.py\n",
                "    outputs: [\"//out/gen/b.h\"]\n",
            ),
        ),
    ]);
    run_gen(temp.path(), &["--quiet"]).expect("gen succeeds");
}

#[test]
fn data_dep_only_chain_fails_validation_with_public_deps_hint() {
    let temp = write_tree(&[
        (
            "Kannafile",
            concat!(
                "targets:\n",
                "  - name: a\n",
                "    type: executable\n",
                "    sources: [a.cc]\n",
                "    inputs: [\"//out/gen/b.h\"]\n",
                "    data_deps: [\"//gen:b\"]\n",
            ),
        ),
        (
            "gen/Kannafile",
            concat!(
                "targets:\n",
                "  - name: b\n",
                "    type: action\n",
                "    outputs: [\"//out/gen/b.h\"]\n",
            ),
        ),
    ]);
    let err = run_gen(temp.path(), &["--quiet"]).expect_err("validation fails");
    assert!(err.to_string().contains("unknown generated input"));
}

#[test]
fn ungenerated_input_fails_validation() {
    let temp = write_tree(&[(
        "Kannafile",
        concat!(
            "targets:\n",
            "  - name: a\n",
            "    type: executable\n",
            "    sources: [a.cc]\n",
            "    inputs: [\"//out/gen/b.h\"]\n",
        ),
    )]);
    let err = run_gen(temp.path(), &["--quiet"]).expect_err("validation fails");
    assert!(err.to_string().contains("unknown generated input"));
}

#[test]
fn dependency_cycle_names_both_labels() {
    let temp = write_tree(&[
        (
            "a/Kannafile",
            "targets:\n  - name: a\n    type: group\n    deps: [\"//b:b\"]\n",
        ),
        (
            "b/Kannafile",
            "targets:\n  - name: b\n    type: group\n    deps: [\"//a:a\"]\n",
        ),
        (
            "Kannafile",
            "targets:\n  - name: all\n    type: group\n    deps: [\"//a:a\"]\n",
        ),
    ]);
    let err = run_gen(temp.path(), &["--quiet"]).expect_err("cycle fails");
    let message = format!("{err:#}");
    assert!(message.contains("//a:a"), "missing //a:a in: {message}");
    assert!(message.contains("//b:b"), "missing //b:b in: {message}");
}

#[test]
fn unknown_ide_tag_is_rejected() {
    let temp = write_tree(&[(
        "Kannafile",
        "targets:\n  - name: x\n    type: group\n",
    )]);
    let err = run_gen(temp.path(), &["--ide=unknown", "--quiet"]).expect_err("unknown ide");
    assert_eq!(format!("{err}"), "Unknown IDE: unknown");
}

#[test]
fn rerunning_with_unchanged_inputs_is_byte_identical() {
    let temp = write_tree(&[
        (
            "Kannafile",
            concat!(
                "targets:\n",
                "  - name: app\n",
                "    type: executable\n",
                "    sources: [main.cc]\n",
                "    deps: [\"//base:base\"]\n",
            ),
        ),
        (
            "base/Kannafile",
            "targets:\n  - name: base\n    type: static_library\n    sources: [base.cc]\n",
        ),
    ]);
    run_gen(temp.path(), &["--quiet"]).expect("first gen");
    let first = fs::read(temp.path().join("out/build.ninja")).expect("first read");
    run_gen(temp.path(), &["--quiet"]).expect("second gen");
    let second = fs::read(temp.path().join("out/build.ninja")).expect("second read");
    assert_eq!(first, second);
}

#[test]
fn json_ide_writer_emits_project_json() {
    let temp = write_tree(&[(
        "Kannafile",
        "targets:\n  - name: x\n    type: group\n",
    )]);
    run_gen(temp.path(), &["--ide=json", "--quiet"]).expect("gen succeeds");
    let json = fs::read_to_string(temp.path().join("out/project.json")).expect("project.json");
    assert!(json.contains("\"//:x(//build/toolchain:default)\""));
}

#[test]
fn compile_commands_exporter_runs_independently() {
    let temp = write_tree(&[(
        "Kannafile",
        "targets:\n  - name: app\n    type: executable\n    sources: [main.cc]\n",
    )]);
    run_gen(temp.path(), &["--export-compile-commands", "--quiet"]).expect("gen succeeds");
    assert!(temp.path().join("out/compile_commands.json").is_file());
}

#[test]
fn user_supplied_args_land_in_args_file() {
    let temp = write_tree(&[(
        "Kannafile",
        "targets:\n  - name: x\n    type: group\n",
    )]);
    run_gen(temp.path(), &["--args=is_debug: true", "--quiet"]).expect("gen succeeds");
    let args = fs::read_to_string(temp.path().join("out/args.kanna")).expect("args.kanna");
    assert_eq!(args, "is_debug: true");
}

#[test]
fn non_default_toolchain_rules_get_their_own_file() {
    let temp = write_tree(&[(
        "Kannafile",
        concat!(
            "targets:\n",
            "  - name: host_tool\n",
            "    type: executable\n",
            "    sources: [tool.cc]\n",
            "    toolchain: \"//tc:alt\"\n",
            "  - name: app\n",
            "    type: executable\n",
            "    sources: [main.cc]\n",
        ),
    )]);
    run_gen(temp.path(), &["--quiet"]).expect("gen succeeds");

    let main = fs::read_to_string(temp.path().join("out/build.ninja")).expect("build.ninja");
    assert!(main.contains("subninja toolchain_alt.ninja"));
    assert!(!main.contains("host_tool"));
    let alt =
        fs::read_to_string(temp.path().join("out/toolchain_alt.ninja")).expect("toolchain file");
    assert!(alt.contains("# //:host_tool(//tc:alt)"));
    assert!(alt.contains("build alt/bin/host_tool: link"));
}

#[test]
fn duplicate_definitions_fail_resolution() {
    let temp = write_tree(&[(
        "Kannafile",
        concat!(
            "targets:\n",
            "  - name: x\n",
            "    type: group\n",
            "  - name: x\n",
            "    type: group\n",
        ),
    )]);
    let err = run_gen(temp.path(), &["--quiet"]).expect_err("duplicate fails");
    assert!(format!("{err:#}").contains("duplicate definition of //:x"));
}
