#![allow(
    clippy::expect_used,
    reason = "integration tests prefer expect for expressive failures"
)]

//! Determinism of the emitted Ninja files.
//!
//! The aggregator receives fragments in worker completion order; its final
//! label sort must make the output independent of the worker count.

use std::fs;
use std::path::Path;

use clap::Parser;
use kanna::cli::Cli;
use kanna::runner;
use rstest::rstest;
use tempfile::TempDir;

/// A tree wide enough that different worker counts interleave differently.
fn write_wide_tree() -> TempDir {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join(".kanna"), "").expect("root marker");

    let mut root = String::from("targets:\n  - name: all\n    type: group\n    deps:\n");
    for index in 0..12 {
        root.push_str(&format!("      - \"//lib{index}:lib{index}\"\n"));
    }
    fs::write(temp.path().join("Kannafile"), root).expect("root Kannafile");

    for index in 0..12 {
        let dir = temp.path().join(format!("lib{index}"));
        fs::create_dir_all(&dir).expect("mkdir");
        let mut content = format!(
            "targets:\n  - name: lib{index}\n    type: static_library\n    sources: [a.cc, b.cc]\n"
        );
        if index > 0 {
            content.push_str(&format!("    deps: [\"//lib{}:lib{}\"]\n", index - 1, index - 1));
        }
        fs::write(dir.join("Kannafile"), content).expect("lib Kannafile");
    }
    temp
}

fn run_gen(root: &Path, threads: &str) {
    let root = root.to_str().expect("utf8 root");
    let cli = Cli::try_parse_from(["kanna", "-C", root, "gen", "out", "-j", threads, "--quiet"])
        .expect("parse argv");
    runner::run(&cli).expect("gen succeeds");
}

#[rstest]
#[case("1")]
#[case("2")]
#[case("8")]
fn output_is_identical_for_any_worker_count(#[case] threads: &str) {
    let baseline_tree = write_wide_tree();
    run_gen(baseline_tree.path(), "1");
    let baseline =
        fs::read(baseline_tree.path().join("out/build.ninja")).expect("baseline build.ninja");

    let tree = write_wide_tree();
    run_gen(tree.path(), threads);
    let output = fs::read(tree.path().join("out/build.ninja")).expect("build.ninja");
    assert_eq!(baseline, output);
}

#[test]
fn repeated_runs_do_not_rewrite_unchanged_files() {
    let tree = write_wide_tree();
    run_gen(tree.path(), "4");
    let path = tree.path().join("out/build.ninja");
    let first_mtime = fs::metadata(&path).expect("metadata").modified().expect("mtime");
    run_gen(tree.path(), "4");
    let second_mtime = fs::metadata(&path).expect("metadata").modified().expect("mtime");
    assert_eq!(first_mtime, second_mtime);
}
