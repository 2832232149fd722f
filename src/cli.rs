//! Command line interface definition using clap.
//!
//! This module defines the [`Cli`] structure and the `gen` subcommand's
//! options. It stays free of crate-internal imports so the build script can
//! include it for man page generation.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Maximum worker thread count accepted by the CLI.
const MAX_THREADS: usize = 512;

fn parse_threads(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("{s} is not a valid number"))?;
    if (1..=MAX_THREADS).contains(&value) {
        Ok(value)
    } else {
        Err(format!("threads must be between 1 and {MAX_THREADS}"))
    }
}

/// A meta-build system that resolves Kannafile build descriptions into Ninja files.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change to this directory before doing anything.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available top-level commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate ninja files from the current tree into the output directory.
    Gen(GenArgs),
}

/// Options of the `gen` command.
#[derive(Debug, Args, Default)]
pub struct GenArgs {
    /// Output directory: //source-root-relative or relative to the current directory.
    pub out_dir: String,

    /// Enable public header checking; `--check=system` also checks system includes.
    #[arg(long, value_name = "MODE", num_args = 0..=1, require_equals = true, default_missing_value = "")]
    pub check: Option<String>,

    /// Generate files for an IDE: eclipse, vs, vs2013, vs2015, vs2017,
    /// vs2019, xcode, qtcreator, or json.
    #[arg(long, value_name = "IDE")]
    pub ide: Option<String>,

    /// Semicolon-separated label patterns limiting the generated projects.
    #[arg(long, value_name = "PATTERNS")]
    pub filters: Option<String>,

    /// Include only directly matching targets, not their dependencies (VS).
    #[arg(long)]
    pub no_deps: bool,

    /// Override the solution file name (VS).
    #[arg(long, value_name = "NAME")]
    pub sln: Option<String>,

    /// Windows SDK version for generated projects (VS).
    #[arg(long, value_name = "VERSION")]
    pub winsdk: Option<String>,

    /// Override the Xcode project file name.
    #[arg(long, value_name = "NAME")]
    pub xcode_project: Option<String>,

    /// Xcode build system: legacy or new.
    #[arg(long, value_name = "VARIANT")]
    pub xcode_build_system: Option<String>,

    /// Ninja executable the generated projects invoke.
    #[arg(long, value_name = "PATH")]
    pub ninja_executable: Option<String>,

    /// Extra arguments passed through to the ninja invocation.
    #[arg(long, value_name = "ARGS")]
    pub ninja_extra_args: Option<String>,

    /// Root target for Xcode and QtCreator projects.
    #[arg(long, value_name = "NAME")]
    pub root_target: Option<String>,

    /// JSON writer output file name.
    #[arg(long, value_name = "NAME")]
    pub json_file_name: Option<String>,

    /// Script executed after the JSON file is generated.
    #[arg(long, value_name = "PATH")]
    pub json_ide_script: Option<String>,

    /// Extra argument passed to the post-emit script.
    #[arg(long, value_name = "ARG")]
    pub json_ide_script_args: Option<String>,

    /// Emit compile_commands.json, optionally limited to the named targets.
    #[arg(long, value_name = "FILTERS", num_args = 0..=1, require_equals = true, default_missing_value = "")]
    pub export_compile_commands: Option<String>,

    /// Emit rust-project.json.
    #[arg(long)]
    pub export_rust_project: bool,

    /// Write runtime-deps listings for the targets named in this file.
    #[arg(long, value_name = "FILE")]
    pub runtime_deps_list_file: Option<String>,

    /// Print jumbo usage statistics.
    #[arg(long)]
    pub jumbo_stats: bool,

    /// Suppress informational output.
    #[arg(long)]
    pub quiet: bool,

    /// Build arguments forwarded to setup, written to args.kanna.
    #[arg(long, value_name = "ARGS")]
    pub args: Option<String>,

    /// Number of worker threads (default: logical CPU count).
    #[arg(short = 'j', long, value_name = "N", value_parser = parse_threads)]
    pub threads: Option<usize>,
}
