//! CLI execution and the gen driver.
//!
//! [`run`] keeps `main` minimal. The gen driver wires the components
//! together in their contractual order: setup, resolution with the
//! per-target writer running on the worker pool, pool drain, deterministic
//! flush, the runtime-deps hook, the generated-input check, and finally the
//! requested project writers. The first failure short-circuits the sequence.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::builder::Item;
use crate::cli::{Cli, Commands, GenArgs};
use crate::console::Console;
use crate::emit::{self, PerToolchainRules, RuleAggregator, write_target_rules};
use crate::ide::{self, WriterOptions};
use crate::pool::WorkerPool;
use crate::scheduler::Scheduler;
use crate::setup::Setup;
use crate::target::Target;
use crate::validate;

/// Execute the parsed [`Cli`] commands.
///
/// # Errors
///
/// Returns the first fatal error of the selected command.
pub fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Gen(args) => run_gen(cli, args),
    }
}

fn run_gen(cli: &Cli, args: &GenArgs) -> Result<()> {
    let timer = Instant::now();
    let console = Console::new(args.quiet);

    let mut setup = Setup::new(start_dir(cli)?);
    if let Some(contents) = &args.args {
        setup.set_args_contents(contents.clone());
    } else {
        // Generate an empty args.kanna when the user supplied none.
        setup.set_gen_empty_args(true);
    }
    if let Some(check) = &args.check {
        setup.set_check_public_headers(true);
        if check == "system" {
            setup.set_check_system_includes(true);
        }
    }
    let settings = setup.do_setup(&args.out_dir)?;

    let threads = args.threads.unwrap_or_else(WorkerPool::default_thread_count);
    let pool = Arc::new(WorkerPool::new(threads));
    let aggregator = Arc::new(RuleAggregator::new());

    // Cause resolution to also write out the per-target rules: each resolved
    // target is handed to the pool, which appends its fragment to the
    // aggregator in completion order.
    let mut scheduler = Scheduler::new(Arc::clone(&settings), setup.registry());
    {
        let pool = Arc::clone(&pool);
        let aggregator = Arc::clone(&aggregator);
        let settings = Arc::clone(&settings);
        scheduler
            .builder_mut()
            .set_resolved_and_generated_callback(Box::new(move |item| {
                let Item::Target(target) = item else {
                    return;
                };
                let target = Arc::clone(target);
                let aggregator = Arc::clone(&aggregator);
                let settings = Arc::clone(&settings);
                pool.submit(move || {
                    let fragment = write_target_rules(&settings, &target)?;
                    aggregator.append(target, fragment);
                    Ok(())
                });
            }));
    }

    scheduler.run()?;
    pool.drain()?;
    let (builder, unknown_inputs) = scheduler.finish();

    let rules = aggregator.finalize();
    let targets_collected: usize = rules.values().map(Vec::len).sum();
    let jumbo = args.jumbo_stats.then(|| JumboStats::collect(&rules));

    emit::ninja::write_root_files(&settings, &rules)?;
    emit::runtime_deps::write_runtime_deps_if_necessary(
        &settings,
        &builder,
        args.runtime_deps_list_file.as_deref().map(Utf8Path::new),
    )?;
    validate::check_for_invalid_generated_inputs(&console, &settings, &builder, &unknown_inputs)?;

    let options = WriterOptions {
        filters: args.filters.as_deref(),
        no_deps: args.no_deps,
        sln_name: args.sln.as_deref(),
        win_sdk: args.winsdk.as_deref(),
        ninja_executable: args.ninja_executable.as_deref(),
        ninja_extra_args: args.ninja_extra_args.as_deref(),
        root_target: args.root_target.as_deref(),
        xcode_project: args.xcode_project.as_deref(),
        xcode_build_system: args.xcode_build_system.as_deref(),
        json_file_name: args.json_file_name.as_deref(),
        json_ide_script: args.json_ide_script.as_deref(),
        json_ide_script_args: args.json_ide_script_args.as_deref(),
    };
    if let Some(ide_tag) = &args.ide {
        ide::run_ide_writer(ide_tag, &settings, &builder, options, &console)?;
    }
    if let Some(filters) = &args.export_compile_commands {
        let writer_timer = Instant::now();
        ide::compile_commands::run_and_write_files(&settings, &builder, filters)?;
        console.info(&format!(
            "Generating compile_commands took {}ms",
            writer_timer.elapsed().as_millis()
        ));
    }
    if args.export_rust_project {
        let writer_timer = Instant::now();
        ide::rust_project::run_and_write_files(&settings, &builder)?;
        console.info(&format!(
            "Generating rust-project.json took {}ms",
            writer_timer.elapsed().as_millis()
        ));
    }

    if let Some(jumbo) = jumbo {
        jumbo.report(&console);
    }
    let input_files = setup.registry().count();
    console.done(&format!(
        "Made {targets_collected} targets from {input_files} files in {}ms",
        timer.elapsed().as_millis()
    ));
    debug!(targets_collected, input_files, "gen finished");
    Ok(())
}

/// The directory paths resolve against: `-C` when given, else the current
/// directory.
fn start_dir(cli: &Cli) -> Result<Utf8PathBuf> {
    let current = std::env::current_dir().context("determining the current directory")?;
    let dir = match &cli.directory {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => current.join(dir),
        None => current,
    };
    Utf8PathBuf::from_path_buf(dir).map_err(|dir| anyhow!("directory {dir:?} must be valid UTF-8"))
}

/// Jumbo usage counters, reporting only.
struct JumboStats {
    allowed: usize,
    disallowed: usize,
    not_configured: Vec<Arc<Target>>,
}

impl JumboStats {
    fn collect(rules: &PerToolchainRules) -> Self {
        let mut stats = Self {
            allowed: 0,
            disallowed: 0,
            not_configured: Vec::new(),
        };
        for (target, _) in rules.values().flatten() {
            if target.is_jumbo_configured() {
                if target.is_jumbo_allowed() {
                    stats.allowed += 1;
                } else {
                    stats.disallowed += 1;
                }
            } else if target.is_binary() {
                stats.not_configured.push(Arc::clone(target));
            }
        }
        stats
            .not_configured
            .sort_by(|a, b| {
                (a.sources.len(), &a.label).cmp(&(b.sources.len(), &b.label))
            });
        stats
    }

    fn report(&self, console: &Console) {
        console.info("Jumbo is not configured in the following targets:");
        for target in &self.not_configured {
            console.info(&format!(
                "{} ({} sources)",
                target.label.to_user_visible(false),
                target.sources.len()
            ));
        }
        console.info(&format!(
            "\nJumbo is not configured in {} targets.",
            self.not_configured.len()
        ));
        console.info(&format!("Jumbo is allowed in {} targets.", self.allowed));
        console.info(&format!(
            "Jumbo is disallowed in {} targets.\n",
            self.disallowed
        ));
    }
}
