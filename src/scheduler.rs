//! Resolution scheduler.
//!
//! A single dispatch thread owns the [`Builder`] and drives the load loop:
//! pop a pending build file, parse it through the registry, define its items,
//! and schedule the build files of every newly referenced directory. Each
//! resolution fires the builder's callback synchronously; the callback may
//! submit work to the worker pool, but the scheduler never waits on the pool.
//!
//! The scheduler also accumulates the *unknown generated inputs* multimap:
//! for every resolved target, any source or input under the build directory
//! that is not produced by the target's public-dependency closure is recorded
//! for the post-resolution validator.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use tracing::debug;

use crate::ast::{BUILD_FILE_NAME, BuildFile};
use crate::builder::Builder;
use crate::files::{SourceDir, SourceFile};
use crate::registry::FileRegistry;
use crate::settings::BuildSettings;
use crate::target::Target;

/// Generated-looking files with no public producer, keyed by file in
/// discovery order, each with its consumers in stable order.
pub type UnknownInputs = IndexMap<SourceFile, Vec<Arc<Target>>>;

/// Drives builder and registry until the target graph is closed.
pub struct Scheduler {
    settings: Arc<BuildSettings>,
    registry: Arc<FileRegistry>,
    builder: Builder,
    queue: VecDeque<SourceFile>,
    scheduled: HashSet<SourceFile>,
    unknown_inputs: UnknownInputs,
}

impl Scheduler {
    #[must_use]
    pub fn new(settings: Arc<BuildSettings>, registry: Arc<FileRegistry>) -> Self {
        let builder = Builder::new(Arc::clone(&settings));
        Self {
            settings,
            registry,
            builder,
            queue: VecDeque::new(),
            scheduled: HashSet::new(),
            unknown_inputs: IndexMap::new(),
        }
    }

    /// The builder, for callback registration before [`Self::run`].
    pub fn builder_mut(&mut self) -> &mut Builder {
        &mut self.builder
    }

    /// Run the dispatch loop to completion.
    ///
    /// # Errors
    ///
    /// Returns the first load, definition, or resolution failure. Unresolved
    /// records at the end of dispatch (missing definitions or dependency
    /// cycles) are fatal.
    pub fn run(&mut self) -> Result<()> {
        self.schedule_file(self.settings.root_build_file.clone());
        while let Some(file) = self.queue.pop_front() {
            let disk_path = self.settings.disk_path(&file);
            let parsed = self.registry.get_or_load(&disk_path)?;
            self.process_file(&file, &parsed)?;
        }
        self.builder.check_fully_resolved()?;
        Ok(())
    }

    /// Surrender the builder and the unknown-inputs snapshot once dispatch
    /// has finished.
    #[must_use]
    pub fn finish(self) -> (Builder, UnknownInputs) {
        (self.builder, self.unknown_inputs)
    }

    fn process_file(&mut self, file: &SourceFile, parsed: &BuildFile) -> Result<()> {
        let dir = file.dir();
        debug!(%file, targets = parsed.targets.len(), "processing build file");

        for def in &parsed.toolchains {
            self.builder
                .define_toolchain(&dir, def)
                .with_context(|| format!("in {file}"))?;
        }

        for def in &parsed.targets {
            let target = Target::from_def(&self.settings, &dir, def)
                .with_context(|| format!("in {file}, target '{}'", def.name))?;

            // Every referenced directory's build file joins the queue before
            // the definition lands, so forward references stay legal.
            let dep_labels: Vec<_> = target.all_deps().cloned().collect();
            for dep in &dep_labels {
                let record = self.builder.get_or_create_record(dep);
                self.schedule_dir(&dep.dir)?;
                self.builder.mark_loading(record);
            }

            let newly = self
                .builder
                .define_target(target)
                .with_context(|| format!("in {file}"))?;
            for resolved in &newly {
                self.check_generated_inputs(resolved);
            }
        }
        Ok(())
    }

    fn schedule_dir(&mut self, dir: &SourceDir) -> Result<()> {
        let build_file = dir
            .file(BUILD_FILE_NAME)
            .with_context(|| format!("build file for {dir}"))?;
        self.schedule_file(build_file);
        Ok(())
    }

    fn schedule_file(&mut self, file: SourceFile) {
        if self.scheduled.insert(file.clone()) {
            self.queue.push_back(file);
        }
    }

    /// Record sources and inputs under the build directory whose producer is
    /// not reachable through public dependencies. Dispatch-thread only.
    fn check_generated_inputs(&mut self, target: &Arc<Target>) {
        let mut reachable = None;
        for file in target.sources.iter().chain(&target.inputs) {
            let Some(output) = self.settings.output_file_for(file) else {
                continue;
            };
            if target.outputs.contains(&output) {
                continue;
            }
            let reachable = reachable
                .get_or_insert_with(|| self.builder.reachable_generated_files(target));
            if !reachable.contains(&output) {
                debug!(%file, target = %target.label, "unknown generated input");
                self.unknown_inputs
                    .entry(file.clone())
                    .or_default()
                    .push(Arc::clone(target));
            }
        }
    }
}
