//! Holds unresolved and resolved build items keyed by label.
//!
//! The builder owns every [`BuilderRecord`]: records are created on first
//! reference (forward references are permitted), receive their definition
//! when the declaring build file is loaded, and become *resolved* once every
//! dependency record has resolved. Resolution order is therefore
//! dependency-first, and the registered callback fires exactly once per
//! record, synchronously on the dispatch thread. Resolved targets are frozen
//! behind `Arc` and never mutated afterwards.

mod cycle;

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use itertools::Itertools;
use miette::Diagnostic;
use thiserror::Error;

use crate::ast::ToolchainDef;
use crate::files::{OutputFile, SourceDir};
use crate::label::{Label, ToolchainLabel};
use crate::settings::BuildSettings;
use crate::target::Target;

/// Errors raised while closing the target graph.
#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    #[error("duplicate definition of {label}")]
    #[diagnostic(code(kanna::builder::duplicate_definition))]
    DuplicateDefinition { label: Label },

    #[error("dependency cycle in the target graph: {path}")]
    #[diagnostic(
        code(kanna::builder::dependency_cycle),
        help("remove one of the listed deps edges to break the cycle")
    )]
    DependencyCycle { path: String },

    #[error("labels were referenced but never defined:\n{listing}")]
    #[diagnostic(
        code(kanna::builder::unresolved_labels),
        help("check the Kannafile of each listed directory for the missing target")
    )]
    UnresolvedLabels { listing: String },
}

/// Index of a record inside the builder.
pub type RecordId = usize;

/// Lifecycle of a [`BuilderRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Referenced by a label; its build file is not yet scheduled.
    Declared,
    /// Its build file is queued or loaded; the record may already hold its
    /// definition while waiting on dependencies.
    Loading,
    /// Definition present and every dependency resolved.
    Resolved,
}

/// A resolved build item.
#[derive(Debug, Clone)]
pub enum Item {
    Target(Arc<Target>),
    Toolchain(ToolchainLabel),
}

/// A definition that has been loaded but not yet resolved.
#[derive(Debug)]
enum Pending {
    Target(Box<Target>),
    Toolchain(ToolchainLabel),
}

/// The builder's handle to a single build item.
#[derive(Debug)]
pub struct BuilderRecord {
    label: Label,
    state: RecordState,
    pending: Option<Pending>,
    resolved_item: Option<Item>,
    dep_ids: Vec<RecordId>,
    unresolved_deps: usize,
    waiting: Vec<RecordId>,
}

impl BuilderRecord {
    fn new(label: Label) -> Self {
        Self {
            label,
            state: RecordState::Declared,
            pending: None,
            resolved_item: None,
            dep_ids: Vec::new(),
            unresolved_deps: 0,
            waiting: Vec::new(),
        }
    }

    fn has_definition(&self) -> bool {
        self.pending.is_some() || self.resolved_item.is_some()
    }

    #[must_use]
    pub fn label(&self) -> &Label {
        &self.label
    }

    #[must_use]
    pub fn state(&self) -> RecordState {
        self.state
    }

    /// The resolved item, once the record has reached
    /// [`RecordState::Resolved`].
    #[must_use]
    pub fn item(&self) -> Option<&Item> {
        self.resolved_item.as_ref()
    }
}

type ResolvedCallback = Box<dyn FnMut(&Item)>;

/// Owner of all build items for the lifetime of one `gen` invocation.
pub struct Builder {
    settings: Arc<BuildSettings>,
    records: Vec<BuilderRecord>,
    by_label: HashMap<Label, RecordId>,
    callback: Option<ResolvedCallback>,
    /// Per-target closure of outputs reachable through public deps only,
    /// including the target's own outputs.
    public_closures: HashMap<Label, Arc<BTreeSet<OutputFile>>>,
    resolved_targets: Vec<Arc<Target>>,
}

impl Builder {
    #[must_use]
    pub fn new(settings: Arc<BuildSettings>) -> Self {
        Self {
            settings,
            records: Vec::new(),
            by_label: HashMap::new(),
            callback: None,
            public_closures: HashMap::new(),
            resolved_targets: Vec::new(),
        }
    }

    /// Register the single resolution sink. Registering twice overwrites.
    pub fn set_resolved_and_generated_callback(&mut self, callback: ResolvedCallback) {
        self.callback = Some(callback);
    }

    /// Idempotent record lookup; equal labels share one record.
    pub fn get_or_create_record(&mut self, label: &Label) -> RecordId {
        if let Some(&id) = self.by_label.get(label) {
            return id;
        }
        let id = self.records.len();
        self.records.push(BuilderRecord::new(label.clone()));
        self.by_label.insert(label.clone(), id);
        id
    }

    #[must_use]
    pub fn record(&self, id: RecordId) -> &BuilderRecord {
        &self.records[id]
    }

    #[must_use]
    pub fn record_for_label(&self, label: &Label) -> Option<&BuilderRecord> {
        self.by_label.get(label).map(|&id| &self.records[id])
    }

    /// Note that the record's build file has been scheduled for loading.
    pub fn mark_loading(&mut self, id: RecordId) {
        let record = &mut self.records[id];
        if record.state == RecordState::Declared {
            record.state = RecordState::Loading;
        }
    }

    /// Install a target definition and cascade resolution.
    ///
    /// Returns the targets newly resolved by this definition in resolution
    /// order; dependencies always precede dependents.
    ///
    /// # Errors
    ///
    /// Returns an error when the label is already defined.
    pub fn define_target(&mut self, target: Target) -> Result<Vec<Arc<Target>>, ResolveError> {
        let id = self.get_or_create_record(&target.label);
        if self.records[id].has_definition() {
            return Err(ResolveError::DuplicateDefinition {
                label: target.label.clone(),
            });
        }

        let dep_labels: Vec<Label> = target.all_deps().cloned().collect();
        let mut dep_ids: Vec<RecordId> = Vec::with_capacity(dep_labels.len());
        for dep in &dep_labels {
            let dep_id = self.get_or_create_record(dep);
            if !dep_ids.contains(&dep_id) {
                dep_ids.push(dep_id);
            }
        }

        let mut unresolved = 0;
        for &dep_id in &dep_ids {
            if self.records[dep_id].state != RecordState::Resolved {
                unresolved += 1;
                self.records[dep_id].waiting.push(id);
            }
        }

        let record = &mut self.records[id];
        record.pending = Some(Pending::Target(Box::new(target)));
        record.dep_ids = dep_ids;
        record.unresolved_deps = unresolved;
        if record.state == RecordState::Declared {
            record.state = RecordState::Loading;
        }

        if unresolved == 0 {
            Ok(self.resolve_from(id))
        } else {
            Ok(Vec::new())
        }
    }

    /// Install a toolchain declaration; toolchains have no dependencies and
    /// resolve immediately.
    ///
    /// # Errors
    ///
    /// Returns an error when the label is already defined.
    pub fn define_toolchain(
        &mut self,
        dir: &SourceDir,
        def: &ToolchainDef,
    ) -> Result<(), ResolveError> {
        let toolchain = ToolchainLabel {
            dir: dir.clone(),
            name: def.name.clone(),
        };
        let label = Label {
            dir: dir.clone(),
            name: def.name.clone(),
            toolchain: self.settings.default_toolchain.clone(),
        };
        let id = self.get_or_create_record(&label);
        if self.records[id].has_definition() {
            return Err(ResolveError::DuplicateDefinition { label });
        }
        self.records[id].pending = Some(Pending::Toolchain(toolchain));
        self.resolve_from(id);
        Ok(())
    }

    /// Mark `start` resolved and wake every dependent whose last outstanding
    /// dependency it was. Fires the callback once per resolved record.
    fn resolve_from(&mut self, start: RecordId) -> Vec<Arc<Target>> {
        let mut newly = Vec::new();
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            if self.records[id].state == RecordState::Resolved {
                continue;
            }
            let Some(pending) = self.records[id].pending.take() else {
                continue;
            };

            let item = match pending {
                Pending::Toolchain(toolchain) => Item::Toolchain(toolchain),
                Pending::Target(mut target) => {
                    // Every dependency is resolved here, so the frozen target
                    // can carry its dependencies' primary outputs.
                    target.linked_dep_outputs = self.primary_outputs(target.linked_deps());
                    target.data_dep_outputs = self.primary_outputs(target.data_deps.iter());
                    let target = Arc::new(*target);
                    let closure = self.compute_public_closure(&target);
                    self.public_closures.insert(target.label.clone(), closure);
                    self.resolved_targets.push(Arc::clone(&target));
                    newly.push(Arc::clone(&target));
                    Item::Target(target)
                }
            };

            let record = &mut self.records[id];
            record.state = RecordState::Resolved;
            record.resolved_item = Some(item.clone());
            if let Some(callback) = self.callback.as_mut() {
                callback(&item);
            }

            let waiting = std::mem::take(&mut self.records[id].waiting);
            for dependent in waiting {
                let record = &mut self.records[dependent];
                record.unresolved_deps -= 1;
                if record.unresolved_deps == 0 && record.pending.is_some() {
                    queue.push_back(dependent);
                }
            }
        }
        newly
    }

    /// The resolved target behind `label`, if any.
    #[must_use]
    pub fn resolved_target(&self, label: &Label) -> Option<&Arc<Target>> {
        match self
            .by_label
            .get(label)
            .and_then(|&id| self.records[id].resolved_item.as_ref())
        {
            Some(Item::Target(target)) => Some(target),
            _ => None,
        }
    }

    fn primary_outputs<'a>(&self, labels: impl Iterator<Item = &'a Label>) -> Vec<OutputFile> {
        labels
            .filter_map(|label| self.resolved_target(label))
            .filter_map(|target| target.primary_output().cloned())
            .collect()
    }

    fn compute_public_closure(&self, target: &Target) -> Arc<BTreeSet<OutputFile>> {
        let mut closure: BTreeSet<OutputFile> = target.outputs.iter().cloned().collect();
        for dep in &target.public_deps {
            if let Some(dep_closure) = self.public_closures.get(dep) {
                closure.extend(dep_closure.iter().cloned());
            }
        }
        Arc::new(closure)
    }

    /// Outputs a target may legitimately consume as generated inputs: the
    /// public-output closures of its linked dependencies. The first hop may
    /// be public or private; every later hop must be public. `data_deps`
    /// never contribute.
    #[must_use]
    pub fn reachable_generated_files(&self, target: &Target) -> BTreeSet<OutputFile> {
        let mut reachable = BTreeSet::new();
        for dep in target.linked_deps() {
            if let Some(closure) = self.public_closures.get(dep) {
                reachable.extend(closure.iter().cloned());
            }
        }
        reachable
    }

    /// Every resolved target, in resolution order. Valid once resolution has
    /// closed.
    #[must_use]
    pub fn get_all_resolved_targets(&self) -> &[Arc<Target>] {
        &self.resolved_targets
    }

    #[must_use]
    pub fn settings(&self) -> &Arc<BuildSettings> {
        &self.settings
    }

    /// Verify that every record resolved, diagnosing cycles and missing
    /// definitions.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::DependencyCycle`] or
    /// [`ResolveError::UnresolvedLabels`] when records remain unresolved.
    pub fn check_fully_resolved(&self) -> Result<(), ResolveError> {
        let unresolved: Vec<RecordId> = (0..self.records.len())
            .filter(|&id| self.records[id].state != RecordState::Resolved)
            .collect();
        if unresolved.is_empty() {
            return Ok(());
        }

        let undefined: Vec<RecordId> = unresolved
            .iter()
            .copied()
            .filter(|&id| !self.records[id].has_definition())
            .collect();
        if undefined.is_empty() {
            // Every unresolved record has a definition, so they are waiting
            // on each other.
            let path = cycle::find_cycle(&self.records, &unresolved)
                .map(|labels| labels.iter().map(ToString::to_string).join(" -> "))
                .unwrap_or_else(|| {
                    unresolved
                        .iter()
                        .map(|&id| self.records[id].label.to_string())
                        .join(", ")
                });
            return Err(ResolveError::DependencyCycle { path });
        }

        let listing = undefined
            .iter()
            .map(|&id| {
                let label = &self.records[id].label;
                match self.first_referencer(id) {
                    Some(referencer) => format!("  {label} (needed by {referencer})"),
                    None => format!("  {label}"),
                }
            })
            .join("\n");
        Err(ResolveError::UnresolvedLabels { listing })
    }

    fn first_referencer(&self, id: RecordId) -> Option<&Label> {
        self.records
            .iter()
            .find(|record| record.dep_ids.contains(&id))
            .map(|record| &record.label)
    }
}
