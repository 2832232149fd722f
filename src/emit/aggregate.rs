//! Per-toolchain rule fragment aggregation.
//!
//! Workers append fragments in whatever order they finish; a single mutex
//! guards the map and each append is O(1). [`RuleAggregator::finalize`]
//! establishes the deterministic order by sorting every toolchain's fragments
//! by target label.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use crate::label::ToolchainLabel;
use crate::target::Target;

/// One fragment together with the target it describes.
pub type TargetRulePair = (Arc<Target>, String);

/// Fragments grouped by toolchain, toolchains and fragments both in label
/// order.
pub type PerToolchainRules = BTreeMap<ToolchainLabel, Vec<TargetRulePair>>;

/// Collects Ninja rules for each toolchain. The lock protects the rules.
#[derive(Debug, Default)]
pub struct RuleAggregator {
    rules: Mutex<HashMap<ToolchainLabel, Vec<TargetRulePair>>>,
}

impl RuleAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fragment under the target's toolchain.
    pub fn append(&self, target: Arc<Target>, fragment: String) {
        let mut rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        rules
            .entry(target.label.toolchain.clone())
            .or_default()
            .push((target, fragment));
    }

    /// Drain the collected fragments into label order. Call once, after the
    /// pool has drained.
    #[must_use]
    pub fn finalize(&self) -> PerToolchainRules {
        let rules = std::mem::take(&mut *self.rules.lock().unwrap_or_else(PoisonError::into_inner));
        rules
            .into_iter()
            .map(|(toolchain, mut pairs)| {
                pairs.sort_by(|a, b| a.0.label.cmp(&b.0.label));
                (toolchain, pairs)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TargetDef;
    use crate::files::{SourceDir, SourceFile};
    use crate::settings::BuildSettings;
    use crate::target::TargetType;
    use camino::Utf8PathBuf;

    fn target(name: &str) -> Arc<Target> {
        let root = SourceDir::root();
        let settings = BuildSettings {
            source_root: Utf8PathBuf::from("/src"),
            build_dir: SourceDir::resolve(&root, "//out").expect("build dir"),
            default_toolchain: crate::label::ToolchainLabel::parse("//tc:default", &root)
                .expect("toolchain"),
            root_build_file: SourceFile::resolve(&root, "//Kannafile").expect("root file"),
            check_public_headers: false,
            check_system_includes: false,
        };
        let def = TargetDef {
            name: name.to_owned(),
            target_type: TargetType::Group,
            sources: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            deps: Vec::new(),
            public_deps: Vec::new(),
            data_deps: Vec::new(),
            script: None,
            args: Vec::new(),
            toolchain: None,
            jumbo: None,
        };
        Arc::new(Target::from_def(&settings, &root, &def).expect("target"))
    }

    #[test]
    fn finalize_sorts_fragments_by_label() {
        let aggregator = RuleAggregator::new();
        aggregator.append(target("zeta"), "# zeta\n".to_owned());
        aggregator.append(target("alpha"), "# alpha\n".to_owned());
        aggregator.append(target("mid"), "# mid\n".to_owned());

        let rules = aggregator.finalize();
        assert_eq!(rules.len(), 1);
        let names: Vec<&str> = rules
            .values()
            .next()
            .expect("toolchain entry")
            .iter()
            .map(|(target, _)| target.label.name.as_str())
            .collect();
        assert_eq!(names, ["alpha", "mid", "zeta"]);
    }
}
