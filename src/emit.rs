//! Deterministic Ninja output emission.
//!
//! Worker threads turn resolved targets into rule fragments
//! ([`target_rules`]), the [`aggregate::RuleAggregator`] collects them per
//! toolchain, and [`ninja`] flushes the canonical `build.ninja` plus one file
//! per non-default toolchain. Determinism is enforced by sorting fragments by
//! target label at finalisation, independent of worker scheduling.

pub mod aggregate;
pub mod ninja;
pub mod runtime_deps;
pub mod target_rules;

pub use aggregate::{PerToolchainRules, RuleAggregator, TargetRulePair};
pub use target_rules::{EmitError, write_target_rules};

use std::fs;
use std::io;

use camino::Utf8Path;

/// Write `content` to `path` unless the file already holds those bytes,
/// creating parent directories as needed. Returns whether the file changed.
///
/// Leaving unchanged files alone preserves their timestamps for IDE
/// consumers.
pub fn write_if_changed(path: &Utf8Path, content: &str) -> io::Result<bool> {
    if let Ok(existing) = fs::read_to_string(path)
        && existing == content
    {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(true)
}
