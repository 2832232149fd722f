//! `compile_commands.json` exporter.
//!
//! Emits one command object per compiled source of every binary target,
//! mirroring the commands the generated Ninja rules would run. An optional
//! comma-separated list of target names restricts the export to those
//! targets and everything they reach.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;

use super::filtered_targets;
use crate::builder::Builder;
use crate::emit::write_if_changed;
use crate::settings::BuildSettings;
use crate::target::{Target, object_dir};

const COMPILED_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx"];

/// Write `compile_commands.json` into the build directory.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub fn run_and_write_files(
    settings: &BuildSettings,
    builder: &Builder,
    target_filters: &str,
) -> Result<()> {
    let targets = select_targets(settings, builder, target_filters)?;

    let mut entries = Vec::new();
    let directory = settings.build_dir_disk();
    for target in &targets {
        if !target.is_binary() {
            continue;
        }
        let obj_dir = object_dir(settings, &target.label);
        for source in &target.sources {
            let extension = source.as_str().rsplit('.').next().unwrap_or_default();
            if !COMPILED_EXTENSIONS.contains(&extension) {
                continue;
            }
            let file = settings.rebase_to_build_dir(source);
            let file_name = source.without_root().rsplit('/').next().unwrap_or_default();
            let output = format!("{obj_dir}/{}/{file_name}.o", target.label.name);
            entries.push(json!({
                "directory": directory.as_str(),
                "file": file,
                "command": format!("c++ -MMD -MF {output}.d -c {file} -o {output}"),
                "output": output,
            }));
        }
    }

    let mut content =
        serde_json::to_string_pretty(&entries).context("serialising compile commands")?;
    content.push('\n');
    let path = directory.join("compile_commands.json");
    write_if_changed(&path, &content).with_context(|| format!("writing {path}"))?;
    Ok(())
}

/// Targets named by the comma-separated filter plus their transitive deps;
/// all targets when the filter is empty.
fn select_targets(
    settings: &BuildSettings,
    builder: &Builder,
    target_filters: &str,
) -> Result<Vec<Arc<Target>>> {
    if target_filters.is_empty() {
        return filtered_targets(settings, builder, None, false);
    }
    let names: BTreeSet<&str> = target_filters.split(',').filter(|n| !n.is_empty()).collect();
    let spec = builder
        .get_all_resolved_targets()
        .iter()
        .filter(|target| names.contains(target.label.name.as_str()))
        .map(|target| target.label.to_user_visible(false))
        .collect::<Vec<_>>()
        .join(";");
    if spec.is_empty() {
        return Ok(Vec::new());
    }
    filtered_targets(settings, builder, Some(&spec), false)
}
