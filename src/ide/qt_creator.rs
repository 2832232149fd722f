//! QtCreator generic project writer.
//!
//! Emits the four-file generic project QtCreator understands (`.creator`,
//! `.files`, `.includes`, `.config`) under `qtcreator_project/` in the build
//! directory. With `--root-target` only that target and its dependencies
//! contribute files; otherwise the whole graph does.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};

use super::filtered_targets;
use crate::builder::Builder;
use crate::emit::write_if_changed;
use crate::settings::BuildSettings;
use crate::target::Target;

/// Write the QtCreator project files.
///
/// # Errors
///
/// Returns an error when `root_target` names no known target or a file
/// cannot be written.
pub fn run_and_write_files(
    settings: &BuildSettings,
    builder: &Builder,
    root_target: Option<&str>,
) -> Result<()> {
    let targets = select_targets(settings, builder, root_target)?;

    let mut files: BTreeSet<String> = BTreeSet::new();
    let mut includes: BTreeSet<String> = BTreeSet::new();
    for target in &targets {
        for file in target.sources.iter().chain(&target.inputs) {
            let disk = settings.disk_path(file);
            if let Some(parent) = disk.parent() {
                includes.insert(parent.to_string());
            }
            files.insert(disk.to_string());
        }
    }

    let project_dir = settings.build_dir_disk().join("qtcreator_project");
    let write = |name: &str, content: &str| -> Result<()> {
        let path = project_dir.join(name);
        write_if_changed(&path, content).with_context(|| format!("writing {path}"))?;
        Ok(())
    };
    write("all.creator", "[General]\n")?;
    write("all.files", &joined_lines(&files))?;
    write("all.includes", &joined_lines(&includes))?;
    write("all.config", "// Add predefined macros for your project here, one per line\n")?;
    Ok(())
}

fn joined_lines(lines: &BTreeSet<String>) -> String {
    let mut joined = String::new();
    for line in lines {
        joined.push_str(line);
        joined.push('\n');
    }
    joined
}

fn select_targets(
    settings: &BuildSettings,
    builder: &Builder,
    root_target: Option<&str>,
) -> Result<Vec<Arc<Target>>> {
    match root_target {
        None | Some("") => filtered_targets(settings, builder, None, false),
        Some(name) => {
            let root = builder
                .get_all_resolved_targets()
                .iter()
                .find(|target| target.label.name == name)
                .ok_or_else(|| anyhow!("root target '{name}' not found in the build"))?;
            let spec = root.label.to_user_visible(false);
            filtered_targets(settings, builder, Some(&spec), false)
        }
    }
}
