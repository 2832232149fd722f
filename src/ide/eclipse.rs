//! Eclipse CDT settings writer.
//!
//! Eclipse projects are not generated wholesale; instead a settings file is
//! produced that can be imported into an existing CDT project. One set of
//! include paths covers the entire build, gathered from the directories of
//! every source and input in the graph.

use std::collections::BTreeSet;
use std::fmt::Write;

use anyhow::{Context, Result};

use crate::builder::Builder;
use crate::emit::write_if_changed;
use crate::settings::BuildSettings;

/// Write `eclipse-cdt-settings.xml` into the build directory.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub fn run_and_write_file(settings: &BuildSettings, builder: &Builder) -> Result<()> {
    let mut include_dirs: BTreeSet<String> = BTreeSet::new();
    for target in builder.get_all_resolved_targets() {
        for file in target.sources.iter().chain(&target.inputs) {
            if let Some(parent) = settings.disk_path(file).parent() {
                include_dirs.insert(parent.to_string());
            }
        }
    }

    let mut content = String::new();
    writeln!(content, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>").expect("write xml");
    writeln!(content, "<cdtprojectproperties>").expect("write xml");
    writeln!(
        content,
        "<section name=\"org.eclipse.cdt.internal.ui.wizards.settingswizards.IncludePaths\">"
    )
    .expect("write xml");
    for language in ["C Source File", "C++ Source File"] {
        writeln!(content, "<language name=\"{language}\">").expect("write xml");
        for dir in &include_dirs {
            writeln!(content, "<includepath>{dir}</includepath>").expect("write xml");
        }
        writeln!(content, "</language>").expect("write xml");
    }
    writeln!(content, "</section>").expect("write xml");
    writeln!(content, "</cdtprojectproperties>").expect("write xml");

    let path = settings.build_dir_disk().join("eclipse-cdt-settings.xml");
    write_if_changed(&path, &content).with_context(|| format!("writing {path}"))?;
    Ok(())
}
