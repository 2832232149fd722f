//! Runtime-deps listings.
//!
//! When `--runtime-deps-list-file` names a file of labels, each listed
//! target gets a `<primary output>.runtime_deps` file next to its output
//! enumerating what must be present at run time: the target's own outputs
//! plus the outputs of everything reached through a `data_deps` edge.

use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use camino::Utf8Path;
use itertools::Itertools;
use tracing::debug;

use super::write_if_changed;
use crate::builder::Builder;
use crate::files::SourceDir;
use crate::label::Label;
use crate::settings::BuildSettings;
use crate::target::Target;

/// Write runtime-deps files for the labels listed in `list_file`, one per
/// line; blank lines and `#` comments are skipped. A `None` list file is a
/// no-op.
///
/// # Errors
///
/// Returns an error when the list file is unreadable, names an unknown
/// label, or an output cannot be written.
pub fn write_runtime_deps_if_necessary(
    settings: &BuildSettings,
    builder: &Builder,
    list_file: Option<&Utf8Path>,
) -> Result<()> {
    let Some(list_file) = list_file else {
        return Ok(());
    };
    let listing =
        fs::read_to_string(list_file).with_context(|| format!("reading {list_file}"))?;
    for line in listing.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let label = Label::parse(line, &SourceDir::root(), &settings.default_toolchain)
            .with_context(|| format!("in {list_file}"))?;
        let target = builder
            .resolved_target(&label)
            .ok_or_else(|| anyhow!("{list_file} lists unknown target {label}"))?;
        write_runtime_deps(settings, builder, target)?;
    }
    Ok(())
}

fn write_runtime_deps(
    settings: &BuildSettings,
    builder: &Builder,
    target: &Arc<Target>,
) -> Result<()> {
    let Some(primary) = target.primary_output() else {
        return Ok(());
    };
    let files = collect_runtime_deps(builder, target);
    let content = files.iter().map(|file| format!("{file}\n")).join("");
    let path = settings
        .build_dir_disk()
        .join(format!("{}.runtime_deps", primary.as_str()));
    write_if_changed(&path, &content).with_context(|| format!("writing {path}"))?;
    debug!(target = %target.label, %path, "runtime deps written");
    Ok(())
}

/// Outputs needed at run time: the target's own, plus those of every target
/// reached through a `data_deps` edge anywhere in the dependency walk.
fn collect_runtime_deps(builder: &Builder, target: &Arc<Target>) -> BTreeSet<String> {
    let mut files: BTreeSet<String> = target
        .outputs
        .iter()
        .map(|output| output.as_str().to_owned())
        .collect();
    let mut visited: BTreeSet<Label> = BTreeSet::new();
    let mut queue: Vec<(&Arc<Target>, bool)> = vec![(target, false)];
    while let Some((current, runtime)) = queue.pop() {
        if !visited.insert(current.label.clone()) {
            continue;
        }
        if runtime {
            files.extend(current.outputs.iter().map(|o| o.as_str().to_owned()));
        }
        for dep in current.linked_deps() {
            if let Some(dep_target) = builder.resolved_target(dep) {
                queue.push((dep_target, runtime));
            }
        }
        for dep in &current.data_deps {
            if let Some(dep_target) = builder.resolved_target(dep) {
                queue.push((dep_target, true));
            }
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FileRegistry;
    use crate::scheduler::Scheduler;
    use crate::files::SourceFile;
    use crate::label::ToolchainLabel;
    use camino::Utf8PathBuf;

    #[test]
    fn data_deps_land_in_the_runtime_listing() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("tool")).expect("mkdir");
        fs::write(
            temp.path().join("Kannafile"),
            concat!(
                "targets:\n",
                "  - name: app\n",
                "    type: executable\n",
                "    sources: [main.cc]\n",
                "    data_deps: [\"//tool:helper\"]\n",
            ),
        )
        .expect("write root");
        fs::write(
            temp.path().join("tool/Kannafile"),
            "targets:\n  - name: helper\n    type: executable\n    sources: [helper.cc]\n",
        )
        .expect("write tool");

        let root = SourceDir::root();
        let settings = Arc::new(BuildSettings {
            source_root: Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8"),
            build_dir: SourceDir::resolve(&root, "//out").expect("build dir"),
            default_toolchain: ToolchainLabel::parse("//tc:default", &root).expect("toolchain"),
            root_build_file: SourceFile::resolve(&root, "//Kannafile").expect("root file"),
            check_public_headers: false,
            check_system_includes: false,
        });
        let mut scheduler = Scheduler::new(Arc::clone(&settings), Arc::new(FileRegistry::new()));
        scheduler.run().expect("run");
        let (builder, _) = scheduler.finish();

        let list = temp.path().join("runtime_list");
        fs::write(&list, "//:app\n").expect("write list");
        let list = Utf8PathBuf::from_path_buf(list).expect("utf8");
        write_runtime_deps_if_necessary(&settings, &builder, Some(list.as_path()))
            .expect("runtime deps");

        let written = fs::read_to_string(temp.path().join("out/bin/app.runtime_deps"))
            .expect("runtime deps file");
        assert_eq!(written, "bin/app\nbin/helper\n");
    }
}
