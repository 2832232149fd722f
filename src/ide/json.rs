//! JSON project writer.
//!
//! Dumps the resolved graph into a JSON file (default `project.json`) and
//! optionally hands the result to a post-processing script. Target keys are
//! full labels including toolchain suffixes, sorted for stable output.

use std::process::Command;

use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use serde_json::{Map, Value, json};

use super::{WriterOptions, filtered_targets};
use crate::builder::Builder;
use crate::emit::write_if_changed;
use crate::files::ROOT_MARKER;
use crate::settings::BuildSettings;
use crate::target::Target;

/// Write the JSON project file and run the optional post-emit script.
///
/// # Errors
///
/// Returns an error when the file cannot be written or the script fails.
pub fn run_and_write_files(
    settings: &BuildSettings,
    builder: &Builder,
    options: WriterOptions<'_>,
) -> Result<()> {
    let file_name = options.json_file_name.unwrap_or("project.json");
    let targets = filtered_targets(settings, builder, options.filters, options.no_deps)?;

    let mut target_map = Map::new();
    for target in &targets {
        target_map.insert(target.label.to_user_visible(true), describe(target));
    }
    let document = json!({
        "build_settings": {
            "root_path": settings.source_root.as_str(),
            "build_dir": settings.build_dir.as_str(),
            "default_toolchain": settings.default_toolchain.to_string(),
        },
        "targets": Value::Object(target_map),
    });
    let mut content = serde_json::to_string_pretty(&document).context("serialising project")?;
    content.push('\n');

    let path = settings.build_dir_disk().join(file_name);
    write_if_changed(&path, &content).with_context(|| format!("writing {path}"))?;

    if let Some(script) = options.json_ide_script {
        run_post_script(settings, script, &path, options.json_ide_script_args)?;
    }
    Ok(())
}

fn describe(target: &Target) -> Value {
    let labels = |deps: &[crate::label::Label]| -> Value {
        Value::from(deps.iter().map(ToString::to_string).collect_vec())
    };
    let mut value = json!({
        "type": target.target_type.as_str(),
        "toolchain": target.label.toolchain.to_string(),
        "sources": target.sources.iter().map(ToString::to_string).collect_vec(),
        "inputs": target.inputs.iter().map(ToString::to_string).collect_vec(),
        "outputs": target.outputs.iter().map(ToString::to_string).collect_vec(),
        "public_deps": labels(&target.public_deps),
        "deps": labels(&target.private_deps),
        "data_deps": labels(&target.data_deps),
    });
    if let Some(script) = &target.script
        && let Value::Object(map) = &mut value
    {
        map.insert("script".to_owned(), Value::from(script.as_str()));
        map.insert("args".to_owned(), Value::from(target.script_args.clone()));
    }
    value
}

/// Resolve the script path (source-absolute, absolute, or build-dir
/// relative) and run it with the JSON path as its first argument.
fn run_post_script(
    settings: &BuildSettings,
    script: &str,
    json_path: &Utf8Path,
    extra_arg: Option<&str>,
) -> Result<()> {
    let script_path: Utf8PathBuf = if let Some(rest) = script.strip_prefix(ROOT_MARKER) {
        settings.source_root.join(rest)
    } else if Utf8Path::new(script).is_absolute() {
        Utf8PathBuf::from(script)
    } else {
        settings.build_dir_disk().join(script)
    };

    let mut command = Command::new("python3");
    command.arg(script_path.as_str()).arg(json_path.as_str());
    if let Some(extra) = extra_arg {
        command.arg(extra);
    }
    let status = command
        .status()
        .with_context(|| format!("running {script_path}"))?;
    if !status.success() {
        return Err(anyhow!("script {script_path} exited with {status}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TargetDef;
    use crate::files::{SourceDir, SourceFile};
    use crate::label::ToolchainLabel;
    use crate::target::TargetType;
    use std::fs;
    use std::sync::Arc;

    #[test]
    fn writes_sorted_target_map() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = SourceDir::root();
        let settings = Arc::new(BuildSettings {
            source_root: Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8"),
            build_dir: SourceDir::resolve(&root, "//out").expect("build dir"),
            default_toolchain: ToolchainLabel::parse("//tc:default", &root).expect("toolchain"),
            root_build_file: SourceFile::resolve(&root, "//Kannafile").expect("root file"),
            check_public_headers: false,
            check_system_includes: false,
        });
        let mut builder = Builder::new(Arc::clone(&settings));
        for name in ["zeta", "alpha"] {
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
            let target = crate::target::Target::from_def(&settings, &root, &def).expect("target");
            builder.define_target(target).expect("define");
        }

        run_and_write_files(&settings, &builder, WriterOptions::default()).expect("write");
        let written = fs::read_to_string(temp.path().join("out/project.json")).expect("read");
        let alpha = written.find("//:alpha").expect("alpha key");
        let zeta = written.find("//:zeta").expect("zeta key");
        assert!(alpha < zeta);
        assert!(written.contains("\"default_toolchain\": \"//tc:default\""));
    }
}
