//! IDE and project-file writers.
//!
//! Leaf consumers of the resolved graph, invoked by the driver after the
//! main Ninja output and the generated-input check. Exactly one IDE writer
//! runs per invocation, selected by the `--ide` tag; the compile-commands
//! and rust-project exporters are independent of that selection.

pub mod compile_commands;
pub mod eclipse;
pub mod json;
pub mod qt_creator;
pub mod rust_project;
pub mod visual_studio;
pub mod xcode;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use miette::Diagnostic;
use thiserror::Error;

use crate::builder::Builder;
use crate::console::Console;
use crate::files::SourceDir;
use crate::label::Label;
use crate::settings::BuildSettings;
use crate::target::Target;

/// Errors raised by IDE writer selection.
#[derive(Debug, Error, Diagnostic)]
pub enum IdeError {
    #[error("Unknown IDE: {0}")]
    #[diagnostic(code(kanna::ide::unknown_ide))]
    Unknown(String),

    #[error("Unknown build system: {0}")]
    #[diagnostic(code(kanna::ide::unknown_build_system))]
    UnknownBuildSystem(String),

    #[error("invalid label pattern '{0}'")]
    #[diagnostic(code(kanna::ide::bad_filter))]
    BadFilter(String),
}

/// Options shared by the project writers, straight from the command line.
#[derive(Debug, Default, Clone, Copy)]
pub struct WriterOptions<'a> {
    pub filters: Option<&'a str>,
    pub no_deps: bool,
    pub sln_name: Option<&'a str>,
    pub win_sdk: Option<&'a str>,
    pub ninja_executable: Option<&'a str>,
    pub ninja_extra_args: Option<&'a str>,
    pub root_target: Option<&'a str>,
    pub xcode_project: Option<&'a str>,
    pub xcode_build_system: Option<&'a str>,
    pub json_file_name: Option<&'a str>,
    pub json_ide_script: Option<&'a str>,
    pub json_ide_script_args: Option<&'a str>,
}

/// Dispatch the writer selected by `tag`, reporting its elapsed time.
///
/// # Errors
///
/// Returns [`IdeError::Unknown`] for tags outside the supported set and
/// propagates writer failures.
pub fn run_ide_writer(
    tag: &str,
    settings: &BuildSettings,
    builder: &Builder,
    options: WriterOptions<'_>,
    console: &Console,
) -> Result<()> {
    let timer = Instant::now();
    let what = match tag {
        "eclipse" => {
            eclipse::run_and_write_file(settings, builder)?;
            "Eclipse settings"
        }
        "vs" | "vs2013" | "vs2015" | "vs2017" | "vs2019" => {
            let version = visual_studio::Version::from_tag(tag);
            visual_studio::run_and_write_files(settings, builder, version, options)?;
            "Visual Studio projects"
        }
        "xcode" => {
            xcode::run_and_write_files(settings, builder, options)?;
            "Xcode projects"
        }
        "qtcreator" => {
            qt_creator::run_and_write_files(settings, builder, options.root_target)?;
            "QtCreator projects"
        }
        "json" => {
            json::run_and_write_files(settings, builder, options)?;
            "JSON projects"
        }
        other => return Err(IdeError::Unknown(other.to_owned()).into()),
    };
    console.info(&format!(
        "Generating {what} took {}ms",
        timer.elapsed().as_millis()
    ));
    Ok(())
}

/// One element of a `--filters` list.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LabelPattern {
    /// `//dir:name`
    Exact(Label),
    /// `//dir:*`
    InDir(SourceDir),
    /// `//dir/*`
    UnderDir(SourceDir),
}

impl LabelPattern {
    fn parse(raw: &str, settings: &BuildSettings) -> Result<Self, IdeError> {
        let bad = || IdeError::BadFilter(raw.to_owned());
        if let Some(dir_part) = raw.strip_suffix(":*") {
            let dir = SourceDir::resolve(&SourceDir::root(), dir_part).map_err(|_| bad())?;
            return Ok(Self::InDir(dir));
        }
        if let Some(dir_part) = raw.strip_suffix("/*") {
            let dir = SourceDir::resolve(&SourceDir::root(), dir_part).map_err(|_| bad())?;
            return Ok(Self::UnderDir(dir));
        }
        let label = Label::parse(raw, &SourceDir::root(), &settings.default_toolchain)
            .map_err(|_| bad())?;
        Ok(Self::Exact(label))
    }

    fn matches(&self, label: &Label) -> bool {
        match self {
            Self::Exact(pattern) => pattern == label,
            Self::InDir(dir) => label.dir == *dir,
            Self::UnderDir(dir) => {
                label.dir == *dir
                    || label
                        .dir
                        .as_str()
                        .strip_prefix(dir.as_str())
                        .is_some_and(|rest| dir.is_root() || rest.starts_with('/'))
            }
        }
    }
}

/// Targets selected by a semicolon-separated `--filters` list, plus their
/// transitive dependencies unless `no_deps`. Without filters, every resolved
/// target. Sorted by label.
pub(crate) fn filtered_targets(
    settings: &BuildSettings,
    builder: &Builder,
    filters: Option<&str>,
    no_deps: bool,
) -> Result<Vec<Arc<Target>>> {
    let all = builder.get_all_resolved_targets();
    let selected: Vec<Arc<Target>> = match filters {
        None | Some("") => all.to_vec(),
        Some(spec) => {
            let patterns: Vec<LabelPattern> = spec
                .split(';')
                .filter(|part| !part.is_empty())
                .map(|part| LabelPattern::parse(part, settings))
                .collect::<Result<_, _>>()
                .context("parsing --filters")?;
            let matched: Vec<Arc<Target>> = all
                .iter()
                .filter(|target| patterns.iter().any(|p| p.matches(&target.label)))
                .cloned()
                .collect();
            if no_deps {
                matched
            } else {
                close_over_deps(builder, matched)
            }
        }
    };
    let mut by_label: BTreeMap<Label, Arc<Target>> = BTreeMap::new();
    for target in selected {
        by_label.insert(target.label.clone(), target);
    }
    Ok(by_label.into_values().collect())
}

fn close_over_deps(builder: &Builder, seed: Vec<Arc<Target>>) -> Vec<Arc<Target>> {
    let mut seen: BTreeMap<Label, Arc<Target>> = BTreeMap::new();
    let mut queue = seed;
    while let Some(target) = queue.pop() {
        if seen.insert(target.label.clone(), Arc::clone(&target)).is_some() {
            continue;
        }
        for dep in target.all_deps() {
            if !seen.contains_key(dep)
                && let Some(dep_target) = builder.resolved_target(dep)
            {
                queue.push(Arc::clone(dep_target));
            }
        }
    }
    seen.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::SourceFile;
    use crate::label::ToolchainLabel;
    use camino::Utf8PathBuf;

    fn settings() -> BuildSettings {
        let root = SourceDir::root();
        BuildSettings {
            source_root: Utf8PathBuf::from("/src"),
            build_dir: SourceDir::resolve(&root, "//out").expect("build dir"),
            default_toolchain: ToolchainLabel::parse("//tc:default", &root).expect("toolchain"),
            root_build_file: SourceFile::resolve(&root, "//Kannafile").expect("root file"),
            check_public_headers: false,
            check_system_includes: false,
        }
    }

    fn label(raw: &str) -> Label {
        Label::parse(raw, &SourceDir::root(), &settings().default_toolchain).expect("label")
    }

    #[test]
    fn exact_pattern_matches_one_label() {
        let pattern = LabelPattern::parse("//a:b", &settings()).expect("pattern");
        assert!(pattern.matches(&label("//a:b")));
        assert!(!pattern.matches(&label("//a:c")));
    }

    #[test]
    fn in_dir_pattern_matches_the_directory_only() {
        let pattern = LabelPattern::parse("//a:*", &settings()).expect("pattern");
        assert!(pattern.matches(&label("//a:b")));
        assert!(!pattern.matches(&label("//a/sub:b")));
    }

    #[test]
    fn under_dir_pattern_matches_subdirectories() {
        let pattern = LabelPattern::parse("//a/*", &settings()).expect("pattern");
        assert!(pattern.matches(&label("//a:b")));
        assert!(pattern.matches(&label("//a/sub:b")));
        assert!(!pattern.matches(&label("//ab:b")));
    }
}
