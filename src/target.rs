//! Resolved build targets.
//!
//! A [`Target`] is the typed form of a [`TargetDef`](crate::ast::TargetDef):
//! every path has been normalised, every dependency string parsed into a
//! [`Label`], and the produced [`OutputFile`] set computed. Targets are
//! immutable once resolved and shared by `Arc` with worker threads.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::TargetDef;
use crate::files::{OutputFile, PathError, SourceDir, SourceFile};
use crate::label::{Label, LabelError, ToolchainLabel};
use crate::settings::BuildSettings;

/// Errors raised while resolving a target definition.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error(transparent)]
    Label(#[from] LabelError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("output '{output}' of {label} is not under the build directory {build_dir}")]
    OutputOutsideBuildDir {
        label: Label,
        output: SourceFile,
        build_dir: SourceDir,
    },
    #[error("{label} is {target_type} but declares no outputs")]
    MissingOutputs {
        label: Label,
        target_type: TargetType,
    },
}

/// What a target produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Executable,
    StaticLibrary,
    SharedLibrary,
    SourceSet,
    Group,
    Action,
    Copy,
}

impl TargetType {
    /// True for targets that compile source code.
    #[must_use]
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            Self::Executable | Self::StaticLibrary | Self::SharedLibrary | Self::SourceSet
        )
    }

    /// The name used in build files and diagnostics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Executable => "executable",
            Self::StaticLibrary => "static_library",
            Self::SharedLibrary => "shared_library",
            Self::SourceSet => "source_set",
            Self::Group => "group",
            Self::Action => "action",
            Self::Copy => "copy",
        }
    }
}

impl std::fmt::Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved build item.
#[derive(Debug)]
pub struct Target {
    pub label: Label,
    pub target_type: TargetType,
    pub sources: Vec<SourceFile>,
    pub inputs: Vec<SourceFile>,
    pub public_deps: Vec<Label>,
    pub private_deps: Vec<Label>,
    pub data_deps: Vec<Label>,
    /// Outputs the target produces, relative to the build directory. Stable
    /// once the target is resolved.
    pub outputs: Vec<OutputFile>,
    /// Primary output of each linked dependency, public deps first. Filled
    /// by the builder at resolution, when every dependency is known.
    pub linked_dep_outputs: Vec<OutputFile>,
    /// Primary output of each data dependency. Filled at resolution.
    pub data_dep_outputs: Vec<OutputFile>,
    /// Script an action runs.
    pub script: Option<SourceFile>,
    /// Extra arguments for the action command line.
    pub script_args: Vec<String>,
    pub jumbo: Option<bool>,
}

impl Target {
    /// Resolve a raw definition declared in `dir` into a typed target.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed labels or paths, for declared outputs
    /// outside the build directory, and for actions or copies without any
    /// output.
    pub fn from_def(
        settings: &BuildSettings,
        dir: &SourceDir,
        def: &TargetDef,
    ) -> Result<Self, TargetError> {
        let toolchain = match &def.toolchain {
            Some(raw) => ToolchainLabel::parse(raw, dir)?,
            None => settings.default_toolchain.clone(),
        };
        let label = Label {
            dir: dir.clone(),
            name: def.name.clone(),
            toolchain: toolchain.clone(),
        };

        let resolve_files = |raw: &[String]| -> Result<Vec<SourceFile>, PathError> {
            raw.iter().map(|s| SourceFile::resolve(dir, s)).collect()
        };
        let resolve_labels = |raw: &[String]| -> Result<Vec<Label>, LabelError> {
            raw.iter().map(|s| Label::parse(s, dir, &toolchain)).collect()
        };

        let sources = resolve_files(&def.sources)?;
        let inputs = resolve_files(&def.inputs)?;
        let script = def
            .script
            .as_deref()
            .map(|raw| SourceFile::resolve(dir, raw))
            .transpose()?;
        let public_deps = resolve_labels(&def.public_deps)?;
        let private_deps = resolve_labels(&def.deps)?;
        let data_deps = resolve_labels(&def.data_deps)?;

        let outputs = if def.outputs.is_empty() {
            default_outputs(settings, &label, def.target_type)?
        } else {
            let mut outputs = Vec::with_capacity(def.outputs.len());
            for raw in &def.outputs {
                let file = SourceFile::resolve(dir, raw)?;
                let output = settings.output_file_for(&file).ok_or_else(|| {
                    TargetError::OutputOutsideBuildDir {
                        label: label.clone(),
                        output: file.clone(),
                        build_dir: settings.build_dir.clone(),
                    }
                })?;
                outputs.push(output);
            }
            outputs
        };

        Ok(Self {
            label,
            target_type: def.target_type,
            sources,
            inputs,
            public_deps,
            private_deps,
            data_deps,
            outputs,
            linked_dep_outputs: Vec::new(),
            data_dep_outputs: Vec::new(),
            script,
            script_args: def.args.clone(),
            jumbo: def.jumbo,
        })
    }

    /// True for targets that compile source code.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.target_type.is_binary()
    }

    /// Dependencies that participate in linking: public then private.
    pub fn linked_deps(&self) -> impl Iterator<Item = &Label> {
        self.public_deps.iter().chain(&self.private_deps)
    }

    /// Every dependency label, in declaration-class order.
    pub fn all_deps(&self) -> impl Iterator<Item = &Label> {
        self.linked_deps().chain(&self.data_deps)
    }

    /// The output naming the target as a dependency input.
    #[must_use]
    pub fn primary_output(&self) -> Option<&OutputFile> {
        self.outputs.first()
    }

    #[must_use]
    pub fn is_jumbo_configured(&self) -> bool {
        self.jumbo.is_some()
    }

    #[must_use]
    pub fn is_jumbo_allowed(&self) -> bool {
        self.jumbo == Some(true)
    }
}

/// Build-dir prefix isolating non-default toolchains, e.g. `alt/`.
pub(crate) fn toolchain_output_prefix(settings: &BuildSettings, label: &Label) -> String {
    if label.toolchain == settings.default_toolchain {
        String::new()
    } else {
        format!("{}/", label.toolchain.name)
    }
}

/// Object directory of a target, e.g. `obj/base` or `alt/obj/base`.
pub(crate) fn object_dir(settings: &BuildSettings, label: &Label) -> String {
    let prefix = toolchain_output_prefix(settings, label);
    if label.dir.is_root() {
        format!("{prefix}obj")
    } else {
        format!("{prefix}obj/{}", label.dir.without_root())
    }
}

/// Compute the conventional outputs for target types without explicit ones.
///
/// The layout is deterministic from the label alone; non-default toolchains
/// build into a subdirectory named after the toolchain.
fn default_outputs(
    settings: &BuildSettings,
    label: &Label,
    target_type: TargetType,
) -> Result<Vec<OutputFile>, TargetError> {
    let toolchain_prefix = toolchain_output_prefix(settings, label);
    let obj_dir = object_dir(settings, label);
    let path = match target_type {
        TargetType::Executable => format!("{toolchain_prefix}bin/{}", label.name),
        TargetType::SharedLibrary => format!("{toolchain_prefix}lib/lib{}.so", label.name),
        TargetType::StaticLibrary => format!("{obj_dir}/lib{}.a", label.name),
        TargetType::SourceSet | TargetType::Group => format!("{obj_dir}/{}.stamp", label.name),
        TargetType::Action | TargetType::Copy => {
            return Err(TargetError::MissingOutputs {
                label: label.clone(),
                target_type,
            });
        }
    };
    Ok(vec![OutputFile::new(path)])
}
