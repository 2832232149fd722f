//! Build description file structures.
//!
//! A `Kannafile` is a YAML document declaring the targets and toolchains of
//! one directory. These types are the raw parsed form; label and path strings
//! are resolved into typed values by the builder.
//!
//! ```yaml
//! targets:
//!   - name: hello
//!     type: executable
//!     sources: [hello.cc, main.cc]
//!     deps: ["//base:base"]
//! ```

use serde::{Deserialize, Serialize};

use crate::target::TargetType;

/// File name of the per-directory build description.
pub const BUILD_FILE_NAME: &str = "Kannafile";

/// One parsed build description file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildFile {
    /// Targets declared by this directory.
    #[serde(default)]
    pub targets: Vec<TargetDef>,

    /// Toolchains declared by this directory.
    #[serde(default)]
    pub toolchains: Vec<ToolchainDef>,
}

/// Raw declaration of a single target.
///
/// Path fields resolve against the declaring file's directory; label fields
/// resolve against the directory and the target's toolchain.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TargetDef {
    /// Short name; globally unique together with the directory and toolchain.
    pub name: String,

    /// What the target produces.
    #[serde(rename = "type")]
    pub target_type: TargetType,

    /// Files compiled or consumed by the target.
    #[serde(default)]
    pub sources: Vec<String>,

    /// Additional files the target reads without compiling.
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Files the target produces. Required for actions and copies; computed
    /// from the target type otherwise.
    #[serde(default)]
    pub outputs: Vec<String>,

    /// Private dependencies.
    #[serde(default)]
    pub deps: Vec<String>,

    /// Dependencies forwarded to dependents.
    #[serde(default)]
    pub public_deps: Vec<String>,

    /// Runtime-only dependencies.
    #[serde(default)]
    pub data_deps: Vec<String>,

    /// Script an action runs, resolved like a source path.
    #[serde(default)]
    pub script: Option<String>,

    /// Extra arguments appended to an action's command line.
    #[serde(default)]
    pub args: Vec<String>,

    /// Toolchain override; the default toolchain applies when absent.
    #[serde(default)]
    pub toolchain: Option<String>,

    /// Jumbo classification. Reporting only.
    #[serde(default)]
    pub jumbo: Option<bool>,
}

/// Raw declaration of a toolchain.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolchainDef {
    /// Short name; the toolchain label is the declaring directory plus this.
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_build_file() {
        let yaml = "targets:\n  - name: hello\n    type: executable\n    sources: [hello.cc]\n";
        let file: BuildFile = serde_yml::from_str(yaml).expect("parse");
        assert_eq!(file.targets.len(), 1);
        assert_eq!(file.targets[0].name, "hello");
        assert_eq!(file.targets[0].target_type, TargetType::Executable);
        assert!(file.toolchains.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let yaml = "targets:\n  - name: x\n    type: group\n    shiny: true\n";
        assert!(serde_yml::from_str::<BuildFile>(yaml).is_err());
    }

    #[test]
    fn missing_type_is_an_error() {
        let yaml = "targets:\n  - name: x\n";
        assert!(serde_yml::from_str::<BuildFile>(yaml).is_err());
    }
}
