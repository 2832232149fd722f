//! Global settings for one `gen` invocation.
//!
//! [`BuildSettings`] is fixed by setup and shared read-only with every
//! component, replacing any process-wide state.

use camino::Utf8PathBuf;

use crate::files::{OutputFile, SourceDir, SourceFile};
use crate::label::ToolchainLabel;

/// Immutable settings resolved during setup.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// Absolute path of the source root on disk.
    pub source_root: Utf8PathBuf,
    /// Build directory as a source-absolute path, e.g. `//out/debug`.
    pub build_dir: SourceDir,
    /// The toolchain assigned to labels without an explicit suffix.
    pub default_toolchain: ToolchainLabel,
    /// The build description file seeding resolution.
    pub root_build_file: SourceFile,
    /// `--check` was passed.
    pub check_public_headers: bool,
    /// `--check=system` was passed.
    pub check_system_includes: bool,
}

impl BuildSettings {
    /// Absolute disk path of a source file.
    #[must_use]
    pub fn disk_path(&self, file: &SourceFile) -> Utf8PathBuf {
        self.source_root.join(file.without_root())
    }

    /// Absolute disk path of the build directory.
    #[must_use]
    pub fn build_dir_disk(&self) -> Utf8PathBuf {
        self.source_root.join(self.build_dir.without_root())
    }

    /// Absolute disk path of an output file.
    #[must_use]
    pub fn output_disk_path(&self, output: &OutputFile) -> Utf8PathBuf {
        self.build_dir_disk().join(output.as_str())
    }

    /// Rewrite a source file relative to the build directory, the form Ninja
    /// rules consume (`../../base/a.cc` for a build dir two levels deep).
    #[must_use]
    pub fn rebase_to_build_dir(&self, file: &SourceFile) -> String {
        if let Some(output) = self.output_file_for(file) {
            return output.as_str().to_owned();
        }
        let mut rebased = "../".repeat(self.build_dir.depth());
        rebased.push_str(file.without_root());
        rebased
    }

    /// The output file corresponding to `file`, when it lies under the build
    /// directory.
    #[must_use]
    pub fn output_file_for(&self, file: &SourceFile) -> Option<OutputFile> {
        OutputFile::from_source_file(&self.build_dir, file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> BuildSettings {
        let root = SourceDir::root();
        BuildSettings {
            source_root: Utf8PathBuf::from("/src"),
            build_dir: SourceDir::resolve(&root, "//out/debug").expect("build dir"),
            default_toolchain: ToolchainLabel::parse("//build/toolchain:default", &root)
                .expect("toolchain"),
            root_build_file: SourceFile::resolve(&root, "//Kannafile").expect("root file"),
            check_public_headers: false,
            check_system_includes: false,
        }
    }

    #[test]
    fn rebase_climbs_out_of_the_build_dir() {
        let settings = settings();
        let file = SourceFile::resolve(&SourceDir::root(), "//base/a.cc").expect("file");
        assert_eq!(settings.rebase_to_build_dir(&file), "../../base/a.cc");
    }

    #[test]
    fn rebase_keeps_generated_files_relative() {
        let settings = settings();
        let file = SourceFile::resolve(&SourceDir::root(), "//out/debug/gen/b.h").expect("file");
        assert_eq!(settings.rebase_to_build_dir(&file), "gen/b.h");
    }

    #[test]
    fn disk_paths_join_the_source_root() {
        let settings = settings();
        let file = SourceFile::resolve(&SourceDir::root(), "//base/a.cc").expect("file");
        assert_eq!(settings.disk_path(&file), Utf8PathBuf::from("/src/base/a.cc"));
        assert_eq!(
            settings.build_dir_disk(),
            Utf8PathBuf::from("/src/out/debug")
        );
    }
}
