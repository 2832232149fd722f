//! Per-invocation setup.
//!
//! [`Setup`] locates the source root (the nearest ancestor directory holding
//! a `.kanna` file), reads that file's settings, prepares the output
//! directory, and materialises the `args.kanna` file before resolution
//! starts. The resulting [`BuildSettings`] are immutable for the rest of the
//! command.

use std::fs;
use std::io;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::ast::BUILD_FILE_NAME;
use crate::files::{PathError, SourceDir, SourceFile};
use crate::label::{LabelError, ToolchainLabel};
use crate::registry::FileRegistry;
use crate::settings::BuildSettings;

/// Name of the source-root marker file.
pub const ROOT_MARKER_FILE: &str = ".kanna";

/// Name of the build arguments file under the output directory.
pub const ARGS_FILE_NAME: &str = "args.kanna";

/// Errors raised during setup.
#[derive(Debug, Error, Diagnostic)]
pub enum SetupError {
    #[error("no {ROOT_MARKER_FILE} file found in '{start}' or any parent directory")]
    #[diagnostic(
        code(kanna::setup::no_source_root),
        help("create a .kanna file at the root of the source tree")
    )]
    NoSourceRoot { start: Utf8PathBuf },

    #[error("failed to read {path}: {reason}")]
    #[diagnostic(code(kanna::setup::bad_root_config))]
    BadRootConfig { path: Utf8PathBuf, reason: String },

    #[error("invalid default toolchain label")]
    #[diagnostic(code(kanna::setup::bad_toolchain))]
    BadToolchain(#[from] LabelError),

    #[error("invalid root build file path")]
    #[diagnostic(code(kanna::setup::bad_root_build_file))]
    BadRootBuildFile(#[from] PathError),

    #[error("output directory '{0}' must be inside the source tree")]
    #[diagnostic(code(kanna::setup::out_dir_outside_tree))]
    OutDirOutsideTree(String),

    #[error("failed to prepare output directory {path}")]
    #[diagnostic(code(kanna::setup::create_out_dir))]
    CreateOutDir {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}")]
    #[diagnostic(code(kanna::setup::write_args))]
    WriteArgs {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Optional settings read from the `.kanna` root marker.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RootConfig {
    default_toolchain: Option<String>,
    root_build_file: Option<String>,
}

/// Prepares one `gen` invocation.
pub struct Setup {
    start_dir: Utf8PathBuf,
    registry: Arc<FileRegistry>,
    gen_empty_args: bool,
    args_contents: Option<String>,
    check_public_headers: bool,
    check_system_includes: bool,
}

impl Setup {
    /// Start setup from `start_dir` (usually the current directory).
    #[must_use]
    pub fn new(start_dir: Utf8PathBuf) -> Self {
        Self {
            start_dir,
            registry: Arc::new(FileRegistry::new()),
            gen_empty_args: false,
            args_contents: None,
            check_public_headers: false,
            check_system_includes: false,
        }
    }

    /// Create an empty `args.kanna` when none exists.
    pub fn set_gen_empty_args(&mut self, enabled: bool) {
        self.gen_empty_args = enabled;
    }

    /// Overwrite `args.kanna` with the given contents.
    pub fn set_args_contents(&mut self, contents: String) {
        self.args_contents = Some(contents);
    }

    pub fn set_check_public_headers(&mut self, enabled: bool) {
        self.check_public_headers = enabled;
    }

    pub fn set_check_system_includes(&mut self, enabled: bool) {
        self.check_system_includes = enabled;
    }

    /// The process-wide build file registry.
    #[must_use]
    pub fn registry(&self) -> Arc<FileRegistry> {
        Arc::clone(&self.registry)
    }

    /// Resolve the source root and output directory and freeze the settings.
    ///
    /// # Errors
    ///
    /// Returns an error when the source root cannot be found, the root
    /// config is malformed, or the output directory cannot be prepared.
    pub fn do_setup(&mut self, out_dir: &str) -> Result<Arc<BuildSettings>, SetupError> {
        let source_root = self.find_source_root()?;
        let config = read_root_config(&source_root)?;

        let root = SourceDir::root();
        let default_toolchain = ToolchainLabel::parse(
            config
                .default_toolchain
                .as_deref()
                .unwrap_or("//build/toolchain:default"),
            &root,
        )?;
        let default_root_file = format!("//{BUILD_FILE_NAME}");
        let root_build_file = SourceFile::resolve(
            &root,
            config.root_build_file.as_deref().unwrap_or(&default_root_file),
        )?;

        let build_dir = self.resolve_out_dir(&source_root, out_dir)?;
        let settings = Arc::new(BuildSettings {
            source_root,
            build_dir,
            default_toolchain,
            root_build_file,
            check_public_headers: self.check_public_headers,
            check_system_includes: self.check_system_includes,
        });

        let build_dir_disk = settings.build_dir_disk();
        fs::create_dir_all(&build_dir_disk).map_err(|source| SetupError::CreateOutDir {
            path: build_dir_disk.clone(),
            source,
        })?;
        self.write_args_file(&build_dir_disk)?;
        debug!(source_root = %settings.source_root, build_dir = %settings.build_dir, "setup complete");
        Ok(settings)
    }

    fn find_source_root(&self) -> Result<Utf8PathBuf, SetupError> {
        let mut dir = self.start_dir.as_path();
        loop {
            if dir.join(ROOT_MARKER_FILE).is_file() {
                return Ok(dir.to_owned());
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => {
                    return Err(SetupError::NoSourceRoot {
                        start: self.start_dir.clone(),
                    });
                }
            }
        }
    }

    /// Accept either a `//`-rooted path or one relative to the start
    /// directory; both must land inside the source tree.
    fn resolve_out_dir(
        &self,
        source_root: &Utf8Path,
        out_dir: &str,
    ) -> Result<SourceDir, SetupError> {
        let outside = || SetupError::OutDirOutsideTree(out_dir.to_owned());
        if out_dir.starts_with("//") {
            return SourceDir::resolve(&SourceDir::root(), out_dir).map_err(|_| outside());
        }
        let absolute = if Utf8Path::new(out_dir).is_absolute() {
            Utf8PathBuf::from(out_dir)
        } else {
            self.start_dir.join(out_dir)
        };
        let relative = absolute.strip_prefix(source_root).map_err(|_| outside())?;
        SourceDir::resolve(&SourceDir::root(), &format!("//{relative}")).map_err(|_| outside())
    }

    fn write_args_file(&self, build_dir_disk: &Utf8Path) -> Result<(), SetupError> {
        let path = build_dir_disk.join(ARGS_FILE_NAME);
        let write = |contents: &str| {
            fs::write(&path, contents).map_err(|source| SetupError::WriteArgs {
                path: path.clone(),
                source,
            })
        };
        if let Some(contents) = &self.args_contents {
            write(contents)?;
        } else if self.gen_empty_args && !path.is_file() {
            write("")?;
        }
        Ok(())
    }
}

fn read_root_config(source_root: &Utf8Path) -> Result<RootConfig, SetupError> {
    let path = source_root.join(ROOT_MARKER_FILE);
    let text = fs::read_to_string(&path).map_err(|err| SetupError::BadRootConfig {
        path: path.clone(),
        reason: err.to_string(),
    })?;
    if text.trim().is_empty() {
        return Ok(RootConfig::default());
    }
    serde_yml::from_str(&text).map_err(|err| SetupError::BadRootConfig {
        path,
        reason: err.to_string(),
    })
}
