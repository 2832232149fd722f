//! Source-absolute and build-relative path types.
//!
//! All build items are described with paths rooted at the source tree
//! (`//dir/file`). [`SourceFile`] and [`SourceDir`] normalise those strings so
//! equality and ordering are byte-exact. [`OutputFile`] is a path relative to
//! the build directory, derived from a [`SourceFile`] by stripping the build
//! directory prefix.

use std::fmt::{self, Display, Formatter};

use serde::Serialize;
use thiserror::Error;

/// Prefix marking a path as source-absolute.
pub const ROOT_MARKER: &str = "//";

/// Errors raised while normalising source-tree paths.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    /// A `..` segment walked above the source root.
    #[error("path '{0}' escapes the source root")]
    EscapesRoot(String),
    /// The path resolved to the bare root where a file was required.
    #[error("path '{0}' does not name a file")]
    NotAFile(String),
}

fn normalize(base: &[String], raw: &str) -> Result<Vec<String>, PathError> {
    let (mut parts, rest) = if let Some(stripped) = raw.strip_prefix(ROOT_MARKER) {
        (Vec::new(), stripped)
    } else {
        (base.to_vec(), raw)
    };
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(PathError::EscapesRoot(raw.to_owned()));
                }
            }
            other => parts.push(other.to_owned()),
        }
    }
    Ok(parts)
}

/// A normalised file path under the source root, e.g. `//base/logging.cc`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SourceFile(String);

impl SourceFile {
    /// Resolve `raw` against `base`, normalising `.` and `..` segments.
    ///
    /// # Errors
    ///
    /// Returns an error when the path escapes the source root or names the
    /// root itself.
    pub fn resolve(base: &SourceDir, raw: &str) -> Result<Self, PathError> {
        let parts = normalize(&base.segments(), raw)?;
        if parts.is_empty() {
            return Err(PathError::NotAFile(raw.to_owned()));
        }
        Ok(Self(format!("{ROOT_MARKER}{}", parts.join("/"))))
    }

    /// The normalised `//`-rooted string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path without its `//` prefix.
    #[must_use]
    pub fn without_root(&self) -> &str {
        &self.0[ROOT_MARKER.len()..]
    }

    /// The directory containing this file.
    #[must_use]
    pub fn dir(&self) -> SourceDir {
        match self.0.rfind('/') {
            Some(idx) if idx >= ROOT_MARKER.len() => SourceDir(self.0[..idx].to_owned()),
            _ => SourceDir::root(),
        }
    }

    /// Whether the file lives under `dir`.
    #[must_use]
    pub fn is_under(&self, dir: &SourceDir) -> bool {
        if dir.is_root() {
            return true;
        }
        self.0
            .strip_prefix(dir.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl Display for SourceFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalised directory under the source root, e.g. `//base` (root is `//`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SourceDir(String);

impl SourceDir {
    /// The source root itself.
    #[must_use]
    pub fn root() -> Self {
        Self(ROOT_MARKER.to_owned())
    }

    /// Resolve `raw` against `base` as a directory path.
    ///
    /// # Errors
    ///
    /// Returns an error when the path escapes the source root.
    pub fn resolve(base: &SourceDir, raw: &str) -> Result<Self, PathError> {
        let parts = normalize(&base.segments(), raw)?;
        if parts.is_empty() {
            return Ok(Self::root());
        }
        Ok(Self(format!("{ROOT_MARKER}{}", parts.join("/"))))
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_MARKER
    }

    /// The normalised `//`-rooted string without a trailing slash.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The directory path without its `//` prefix (empty for the root).
    #[must_use]
    pub fn without_root(&self) -> &str {
        self.0.get(ROOT_MARKER.len()..).unwrap_or("")
    }

    /// A file directly inside this directory.
    ///
    /// # Errors
    ///
    /// Propagates normalisation failures from [`SourceFile::resolve`].
    pub fn file(&self, name: &str) -> Result<SourceFile, PathError> {
        SourceFile::resolve(self, name)
    }

    fn segments(&self) -> Vec<String> {
        let rest = self.without_root();
        if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/').map(str::to_owned).collect()
        }
    }

    /// Number of path components below the source root.
    #[must_use]
    pub fn depth(&self) -> usize {
        let rest = self.without_root();
        if rest.is_empty() {
            0
        } else {
            rest.split('/').count()
        }
    }
}

impl Display for SourceDir {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A path relative to the build directory, e.g. `gen/b.h` or `obj/base/a.o`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct OutputFile(String);

impl OutputFile {
    /// Wrap an already build-dir-relative path.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Derive the output file corresponding to `file`, or `None` when the
    /// file does not live under the build directory.
    #[must_use]
    pub fn from_source_file(build_dir: &SourceDir, file: &SourceFile) -> Option<Self> {
        file.as_str()
            .strip_prefix(build_dir.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .map(|rest| Self(rest.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OutputFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn dir(s: &str) -> SourceDir {
        SourceDir::resolve(&SourceDir::root(), s).expect("dir")
    }

    #[rstest]
    #[case("//base", "logging.cc", "//base/logging.cc")]
    #[case("//base", "//net/socket.cc", "//net/socket.cc")]
    #[case("//base", "./sub/../logging.cc", "//base/logging.cc")]
    #[case("//", "main.cc", "//main.cc")]
    fn source_file_resolution(#[case] base: &str, #[case] raw: &str, #[case] expected: &str) {
        let file = SourceFile::resolve(&dir(base), raw).expect("resolve");
        assert_eq!(file.as_str(), expected);
    }

    #[test]
    fn source_file_rejects_root_escape() {
        let err = SourceFile::resolve(&dir("//base"), "../../nope.cc").unwrap_err();
        assert_eq!(err, PathError::EscapesRoot("../../nope.cc".to_owned()));
    }

    #[test]
    fn source_file_dir_of_root_level_file() {
        let file = SourceFile::resolve(&SourceDir::root(), "main.cc").expect("resolve");
        assert!(file.dir().is_root());
    }

    #[rstest]
    #[case("//out/debug/gen/b.h", "//out/debug", Some("gen/b.h"))]
    #[case("//src/b.h", "//out/debug", None)]
    #[case("//out/debugged/b.h", "//out/debug", None)]
    fn output_file_derivation(
        #[case] file: &str,
        #[case] build_dir: &str,
        #[case] expected: Option<&str>,
    ) {
        let file = SourceFile::resolve(&SourceDir::root(), file).expect("file");
        let derived = OutputFile::from_source_file(&dir(build_dir), &file);
        assert_eq!(derived.as_ref().map(OutputFile::as_str), expected);
    }

    #[test]
    fn source_dir_depth_counts_components() {
        assert_eq!(SourceDir::root().depth(), 0);
        assert_eq!(dir("//out").depth(), 1);
        assert_eq!(dir("//out/debug").depth(), 2);
    }
}
