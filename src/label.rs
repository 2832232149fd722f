//! Build item labels.
//!
//! A [`Label`] uniquely identifies a build item as a `(directory, name,
//! toolchain)` triple. Labels order lexicographically over that triple, so the
//! same `//dir:name` pair under two toolchains names two distinct items.
//! [`ToolchainLabel`] is the `(directory, name)` pair naming a toolchain; one
//! toolchain is designated the default at setup time.

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

use crate::files::{PathError, SourceDir};

/// Errors raised while parsing label strings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("label '{0}' has an empty target name")]
    EmptyName(String),
    #[error("label '{0}' has a malformed toolchain suffix")]
    BadToolchainSuffix(String),
    #[error("invalid label '{label}': {source}")]
    BadPath {
        label: String,
        source: PathError,
    },
}

/// Label of a toolchain, e.g. `//build/toolchain:msvc`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ToolchainLabel {
    pub dir: SourceDir,
    pub name: String,
}

impl ToolchainLabel {
    /// Parse a toolchain label, resolving relative forms against `base`.
    ///
    /// # Errors
    ///
    /// Returns an error for empty names or paths escaping the source root.
    pub fn parse(raw: &str, base: &SourceDir) -> Result<Self, LabelError> {
        let (dir, name) = split_dir_and_name(raw, base)?;
        Ok(Self { dir, name })
    }
}

impl Display for ToolchainLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dir, self.name)
    }
}

/// Globally unique identifier of a build item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
    pub dir: SourceDir,
    pub name: String,
    pub toolchain: ToolchainLabel,
}

impl Label {
    /// Parse a label string such as `//base:logging`, `:local`, `//base`, or
    /// `//base:logging(//build/toolchain:msvc)`.
    ///
    /// Relative forms resolve against `base`; labels without an explicit
    /// toolchain suffix inherit `default_toolchain`.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed or root-escaping labels.
    pub fn parse(
        raw: &str,
        base: &SourceDir,
        default_toolchain: &ToolchainLabel,
    ) -> Result<Self, LabelError> {
        let (main, toolchain) = match raw.strip_suffix(')') {
            Some(stripped) => {
                let (main, suffix) = stripped
                    .split_once('(')
                    .ok_or_else(|| LabelError::BadToolchainSuffix(raw.to_owned()))?;
                (main, ToolchainLabel::parse(suffix, base)?)
            }
            None => (raw, default_toolchain.clone()),
        };
        let (dir, name) = split_dir_and_name(main, base)?;
        Ok(Self {
            dir,
            name,
            toolchain,
        })
    }

    /// Render the label, appending the toolchain suffix on request.
    ///
    /// Diagnostics suppress the suffix when every involved item belongs to
    /// the default toolchain.
    #[must_use]
    pub fn to_user_visible(&self, show_toolchain: bool) -> String {
        if show_toolchain {
            format!("{}:{}({})", self.dir, self.name, self.toolchain)
        } else {
            format!("{}:{}", self.dir, self.name)
        }
    }

    /// The `(dir, name)` pair of this label viewed as a toolchain label.
    #[must_use]
    pub fn as_toolchain(&self) -> ToolchainLabel {
        ToolchainLabel {
            dir: self.dir.clone(),
            name: self.name.clone(),
        }
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dir, self.name)
    }
}

fn split_dir_and_name(raw: &str, base: &SourceDir) -> Result<(SourceDir, String), LabelError> {
    let bad_path = |source| LabelError::BadPath {
        label: raw.to_owned(),
        source,
    };
    if let Some((dir_part, name)) = raw.rsplit_once(':') {
        if name.is_empty() || name.contains('/') {
            return Err(LabelError::EmptyName(raw.to_owned()));
        }
        let dir = if dir_part.is_empty() {
            base.clone()
        } else {
            SourceDir::resolve(base, dir_part).map_err(bad_path)?
        };
        return Ok((dir, name.to_owned()));
    }
    // No colon: the name defaults to the last directory component.
    let dir = SourceDir::resolve(base, raw).map_err(bad_path)?;
    let name = dir
        .without_root()
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LabelError::EmptyName(raw.to_owned()))?
        .to_owned();
    Ok((dir, name))
}
