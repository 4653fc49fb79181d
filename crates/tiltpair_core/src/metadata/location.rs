//! `block@path` addressing for record tables.

use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Address of one record table: a named block inside a file.
///
/// The empty block name is the file's default block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MdLocation {
    block: String,
    path: PathBuf,
}

impl MdLocation {
    pub fn new(block: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            block: block.into(),
            path: path.into(),
        }
    }

    /// Default block of `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(String::new(), path)
    }

    /// Parses `block@path`; text without `@` addresses the default block.
    pub fn parse(value: &str) -> Self {
        match value.split_once('@') {
            Some((block, path)) => Self::new(block.trim(), path.trim()),
            None => Self::file(value.trim()),
        }
    }

    pub fn block(&self) -> &str {
        &self.block
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Display for MdLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.block.is_empty() {
            write!(f, "{}", self.path.display())
        } else {
            write!(f, "{}@{}", self.block, self.path.display())
        }
    }
}
