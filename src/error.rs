//! Error type shared by every bundling stage.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BundleError>;

/// Every variant aborts the packaging run. Nothing is retried.
#[derive(Debug, Error)]
pub enum BundleError {
    /// A binary's load commands could not be read.
    #[error("failed to inspect {}: {reason}", binary.display())]
    Inspection { binary: PathBuf, reason: String },

    /// A root binary is absent.
    #[error("root binary does not exist: {}", .0.display())]
    Closure(PathBuf),

    /// Two different libraries would land on the same bundle file.
    #[error(
        "bundle name collision for {name}: {} and {}",
        first.display(),
        second.display()
    )]
    Collision {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// A closure member has no file name to bundle it under.
    #[error("library path has no file name: {}", .0.display())]
    UnnamedLibrary(PathBuf),

    #[error("failed to copy {} to {}: {source}", src.display(), dest.display())]
    Copy {
        src: PathBuf,
        dest: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to rewrite {library} in {}: {reason}", binary.display())]
    Rewrite {
        binary: PathBuf,
        library: String,
        reason: String,
    },

    /// The bundle directory itself could not be created or listed.
    #[error("bundle directory {}: {source}", dir.display())]
    Layout {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BundleError {
    pub(crate) fn inspection(binary: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Inspection {
            binary: binary.into(),
            reason: reason.into(),
        }
    }
}
