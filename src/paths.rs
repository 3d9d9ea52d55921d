//! Path classification and executable searching.

use std::env;
use std::path::{Path, PathBuf};

/// Decides whether a library belongs to the base operating system.
///
/// Only the path is consulted, never the filesystem, so the answer for a
/// given input is always the same.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemLibraryClassifier {
    prefixes: Vec<PathBuf>,
}

impl Default for SystemLibraryClassifier {
    fn default() -> Self {
        Self::new(["/usr/lib", "/System"])
    }
}

impl SystemLibraryClassifier {
    pub fn new<I, P>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn prefixes(&self) -> &[PathBuf] {
        &self.prefixes
    }

    /// Component-wise prefix match: `/usr/lib` covers `/usr/lib/swift/...`
    /// but not `/usr/libexec` or `/usr/local/lib`.
    #[must_use]
    pub fn is_system_library(&self, path: &Path) -> bool {
        self.prefixes.iter().any(|prefix| path.starts_with(prefix))
    }
}

/// True for `@loader_path/...`, `@executable_path/...` and `@rpath/...`
/// references, which the loader resolves relative to the bundle.
#[must_use]
pub fn is_loader_relative(path: &Path) -> bool {
    path.to_string_lossy().starts_with('@')
}

/// Base file name as UTF-8, if it has one.
#[must_use]
pub fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// Find an executable by name in the given directories, first match wins.
///
/// Returns `None` if no directory holds a regular file with that name.
#[must_use = "found executable path should be used"]
pub fn find_in_path<I, P>(name: &str, dirs: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    dirs.into_iter()
        .filter_map(|d| {
            let dir = d.as_ref();
            // An empty $PATH entry is not the current directory here
            (!dir.as_os_str().is_empty()).then(|| dir.join(name))
        })
        .find(|p| p.is_file())
}

/// Find an executable by name in `$PATH`.
#[must_use = "found executable path should be used"]
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    find_in_path(name, env::split_paths(&path_var))
}

/// Resolve a root argument: anything containing a separator, or naming a
/// file in the current directory, is taken as a path. Other bare names are
/// searched in `$PATH`.
#[must_use]
pub fn resolve_root(arg: &str) -> Option<PathBuf> {
    let path = Path::new(arg);
    if arg.contains('/') || path.is_file() {
        Some(path.to_path_buf())
    } else {
        find_executable(arg)
    }
}
