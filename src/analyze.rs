//! Mach-O load command analysis using otool.

use log::debug;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::BundleConfig;
use crate::error::{BundleError, Result};
use crate::paths::{is_loader_relative, SystemLibraryClassifier};

/// Unique third-party library paths reachable from a set of roots.
pub type DependencyClosure = BTreeSet<PathBuf>;

/// What a binary's load commands declare.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadCommands {
    /// `LC_ID_DYLIB`. Only shared libraries have one.
    pub install_name: Option<PathBuf>,
    /// Libraries the binary links against, minus its own install name.
    pub references: BTreeSet<PathBuf>,
}

/// Reads the dynamic library references out of a binary.
pub trait LoadPathInspector {
    /// # Errors
    ///
    /// Returns [`BundleError::Inspection`] if the binary is missing or its
    /// load commands cannot be parsed.
    fn inspect(&self, binary: &Path) -> Result<LoadCommands>;

    fn references(&self, binary: &Path) -> Result<BTreeSet<PathBuf>> {
        Ok(self.inspect(binary)?.references)
    }
}

impl<T: LoadPathInspector + ?Sized> LoadPathInspector for &T {
    fn inspect(&self, binary: &Path) -> Result<LoadCommands> {
        (**self).inspect(binary)
    }
}

/// [`LoadPathInspector`] backed by `otool -L` and `otool -D`.
///
/// otool reads the Mach-O headers directly, so this works on binaries of any
/// architecture without loading them.
#[derive(Debug, Clone)]
pub struct OtoolInspector {
    program: PathBuf,
}

impl OtoolInspector {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_config(config: &BundleConfig) -> Self {
        Self::new(config.otool())
    }
}

impl Default for OtoolInspector {
    fn default() -> Self {
        Self::new("otool")
    }
}

impl LoadPathInspector for OtoolInspector {
    fn inspect(&self, binary: &Path) -> Result<LoadCommands> {
        // Check file exists first for a clear error message
        if !binary.exists() {
            return Err(BundleError::inspection(binary, "file does not exist"));
        }

        let listing = run_tool(&self.program, &["-L"], binary)
            .map_err(|reason| BundleError::inspection(binary, reason))?;
        let id = run_tool(&self.program, &["-D"], binary)
            .map_err(|reason| BundleError::inspection(binary, reason))?;

        let install_name = parse_otool_id(&id);
        let mut references = parse_otool_list(&listing);
        if let Some(name) = &install_name {
            references.remove(name);
        }

        Ok(LoadCommands {
            install_name,
            references,
        })
    }
}

/// Run an external tool against `binary`, returning its stdout.
///
/// A spawn failure or non-zero exit becomes the error string.
pub(crate) fn run_tool(
    program: &Path,
    args: &[&str],
    binary: &Path,
) -> std::result::Result<String, String> {
    let output = Command::new(program)
        .args(args)
        .arg(binary)
        .output()
        .map_err(|e| format!("failed to run {}: {e}", program.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        // otool reports "is not an object file" on stdout
        let detail = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        return Err(format!(
            "{} exited with {}: {}",
            program.display(),
            output.status,
            detail
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse `otool -L` output into the set of referenced library paths.
///
/// Example output:
/// ```text
/// /opt/build/usr/bin/ccnet:
///     /opt/build/usr/lib/libsearpc.1.dylib (compatibility version 2.0.0, current version 2.0.0)
///     /opt/local/lib/libglib-2.0.0.dylib (compatibility version 5001.0.0, current version 5001.3.0)
///     /usr/lib/libSystem.B.dylib (compatibility version 1.0.0, current version 1311.0.0)
/// ```
///
/// Universal binaries repeat the block per architecture under
/// `path (architecture x86_64):` headers; the set collapses the repeats.
pub fn parse_otool_list(output: &str) -> BTreeSet<PathBuf> {
    output
        .lines()
        .filter(|line| line.starts_with(char::is_whitespace))
        .filter_map(|line| {
            let line = line.trim();
            let end = line.rfind(" (compatibility version")?;
            let path = line[..end].trim_end();
            (!path.is_empty()).then(|| PathBuf::from(path))
        })
        .collect()
}

/// Parse `otool -D` output into the install name, if the binary has one.
///
/// Example output for a dylib:
/// ```text
/// /opt/local/lib/libglib-2.0.0.dylib:
/// /opt/local/lib/libglib-2.0.0.dylib
/// ```
/// Executables print only the header line.
pub fn parse_otool_id(output: &str) -> Option<PathBuf> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.ends_with(':'))
        .map(PathBuf::from)
}

/// Compute every non-system library reachable from `roots`.
///
/// Each library is inspected at most once, so shared dependencies and
/// reference cycles terminate. Roots are entry points and never become
/// closure members. Loader-relative references are already bundle-local and
/// are not followed.
///
/// # Errors
///
/// Returns [`BundleError::Closure`] if a root is missing, before anything is
/// inspected, and propagates any inspection failure.
pub fn build_closure<I>(
    inspector: &I,
    classifier: &SystemLibraryClassifier,
    roots: &[PathBuf],
) -> Result<DependencyClosure>
where
    I: LoadPathInspector + ?Sized,
{
    if let Some(missing) = roots.iter().find(|r| !r.is_file()) {
        return Err(BundleError::Closure(missing.clone()));
    }

    // References spell paths their own way, so compare resolved paths
    let root_set: HashSet<PathBuf> = roots.iter().map(|r| resolved(r)).collect();
    let mut closure = DependencyClosure::new();
    let mut queue = VecDeque::new();

    for root in roots {
        queue.extend(inspector.references(root)?);
    }

    while let Some(candidate) = queue.pop_front() {
        if closure.contains(&candidate) || root_set.contains(&resolved(&candidate)) {
            continue;
        }
        if is_loader_relative(&candidate) {
            debug!("not following loader-relative {}", candidate.display());
            continue;
        }
        if classifier.is_system_library(&candidate) {
            debug!("system library {}", candidate.display());
            continue;
        }

        // New library - its own dependencies have to come along too
        queue.extend(inspector.references(&candidate)?);
        debug!("closure member {}", candidate.display());
        closure.insert(candidate);
    }

    Ok(closure)
}

/// Canonical form of `path`, or the path as written if it cannot be resolved.
fn resolved(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
