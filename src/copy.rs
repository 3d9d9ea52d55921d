//! Copying the dependency closure into the bundle.

use log::{debug, info};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::Builder;

use crate::analyze::DependencyClosure;
use crate::error::{BundleError, Result};
use crate::paths::file_name;

/// Name prefix of in-progress copies. Hidden, so never taken for a library.
const STAGING_PREFIX: &str = ".leviso-";

/// Where each closure member lands inside the bundle directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleLayout {
    dest_dir: PathBuf,
    /// Bundle file name -> source library.
    entries: BTreeMap<String, PathBuf>,
}

impl BundleLayout {
    /// Map every library to `dest_dir/<basename>`.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::Collision`] if two different libraries share a
    /// base name, since only one of them could live in the bundle, and
    /// [`BundleError::UnnamedLibrary`] for a path with no file name.
    pub fn plan(closure: &DependencyClosure, dest_dir: &Path) -> Result<Self> {
        let mut entries: BTreeMap<String, PathBuf> = BTreeMap::new();

        for lib in closure {
            let name = file_name(lib)
                .ok_or_else(|| BundleError::UnnamedLibrary(lib.clone()))?
                .to_string();

            if let Some(first) = entries.get(&name) {
                return Err(BundleError::Collision {
                    name,
                    first: first.clone(),
                    second: lib.clone(),
                });
            }
            entries.insert(name, lib.clone());
        }

        Ok(Self {
            dest_dir: dest_dir.to_path_buf(),
            entries,
        })
    }

    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    /// `(source, destination)` pairs in file-name order.
    pub fn entries(&self) -> impl Iterator<Item = (&Path, PathBuf)> {
        self.entries
            .iter()
            .map(|(name, src)| (src.as_path(), self.dest_dir.join(name)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a copy pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopySummary {
    pub copied: Vec<PathBuf>,
    /// Destinations that already existed from an earlier run.
    pub skipped: Vec<PathBuf>,
}

/// Make a file executable (chmod 755).
pub fn make_executable(path: &Path) -> std::io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)
}

/// Copy every library in `closure` into `dest_dir`.
///
/// Files already present in `dest_dir` are left alone, so a failed run can
/// be retried without cleaning up. New copies are made `0755` in a hidden
/// staging file and renamed into place, so an interrupted copy never shows
/// up under the library's name.
///
/// # Errors
///
/// Fails on a base-name collision before touching the filesystem, and on the
/// first copy or chmod failure after that. A partially populated directory
/// is left in place.
pub fn copy_all(closure: &DependencyClosure, dest_dir: &Path) -> Result<CopySummary> {
    let layout = BundleLayout::plan(closure, dest_dir)?;
    copy_layout(&layout)
}

/// Copy a planned layout. See [`copy_all`].
pub fn copy_layout(layout: &BundleLayout) -> Result<CopySummary> {
    fs::create_dir_all(layout.dest_dir()).map_err(|source| BundleError::Layout {
        dir: layout.dest_dir().to_path_buf(),
        source,
    })?;

    let mut summary = CopySummary::default();
    for (src, dest) in layout.entries() {
        if dest.exists() {
            debug!("already bundled: {}", dest.display());
            summary.skipped.push(dest);
            continue; // Already copied
        }

        info!("Copying {}", src.display());
        let copy_err = |source| BundleError::Copy {
            src: src.to_path_buf(),
            dest: dest.clone(),
            source,
        };
        let mut staged = Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(layout.dest_dir())
            .map_err(copy_err)?;
        let mut input = fs::File::open(src).map_err(copy_err)?;
        io::copy(&mut input, staged.as_file_mut()).map_err(copy_err)?;
        make_executable(staged.path()).map_err(copy_err)?;
        staged.persist(&dest).map_err(|e| copy_err(e.error))?;
        summary.copied.push(dest);
    }

    Ok(summary)
}

/// Regular files directly inside `dir`, sorted.
///
/// Subdirectories (framework bundles placed by other tools), symlinks and
/// hidden files are not included.
pub fn bundled_binaries(dir: &Path) -> Result<Vec<PathBuf>> {
    let layout_err = |source| BundleError::Layout {
        dir: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(layout_err)? {
        let entry = entry.map_err(layout_err)?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.file_type().map_err(layout_err)?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_lib(dir: &Path, name: &str, contents: &str) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn closure_of(paths: &[&PathBuf]) -> DependencyClosure {
        paths.iter().map(|p| (*p).clone()).collect()
    }

    #[test]
    fn test_copy_all_creates_dest_and_sets_mode() {
        let temp = TempDir::new().unwrap();
        let foo = write_lib(&temp.path().join("opt/lib"), "libfoo.dylib", "foo");
        let dest = temp.path().join("app/Contents/Frameworks");

        let summary = copy_all(&closure_of(&[&foo]), &dest).unwrap();

        let copied = dest.join("libfoo.dylib");
        assert_eq!(summary.copied, vec![copied.clone()]);
        assert!(summary.skipped.is_empty());
        assert_eq!(fs::read_to_string(&copied).unwrap(), "foo");
        let mode = fs::metadata(&copied).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_copy_all_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let foo = write_lib(&temp.path().join("opt/lib"), "libfoo.dylib", "foo");
        let bar = write_lib(&temp.path().join("opt/lib"), "libbar.dylib", "bar");
        let dest = temp.path().join("Frameworks");
        let closure = closure_of(&[&foo, &bar]);

        copy_all(&closure, &dest).unwrap();
        let second = copy_all(&closure, &dest).unwrap();

        assert!(second.copied.is_empty());
        assert_eq!(second.skipped.len(), 2);
        assert_eq!(bundled_binaries(&dest).unwrap().len(), 2);
    }

    #[test]
    fn test_existing_file_is_not_overwritten() {
        let temp = TempDir::new().unwrap();
        let foo = write_lib(&temp.path().join("opt/lib"), "libfoo.dylib", "new");
        let dest = temp.path().join("Frameworks");
        // Stands in for a copy that was already rewritten in place
        write_lib(&dest, "libfoo.dylib", "rewritten");

        copy_all(&closure_of(&[&foo]), &dest).unwrap();
        assert_eq!(
            fs::read_to_string(dest.join("libfoo.dylib")).unwrap(),
            "rewritten"
        );
    }

    #[test]
    fn test_basename_collision_fails_before_copy() {
        let temp = TempDir::new().unwrap();
        let a = write_lib(&temp.path().join("opt/local/lib"), "libz.1.dylib", "a");
        let b = write_lib(&temp.path().join("usr/local/lib"), "libz.1.dylib", "b");
        let dest = temp.path().join("Frameworks");

        let err = copy_all(&closure_of(&[&a, &b]), &dest).unwrap_err();
        assert!(matches!(err, BundleError::Collision { ref name, .. } if name == "libz.1.dylib"));
        assert!(!dest.exists());
    }

    #[test]
    fn test_missing_source_names_pair() {
        let temp = TempDir::new().unwrap();
        let gone = temp.path().join("opt/lib/libgone.dylib");
        let dest = temp.path().join("Frameworks");

        let err = copy_all(&closure_of(&[&gone]), &dest).unwrap_err();
        match err {
            BundleError::Copy { src, dest: d, .. } => {
                assert_eq!(src, gone);
                assert_eq!(d, dest.join("libgone.dylib"));
            }
            other => panic!("expected copy error, got {other:?}"),
        }
    }

    #[test]
    fn test_failed_copy_leaves_nothing_behind_and_retries() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("opt/lib/libfoo.dylib");
        // A directory opens fine but fails on the first read
        fs::create_dir_all(&src).unwrap();
        let dest = temp.path().join("Frameworks");
        let closure = closure_of(&[&src]);

        let err = copy_all(&closure, &dest).unwrap_err();
        assert!(matches!(err, BundleError::Copy { .. }));
        assert!(!dest.join("libfoo.dylib").exists());
        assert_eq!(fs::read_dir(&dest).unwrap().count(), 0);

        fs::remove_dir(&src).unwrap();
        fs::write(&src, "foo").unwrap();
        let retry = copy_all(&closure, &dest).unwrap();

        assert_eq!(retry.copied, vec![dest.join("libfoo.dylib")]);
        assert_eq!(fs::read_to_string(dest.join("libfoo.dylib")).unwrap(), "foo");
    }

    #[test]
    fn test_path_without_file_name_is_rejected() {
        let temp = TempDir::new().unwrap();
        let closure = closure_of(&[&PathBuf::from("/")]);

        let err = BundleLayout::plan(&closure, temp.path()).unwrap_err();
        assert!(matches!(err, BundleError::UnnamedLibrary(ref p) if p == Path::new("/")));
    }

    #[test]
    fn test_bundled_binaries_skips_dirs_symlinks_and_hidden() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        write_lib(dir, "libb.dylib", "b");
        write_lib(dir, "liba.dylib", "a");
        fs::create_dir_all(dir.join("QtCore.framework")).unwrap();
        std::os::unix::fs::symlink(dir.join("liba.dylib"), dir.join("liba.1.dylib")).unwrap();
        write_lib(dir, ".leviso-a1b2c3", "partial");

        let files = bundled_binaries(dir).unwrap();
        assert_eq!(files, vec![dir.join("liba.dylib"), dir.join("libb.dylib")]);
    }
}
