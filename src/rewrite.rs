//! Pointing load paths at the bundled copies using install_name_tool.

use log::{debug, info};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::analyze::{run_tool, LoadPathInspector};
use crate::config::BundleConfig;
use crate::copy::bundled_binaries;
use crate::error::{BundleError, Result};
use crate::paths::file_name;

/// Edits load commands of a binary in place.
///
/// Implementations report failure as a plain reason; the caller attaches the
/// binary and library to build a [`BundleError::Rewrite`].
pub trait LoadPathEditor {
    /// Replace the reference `old` with `new`.
    fn change_reference(
        &self,
        binary: &Path,
        old: &Path,
        new: &str,
    ) -> std::result::Result<(), String>;

    /// Replace the binary's own install name.
    fn set_install_name(&self, binary: &Path, new: &str) -> std::result::Result<(), String>;
}

impl<T: LoadPathEditor + ?Sized> LoadPathEditor for &T {
    fn change_reference(
        &self,
        binary: &Path,
        old: &Path,
        new: &str,
    ) -> std::result::Result<(), String> {
        (**self).change_reference(binary, old, new)
    }

    fn set_install_name(&self, binary: &Path, new: &str) -> std::result::Result<(), String> {
        (**self).set_install_name(binary, new)
    }
}

/// [`LoadPathEditor`] backed by `install_name_tool`.
#[derive(Debug, Clone)]
pub struct InstallNameTool {
    program: PathBuf,
}

impl InstallNameTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_config(config: &BundleConfig) -> Self {
        Self::new(config.install_name_tool())
    }
}

impl Default for InstallNameTool {
    fn default() -> Self {
        Self::new("install_name_tool")
    }
}

impl LoadPathEditor for InstallNameTool {
    fn change_reference(
        &self,
        binary: &Path,
        old: &Path,
        new: &str,
    ) -> std::result::Result<(), String> {
        let old = old
            .to_str()
            .ok_or_else(|| format!("non UTF-8 load path {}", old.display()))?;
        run_tool(&self.program, &["-change", old, new], binary).map(drop)
    }

    fn set_install_name(&self, binary: &Path, new: &str) -> std::result::Result<(), String> {
        run_tool(&self.program, &["-id", new], binary).map(drop)
    }
}

/// Edits issued by a rewrite pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    /// `-change` edits.
    pub references: usize,
    /// `-id` edits.
    pub install_names: usize,
}

impl RewriteSummary {
    pub fn is_empty(&self) -> bool {
        self.references == 0 && self.install_names == 0
    }
}

/// Point every reference to a bundled library at its loader-relative copy.
///
/// `binaries` is normally every regular file in `dest_dir` plus the root
/// executables. For each one, non-system references whose base name is a
/// file in `dest_dir` become `<loader prefix>/<name>`, and a library's own install
/// name becomes `<loader prefix>/<own name>` unless its file name is in the
/// configured exclusion list.
///
/// Only references not already in loader-relative form are edited, so a
/// second pass issues no edits.
///
/// # Errors
///
/// Propagates inspection failures and stops at the first failed edit with
/// [`BundleError::Rewrite`].
pub fn rewrite<I, E>(
    inspector: &I,
    editor: &E,
    config: &BundleConfig,
    binaries: &[PathBuf],
    dest_dir: &Path,
) -> Result<RewriteSummary>
where
    I: LoadPathInspector + ?Sized,
    E: LoadPathEditor + ?Sized,
{
    let bundled: BTreeSet<String> = bundled_binaries(dest_dir)?
        .iter()
        .filter_map(|p| file_name(p).map(str::to_string))
        .collect();

    let mut summary = RewriteSummary::default();
    for binary in binaries {
        let commands = inspector.inspect(binary)?;

        for reference in &commands.references {
            // Same file name as a bundled library, but the OS copy is meant
            if config.classifier().is_system_library(reference) {
                continue;
            }
            let Some(name) = file_name(reference).filter(|n| bundled.contains(*n)) else {
                continue;
            };
            let target = config.loader_path_for(name);
            if reference.as_os_str() == target.as_str() {
                continue;
            }

            debug!(
                "{}: {} -> {}",
                binary.display(),
                reference.display(),
                target
            );
            editor
                .change_reference(binary, reference, &target)
                .map_err(|reason| BundleError::Rewrite {
                    binary: binary.clone(),
                    library: reference.display().to_string(),
                    reason,
                })?;
            summary.references += 1;
        }

        let Some(install_name) = &commands.install_name else {
            continue;
        };
        let Some(own_name) = file_name(binary) else {
            continue;
        };
        if config.is_excluded(own_name) {
            debug!("install name of {} left to its toolkit", binary.display());
            continue;
        }
        let target = config.loader_path_for(own_name);
        if install_name.as_os_str() == target.as_str() {
            continue;
        }

        debug!("{}: id -> {}", binary.display(), target);
        editor
            .set_install_name(binary, &target)
            .map_err(|reason| BundleError::Rewrite {
                binary: binary.clone(),
                library: install_name.display().to_string(),
                reason,
            })?;
        summary.install_names += 1;
    }

    info!(
        "Rewrote {} references and {} install names",
        summary.references, summary.install_names
    );
    Ok(summary)
}
