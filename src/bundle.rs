//! The full packaging pipeline: closure, copy, rewrite.

use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::analyze::{build_closure, DependencyClosure, LoadPathInspector, OtoolInspector};
use crate::config::BundleConfig;
use crate::copy::{bundled_binaries, copy_layout, BundleLayout, CopySummary};
use crate::error::Result;
use crate::rewrite::{rewrite, InstallNameTool, LoadPathEditor, RewriteSummary};

/// Outcome of [`Bundler::bundle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleReport {
    pub closure: DependencyClosure,
    pub copy: CopySummary,
    pub rewrite: RewriteSummary,
}

/// Runs the stages strictly in order against one configuration.
///
/// Any error stops the run; whatever was already written to the bundle
/// directory stays there.
pub struct Bundler<I, E> {
    config: BundleConfig,
    inspector: I,
    editor: E,
}

impl Bundler<OtoolInspector, InstallNameTool> {
    /// Bundler using the real otool and install_name_tool named by `config`.
    pub fn new(config: BundleConfig) -> Self {
        let inspector = OtoolInspector::from_config(&config);
        let editor = InstallNameTool::from_config(&config);
        Self::with_tools(config, inspector, editor)
    }
}

impl<I, E> Bundler<I, E>
where
    I: LoadPathInspector,
    E: LoadPathEditor,
{
    pub fn with_tools(config: BundleConfig, inspector: I, editor: E) -> Self {
        Self {
            config,
            inspector,
            editor,
        }
    }

    pub fn config(&self) -> &BundleConfig {
        &self.config
    }

    /// Third-party libraries reachable from `roots`.
    pub fn closure(&self, roots: &[PathBuf]) -> Result<DependencyClosure> {
        build_closure(&self.inspector, self.config.classifier(), roots)
    }

    /// Make `dest_dir` hold every library `roots` need and point all load
    /// paths at it.
    ///
    /// Safe to re-run against the same `dest_dir`.
    pub fn bundle(&self, roots: &[PathBuf], dest_dir: &Path) -> Result<BundleReport> {
        info!("Resolving dependencies of {} root binaries", roots.len());
        let closure = self.closure(roots)?;
        if closure.is_empty() {
            warn!("No third-party libraries to bundle");
        }

        let layout = BundleLayout::plan(&closure, dest_dir)?;
        info!(
            "Copying {} libraries into {}",
            layout.len(),
            dest_dir.display()
        );
        let copy = copy_layout(&layout)?;

        // Rewriting needs the final set of bundled names, so only now
        let mut binaries = bundled_binaries(dest_dir)?;
        binaries.extend(roots.iter().cloned());
        info!("Rewriting load paths of {} binaries", binaries.len());
        let rewrite = rewrite(
            &self.inspector,
            &self.editor,
            &self.config,
            &binaries,
            dest_dir,
        )?;

        Ok(BundleReport {
            closure,
            copy,
            rewrite,
        })
    }
}
