//! Mach-O dependency bundling utilities.
//!
//! Makes an application bundle self-contained: finds every non-system
//! dynamic library its executables need (directly or transitively), copies
//! them next to the executables, and rewrites load paths with
//! `install_name_tool` so they resolve relative to the loading binary.
//!
//! Dependencies are read with `otool` rather than by loading the binaries,
//! so bundles for other architectures can be processed too.

mod analyze;
mod bundle;
mod config;
mod copy;
mod error;
mod paths;
mod rewrite;

pub use analyze::{
    build_closure, parse_otool_id, parse_otool_list, DependencyClosure, LoadCommands,
    LoadPathInspector, OtoolInspector,
};
pub use bundle::{BundleReport, Bundler};
pub use config::{BundleConfig, DEFAULT_LOADER_PREFIX};
pub use copy::{bundled_binaries, copy_all, copy_layout, make_executable, BundleLayout, CopySummary};
pub use error::{BundleError, Result};
pub use paths::{
    file_name, find_executable, find_in_path, is_loader_relative, resolve_root,
    SystemLibraryClassifier,
};
pub use rewrite::{rewrite, InstallNameTool, LoadPathEditor, RewriteSummary};
