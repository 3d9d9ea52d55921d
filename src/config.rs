//! Immutable bundling configuration.

use std::path::{Path, PathBuf};

use crate::paths::SystemLibraryClassifier;

/// Load-path prefix for libraries living in `Contents/Frameworks` next to
/// `Contents/MacOS`.
pub const DEFAULT_LOADER_PREFIX: &str = "@loader_path/../Frameworks";

/// Settings for one packaging run.
///
/// Built once (usually from command-line flags) and passed by reference to
/// each stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleConfig {
    classifier: SystemLibraryClassifier,
    loader_prefix: String,
    excluded_names: Vec<String>,
    otool: PathBuf,
    install_name_tool: PathBuf,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            classifier: SystemLibraryClassifier::default(),
            loader_prefix: DEFAULT_LOADER_PREFIX.to_string(),
            excluded_names: Vec::new(),
            otool: PathBuf::from("otool"),
            install_name_tool: PathBuf::from("install_name_tool"),
        }
    }
}

impl BundleConfig {
    /// Replace the OS-reserved prefixes. An empty list keeps the defaults.
    #[must_use]
    pub fn with_system_prefixes<I, P>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let prefixes: Vec<PathBuf> = prefixes.into_iter().map(Into::into).collect();
        if !prefixes.is_empty() {
            self.classifier = SystemLibraryClassifier::new(prefixes);
        }
        self
    }

    #[must_use]
    pub fn with_loader_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        self.loader_prefix = prefix.trim_end_matches('/').to_string();
        self
    }

    /// File names whose install name is left alone by the rewriter.
    #[must_use]
    pub fn with_excluded_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_names = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_otool(mut self, program: impl Into<PathBuf>) -> Self {
        self.otool = program.into();
        self
    }

    #[must_use]
    pub fn with_install_name_tool(mut self, program: impl Into<PathBuf>) -> Self {
        self.install_name_tool = program.into();
        self
    }

    pub fn classifier(&self) -> &SystemLibraryClassifier {
        &self.classifier
    }

    pub fn loader_prefix(&self) -> &str {
        &self.loader_prefix
    }

    pub fn excluded_names(&self) -> &[String] {
        &self.excluded_names
    }

    pub fn is_excluded(&self, file_name: &str) -> bool {
        self.excluded_names.iter().any(|n| n == file_name)
    }

    pub fn otool(&self) -> &Path {
        &self.otool
    }

    pub fn install_name_tool(&self) -> &Path {
        &self.install_name_tool
    }

    /// The load path a bundled library named `file_name` is referenced by.
    pub fn loader_path_for(&self, file_name: &str) -> String {
        format!("{}/{}", self.loader_prefix, file_name)
    }
}
