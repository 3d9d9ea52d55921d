use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use leviso_macho::{resolve_root, BundleConfig, BundleError, Bundler, DEFAULT_LOADER_PREFIX};

/// Copy the non-system dylibs an app needs into its bundle and rewrite load
/// paths to point at them.
#[derive(Parser, Debug)]
#[command(name = "leviso-macho", version, about, long_about = None)]
struct Cli {
    /// Log every classified reference and issued edit.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the third-party libraries the roots depend on, one per line.
    Deps {
        #[command(flatten)]
        opts: ToolOpts,

        /// Executables to start from. Bare names not in the current directory
        /// are searched in PATH.
        #[arg(required = true)]
        roots: Vec<String>,
    },

    /// Copy dependencies into DEST and rewrite load paths of DEST and roots.
    Bundle {
        #[command(flatten)]
        opts: ToolOpts,

        /// Bundle library directory, e.g. MyApp.app/Contents/Frameworks.
        #[arg(long)]
        dest: PathBuf,

        /// Executables to start from. Bare names not in the current directory
        /// are searched in PATH.
        #[arg(required = true)]
        roots: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct ToolOpts {
    /// OS-reserved prefix whose libraries are never bundled. Repeatable;
    /// replaces the defaults (/usr/lib, /System).
    #[arg(long = "system-prefix", value_name = "DIR")]
    system_prefixes: Vec<PathBuf>,

    /// Load-path prefix bundled libraries are referenced through.
    #[arg(long, default_value = DEFAULT_LOADER_PREFIX)]
    loader_prefix: String,

    /// File name whose install name must not be rewritten. Repeatable.
    #[arg(long = "exclude", value_name = "NAME")]
    excluded: Vec<String>,

    #[arg(long, default_value = "otool")]
    otool: PathBuf,

    #[arg(long, default_value = "install_name_tool")]
    install_name_tool: PathBuf,
}

impl ToolOpts {
    fn into_config(self) -> BundleConfig {
        BundleConfig::default()
            .with_system_prefixes(self.system_prefixes)
            .with_loader_prefix(self.loader_prefix)
            .with_excluded_names(self.excluded)
            .with_otool(self.otool)
            .with_install_name_tool(self.install_name_tool)
    }
}

fn resolve_roots(args: &[String]) -> Result<Vec<PathBuf>> {
    args.iter()
        .map(|arg| {
            resolve_root(arg)
                .ok_or_else(|| BundleError::Closure(PathBuf::from(arg)))
                .with_context(|| format!("'{arg}' not found in PATH"))
        })
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Command::Deps { opts, roots } => {
            let roots = resolve_roots(&roots)?;
            let bundler = Bundler::new(opts.into_config());
            let closure = bundler
                .closure(&roots)
                .context("Failed to resolve dependencies")?;
            for lib in closure {
                println!("{}", lib.display());
            }
        }
        Command::Bundle { opts, dest, roots } => {
            let roots = resolve_roots(&roots)?;
            let bundler = Bundler::new(opts.into_config());
            let report = bundler.bundle(&roots, &dest).with_context(|| {
                format!(
                    "Failed to bundle libraries into {} (left in place for inspection)",
                    dest.display()
                )
            })?;

            println!("---------------------------------------------");
            println!("Bundled into:\t{}", dest.display());
            println!("Libraries:\t{}", report.closure.len());
            println!(
                "Copied:\t\t{} ({} already present)",
                report.copy.copied.len(),
                report.copy.skipped.len()
            );
            println!(
                "Rewritten:\t{} references, {} install names",
                report.rewrite.references, report.rewrite.install_names
            );
            println!("---------------------------------------------");
        }
    }

    Ok(())
}
