//! userdoc: generate user documentation pages from annotated headers and a
//! Python stand-in for the native kernel module.
//!
//! - **extract**: `userdoc extract -b src -o build/models 'models/*.h'`
//! - **mock**: `userdoc mock -o build/pynestkernel_mock.py pynest/pynestkernel.pyx`
//! - **build**: the standard documentation job, configured from the environment

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use userdoc::config::{self, BuildEnv, BuildSettings};
use userdoc::pipeline::{self, ExtractOptions, ExtractReport, MockOptions};
use userdoc::PageFormat;

#[derive(Parser)]
#[command(
    name = "userdoc",
    version,
    about = "Extract user documentation from annotated headers and mock native modules"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract documentation blocks into one page per entity
    Extract {
        /// Source patterns (globs, files or directories), relative to the base directory
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Base directory the patterns are resolved against
        #[arg(short = 'b', long, default_value = ".")]
        base: PathBuf,

        /// Output directory
        #[arg(short = 'o', long)]
        output: PathBuf,

        /// Output format: rst (default), markdown, json
        #[arg(short = 'f', long, default_value = "rst")]
        format: String,

        /// Exit with an error if any warning was reported
        #[arg(long)]
        deny_warnings: bool,
    },

    /// Synthesize a Python stand-in module from an interface definition
    Mock {
        /// Interface definition source (.pyx, .pxd, .pyi)
        interface: PathBuf,

        /// Output file. If omitted, the module is written to stdout.
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Module name shown in the generated header (default: file stem)
        #[arg(short = 'm', long)]
        module_name: Option<String>,

        /// File copied verbatim ahead of the stand-ins. Can be repeated.
        #[arg(short = 'p', long)]
        prelude: Vec<PathBuf>,

        /// Also write the stand-in inventory (paths, kinds, parameters) as JSON
        #[arg(long)]
        entities: Option<PathBuf>,
    },

    /// Run the standard documentation job
    Build {
        /// Source checkout root
        #[arg(long, env = "NESTSRCDIR")]
        source_dir: Option<PathBuf>,

        /// Build output directory (default: ./doc/userdoc)
        #[arg(long, env = "USERDOC_BUILD_DIR")]
        build_dir: Option<PathBuf>,

        /// Hosted build: write into <source-dir>/doc/userdoc. Also set by READTHEDOCS=True.
        #[arg(long)]
        hosted: bool,

        /// Exit with an error if any warning was reported
        #[arg(long)]
        deny_warnings: bool,
    },
}

fn main() -> Result<()> {
    // stdout is reserved for `mock` without --output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "userdoc=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Extract {
            patterns,
            base,
            output,
            format,
            deny_warnings,
        } => {
            let format: PageFormat = format.parse()?;
            let report = pipeline::extract_docs_with(patterns.as_slice(), &base, &output, &ExtractOptions { format })
                .with_context(|| format!("failed to extract documentation into {}", output.display()))?;
            check_warnings(&report, deny_warnings)
        }
        Command::Mock {
            interface,
            output,
            module_name,
            prelude,
            entities,
        } => {
            let options = MockOptions {
                module_name,
                preludes: prelude,
            };
            let module = match output {
                Some(out_file) => pipeline::synthesize_mock_with(&interface, &out_file, &options)
                    .with_context(|| format!("failed to synthesize mock from {}", interface.display()))?,
                None => {
                    let module = pipeline::build_mock(&interface, &options)
                        .with_context(|| format!("failed to synthesize mock from {}", interface.display()))?;
                    print!("{}", module.source);
                    module
                }
            };
            if let Some(path) = entities {
                let json = serde_json::to_string_pretty(&module.entities)
                    .context("failed to serialize stand-in inventory")?;
                fs::write(&path, json + "\n")
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
            Ok(())
        }
        Command::Build {
            source_dir,
            build_dir,
            hosted,
            deny_warnings,
        } => {
            let cwd = env::current_dir().context("failed to determine current directory")?;
            let hosted = hosted || config::is_hosted(env::var(config::HOSTED_ENV).ok().as_deref());
            let build = BuildEnv::resolve(
                BuildSettings {
                    source_dir,
                    build_dir,
                    hosted,
                },
                &cwd,
            );
            run_build(&build, deny_warnings)
        }
    }
}

fn run_build(build: &BuildEnv, deny_warnings: bool) -> Result<()> {
    info!(
        "building user documentation from {} into {}{}",
        build.source_dir.display(),
        build.build_dir.display(),
        if build.hosted { " (hosted)" } else { "" }
    );

    let pages_dir = build.pages_dir();
    let report = pipeline::extract_docs(config::HEADER_PATTERNS, &build.source_dir, &pages_dir)
        .with_context(|| format!("failed to extract documentation into {}", pages_dir.display()))?;

    let interface = build.interface_file();
    let mock_file = build.mock_file();
    pipeline::synthesize_mock_with(&interface, &mock_file, &build.mock_options())
        .with_context(|| format!("failed to synthesize mock from {}", interface.display()))?;

    check_warnings(&report, deny_warnings)
}

/// Fail after all output is written when warnings are not tolerated.
fn check_warnings(report: &ExtractReport, deny_warnings: bool) -> Result<()> {
    if deny_warnings && !report.warnings.is_empty() {
        bail!("{} warning(s) reported and --deny-warnings is set", report.warnings.len());
    }
    Ok(())
}
