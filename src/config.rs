//! Build configuration for the standard documentation job.
//!
//! Settings arrive from command-line flags or their environment variables;
//! this module only turns them into concrete paths.

use crate::pipeline::MockOptions;
use std::path::{Path, PathBuf};

/// Environment variable set by the hosted documentation service.
pub const HOSTED_ENV: &str = "READTHEDOCS";

/// Header patterns scanned by the standard job, relative to the source dir.
pub const HEADER_PATTERNS: &[&str] = &["models/*.h", "nestkernel/*.h"];

const INTERFACE_FILE: &str = "pynest/pynestkernel.pyx";
const PRELUDE_FILE: &str = "pynest/nest/lib/hl_api_exceptions.py";
const MOCK_FILE: &str = "pynestkernel_mock.py";
const PAGES_DIR: &str = "models";

/// Raw settings before resolution. `None` means "use the default".
#[derive(Debug, Clone, Default)]
pub struct BuildSettings {
    pub source_dir: Option<PathBuf>,
    pub build_dir: Option<PathBuf>,
    pub hosted: bool,
}

/// Resolved paths of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEnv {
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub hosted: bool,
}

impl BuildEnv {
    /// Resolve settings against the current working directory.
    ///
    /// The source dir defaults to `cwd` and the build dir to
    /// `<cwd>/doc/userdoc`. A hosted build always writes to
    /// `<source dir>/doc/userdoc`, whatever build dir was requested.
    pub fn resolve(settings: BuildSettings, cwd: &Path) -> Self {
        let source_dir = match settings.source_dir {
            Some(dir) if dir.is_absolute() => dir,
            Some(dir) => cwd.join(dir),
            None => cwd.to_path_buf(),
        };
        let build_dir = if settings.hosted {
            source_dir.join("doc").join("userdoc")
        } else {
            match settings.build_dir {
                Some(dir) if dir.is_absolute() => dir,
                Some(dir) => cwd.join(dir),
                None => cwd.join("doc").join("userdoc"),
            }
        };
        BuildEnv {
            source_dir,
            build_dir,
            hosted: settings.hosted,
        }
    }

    /// Output directory of the documentation pages.
    pub fn pages_dir(&self) -> PathBuf {
        self.build_dir.join(PAGES_DIR)
    }

    pub fn interface_file(&self) -> PathBuf {
        self.source_dir.join(INTERFACE_FILE)
    }

    pub fn mock_file(&self) -> PathBuf {
        self.build_dir.join(MOCK_FILE)
    }

    /// Mock options for the standard job; the prelude is only used when present.
    pub fn mock_options(&self) -> MockOptions {
        let prelude = self.source_dir.join(PRELUDE_FILE);
        MockOptions {
            module_name: Some("pynestkernel".to_string()),
            preludes: if prelude.is_file() { vec![prelude] } else { Vec::new() },
        }
    }
}

/// Interpret the hosted-build variable. The service sets it to `True`.
pub fn is_hosted(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "yes")
    )
}
