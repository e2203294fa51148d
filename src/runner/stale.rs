//! Staleness check for file targets
//!
//! A file target is up to date when its artifact exists and nothing it was
//! built from is newer: no phony prerequisite, no prerequisite artifact that is
//! missing or newer, no source file that is newer. Equal timestamps count as
//! up to date.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::trace;

/// What a prerequisite contributes to the check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upstream {
    /// Phony tasks always count as newer
    Phony,
    /// Artifact of a file target
    Artifact(PathBuf),
}

/// Why a file target has to run; `None` from [`check`] means it can be skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    MissingOutput,
    PhonyPrerequisite,
    MissingPrerequisite(PathBuf),
    NewerPrerequisite(PathBuf),
    NewerSource(PathBuf),
    BadSourcePattern(String),
}

impl std::fmt::Display for StaleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StaleReason::MissingOutput => write!(f, "output does not exist"),
            StaleReason::PhonyPrerequisite => write!(f, "a prerequisite is phony"),
            StaleReason::MissingPrerequisite(p) => {
                write!(f, "prerequisite artifact {} is missing", p.display())
            }
            StaleReason::NewerPrerequisite(p) => write!(f, "{} is newer", p.display()),
            StaleReason::NewerSource(p) => write!(f, "source {} is newer", p.display()),
            StaleReason::BadSourcePattern(p) => write!(f, "source pattern '{}' is invalid", p),
        }
    }
}

fn modified(path: &Path) -> io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

/// Decide whether the artifact at `output` must be rebuilt.
///
/// `sources` are glob patterns relative to `base_dir`.
pub fn check(
    output: &Path,
    upstream: &[Upstream],
    sources: &[String],
    base_dir: &Path,
) -> Option<StaleReason> {
    let Ok(built) = modified(output) else {
        return Some(StaleReason::MissingOutput);
    };

    for item in upstream {
        match item {
            Upstream::Phony => return Some(StaleReason::PhonyPrerequisite),
            Upstream::Artifact(path) => match modified(path) {
                Err(_) => return Some(StaleReason::MissingPrerequisite(path.clone())),
                Ok(time) if time > built => {
                    return Some(StaleReason::NewerPrerequisite(path.clone()))
                }
                Ok(_) => {}
            },
        }
    }

    for pattern in sources {
        let full = base_dir.join(pattern);
        let Ok(paths) = glob::glob(&full.to_string_lossy()) else {
            return Some(StaleReason::BadSourcePattern(pattern.clone()));
        };
        for path in paths.flatten() {
            if let Ok(time) = modified(&path) {
                if time > built {
                    return Some(StaleReason::NewerSource(path));
                }
            }
        }
    }

    trace!(output = %output.display(), "artifact is up to date");
    None
}
