//! Versioned source archives built with `git archive`.
//!
//! Homebrew infers a formula's version from its URL, so the archive must look
//! like a released artifact: `<version>.tar.gz` whose entries all live under
//! `<version>/`. Both names are derived from the same version token.

use crate::process::{Invocation, ProcessRunner};
use crate::{Error, Result};
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

/// Version used when none is configured.
pub const DEFAULT_VERSION: &str = "1";

/// A tarball produced by [`create_archive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub path: PathBuf,
    pub version: String,
}

impl Archive {
    /// File name without its last extension (`1.tar.gz` -> `1.tar`).
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// `file://` URL of the archive on this host.
    pub fn file_url(&self) -> Result<String> {
        let absolute = std::path::absolute(&self.path)?;
        Ok(format!("file://{}", absolute.display()))
    }

    /// Hex-encoded SHA-256 of the archive contents.
    pub fn sha256(&self) -> Result<String> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect())
    }
}

/// What [`verify_archive`] found inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Number of entries in the tarball
    pub entries: usize,
    /// Distinct top-level path components
    pub top_level: BTreeSet<String>,
}

/// Whether Homebrew's URL heuristics will accept `version` as a version token.
pub fn looks_like_version(version: &str) -> bool {
    let mut chars = version.chars();
    match chars.next() {
        Some(first) if first.is_ascii_digit() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Archive `HEAD` of the checkout at `repo` into `<directory>/<version>.tar.gz`.
///
/// Uses git's native archiver so content and prefix match exactly what is committed.
pub fn create_archive(
    runner: &dyn ProcessRunner,
    repo: &Path,
    directory: &Path,
    version: &str,
) -> Result<Archive> {
    if !looks_like_version(version) {
        return Err(Error::InvalidVersion(version.to_string()));
    }

    // git resolves -o relative to the checkout, not to our cwd
    let path = std::path::absolute(directory)?.join(format!("{}.tar.gz", version));
    let invocation = Invocation::new("git")
        .args(["archive", "--format", "tar.gz", "-o"])
        .arg(path.to_string_lossy())
        .arg("--prefix")
        .arg(format!("{}/", version))
        .arg("HEAD")
        .current_dir(repo);
    runner.run(&invocation)?;

    tracing::info!(archive = %path.display(), version, "created source archive");
    Ok(Archive {
        path,
        version: version.to_string(),
    })
}

/// Check that every entry of the archive at `path` lives under `<version>/`.
pub fn verify_archive(path: &Path, version: &str) -> Result<ArchiveSummary> {
    let file = File::open(path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));

    let mut entries = 0;
    let mut top_level = BTreeSet::new();
    for entry in archive.entries()? {
        let entry = entry?;
        let entry_path = entry.path()?;
        entries += 1;

        // git archive emits a pax global header carrying the commit id
        if entry.header().entry_type().is_pax_global_extensions() {
            continue;
        }

        let first = entry_path.components().find_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        });
        match first {
            Some(name) => {
                top_level.insert(name);
            }
            None => {
                return Err(Error::ArchiveLayout(format!(
                    "entry '{}' has no directory component",
                    entry_path.display()
                )));
            }
        }
    }

    if !top_level.contains(version) {
        return Err(Error::ArchiveLayout(format!(
            "{} has no top-level '{}/' directory",
            path.display(),
            version
        )));
    }
    if top_level.len() > 1 {
        let stray: Vec<_> = top_level.iter().filter(|t| *t != version).collect();
        return Err(Error::ArchiveLayout(format!(
            "{} has entries outside '{}/': {:?}",
            path.display(),
            version,
            stray
        )));
    }

    Ok(ArchiveSummary { entries, top_level })
}

/// Find the root of the git checkout containing `dir`.
pub fn repository_root(runner: &dyn ProcessRunner, dir: &Path) -> Result<PathBuf> {
    let output = runner.run(
        &Invocation::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(dir),
    )?;
    let root = output.stdout.trim();
    if root.is_empty() {
        return Err(Error::Other(format!(
            "git did not report a repository root for {}",
            dir.display()
        )));
    }
    Ok(PathBuf::from(root))
}

/// `file://` URL for the live checkout, used as the formula's `head`.
pub fn head_url(repo: &Path) -> Result<String> {
    let absolute = std::path::absolute(repo)?;
    Ok(format!("file://{}", absolute.display()))
}
