//! Format strategies for archive manipulation.
//!
//! One stateless strategy per [`ArchiveFormat`] implements the same operation
//! contract. Strategies are built once at start-up and looked up through a
//! read-only [`StrategyRegistry`].
//!
//! Every operation returns an [`Outcome`]; faults are trapped at the strategy
//! boundary and never propagate to the caller.

pub mod rar;
pub mod tar_gz;
pub mod unsupported;
pub mod zip;

pub use self::rar::RarStrategy;
pub use self::tar_gz::TarGzStrategy;
pub use self::unsupported::UnsupportedStrategy;
pub use self::zip::ZipStrategy;

use crate::checksum::{manifest_path, ChecksumManifest};
use crate::error::{ArchiveError, ErrorKind, Result};
use crate::outcome::Outcome;
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Default location of the native RAR tool
pub const DEFAULT_RAR_BINARY: &str = "/usr/bin/rar";

// =============================================================================
// Formats
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
    Rar,
    /// Recognised on the wire (`ace`) but not implemented
    Unsupported,
}

impl ArchiveFormat {
    pub const ALL: [ArchiveFormat; 4] = [
        ArchiveFormat::TarGz,
        ArchiveFormat::Zip,
        ArchiveFormat::Rar,
        ArchiveFormat::Unsupported,
    ];

    /// Parse a protocol format token (`tar.gz`, `zip`, `rar`, `ace`)
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "tar.gz" => Some(Self::TarGz),
            "zip" => Some(Self::Zip),
            "rar" => Some(Self::Rar),
            "ace" => Some(Self::Unsupported),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
            Self::Rar => "rar",
            Self::Unsupported => "ace",
        }
    }

    /// Canonical file extension, including the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::TarGz => ".tar.gz",
            Self::Zip => ".zip",
            Self::Rar => ".rar",
            Self::Unsupported => ".ace",
        }
    }

    /// Upper-case name used in messages
    pub fn label(&self) -> &'static str {
        match self {
            Self::TarGz => "TAR.GZ",
            Self::Zip => "ZIP",
            Self::Rar => "RAR",
            Self::Unsupported => "ACE",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

// =============================================================================
// Archive
// =============================================================================

/// An archive addressed by one request: declared format plus file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub format: ArchiveFormat,
    pub path: PathBuf,
}

impl Archive {
    pub fn new(format: ArchiveFormat, path: impl Into<PathBuf>) -> Self {
        Self {
            format,
            path: path.into(),
        }
    }

    pub fn has_extension(&self) -> bool {
        self.path
            .to_string_lossy()
            .ends_with(self.format.extension())
    }

    /// Append the canonical extension if the path lacks it
    pub fn ensure_extension(&mut self) {
        if !self.has_extension() {
            let mut name = self.path.as_os_str().to_owned();
            name.push(self.format.extension());
            self.path = PathBuf::from(name);
        }
    }

    /// Fail with `FormatMismatch` unless the path carries the canonical extension
    pub fn require_extension(&self) -> Result<()> {
        if self.has_extension() {
            Ok(())
        } else {
            Err(ArchiveError::FormatMismatch {
                expected: self.format.label(),
                path: self.path.clone(),
            })
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        manifest_path(&self.path)
    }

    /// File name component, used to derive sidecar member names
    pub fn base_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

// =============================================================================
// Strategy contract
// =============================================================================

/// Format-specific implementation of the archive operations.
///
/// `create` may rewrite `archive.path` to carry the canonical extension; all
/// other operations reject a path without it.
pub trait ArchiveStrategy: Send + Sync {
    fn format(&self) -> ArchiveFormat;

    fn create(&self, archive: &mut Archive, inputs: &[PathBuf]) -> Outcome;

    fn extract(&self, archive: &Archive, dest: &Path) -> Outcome;

    fn add(&self, archive: &Archive, inputs: &[PathBuf]) -> Outcome;

    fn remove(&self, archive: &Archive, items: &[String]) -> Outcome;

    fn edit_metadata(&self, archive: &Archive, text: &str) -> Outcome;

    fn show_metadata(&self, archive: &Archive) -> Outcome;

    fn test(&self, archive: &Archive) -> Outcome;

    /// Binary chunking, independent of the container structure
    fn split(&self, archive: &Archive, part_size: u64) -> Outcome {
        Outcome::capture(
            &format!("Error splitting {} archive", self.format().label()),
            split_archive(archive, part_size),
        )
    }
}

/// Read-only mapping from format to its strategy
pub struct StrategyRegistry {
    tar_gz: TarGzStrategy,
    zip: ZipStrategy,
    rar: RarStrategy,
    unsupported: UnsupportedStrategy,
}

impl StrategyRegistry {
    pub fn new(rar_binary: impl Into<PathBuf>) -> Self {
        Self {
            tar_gz: TarGzStrategy,
            zip: ZipStrategy,
            rar: RarStrategy::new(rar_binary),
            unsupported: UnsupportedStrategy,
        }
    }

    pub fn get(&self, format: ArchiveFormat) -> &dyn ArchiveStrategy {
        match format {
            ArchiveFormat::TarGz => &self.tar_gz,
            ArchiveFormat::Zip => &self.zip,
            ArchiveFormat::Rar => &self.rar,
            ArchiveFormat::Unsupported => &self.unsupported,
        }
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_RAR_BINARY)
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

/// A file on disk and the name it takes inside an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub source: PathBuf,
    pub name: String,
}

/// Expand inputs into archive members.
///
/// Files keep their base name. Directories are walked recursively, hidden and
/// ignored files included, with names relative to the directory itself.
/// Inputs that do not exist are skipped. When two inputs map to the same
/// name, the later one wins.
pub fn collect_members(inputs: &[PathBuf]) -> Result<Vec<SourceFile>> {
    let mut members = Vec::new();

    for input in inputs {
        if input.is_file() {
            let name = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| input.to_string_lossy().into_owned());
            members.push(SourceFile {
                source: input.clone(),
                name,
            });
        } else if input.is_dir() {
            let walker = ignore::WalkBuilder::new(input)
                .standard_filters(false)
                .follow_links(false)
                .sort_by_file_path(|a, b| a.cmp(b))
                .build();

            for entry in walker {
                let entry = entry.map_err(io::Error::other)?;
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }
                let rel = entry.path().strip_prefix(input).map_err(io::Error::other)?;
                members.push(SourceFile {
                    source: entry.path().to_path_buf(),
                    name: member_name(rel),
                });
            }
        } else {
            tracing::debug!(input = %input.display(), "skipping missing input");
        }
    }

    Ok(dedup_last_wins(members))
}

fn dedup_last_wins(members: Vec<SourceFile>) -> Vec<SourceFile> {
    let mut seen = HashSet::new();
    let mut kept: Vec<SourceFile> = members
        .into_iter()
        .rev()
        .filter(|m| {
            let fresh = seen.insert(m.name.clone());
            if !fresh {
                tracing::debug!(member = %m.name, source = %m.source.display(), "shadowed by later input");
            }
            fresh
        })
        .collect();
    kept.reverse();
    kept
}

/// `/`-separated archive name for a relative path
pub fn member_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Names produced by `members`, for replace-on-add filtering
pub fn member_names(members: &[SourceFile]) -> HashSet<String> {
    members.iter().map(|m| m.name.clone()).collect()
}

/// True if `name` is one of `items` or nested under one of them
pub fn is_removed(name: &str, items: &[String]) -> bool {
    let name = name.trim_end_matches('/');
    items.iter().any(|item| {
        let item = item.trim_end_matches('/');
        name == item
            || name
                .strip_prefix(item)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// Write `path` through a temp file in the same directory, then rename over it.
///
/// On error the temp file is discarded and an existing `path` is untouched.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut builder = tempfile::Builder::new();
    builder.prefix(".archd-").suffix(".temp");
    // New archives get the umask-filtered mode a plain create would give
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if fs::symlink_metadata(path).is_err() {
            builder.permissions(fs::Permissions::from_mode(0o666));
        }
    }
    let mut temp = builder.tempfile_in(&dir)?;

    write(temp.as_file_mut())?;
    temp.as_file().sync_all()?;

    if let Ok(meta) = fs::metadata(path) {
        temp.as_file().set_permissions(meta.permissions())?;
    }

    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Compute and persist the manifest for the inputs exactly as given
pub fn write_manifest(archive: &Archive, inputs: &[PathBuf]) -> Result<PathBuf> {
    let manifest = ChecksumManifest::compute(inputs)?;
    let dest = archive.manifest_path();
    manifest.persist(&dest)?;
    Ok(dest)
}

/// Outcome of a successful create, followed by the manifest step
pub fn created(archive: &Archive, inputs: &[PathBuf]) -> Outcome {
    let created = format!("Archive {} created successfully.", archive.path.display());
    match write_manifest(archive, inputs) {
        Ok(manifest) => {
            Outcome::success(created).with_line(format!("Checksums saved to {}.", manifest.display()))
        }
        Err(e) => {
            tracing::warn!(archive = %archive.path.display(), error = %e, "manifest not written");
            Outcome::failure(e.kind(), created)
                .with_line(format!("Error computing checksums: {}", e))
        }
    }
}

/// Check extracted content against the archive's manifest, if any
pub fn verify_extraction(archive: &Archive, dest: &Path) -> Outcome {
    let manifest = archive.manifest_path();
    if !manifest.exists() {
        return Outcome::warning("No checksum file found. Skipping verification.");
    }

    match ChecksumManifest::verify(dest, &manifest) {
        Ok(true) => Outcome::success("Checksum verification successful."),
        Ok(false) => Outcome::failure(
            ErrorKind::IntegrityFailure,
            "Checksum verification failed. The extracted files may be corrupted.",
        ),
        Err(e) => Outcome::failure(e.kind(), format!("Checksum verification failed: {}", e)),
    }
}

/// Path of the `n`th split part (1-based)
pub fn part_path(path: &Path, n: u64) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".part{}", n));
    PathBuf::from(name)
}

/// Cut a file into `ceil(size / part_size)` sequential parts
pub fn split_file(path: &Path, part_size: u64) -> Result<Vec<PathBuf>> {
    if part_size == 0 {
        return Err(ArchiveError::Protocol(
            "Part size must be greater than zero".to_string(),
        ));
    }

    let file = File::open(path)?;
    let size = file.metadata()?.len();
    let count = size.div_ceil(part_size);
    let mut input = BufReader::new(file);
    let mut parts = Vec::with_capacity(count as usize);

    for n in 1..=count {
        let part = part_path(path, n);
        let mut out = File::create(&part)?;
        let copied = io::copy(&mut (&mut input).take(part_size), &mut out)?;
        if copied == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{} shrank while splitting", path.display()),
            )
            .into());
        }
        parts.push(part);
    }

    Ok(parts)
}

fn split_archive(archive: &Archive, part_size: u64) -> Result<Outcome> {
    archive.require_extension()?;
    let parts = split_file(&archive.path, part_size)?;
    tracing::info!(archive = %archive.path.display(), parts = parts.len(), "split archive");
    Ok(Outcome::success(format!(
        "Archive split into {} parts successfully.",
        parts.len()
    )))
}
