// Checksum manifest for archive contents
//
// Snapshot of per-file MD5 digests taken when an archive is created and
// persisted next to it as `<archive>.checksums.txt`. Extraction re-reads the
// snapshot and compares it against the extracted files.
//
// Text format, one entry per line: `<original-path> <32-hex-digest>`

use crate::error::Result;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Suffix appended to the archive path to name its manifest
pub const MANIFEST_SUFFIX: &str = ".checksums.txt";

/// Manifest location for an archive
pub fn manifest_path(archive_path: &Path) -> PathBuf {
    let mut name = archive_path.as_os_str().to_owned();
    name.push(MANIFEST_SUFFIX);
    PathBuf::from(name)
}

/// Hex MD5 digest of a file's full content
pub fn file_digest(path: &Path) -> Result<String> {
    let data = fs::read(path)?;
    Ok(hex::encode(md5::compute(&data).0))
}

/// Ordered mapping of original path -> content digest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumManifest {
    entries: Vec<(String, String)>,
}

impl ChecksumManifest {
    /// Digest every path in order. Paths must be readable files.
    pub fn compute<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut manifest = Self::default();
        for path in paths {
            let path = path.as_ref();
            let digest = file_digest(path)?;
            manifest.insert(path.to_string_lossy().into_owned(), digest);
        }
        Ok(manifest)
    }

    /// Insert or replace an entry; a repeated path keeps its first position
    pub fn insert(&mut self, path: String, digest: String) {
        if let Some(entry) = self.entries.iter_mut().find(|(p, _)| *p == path) {
            entry.1 = digest;
        } else {
            self.entries.push((path, digest));
        }
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, d)| d.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, d)| (p.as_str(), d.as_str()))
    }

    /// Write the manifest, replacing any existing file
    pub fn persist(&self, dest: &Path) -> Result<()> {
        let mut file = fs::File::create(dest)?;
        for (path, digest) in &self.entries {
            writeln!(file, "{} {}", path, digest)?;
        }
        file.flush()?;
        Ok(())
    }

    /// Load a manifest written by [`ChecksumManifest::persist`]
    pub fn load(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        let reader = BufReader::new(file);
        let mut manifest = Self::default();

        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }

            // Digest is always the last token; the path may contain spaces
            let (file_path, digest) = line.rsplit_once(' ').ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Malformed manifest line in {}: {}", path.display(), line),
                )
            })?;
            manifest.insert(file_path.to_string(), digest.to_string());
        }

        Ok(manifest)
    }

    /// Entries whose file under `root` no longer matches the recorded digest.
    ///
    /// Every entry is checked. Any mismatch makes the result `Ok`, even if
    /// other entries could not be read; an unreadable entry is an error only
    /// when everything readable matched.
    pub fn mismatches(&self, root: &Path) -> Result<Vec<String>> {
        let mut bad = Vec::new();
        let mut unreadable = None;

        for (path, digest) in &self.entries {
            match file_digest(&root.join(path)) {
                Ok(actual) if actual.eq_ignore_ascii_case(digest) => {}
                Ok(_) => bad.push(path.clone()),
                Err(e) => {
                    tracing::debug!(file = %path, error = %e, "manifest entry unreadable");
                    if unreadable.is_none() {
                        unreadable = Some(e);
                    }
                }
            }
        }

        match unreadable {
            Some(e) if bad.is_empty() => Err(e),
            _ => Ok(bad),
        }
    }

    /// Re-read `manifest_file` and check every entry resolved under `root`.
    ///
    /// Absolute entries resolve to themselves, as `Path::join` does.
    pub fn verify(root: &Path, manifest_file: &Path) -> Result<bool> {
        let manifest = Self::load(manifest_file)?;
        let bad = manifest.mismatches(root)?;
        if !bad.is_empty() {
            tracing::debug!(files = ?bad, "checksum mismatch");
        }
        Ok(bad.is_empty())
    }
}
