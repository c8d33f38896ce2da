//! Gzip-compressed tar archives.
//!
//! Metadata lives in a synthetic member named `<archive-basename>_metadata.txt`.
//! Every mutation rewrites the whole archive through a temp file.

use super::{
    collect_members, created, is_removed, member_names, verify_extraction, write_atomically,
    Archive, ArchiveFormat, ArchiveStrategy, SourceFile,
};
use crate::error::Result;
use crate::outcome::Outcome;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

type TarReader = tar::Archive<GzDecoder<BufReader<File>>>;

pub struct TarGzStrategy;

impl TarGzStrategy {
    pub fn metadata_member(archive: &Archive) -> String {
        format!("{}_metadata.txt", archive.base_name())
    }

    fn open(path: &Path) -> Result<TarReader> {
        let file = File::open(path)?;
        Ok(tar::Archive::new(GzDecoder::new(BufReader::new(file))))
    }

    /// Copy members of the archive at `path` into `builder`, dropping those
    /// `skip` rejects. Returns (copied, skipped).
    fn copy_members<W, F>(path: &Path, builder: &mut tar::Builder<W>, skip: F) -> Result<(usize, usize)>
    where
        W: Write,
        F: Fn(&str) -> bool,
    {
        let mut existing = Self::open(path)?;
        let mut copied = 0;
        let mut skipped = 0;

        for entry in existing.entries()? {
            let mut entry = entry?;
            let name = entry.path()?.to_string_lossy().into_owned();
            if skip(&name) {
                skipped += 1;
                continue;
            }
            let mut header = entry.header().clone();
            builder.append_data(&mut header, &name, &mut entry)?;
            copied += 1;
        }

        Ok((copied, skipped))
    }

    fn append_sources<W: Write>(builder: &mut tar::Builder<W>, members: &[SourceFile]) -> Result<()> {
        for member in members {
            builder.append_path_with_name(&member.source, &member.name)?;
        }
        Ok(())
    }

    fn finish<W: Write>(builder: tar::Builder<GzEncoder<W>>) -> Result<()> {
        builder.into_inner()?.finish()?;
        Ok(())
    }

    fn try_create(&self, archive: &mut Archive, inputs: &[PathBuf]) -> Result<Outcome> {
        archive.ensure_extension();
        let members = collect_members(inputs)?;

        write_atomically(&archive.path, |file| {
            let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
            Self::append_sources(&mut builder, &members)?;
            Self::finish(builder)
        })?;

        tracing::info!(archive = %archive.path.display(), members = members.len(), "created tar.gz");
        Ok(created(archive, inputs))
    }

    fn try_extract(&self, archive: &Archive, dest: &Path) -> Result<Outcome> {
        archive.require_extension()?;
        fs::create_dir_all(dest)?;
        Self::open(&archive.path)?.unpack(dest)?;

        Ok(verify_extraction(archive, dest)
            .with_lead(format!("Archive extracted to {}.", dest.display())))
    }

    fn try_add(&self, archive: &Archive, inputs: &[PathBuf]) -> Result<Outcome> {
        archive.require_extension()?;
        let members = collect_members(inputs)?;
        let replaced = member_names(&members);

        write_atomically(&archive.path, |file| {
            let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
            Self::copy_members(&archive.path, &mut builder, |name| replaced.contains(name))?;
            Self::append_sources(&mut builder, &members)?;
            Self::finish(builder)
        })?;

        tracing::info!(archive = %archive.path.display(), added = members.len(), "added to tar.gz");
        Ok(Outcome::success(format!(
            "Files added to {} successfully.",
            archive.path.display()
        )))
    }

    fn try_remove(&self, archive: &Archive, items: &[String]) -> Result<Outcome> {
        archive.require_extension()?;
        let mut removed = 0;

        write_atomically(&archive.path, |file| {
            let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
            let (_, skipped) =
                Self::copy_members(&archive.path, &mut builder, |name| is_removed(name, items))?;
            removed = skipped;
            Self::finish(builder)
        })?;

        tracing::info!(archive = %archive.path.display(), removed, "removed from tar.gz");
        Ok(Outcome::success(format!(
            "Items removed from {} successfully.",
            archive.path.display()
        )))
    }

    fn try_edit_metadata(&self, archive: &Archive, text: &str) -> Result<Outcome> {
        archive.require_extension()?;
        let member = Self::metadata_member(archive);
        let mtime = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        write_atomically(&archive.path, |file| {
            let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
            Self::copy_members(&archive.path, &mut builder, |name| name == member)?;

            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(text.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(mtime);
            builder.append_data(&mut header, &member, text.as_bytes())?;

            Self::finish(builder)
        })?;

        Ok(Outcome::success(format!(
            "Metadata updated for {}.",
            archive.path.display()
        )))
    }

    fn try_show_metadata(&self, archive: &Archive) -> Result<Outcome> {
        archive.require_extension()?;
        let member = Self::metadata_member(archive);
        let mut reader = Self::open(&archive.path)?;

        for entry in reader.entries()? {
            let mut entry = entry?;
            if entry.path()?.to_string_lossy() != member {
                continue;
            }
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            return Ok(Outcome::success(format!("TAR.GZ Metadata:\n{}", content)));
        }

        Ok(Outcome::warning(
            "No metadata file found in this TAR.GZ archive.",
        ))
    }

    fn try_test(&self, archive: &Archive) -> Result<Outcome> {
        archive.require_extension()?;
        let mut reader = Self::open(&archive.path)?;
        let mut members = 0usize;

        for entry in reader.entries()? {
            let mut entry = entry?;
            io::copy(&mut entry, &mut io::sink())?;
            members += 1;
        }

        // Drain the gzip trailer so its CRC is checked too
        io::copy(&mut reader.into_inner(), &mut io::sink())?;

        tracing::debug!(archive = %archive.path.display(), members, "tar.gz test passed");
        Ok(Outcome::success(format!(
            "TAR.GZ Archive {} is valid and has no errors.",
            archive.path.display()
        )))
    }
}

impl ArchiveStrategy for TarGzStrategy {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::TarGz
    }

    fn create(&self, archive: &mut Archive, inputs: &[PathBuf]) -> Outcome {
        Outcome::capture(
            "Error creating TAR.GZ archive",
            self.try_create(archive, inputs),
        )
    }

    fn extract(&self, archive: &Archive, dest: &Path) -> Outcome {
        Outcome::capture(
            "Error extracting TAR.GZ archive",
            self.try_extract(archive, dest),
        )
    }

    fn add(&self, archive: &Archive, inputs: &[PathBuf]) -> Outcome {
        Outcome::capture(
            "Error adding files to TAR.GZ archive",
            self.try_add(archive, inputs),
        )
    }

    fn remove(&self, archive: &Archive, items: &[String]) -> Outcome {
        Outcome::capture(
            "Error removing items from TAR.GZ archive",
            self.try_remove(archive, items),
        )
    }

    fn edit_metadata(&self, archive: &Archive, text: &str) -> Outcome {
        Outcome::capture(
            "Error editing metadata for TAR.GZ archive",
            self.try_edit_metadata(archive, text),
        )
    }

    fn show_metadata(&self, archive: &Archive) -> Outcome {
        Outcome::capture(
            &format!("Error showing metadata for {}", archive.path.display()),
            self.try_show_metadata(archive),
        )
    }

    fn test(&self, archive: &Archive) -> Outcome {
        Outcome::capture(
            &format!("Error testing {}", archive.path.display()),
            self.try_test(archive),
        )
    }
}
