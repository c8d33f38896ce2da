//! Zip archives. Metadata is the container comment.

use super::{
    collect_members, created, is_removed, member_names, verify_extraction, write_atomically,
    Archive, ArchiveFormat, ArchiveStrategy, SourceFile,
};
use crate::error::{ErrorKind, Result};
use crate::outcome::Outcome;
use std::fs::{self, File};
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub struct ZipStrategy;

impl ZipStrategy {
    fn options() -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
    }

    fn open(path: &Path) -> Result<ZipArchive<File>> {
        Ok(ZipArchive::new(File::open(path)?)?)
    }

    /// Raw-copy members of the archive at `path` into `writer`, dropping those
    /// `skip` rejects. Returns the existing container comment.
    fn copy_members<W, F>(path: &Path, writer: &mut ZipWriter<W>, skip: F) -> Result<Vec<u8>>
    where
        W: Write + Seek,
        F: Fn(&str) -> bool,
    {
        let mut existing = Self::open(path)?;
        let comment = existing.comment().to_vec();

        for i in 0..existing.len() {
            let file = existing.by_index_raw(i)?;
            if skip(file.name()) {
                continue;
            }
            writer.raw_copy_file(file)?;
        }

        Ok(comment)
    }

    fn append_sources<W: Write + Seek>(writer: &mut ZipWriter<W>, members: &[SourceFile]) -> Result<()> {
        for member in members {
            writer.start_file(member.name.clone(), Self::options())?;
            let mut source = File::open(&member.source)?;
            io::copy(&mut source, &mut *writer)?;
        }
        Ok(())
    }

    fn set_comment<W: Write + Seek>(writer: &mut ZipWriter<W>, comment: &[u8]) {
        if !comment.is_empty() {
            writer.set_comment(String::from_utf8_lossy(comment).into_owned());
        }
    }

    fn try_create(&self, archive: &mut Archive, inputs: &[PathBuf]) -> Result<Outcome> {
        archive.ensure_extension();
        let members = collect_members(inputs)?;

        write_atomically(&archive.path, |file| {
            let mut writer = ZipWriter::new(file);
            Self::append_sources(&mut writer, &members)?;
            writer.finish()?;
            Ok(())
        })?;

        tracing::info!(archive = %archive.path.display(), members = members.len(), "created zip");
        Ok(created(archive, inputs))
    }

    fn try_extract(&self, archive: &Archive, dest: &Path) -> Result<Outcome> {
        archive.require_extension()?;
        fs::create_dir_all(dest)?;
        Self::open(&archive.path)?.extract(dest)?;

        Ok(verify_extraction(archive, dest)
            .with_lead(format!("Archive extracted to {}.", dest.display())))
    }

    fn try_add(&self, archive: &Archive, inputs: &[PathBuf]) -> Result<Outcome> {
        archive.require_extension()?;
        let members = collect_members(inputs)?;
        let replaced = member_names(&members);

        write_atomically(&archive.path, |file| {
            let mut writer = ZipWriter::new(file);
            let comment =
                Self::copy_members(&archive.path, &mut writer, |name| replaced.contains(name))?;
            Self::append_sources(&mut writer, &members)?;
            Self::set_comment(&mut writer, &comment);
            writer.finish()?;
            Ok(())
        })?;

        tracing::info!(archive = %archive.path.display(), added = members.len(), "added to zip");
        Ok(Outcome::success(format!(
            "Files added to {} successfully.",
            archive.path.display()
        )))
    }

    fn try_remove(&self, archive: &Archive, items: &[String]) -> Result<Outcome> {
        archive.require_extension()?;

        write_atomically(&archive.path, |file| {
            let mut writer = ZipWriter::new(file);
            let comment =
                Self::copy_members(&archive.path, &mut writer, |name| is_removed(name, items))?;
            Self::set_comment(&mut writer, &comment);
            writer.finish()?;
            Ok(())
        })?;

        tracing::info!(archive = %archive.path.display(), items = ?items, "removed from zip");
        Ok(Outcome::success(format!(
            "Items removed from {} successfully.",
            archive.path.display()
        )))
    }

    fn try_edit_metadata(&self, archive: &Archive, text: &str) -> Result<Outcome> {
        archive.require_extension()?;

        write_atomically(&archive.path, |file| {
            let mut writer = ZipWriter::new(file);
            Self::copy_members(&archive.path, &mut writer, |_| false)?;
            writer.set_comment(text.to_string());
            writer.finish()?;
            Ok(())
        })?;

        Ok(Outcome::success(format!(
            "Metadata updated for {}.",
            archive.path.display()
        )))
    }

    fn try_show_metadata(&self, archive: &Archive) -> Result<Outcome> {
        archive.require_extension()?;
        let existing = Self::open(&archive.path)?;
        let comment = existing.comment();

        if comment.is_empty() {
            return Ok(Outcome::warning("No comment found in this ZIP archive."));
        }

        Ok(Outcome::success(format!(
            "ZIP Archive Comment:\n{}",
            String::from_utf8_lossy(comment)
        )))
    }

    fn try_test(&self, archive: &Archive) -> Result<Outcome> {
        archive.require_extension()?;
        let mut existing = Self::open(&archive.path)?;
        let mut corrupt = Vec::new();

        // Reading each member to the end validates its CRC
        for i in 0..existing.len() {
            match existing.by_index(i) {
                Ok(mut file) => {
                    let name = file.name().to_string();
                    if let Err(e) = io::copy(&mut file, &mut io::sink()) {
                        tracing::debug!(member = %name, error = %e, "corrupt zip member");
                        corrupt.push(name);
                    }
                }
                Err(e) => corrupt.push(format!("entry #{} ({})", i, e)),
            }
        }

        if corrupt.is_empty() {
            Ok(Outcome::success(format!(
                "ZIP Archive {} is valid and has no errors.",
                archive.path.display()
            )))
        } else {
            Ok(Outcome::failure(
                ErrorKind::IntegrityFailure,
                format!(
                    "ZIP Archive {} contains a corrupt file: {}",
                    archive.path.display(),
                    corrupt.join(", ")
                ),
            ))
        }
    }
}

impl ArchiveStrategy for ZipStrategy {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn create(&self, archive: &mut Archive, inputs: &[PathBuf]) -> Outcome {
        Outcome::capture("Error creating ZIP archive", self.try_create(archive, inputs))
    }

    fn extract(&self, archive: &Archive, dest: &Path) -> Outcome {
        Outcome::capture("Error extracting ZIP archive", self.try_extract(archive, dest))
    }

    fn add(&self, archive: &Archive, inputs: &[PathBuf]) -> Outcome {
        Outcome::capture(
            "Error adding files to ZIP archive",
            self.try_add(archive, inputs),
        )
    }

    fn remove(&self, archive: &Archive, items: &[String]) -> Outcome {
        Outcome::capture(
            "Error removing items from ZIP archive",
            self.try_remove(archive, items),
        )
    }

    fn edit_metadata(&self, archive: &Archive, text: &str) -> Outcome {
        Outcome::capture(
            "Error editing metadata for ZIP archive",
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Verdict;
    use tempfile::TempDir;

    fn names(path: &Path) -> Vec<String> {
        let archive = ZipStrategy::open(path).unwrap();
        let mut names: Vec<_> = archive.file_names().map(String::from).collect();
        names.sort();
        names
    }

    fn tree(temp: &TempDir) -> PathBuf {
        let dir = temp.path().join("site");
        fs::create_dir_all(dir.join("docs/img")).unwrap();
        fs::write(dir.join("index.html"), "<html/>").unwrap();
        fs::write(dir.join("docs/guide.md"), "# guide").unwrap();
        fs::write(dir.join("docs/img/logo.svg"), "<svg/>").unwrap();
        dir
    }

    #[test]
    fn test_create_directory_members_are_relative() {
        let temp = TempDir::new().unwrap();
        let dir = tree(&temp);
        let mut archive = Archive::new(ArchiveFormat::Zip, temp.path().join("site.zip"));

        // Directory inputs are not checksummed; the archive itself is still written
        let outcome = ZipStrategy.create(&mut archive, &[dir]);
        assert_eq!(outcome.verdict, Verdict::Failure(ErrorKind::IoFailure));
        assert!(outcome.text().contains("created successfully"));

        assert_eq!(
            names(&archive.path),
            vec!["docs/guide.md", "docs/img/logo.svg", "index.html"]
        );
    }

    #[test]
    fn test_remove_directory_prefix() {
        let temp = TempDir::new().unwrap();
        let dir = tree(&temp);
        let mut archive = Archive::new(ArchiveFormat::Zip, temp.path().join("site.zip"));
        ZipStrategy.create(&mut archive, &[dir]);

        let outcome = ZipStrategy.remove(&archive, &["docs".to_string()]);
        assert!(outcome.is_success(), "{}", outcome.text());
        assert_eq!(names(&archive.path), vec!["index.html"]);
        assert!(ZipStrategy.test(&archive).is_success());
    }

    #[test]
    fn test_comment_survives_rewrites() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        fs::write(&file, "aaa").unwrap();
        let extra = temp.path().join("b.txt");
        fs::write(&extra, "bbb").unwrap();
        let mut archive = Archive::new(ArchiveFormat::Zip, temp.path().join("c.zip"));
        ZipStrategy.create(&mut archive, &[file]);

        let shown = ZipStrategy.show_metadata(&archive);
        assert_eq!(shown.verdict, Verdict::Warning);

        assert!(ZipStrategy.edit_metadata(&archive, "release 1.2").is_success());
        assert!(ZipStrategy.add(&archive, &[extra]).is_success());
        assert!(ZipStrategy.remove(&archive, &["a.txt".to_string()]).is_success());

        let shown = ZipStrategy.show_metadata(&archive);
        assert!(shown.is_success());
        assert_eq!(shown.text(), "ZIP Archive Comment:\nrelease 1.2");
        assert_eq!(names(&archive.path), vec!["b.txt"]);
    }

    #[test]
    fn test_test_reports_corrupt_member() {
        let temp = TempDir::new().unwrap();
        let archive = Archive::new(ArchiveFormat::Zip, temp.path().join("bad.zip"));

        write_atomically(&archive.path, |f| {
            let mut writer = ZipWriter::new(f);
            writer.start_file(
                "payload.bin",
                SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
            )?;
            writer.write_all(&vec![b'x'; 4096])?;
            writer.finish()?;
            Ok(())
        })
        .unwrap();

        // Flip a byte inside the stored payload so the CRC no longer matches
        let mut bytes = fs::read(&archive.path).unwrap();
        let pos = bytes.windows(8).position(|w| w == b"xxxxxxxx").unwrap() + 100;
        bytes[pos] = b'y';
        fs::write(&archive.path, bytes).unwrap();

        let outcome = ZipStrategy.test(&archive);
        assert_eq!(outcome.verdict, Verdict::Failure(ErrorKind::IntegrityFailure));
        assert!(outcome.text().contains("payload.bin"));
    }
}
