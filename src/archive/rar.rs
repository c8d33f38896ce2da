//! RAR archives via the native command-line tool.
//!
//! The tool is invoked with fixed verbs: `a` (add/create), `x` (extract),
//! `d` (delete), `c -z<file>` (comment) and `t` (test). A missing binary or a
//! non-zero exit is a `BackendFault`.

use super::{created, verify_extraction, Archive, ArchiveFormat, ArchiveStrategy};
use crate::error::{ArchiveError, Result};
use crate::outcome::Outcome;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::process::{Command, Output, Stdio};

/// Switches shared by every invocation: assume yes, quiet output
const COMMON_SWITCHES: [&str; 2] = ["-y", "-idq"];

pub struct RarStrategy {
    binary: PathBuf,
}

/// Removes a transient sidecar file when dropped
struct SidecarGuard {
    path: PathBuf,
}

impl Drop for SidecarGuard {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove comment file");
            }
        }
    }
}

impl RarStrategy {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Out-of-band comment file used to feed `c -z<file>`
    pub fn comment_path(archive: &Archive) -> PathBuf {
        let mut name = archive.path.as_os_str().to_owned();
        name.push(".txt");
        PathBuf::from(name)
    }

    fn run<I, S>(&self, verb: &'static str, args: I) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(verb);
        cmd.args(COMMON_SWITCHES);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!(command = ?cmd, "invoking rar");

        let output = cmd.output().map_err(|e| ArchiveError::Backend {
            tool: self.binary.display().to_string(),
            verb,
            detail: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ArchiveError::Backend {
                tool: self.binary.display().to_string(),
                verb,
                detail: format!("{} {}", output.status, stderr.trim()),
            });
        }

        Ok(output)
    }

    /// `a` arguments: store names without the leading path, recurse into dirs
    fn add_args(archive: &Archive, inputs: &[PathBuf]) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-ep1".into(), "-r".into()];
        args.push(archive.path.clone().into_os_string());
        args.extend(inputs.iter().map(|p| p.clone().into_os_string()));
        args
    }

    fn try_create(&self, archive: &mut Archive, inputs: &[PathBuf]) -> Result<Outcome> {
        archive.ensure_extension();
        self.run("a", Self::add_args(archive, inputs))?;
        tracing::info!(archive = %archive.path.display(), "created rar");
        Ok(created(archive, inputs))
    }

    fn try_extract(&self, archive: &Archive, dest: &Path) -> Result<Outcome> {
        archive.require_extension()?;
        fs::create_dir_all(dest)?;

        // rar treats the destination as a directory only with a trailing separator
        let mut dest_arg = dest.as_os_str().to_owned();
        if !dest_arg.to_string_lossy().ends_with(MAIN_SEPARATOR) {
            dest_arg.push(MAIN_SEPARATOR.to_string());
        }
        self.run("x", [archive.path.as_os_str(), dest_arg.as_os_str()])?;

        Ok(verify_extraction(archive, dest).with_lead(format!(
            "RAR Archive {} extracted to {}.",
            archive.path.display(),
            dest.display()
        )))
    }

    fn try_add(&self, archive: &Archive, inputs: &[PathBuf]) -> Result<Outcome> {
        archive.require_extension()?;
        self.run("a", Self::add_args(archive, inputs))?;
        Ok(Outcome::success(format!(
            "Files added to {} successfully.",
            archive.path.display()
        )))
    }

    fn try_remove(&self, archive: &Archive, items: &[String]) -> Result<Outcome> {
        archive.require_extension()?;
        for item in items {
            self.run("d", [archive.path.as_os_str(), OsStr::new(item)])?;
        }
        Ok(Outcome::success(format!(
            "Items removed from {} successfully.",
            archive.path.display()
        )))
    }

    fn try_edit_metadata(&self, archive: &Archive, text: &str) -> Result<Outcome> {
        archive.require_extension()?;
        let comment_file = Self::comment_path(archive);
        let _guard = SidecarGuard {
            path: comment_file.clone(),
        };
        fs::write(&comment_file, text)?;

        let mut switch = OsString::from("-z");
        switch.push(&comment_file);
        self.run("c", [switch.as_os_str(), archive.path.as_os_str()])?;

        Ok(Outcome::success(format!(
            "Metadata updated for {}.",
            archive.path.display()
        )))
    }

    /// Reports the `<archive>.txt` sidecar only. `edit_metadata` deletes that
    /// file once the tool has applied it, so an edited comment is not read back.
    fn try_show_metadata(&self, archive: &Archive) -> Result<Outcome> {
        archive.require_extension()?;
        let comment_file = Self::comment_path(archive);
        if !comment_file.exists() {
            return Ok(Outcome::warning(
                "No comment file found for this RAR archive.",
            ));
        }
        let comment = fs::read_to_string(&comment_file)?;
        Ok(Outcome::success(format!("RAR Archive Comment:\n{}", comment)))
    }

    fn try_test(&self, archive: &Archive) -> Result<Outcome> {
        archive.require_extension()?;
        self.run("t", [archive.path.as_os_str()])?;
        Ok(Outcome::success(format!(
            "RAR Archive {} is valid and has no errors.",
            archive.path.display()
        )))
    }
}

impl ArchiveStrategy for RarStrategy {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Rar
    }

    fn create(&self, archive: &mut Archive, inputs: &[PathBuf]) -> Outcome {
        Outcome::capture("Error creating RAR archive", self.try_create(archive, inputs))
    }

    fn extract(&self, archive: &Archive, dest: &Path) -> Outcome {
        Outcome::capture("Error extracting RAR archive", self.try_extract(archive, dest))
    }

    fn add(&self, archive: &Archive, inputs: &[PathBuf]) -> Outcome {
        Outcome::capture(
            "Error adding files to RAR archive",
            self.try_add(archive, inputs),
        )
    }

    fn remove(&self, archive: &Archive, items: &[String]) -> Outcome {
        Outcome::capture(
            "Error removing items from RAR archive",
            self.try_remove(archive, items),
        )
    }

    fn edit_metadata(&self, archive: &Archive, text: &str) -> Outcome {
        Outcome::capture(
            "Error editing metadata for RAR archive",
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
            &format!(
                "RAR Archive {} may be corrupt or an error occurred",
                archive.path.display()
            ),
            self.try_test(archive),
        )
    }
}
