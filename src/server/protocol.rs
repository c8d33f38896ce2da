//! Line protocol for archive sessions.
//!
//! Text over a byte stream. The client sends one `\n`-terminated line per
//! step (command, archive type, archive path, parameters); the server answers
//! each step with a prompt or a result. Lines are reassembled from however
//! many transport reads they arrive in.
//!
//! ```text
//! C: create            S: Enter archive type (tar.gz, zip, rar, ace):
//! C: zip               S: Enter the full path to the archive:
//! C: /tmp/out.zip      S: Enter files or directory to archive, separated by space:
//! C: a.txt docs        S: <result> + command prompt
//! ```

use crate::archive::ArchiveFormat;
use crate::error::{ArchiveError, Result as ArchiveResult};
use crate::operations::Operation;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum accepted line length, excluding the terminator
pub const MAX_LINE_LEN: usize = 64 * 1024;

const BYTES_PER_MB: u64 = 1024 * 1024;

// =============================================================================
// Commands
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Create,
    Extract,
    Add,
    Remove,
    EditMetadata,
    ShowMetadata,
    Test,
    Split,
    Exit,
    Help,
}

impl Command {
    pub const ALL: [Command; 10] = [
        Command::Create,
        Command::Extract,
        Command::Add,
        Command::Remove,
        Command::EditMetadata,
        Command::ShowMetadata,
        Command::Test,
        Command::Split,
        Command::Exit,
        Command::Help,
    ];

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.keyword() == keyword)
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Command::Create => "create",
            Command::Extract => "extract",
            Command::Add => "add",
            Command::Remove => "remove",
            Command::EditMetadata => "edit_metadata",
            Command::ShowMetadata => "show_metadata",
            Command::Test => "test",
            Command::Split => "split",
            Command::Exit => "exit",
            Command::Help => "help",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Command::Create => "Create a new archive",
            Command::Extract => "Extract files from an archive",
            Command::Add => "Add files to an archive",
            Command::Remove => "Remove files from an archive",
            Command::EditMetadata => "Edit archive metadata",
            Command::ShowMetadata => "Display archive metadata",
            Command::Test => "Test archive integrity",
            Command::Split => "Split an archive into parts",
            Command::Exit => "Exit the session",
            Command::Help => "Display this help message",
        }
    }

    /// Prompt for the parameter line, or `None` if the command takes none
    pub fn parameter_prompt(&self) -> Option<&'static str> {
        match self {
            Command::Create => Some("Enter files or directory to archive, separated by space:"),
            Command::Extract => Some("Enter the path where to extract:"),
            Command::Add => {
                Some("Enter files or directory to add to the archive, separated by space:")
            }
            Command::Remove => Some("Enter files to remove from the archive, separated by space:"),
            Command::EditMetadata => Some("Enter new metadata for the archive:"),
            Command::Split => Some("Enter the size of each part in megabytes:"),
            Command::ShowMetadata | Command::Test | Command::Exit | Command::Help => None,
        }
    }

    /// Build the operation from the parameter line (ignored for commands
    /// without parameters).
    pub fn parse_operation(&self, line: &str) -> ArchiveResult<Operation> {
        let line = line.trim();
        match self {
            Command::Create => Ok(Operation::Create(parse_paths(line))),
            Command::Extract => Ok(Operation::Extract(PathBuf::from(line))),
            Command::Add => Ok(Operation::Add(parse_paths(line))),
            Command::Remove => Ok(Operation::Remove(parse_items(line))),
            Command::EditMetadata => Ok(Operation::EditMetadata(line.to_string())),
            Command::ShowMetadata => Ok(Operation::ShowMetadata),
            Command::Test => Ok(Operation::Test),
            Command::Split => parse_part_size(line).map(Operation::Split),
            Command::Exit | Command::Help => Err(ArchiveError::Protocol(format!(
                "`{}` is not an archive operation",
                self.keyword()
            ))),
        }
    }
}

/// Whitespace-separated item names
pub fn parse_items(line: &str) -> Vec<String> {
    line.split_whitespace().map(String::from).collect()
}

fn parse_paths(line: &str) -> Vec<PathBuf> {
    line.split_whitespace().map(PathBuf::from).collect()
}

/// Megabyte count -> bytes
pub fn parse_part_size(line: &str) -> ArchiveResult<u64> {
    let mb: u64 = line
        .trim()
        .parse()
        .map_err(|_| ArchiveError::Protocol(format!("Invalid part size: {:?}", line.trim())))?;
    if mb == 0 {
        return Err(ArchiveError::Protocol(
            "Part size must be at least 1 MB".to_string(),
        ));
    }
    mb.checked_mul(BYTES_PER_MB)
        .ok_or_else(|| ArchiveError::Protocol(format!("Part size too large: {} MB", mb)))
}

// =============================================================================
// Messages
// =============================================================================

fn command_list() -> String {
    Command::ALL
        .iter()
        .map(|c| c.keyword())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn welcome() -> String {
    format!("Welcome!\nEnter command ({}): ", command_list())
        .yellow()
        .to_string()
}

/// Suffix appended to every operation result
pub fn command_prompt() -> String {
    format!("\nEnter command ({}): ", command_list())
        .yellow()
        .to_string()
}

pub fn help_text() -> String {
    let mut text = String::from("Available commands:\n");
    for command in Command::ALL {
        text.push_str(&format!("  {} - {}\n", command.keyword(), command.description()));
    }
    text.yellow().to_string()
}

pub fn format_prompt() -> String {
    let tokens = ArchiveFormat::ALL
        .iter()
        .map(|f| f.token())
        .collect::<Vec<_>>()
        .join(", ");
    format!("Enter archive type ({}): ", tokens).yellow().to_string()
}

pub fn path_prompt() -> String {
    "Enter the full path to the archive: ".yellow().to_string()
}

pub fn parameter_prompt(command: Command) -> Option<String> {
    command
        .parameter_prompt()
        .map(|p| format!("{} ", p).yellow().to_string())
}

pub fn unknown_command() -> String {
    "Unknown command.\n".red().to_string()
}

pub fn unknown_format() -> String {
    "Unknown archive type.\n".red().to_string()
}

pub fn goodbye() -> String {
    "Goodbye.\n".yellow().to_string()
}

// =============================================================================
// Framing
// =============================================================================

/// Read one line, without its terminator.
///
/// Returns `None` on a clean end of stream. Bytes after the last `\n` at end
/// of stream count as a final line. Invalid UTF-8 is replaced lossily.
pub async fn read_line<R: AsyncBufRead + Unpin>(r: &mut R) -> Result<Option<String>> {
    let mut buf = Vec::new();
    let n = (&mut *r)
        .take(MAX_LINE_LEN as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await
        .context("Failed to read line")?;

    if n == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > MAX_LINE_LEN {
        anyhow::bail!(
            "Line exceeds maximum allowed length {}",
            MAX_LINE_LEN
        );
    }

    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Write a message and flush it.
pub async fn write_message<W: AsyncWrite + Unpin>(w: &mut W, text: &str) -> Result<()> {
    w.write_all(text.as_bytes())
        .await
        .context("Failed to write message")?;
    w.flush().await.context("Failed to flush message")?;
    Ok(())
}
