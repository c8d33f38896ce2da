//! Formats recognised on the wire but not implemented (`ace`).

use super::{Archive, ArchiveFormat, ArchiveStrategy};
use crate::error::ErrorKind;
use crate::outcome::Outcome;
use std::path::{Path, PathBuf};

pub struct UnsupportedStrategy;

fn not_supported(message: &str) -> Outcome {
    Outcome::failure(ErrorKind::UnsupportedFormat, message)
}

impl ArchiveStrategy for UnsupportedStrategy {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Unsupported
    }

    fn create(&self, _archive: &mut Archive, _inputs: &[PathBuf]) -> Outcome {
        not_supported("Creation of .ace archives is not supported.")
    }

    fn extract(&self, _archive: &Archive, _dest: &Path) -> Outcome {
        not_supported("Extraction of .ace archives is not supported.")
    }

    fn add(&self, _archive: &Archive, _inputs: &[PathBuf]) -> Outcome {
        not_supported("Adding files to .ace archives is not supported.")
    }

    fn remove(&self, _archive: &Archive, _items: &[String]) -> Outcome {
        not_supported("Removing files from .ace archives is not supported.")
    }

    fn edit_metadata(&self, _archive: &Archive, _text: &str) -> Outcome {
        not_supported("Editing metadata is not supported for ACE archives.")
    }

    fn show_metadata(&self, _archive: &Archive) -> Outcome {
        not_supported("Showing metadata is not supported for ACE archives.")
    }

    fn test(&self, _archive: &Archive) -> Outcome {
        not_supported("Testing .ace archives is not supported.")
    }

    fn split(&self, _archive: &Archive, _part_size: u64) -> Outcome {
        not_supported("Splitting .ace archives is not supported.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Verdict;
    use tempfile::TempDir;

    #[test]
    fn test_every_operation_is_a_noop() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("a.txt");
        std::fs::write(&input, "a").unwrap();
        let mut archive = Archive::new(ArchiveFormat::Unsupported, temp.path().join("x"));
        let s = UnsupportedStrategy;

        let outcomes = vec![
            s.create(&mut archive, &[input.clone()]),
            s.extract(&archive, temp.path()),
            s.add(&archive, &[input]),
            s.remove(&archive, &["a.txt".to_string()]),
            s.edit_metadata(&archive, "m"),
            s.show_metadata(&archive),
            s.test(&archive),
            s.split(&archive, 1),
        ];

        for outcome in outcomes {
            assert_eq!(outcome.verdict, Verdict::Failure(ErrorKind::UnsupportedFormat));
            assert!(outcome.text().contains("not supported"));
        }
        // Path is left alone and nothing is written
        assert_eq!(archive.path, temp.path().join("x"));
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 1);
    }
}
