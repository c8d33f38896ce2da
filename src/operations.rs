//! Uniform operation surface over the format strategies.
//!
//! [`ArchiveOperations`] binds one archive to its resolved strategy and
//! forwards calls unchanged. It does no validation of its own; the format is
//! already a closed enum by the time one is constructed.

use crate::archive::{Archive, ArchiveFormat, ArchiveStrategy, StrategyRegistry};
use crate::outcome::Outcome;
use std::path::{Path, PathBuf};

/// One requested operation with its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Create(Vec<PathBuf>),
    Extract(PathBuf),
    Add(Vec<PathBuf>),
    Remove(Vec<String>),
    EditMetadata(String),
    ShowMetadata,
    Test,
    /// Part size in bytes
    Split(u64),
}

pub struct ArchiveOperations<'a> {
    archive: Archive,
    strategy: &'a dyn ArchiveStrategy,
}

impl<'a> ArchiveOperations<'a> {
    pub fn new(registry: &'a StrategyRegistry, format: ArchiveFormat, path: impl Into<PathBuf>) -> Self {
        Self {
            archive: Archive::new(format, path),
            strategy: registry.get(format),
        }
    }

    /// The bound archive; `create` may have corrected its extension
    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    pub fn create(&mut self, inputs: &[PathBuf]) -> Outcome {
        self.strategy.create(&mut self.archive, inputs)
    }

    pub fn extract(&self, dest: &Path) -> Outcome {
        self.strategy.extract(&self.archive, dest)
    }

    pub fn add(&self, inputs: &[PathBuf]) -> Outcome {
        self.strategy.add(&self.archive, inputs)
    }

    pub fn remove(&self, items: &[String]) -> Outcome {
        self.strategy.remove(&self.archive, items)
    }

    pub fn edit_metadata(&self, text: &str) -> Outcome {
        self.strategy.edit_metadata(&self.archive, text)
    }

    pub fn show_metadata(&self) -> Outcome {
        self.strategy.show_metadata(&self.archive)
    }

    pub fn test(&self) -> Outcome {
        self.strategy.test(&self.archive)
    }

    pub fn split(&self, part_size: u64) -> Outcome {
        self.strategy.split(&self.archive, part_size)
    }

    /// Dispatch a parsed operation
    pub fn execute(&mut self, operation: &Operation) -> Outcome {
        match operation {
            Operation::Create(inputs) => self.create(inputs),
            Operation::Extract(dest) => self.extract(dest),
            Operation::Add(inputs) => self.add(inputs),
            Operation::Remove(items) => self.remove(items),
            Operation::EditMetadata(text) => self.edit_metadata(text),
            Operation::ShowMetadata => self.show_metadata(),
            Operation::Test => self.test(),
            Operation::Split(part_size) => self.split(*part_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::outcome::Verdict;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_binds_strategy_by_format() {
        let registry = StrategyRegistry::default();
        for format in ArchiveFormat::ALL {
            let ops = ArchiveOperations::new(&registry, format, "x");
            assert_eq!(ops.strategy.format(), format);
        }
    }

    #[test]
    fn test_create_corrects_bound_path() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("a.txt");
        fs::write(&input, "a").unwrap();
        let registry = StrategyRegistry::default();
        let mut ops = ArchiveOperations::new(&registry, ArchiveFormat::Zip, temp.path().join("pkg"));

        let outcome = ops.execute(&Operation::Create(vec![input]));

        assert!(outcome.is_success(), "{}", outcome.text());
        assert_eq!(ops.archive().path, temp.path().join("pkg.zip"));
        assert!(ops.execute(&Operation::Test).is_success());
    }

    #[test]
    fn test_unsupported_format_forwards_verbatim() {
        let registry = StrategyRegistry::default();
        let mut ops = ArchiveOperations::new(&registry, ArchiveFormat::Unsupported, "x.ace");
        let outcome = ops.execute(&Operation::ShowMetadata);
        assert_eq!(outcome.verdict, Verdict::Failure(ErrorKind::UnsupportedFormat));
    }
}
