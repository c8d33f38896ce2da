//! archd - archive manipulation over a line protocol.
//!
//! Layers, leaf first:
//! - [`checksum`]: per-file digest manifest written at create, verified at extract
//! - [`archive`]: one strategy per format (tar.gz, zip, rar, unsupported)
//! - [`operations`]: binds an archive to its strategy
//! - [`server`]: session state machine and connection listener

pub mod archive;
pub mod checksum;
pub mod config;
pub mod error;
pub mod operations;
pub mod outcome;
pub mod server;

pub use archive::{Archive, ArchiveFormat, ArchiveStrategy, StrategyRegistry};
pub use checksum::ChecksumManifest;
pub use config::ServerConfig;
pub use error::{ArchiveError, ErrorKind, Result};
pub use operations::{ArchiveOperations, Operation};
pub use outcome::{Outcome, Verdict};
