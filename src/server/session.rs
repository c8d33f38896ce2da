//! Per-connection session state machine.
//!
//! ```text
//! AwaitingCommand -> AwaitingFormat -> AwaitingPath -> AwaitingParameters -> Executing
//!        ^                 |                                                    |
//!        +-----------------+ (unknown archive type)                             |
//!        +----------------------------------------------------------------------+
//! ```
//!
//! `exit`, end of stream or a transport error close the session.

use crate::archive::{ArchiveFormat, StrategyRegistry};
use crate::error::ErrorKind;
use crate::operations::{ArchiveOperations, Operation};
use crate::outcome::Outcome;
use crate::server::protocol::{self, Command};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};

/// A fully collected request, ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub format: ArchiveFormat,
    pub path: PathBuf,
    pub operation: Operation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    AwaitingCommand,
    AwaitingFormat(Command),
    AwaitingPath(Command, ArchiveFormat),
    AwaitingParameters(Command, ArchiveFormat, PathBuf),
    Executing(Request),
    Closed,
}

pub struct Session<R, W> {
    reader: R,
    writer: W,
    registry: Arc<StrategyRegistry>,
    peer: String,
}

impl<R, W> Session<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, registry: Arc<StrategyRegistry>) -> Self {
        Self {
            reader,
            writer,
            registry,
            peer: String::from("local"),
        }
    }

    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = peer.into();
        self
    }

    /// Greet the peer and drive the state machine until the session closes.
    pub async fn run(mut self) -> Result<()> {
        self.send(&protocol::welcome()).await?;

        let mut state = State::AwaitingCommand;
        while state != State::Closed {
            state = self.step(state).await?;
        }

        tracing::debug!(peer = %self.peer, "session closed");
        Ok(())
    }

    /// Advance one transition. Reads at most one line.
    pub async fn step(&mut self, state: State) -> Result<State> {
        let next = match state {
            State::AwaitingCommand => match self.next_line().await? {
                None => State::Closed,
                Some(line) => self.on_command(line.trim()).await?,
            },

            State::AwaitingFormat(command) => match self.next_line().await? {
                None => State::Closed,
                Some(line) => match ArchiveFormat::from_token(line.trim()) {
                    Some(format) => {
                        self.send(&protocol::path_prompt()).await?;
                        State::AwaitingPath(command, format)
                    }
                    None => {
                        self.send(&protocol::unknown_format()).await?;
                        State::AwaitingCommand
                    }
                },
            },

            State::AwaitingPath(command, format) => match self.next_line().await? {
                None => State::Closed,
                Some(line) => {
                    let path = PathBuf::from(line.trim());
                    match protocol::parameter_prompt(command) {
                        Some(prompt) => {
                            self.send(&prompt).await?;
                            State::AwaitingParameters(command, format, path)
                        }
                        None => self.on_parameters(command, format, path, "").await?,
                    }
                }
            },

            State::AwaitingParameters(command, format, path) => match self.next_line().await? {
                None => State::Closed,
                Some(line) => self.on_parameters(command, format, path, &line).await?,
            },

            State::Executing(request) => {
                let outcome = self.execute(request).await;
                let response = format!("{}{}", outcome, protocol::command_prompt());
                self.send(&response).await?;
                State::AwaitingCommand
            }

            State::Closed => State::Closed,
        };

        tracing::debug!(peer = %self.peer, state = ?next, "session transition");
        Ok(next)
    }

    async fn on_command(&mut self, keyword: &str) -> Result<State> {
        match Command::from_keyword(keyword) {
            None => {
                tracing::debug!(peer = %self.peer, keyword, "unknown command");
                self.send(&protocol::unknown_command()).await?;
                Ok(State::AwaitingCommand)
            }
            Some(Command::Help) => {
                self.send(&protocol::help_text()).await?;
                Ok(State::AwaitingCommand)
            }
            Some(Command::Exit) => {
                self.send(&protocol::goodbye()).await?;
                Ok(State::Closed)
            }
            Some(command) => {
                self.send(&protocol::format_prompt()).await?;
                Ok(State::AwaitingFormat(command))
            }
        }
    }

    async fn on_parameters(
        &mut self,
        command: Command,
        format: ArchiveFormat,
        path: PathBuf,
        line: &str,
    ) -> Result<State> {
        match command.parse_operation(line) {
            Ok(operation) => Ok(State::Executing(Request {
                format,
                path,
                operation,
            })),
            Err(e) => {
                let outcome = Outcome::failure(e.kind(), e.to_string());
                let response = format!("{}{}", outcome, protocol::command_prompt());
                self.send(&response).await?;
                Ok(State::AwaitingCommand)
            }
        }
    }

    /// Run the archive operation off the async runtime.
    async fn execute(&self, request: Request) -> Outcome {
        let registry = Arc::clone(&self.registry);
        tracing::debug!(peer = %self.peer, request = ?request, "executing");

        let result = tokio::task::spawn_blocking(move || {
            let mut ops = ArchiveOperations::new(&registry, request.format, request.path);
            ops.execute(&request.operation)
        })
        .await;

        result.unwrap_or_else(|e| {
            tracing::warn!(peer = %self.peer, error = %e, "archive operation aborted");
            Outcome::failure(ErrorKind::IoFailure, format!("Operation aborted: {}", e))
        })
    }

    async fn next_line(&mut self) -> Result<Option<String>> {
        protocol::read_line(&mut self.reader).await
    }

    async fn send(&mut self, text: &str) -> Result<()> {
        protocol::write_message(&mut self.writer, text).await
    }
}
