//! Classified textual results returned by every archive operation.
//!
//! Operations never raise past their boundary. Whatever happened is folded
//! into an [`Outcome`]: a verdict plus the human-readable lines sent back to
//! the peer. The verdict is authoritative, the text is for display.

use crate::error::{ErrorKind, Result};
use colored::Colorize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    /// Operation completed but something deserves attention (e.g. no manifest)
    Warning,
    Failure(ErrorKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub verdict: Verdict,
    pub lines: Vec<String>,
}

impl Outcome {
    pub fn success(line: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Success,
            lines: vec![line.into()],
        }
    }

    pub fn warning(line: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Warning,
            lines: vec![line.into()],
        }
    }

    pub fn failure(kind: ErrorKind, line: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Failure(kind),
            lines: vec![line.into()],
        }
    }

    /// Append a line, keeping the current verdict.
    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    /// Put a line in front, keeping the current verdict.
    pub fn with_lead(mut self, line: impl Into<String>) -> Self {
        self.lines.insert(0, line.into());
        self
    }

    /// Fold a fallible operation into an outcome.
    ///
    /// Errors become a `Failure` whose text is `"<context>: <error>"`.
    pub fn capture(context: &str, result: Result<Outcome>) -> Outcome {
        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "{}", context);
                Outcome::failure(e.kind(), format!("{}: {}", context, e))
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.verdict == Verdict::Success
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.verdict, Verdict::Failure(_))
    }

    /// Plain text without color codes.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.text();
        let painted = match self.verdict {
            Verdict::Success => text.green(),
            Verdict::Warning => text.yellow(),
            Verdict::Failure(_) => text.red(),
        };
        write!(f, "{}", painted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArchiveError;

    #[test]
    fn test_capture_passes_through_ok() {
        let outcome = Outcome::capture("ctx", Ok(Outcome::success("done")));
        assert!(outcome.is_success());
        assert_eq!(outcome.text(), "done");
    }

    #[test]
    fn test_capture_classifies_error() {
        let err = ArchiveError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let outcome = Outcome::capture("Error creating ZIP archive", Err(err));

        assert_eq!(outcome.verdict, Verdict::Failure(ErrorKind::IoFailure));
        assert!(outcome.text().starts_with("Error creating ZIP archive: "));
        assert!(outcome.text().contains("missing"));
    }

    #[test]
    fn test_with_line_keeps_verdict() {
        let outcome = Outcome::warning("no manifest").with_line("extracted");
        assert_eq!(outcome.verdict, Verdict::Warning);
        assert_eq!(outcome.text(), "no manifest\nextracted");
    }
}
