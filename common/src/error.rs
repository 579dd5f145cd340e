use std::{io, path::PathBuf, process::ExitStatus};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlotError {
    #[error("Input file {} does not exist", .0.display())]
    MissingFile(PathBuf),
    #[error("Could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Could not create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid configuration {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
    #[error("Invalid metric filter: {0}")]
    MetricFilter(#[from] regex::Error),
}

/// A malformed data row. `line` is the 1-based line number in the input.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    pub line: u64,
    pub reason: ParseErrorReason,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseErrorReason {
    #[error("expected at least {expected} fields, found {found}")]
    MissingFields { expected: usize, found: usize },
    #[error("invalid rank count {0:?}")]
    InvalidRankCount(String),
    #[error("rank count must be positive")]
    ZeroRankCount,
    #[error("invalid elapsed seconds {0:?}")]
    InvalidElapsed(String),
    #[error("elapsed seconds must not be negative, got {0}")]
    NegativeElapsed(f64),
    #[error("row is not valid UTF-8")]
    InvalidUtf8,
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Drawing failed: {0}")]
    Drawing(String),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("{} was already written by another chart", .0.display())]
    DuplicateOutput(PathBuf),
    #[error("{program} exited with {status}: {stderr}")]
    Process {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}
