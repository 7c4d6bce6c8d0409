//! Error types shared by the samplers and the command gateway.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program}: {}", exit_text(.code))]
    Failed {
        program: String,
        code: Option<i32>,
        output: String,
    },
}

fn exit_text(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit status {c}"),
        None => "terminated by signal".to_string(),
    }
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed {}: {what}", path.display())]
    Parse { path: PathBuf, what: &'static str },
    #[error("failed to enumerate {}: {source}", path.display())]
    Enumerate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A sampled value that either came from its source or fell back to a default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading<T> {
    Fresh(T),
    Degraded { value: T, reason: String },
}

impl<T> Reading<T> {
    /// Falls back to `default`, logging why.
    pub fn degraded(default: T, what: &str, reason: impl ToString) -> Self {
        let reason = reason.to_string();
        warn!(source = what, %reason, "using default value");
        Reading::Degraded {
            value: default,
            reason,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Reading::Degraded { .. })
    }

    pub fn into_value(self) -> T {
        match self {
            Reading::Fresh(v) | Reading::Degraded { value: v, .. } => v,
        }
    }
}
