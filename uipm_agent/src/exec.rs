//! Command gateway: runs external tools, masks secrets in the log, and keeps a
//! drainable record of failures for the dashboard.

use crate::error::ExecError;
use crate::types::CommandError;
use std::io;
use std::process::Command;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

const SENSITIVE_PREFIXES: &[&str] = &["--authkey="];
const MASK: &str = "***";

/// Raw result of a finished process.
#[derive(Debug, Clone, Default)]
pub struct RawOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Process-execution facility. Implementations block until the child exits.
pub trait Executor: Send + Sync {
    fn execute(&self, program: &str, args: &[&str]) -> io::Result<RawOutput>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn execute(&self, program: &str, args: &[&str]) -> io::Result<RawOutput> {
        let out = Command::new(program).args(args).output()?;
        Ok(RawOutput {
            success: out.status.success(),
            code: out.status.code(),
            stdout: out.stdout,
            stderr: out.stderr,
        })
    }
}

/// Append-only failure log, emptied on read.
#[derive(Debug, Default)]
pub struct CommandErrorLog {
    entries: Mutex<Vec<CommandError>>,
}

impl CommandErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<CommandError>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, message: String) {
        self.guard().push(CommandError { message });
    }

    /// Everything pushed since the previous drain, oldest first.
    pub fn drain(&self) -> Vec<CommandError> {
        std::mem::take(&mut *self.guard())
    }
}

/// Mask values of sensitive flags. Only used for the logged form.
pub fn redact_args(args: &[&str]) -> Vec<String> {
    args.iter()
        .map(|a| {
            match SENSITIVE_PREFIXES.iter().find(|p| a.starts_with(**p)) {
                Some(prefix) => format!("{prefix}{MASK}"),
                None => (*a).to_string(),
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct CommandGateway {
    executor: Arc<dyn Executor>,
    errors: Arc<CommandErrorLog>,
}

impl CommandGateway {
    pub fn new(executor: Arc<dyn Executor>, errors: Arc<CommandErrorLog>) -> Self {
        Self { executor, errors }
    }

    pub fn system(errors: Arc<CommandErrorLog>) -> Self {
        Self::new(Arc::new(SystemExecutor), errors)
    }

    pub fn errors(&self) -> &Arc<CommandErrorLog> {
        &self.errors
    }

    /// Run a command; returns combined stdout+stderr on success.
    pub fn run(&self, program: &str, args: &[&str]) -> Result<Vec<u8>, ExecError> {
        self.log_invocation(program, args);
        let out = self.launch(program, args)?;
        let mut combined = out.stdout;
        combined.extend_from_slice(&out.stderr);
        if !out.success {
            let err = ExecError::Failed {
                program: program.to_string(),
                code: out.code,
                output: String::from_utf8_lossy(&combined).trim().to_string(),
            };
            self.record(&err);
            return Err(err);
        }
        debug!(program, "ok");
        Ok(combined)
    }

    /// Run a command and capture stdout only. Stderr is not kept on failure.
    pub fn run_capture(&self, program: &str, args: &[&str]) -> Result<Vec<u8>, ExecError> {
        self.log_invocation(program, args);
        let out = self.launch(program, args)?;
        if !out.success {
            let err = ExecError::Failed {
                program: program.to_string(),
                code: out.code,
                output: String::new(),
            };
            self.record(&err);
            return Err(err);
        }
        debug!(program, bytes = out.stdout.len(), "ok");
        Ok(out.stdout)
    }

    fn log_invocation(&self, program: &str, args: &[&str]) {
        let mut line = program.to_string();
        for a in redact_args(args) {
            line.push(' ');
            line.push_str(&a);
        }
        info!("$ {line}");
    }

    fn launch(&self, program: &str, args: &[&str]) -> Result<RawOutput, ExecError> {
        self.executor.execute(program, args).map_err(|source| {
            let err = ExecError::Launch {
                program: program.to_string(),
                source,
            };
            self.record(&err);
            err
        })
    }

    fn record(&self, err: &ExecError) {
        let msg = match err {
            ExecError::Failed { output, .. } if !output.is_empty() => format!("{err} - {output}"),
            _ => err.to_string(),
        };
        warn!("error: {msg}");
        self.errors.push(msg);
    }
}
