use eyre::{bail, Context, Result};
use fancy_duration::AsFancyDuration;
use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

/// How an external tool invocation ended.
#[derive(Debug)]
pub enum ToolOutcome {
    Succeeded,
    Failed(ExitStatus),
    /// The process could not be spawned at all.
    NotStarted(io::Error),
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Succeeded)
    }

    fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            ToolOutcome::Succeeded
        } else {
            ToolOutcome::Failed(status)
        }
    }
}

impl Display for ToolOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolOutcome::Succeeded => write!(f, "succeeded"),
            ToolOutcome::Failed(status) => write!(f, "failed ({status})"),
            ToolOutcome::NotStarted(e) => write!(f, "could not be started ({e})"),
        }
    }
}

/// An external executable, e.g. `avr-objcopy`.
#[derive(Debug, Clone)]
pub struct Tool {
    name: &'static str,
    program: PathBuf,
}

impl Tool {
    pub fn new(name: &'static str, program: impl Into<PathBuf>) -> Self {
        Self {
            name,
            program: program.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run to completion. stdout and stderr are merged and logged line by
    /// line.
    pub fn run(&self, args: Vec<OsString>) -> Result<ToolOutcome> {
        let expr = self.expression(&args).stderr_to_stdout();
        self.drain(&args, &expr, |line| {
            tracing::info!("{}: {line}", self.name);
            Ok(())
        })
    }

    /// Run to completion, handing each line of stdout to `on_line`. stderr is
    /// left attached to ours.
    pub fn stream<F>(&self, args: Vec<OsString>, on_line: F) -> Result<ToolOutcome>
    where
        F: FnMut(&str) -> Result<()>,
    {
        let expr = self.expression(&args);
        self.drain(&args, &expr, on_line)
    }

    fn expression(&self, args: &[OsString]) -> duct::Expression {
        duct::cmd(self.program.as_path(), args.iter().cloned()).unchecked()
    }

    fn drain<F>(
        &self,
        args: &[OsString],
        expr: &duct::Expression,
        mut on_line: F,
    ) -> Result<ToolOutcome>
    where
        F: FnMut(&str) -> Result<()>,
    {
        tracing::info!("`{}`", self.command_line(args));
        let start = chrono::Utc::now();

        let reader = match expr.reader() {
            Ok(reader) => reader,
            Err(e) => {
                tracing::debug!("failed to spawn {}: {e}", self.program.display());
                return Ok(ToolOutcome::NotStarted(e));
            }
        };
        let mut buf_reader = BufReader::new(reader);
        for line in (&mut buf_reader).split(b'\n') {
            let line = line.wrap_err_with(|| format!("failed to read output of {}", self.name))?;
            let line = String::from_utf8_lossy(&line);
            on_line(line.strip_suffix('\r').unwrap_or(&*line))?;
        }

        // Reaching EOF makes the handle wait on the child.
        let reader = buf_reader.into_inner();
        let Some(output) = reader
            .try_wait()
            .wrap_err_with(|| format!("failed to wait for {}", self.name))?
        else {
            bail!("{} closed its output but did not exit", self.name);
        };
        let outcome = ToolOutcome::from_status(output.status);
        tracing::debug!(
            "{} {outcome} after {}",
            self.name,
            (chrono::Utc::now() - start).fancy_duration().to_string(),
        );
        Ok(outcome)
    }

    fn command_line(&self, args: &[OsString]) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(args.iter().map(OsString::as_os_str))
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
