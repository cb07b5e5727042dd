use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};

use bench_core::errors::{BenchError, ErrorInfo};
use bench_core::Combination;
use serde::{Deserialize, Serialize};

use crate::family::ArgToken;
use crate::plan::AxisSpec;

/// Exit status and merged output text of one benchmark invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOutput {
    pub exit_status: i32,
    pub text: String,
}

impl RawOutput {
    pub fn new(exit_status: i32, text: impl Into<String>) -> Self {
        Self {
            exit_status,
            text: text.into(),
        }
    }
}

/// Something that can execute the benchmark with a rendered argument vector.
///
/// A non-zero exit is reported through [`RawOutput::exit_status`]; only a
/// failure to start the program is an error.
pub trait Runner {
    fn run(&mut self, args: &[String]) -> Result<RawOutput, BenchError>;

    /// Checks up front that the program can be launched at all.
    fn preflight(&self) -> Result<(), BenchError> {
        Ok(())
    }
}

/// Runs an external executable as a blocking child process.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    executable: PathBuf,
}

impl ProcessRunner {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// A single-component name such as `python3` is resolved through `PATH`
    /// by the OS at launch time.
    fn searches_path(&self) -> bool {
        self.executable.components().count() == 1
            && !self.executable.as_os_str().is_empty()
            && !self.executable.exists()
    }

    fn launch_error(&self, message: &str, hint: impl Into<String>) -> BenchError {
        BenchError::Launch(
            ErrorInfo::new("launch", message)
                .with_context("path", self.executable.display().to_string())
                .with_hint(hint),
        )
    }
}

impl Runner for ProcessRunner {
    fn run(&mut self, args: &[String]) -> Result<RawOutput, BenchError> {
        let mut command = Command::new(&self.executable);
        command.args(args).stdin(Stdio::null());
        let output = command.output().map_err(|err| {
            self.launch_error("failed to launch benchmark executable", err.to_string())
        })?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push('\n');
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(RawOutput {
            exit_status: exit_code(output.status),
            text,
        })
    }

    fn preflight(&self) -> Result<(), BenchError> {
        if self.searches_path() {
            return Ok(());
        }
        let metadata = fs::metadata(&self.executable).map_err(|err| {
            self.launch_error("benchmark executable not found", err.to_string())
        })?;
        if !metadata.is_file() {
            return Err(self.launch_error(
                "benchmark executable is not a regular file",
                "point `executable` at the compiled benchmark binary",
            ));
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if metadata.permissions().mode() & 0o111 == 0 {
                return Err(self.launch_error(
                    "benchmark executable is not executable",
                    "chmod +x the benchmark binary",
                ));
            }
        }
        Ok(())
    }
}

/// Exit code, or the negated signal number when the child was killed.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

/// Argument template bound to the plan's axis rendering rules.
#[derive(Debug, Clone)]
pub struct ArgTemplate {
    tokens: Vec<ArgToken>,
    precision: BTreeMap<String, usize>,
}

impl ArgTemplate {
    pub fn new(tokens: &[ArgToken], axes: &[AxisSpec]) -> Self {
        Self {
            tokens: tokens.to_vec(),
            precision: axes
                .iter()
                .filter_map(|axis| axis.precision.map(|digits| (axis.name.clone(), digits)))
                .collect(),
        }
    }

    /// Positional arguments for `combination`, in template order.
    pub fn render(&self, combination: &Combination) -> Result<Vec<String>, BenchError> {
        self.tokens
            .iter()
            .map(|token| match token {
                ArgToken::Literal { literal } => Ok(literal.clone()),
                ArgToken::Axis { axis } => combination
                    .get(axis)
                    .map(|value| value.render(self.precision.get(axis).copied()))
                    .ok_or_else(|| {
                        BenchError::Config(
                            ErrorInfo::new("args-axis", "argument references a missing axis")
                                .with_context("axis", axis)
                                .with_context("combination", combination.label()),
                        )
                    }),
            })
            .collect()
    }
}
