//! Shell invocation
//!
//! Every action and every computed variable goes through a [`Shell`]: the
//! configured interpreter (`sh -c` unless the task file says otherwise) run
//! from the task file's directory.

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command as StdCommand, ExitStatus, Output, Stdio};

/// Interpreter and base directory used to run command strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    /// Interpreter program followed by its arguments (e.g., ["sh", "-c"])
    pub interpreter: Vec<String>,

    /// Directory commands run from
    pub working_dir: PathBuf,
}

impl Shell {
    /// `sh -c` from the current directory
    pub fn new() -> Self {
        Shell {
            interpreter: vec!["sh".to_string(), "-c".to_string()],
            working_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Set the interpreter
    pub fn with_interpreter(mut self, interpreter: Vec<String>) -> Self {
        if !interpreter.is_empty() {
            self.interpreter = interpreter;
        }
        self
    }

    /// Set the working directory
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    /// Resolve a possibly relative path against the working directory
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        self.working_dir.join(path)
    }

    fn build(&self, script: &str, dir: Option<&Path>, envs: &[(String, String)]) -> StdCommand {
        let mut command = StdCommand::new(&self.interpreter[0]);

        // Add interpreter args (e.g., "-c" for sh/bash)
        if self.interpreter.len() > 1 {
            command.args(&self.interpreter[1..]);
        }

        command.arg(script);
        command.current_dir(dir.unwrap_or(self.working_dir.as_path()));

        for (key, value) in envs {
            command.env(key, value);
        }

        command
    }

    /// Run a command with inherited stdio and wait for it to exit
    pub fn run(
        &self,
        script: &str,
        dir: Option<&Path>,
        envs: &[(String, String)],
    ) -> io::Result<ExitStatus> {
        let mut command = self.build(script, dir, envs);
        command.stdin(Stdio::inherit());
        command.stdout(Stdio::inherit());
        command.stderr(Stdio::inherit());
        command.status()
    }

    /// Run a command and capture its standard output; stderr is passed through
    pub fn capture(&self, script: &str, envs: &[(String, String)]) -> io::Result<Output> {
        let mut command = self.build(script, None, envs);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::inherit());
        command.output()
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

/// Exit code reported for a finished process.
///
/// A process killed by a signal has no code; report it as a plain failure.
pub fn exit_code(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
