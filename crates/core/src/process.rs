//! External command runner
//!
//! Every external program droidpack drives (package managers, `eas`, `npx`,
//! `java`, `curl`/`wget`, `taskkill`) goes through [`CommandRunner`]. The
//! runner resolves the program on the search path of the project's
//! environment snapshot, spawns it, waits for it to exit and turns a nonzero
//! status into [`RunError::CommandFailed`]. It never retries; retry policy
//! belongs to the caller.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Options for a single invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOptions {
    /// Stream the child's output to our terminal instead of capturing it
    pub inherit_io: bool,
    /// Directory to run in (defaults to the runner's project root)
    pub working_directory: Option<PathBuf>,
}

impl CommandOptions {
    /// Stream output to the terminal
    pub fn inherit() -> Self {
        Self {
            inherit_io: true,
            working_directory: None,
        }
    }

    /// Capture stdout
    pub fn capture() -> Self {
        Self::default()
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }
}

/// Result of a successful invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    /// Captured stdout, `None` when output was inherited
    pub stdout: Option<String>,
}

/// Command runner errors
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),
    #[error("{program} exited with status {code}")]
    CommandFailed {
        program: String,
        code: i32,
        stderr: Option<String>,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunError {
    /// Exit code of a failed command, if it ran at all
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RunError::CommandFailed { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Invokes external programs
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and wait for it to exit.
    async fn run(
        &self,
        program: &str,
        args: &[String],
        options: &CommandOptions,
    ) -> Result<CommandOutput, RunError>;

    /// Whether `program` resolves on the search path
    fn is_available(&self, program: &str) -> bool;
}

/// Build an argument vector from anything string-like
pub fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items.into_iter().map(|s| s.as_ref().to_string()).collect()
}

/// Runs real processes with the project's environment snapshot
pub struct SystemRunner {
    env: HashMap<String, String>,
    cwd: PathBuf,
}

impl SystemRunner {
    /// Create a runner that hands `env` to every child and runs in `cwd`
    pub fn new(env: HashMap<String, String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            env,
            cwd: cwd.into(),
        }
    }

    fn search_path(&self) -> Option<&String> {
        self.env.get("PATH").or_else(|| self.env.get("Path"))
    }

    /// Resolve a program name to an executable path
    pub fn resolve(&self, program: &str) -> Result<PathBuf, RunError> {
        which::which_in(program, self.search_path(), &self.cwd)
            .map_err(|_| RunError::CommandNotFound(program.to_string()))
    }

    fn working_dir<'a>(&'a self, options: &'a CommandOptions) -> &'a Path {
        options.working_directory.as_deref().unwrap_or(&self.cwd)
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        options: &CommandOptions,
    ) -> Result<CommandOutput, RunError> {
        let resolved = self.resolve(program)?;

        debug!("{} {}", program, args.join(" "));

        let mut cmd = Command::new(&resolved);
        cmd.args(args)
            .env_clear()
            .envs(&self.env)
            .current_dir(self.working_dir(options))
            .kill_on_drop(true);

        if options.inherit_io {
            let status = cmd
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await?;

            // Killed by a signal shows up as -1
            let code = status.code().unwrap_or(-1);
            if !status.success() {
                return Err(RunError::CommandFailed {
                    program: program.to_string(),
                    code,
                    stderr: None,
                });
            }

            return Ok(CommandOutput {
                exit_code: code,
                stdout: None,
            });
        }

        let output = cmd.stdin(Stdio::null()).output().await?;
        let code = output.status.code().unwrap_or(-1);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(RunError::CommandFailed {
                program: program.to_string(),
                code,
                stderr: Some(stderr),
            });
        }

        Ok(CommandOutput {
            exit_code: code,
            stdout: Some(String::from_utf8_lossy(&output.stdout).to_string()),
        })
    }

    fn is_available(&self, program: &str) -> bool {
        self.resolve(program).is_ok()
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod testing {
    //! A scripted, recording [`CommandRunner`] for tests.

    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::{CommandOptions, CommandOutput, CommandRunner, RunError};

    /// Side effect run when a program is invoked (e.g. to create its output files)
    pub type Hook = Arc<dyn Fn(&[String]) + Send + Sync>;

    /// One scripted reply
    #[derive(Debug, Clone)]
    pub enum Response {
        Exit(i32),
        Stdout(i32, String),
    }

    /// A call the runner received
    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub program: String,
        pub args: Vec<String>,
        pub options: CommandOptions,
        pub at: tokio::time::Instant,
    }

    impl RecordedCall {
        pub fn has_arg(&self, arg: &str) -> bool {
            self.args.iter().any(|a| a == arg)
        }
    }

    /// Runner whose replies are scripted per program.
    ///
    /// Programs with no scripted reply exit 0. Queued replies are consumed in
    /// order before the per-program default applies.
    #[derive(Default)]
    pub struct ScriptedRunner {
        missing: HashSet<String>,
        defaults: HashMap<String, Response>,
        queued: Mutex<HashMap<String, VecDeque<Response>>>,
        hooks: HashMap<String, Hook>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pretend `program` is not installed
        pub fn missing(mut self, program: &str) -> Self {
            self.missing.insert(program.to_string());
            self
        }

        /// Every call to `program` gets `response` unless something is queued
        pub fn always(mut self, program: &str, response: Response) -> Self {
            self.defaults.insert(program.to_string(), response);
            self
        }

        /// Queue a one-shot reply for the next call to `program`
        pub fn then(self, program: &str, response: Response) -> Self {
            self.queued
                .lock()
                .entry(program.to_string())
                .or_default()
                .push_back(response);
            self
        }

        /// Run `hook` with the arguments of every call to `program`
        pub fn on_call<F>(mut self, program: &str, hook: F) -> Self
        where
            F: Fn(&[String]) + Send + Sync + 'static,
        {
            self.hooks.insert(program.to_string(), Arc::new(hook));
            self
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().clone()
        }

        pub fn calls_to(&self, program: &str) -> Vec<RecordedCall> {
            self.calls
                .lock()
                .iter()
                .filter(|c| c.program == program)
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(
            &self,
            program: &str,
            args: &[String],
            options: &CommandOptions,
        ) -> Result<CommandOutput, RunError> {
            if self.missing.contains(program) {
                return Err(RunError::CommandNotFound(program.to_string()));
            }

            self.calls.lock().push(RecordedCall {
                program: program.to_string(),
                args: args.to_vec(),
                options: options.clone(),
                at: tokio::time::Instant::now(),
            });

            if let Some(hook) = self.hooks.get(program) {
                hook(args);
            }

            let response = self
                .queued
                .lock()
                .get_mut(program)
                .and_then(|q| q.pop_front())
                .or_else(|| self.defaults.get(program).cloned())
                .unwrap_or(Response::Exit(0));

            let (code, stdout) = match response {
                Response::Exit(code) => (code, None),
                Response::Stdout(code, out) => (code, Some(out)),
            };

            if code != 0 {
                return Err(RunError::CommandFailed {
                    program: program.to_string(),
                    code,
                    stderr: None,
                });
            }

            Ok(CommandOutput {
                exit_code: 0,
                stdout: if options.inherit_io {
                    None
                } else {
                    Some(stdout.unwrap_or_default())
                },
            })
        }

        fn is_available(&self, program: &str) -> bool {
            !self.missing.contains(program)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Response, ScriptedRunner};
    use super::*;

    fn runner() -> SystemRunner {
        let env: HashMap<String, String> = std::env::vars().collect();
        SystemRunner::new(env, std::env::temp_dir())
    }

    #[tokio::test]
    async fn test_missing_program() {
        let result = runner()
            .run("definitely_not_a_real_command_12345", &[], &CommandOptions::capture())
            .await;
        assert!(matches!(result, Err(RunError::CommandNotFound(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_stdout() {
        let output = runner()
            .run("sh", &args(["-c", "echo hello"]), &CommandOptions::capture())
            .await
            .unwrap();
        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout.as_deref().map(str::trim), Some("hello"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit() {
        let err = runner()
            .run("sh", &args(["-c", "exit 3"]), &CommandOptions::capture())
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let output = runner()
            .run("sh", &args(["-c", "pwd"]), &CommandOptions::capture().in_dir(dir.path()))
            .await
            .unwrap();
        let printed = PathBuf::from(output.stdout.unwrap().trim());
        assert_eq!(
            printed.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn test_scripted_runner_queue() {
        let runner = ScriptedRunner::new()
            .always("npm", Response::Exit(1))
            .then("npm", Response::Exit(0));

        assert!(runner.run("npm", &args(["install"]), &CommandOptions::inherit()).await.is_ok());
        assert!(runner.run("npm", &args(["install"]), &CommandOptions::inherit()).await.is_err());
        assert_eq!(runner.calls_to("npm").len(), 2);
    }
}
