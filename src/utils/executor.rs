//! Subprocess seam
//!
//! The dump tool and rclone both run through [`CommandExecutor`]. Every
//! invocation carries a deadline; a run that outlives it is killed.

use anyhow::Result;
use std::process::Output;
use std::time::Duration;

/// Runs external programs on behalf of the orchestrators
pub trait CommandExecutor: Send + Sync {
    /// Run `program` to completion; a nonzero exit is an error
    fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Result<Output>;

    /// Run `program` and return its stdout as text
    fn run_stdout(&self, program: &str, args: &[&str], timeout: Duration) -> Result<String> {
        let output = self.run(program, args, timeout)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Spawns real child processes
#[derive(Debug, Clone, Default)]
pub struct RealExecutor;

impl RealExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealExecutor {
    fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Result<Output> {
        super::command::run_with_deadline(program, args, timeout)
    }
}

/// Scripted executor that records invocations instead of spawning anything
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// One recorded invocation
    #[derive(Clone, Debug)]
    pub struct Invocation {
        pub program: String,
        pub args: Vec<String>,
        pub timeout: Duration,
    }

    /// Scripted outcome of an invocation
    #[derive(Clone, Debug, Default)]
    pub enum MockResponse {
        /// Exit 0 printing nothing
        #[default]
        Empty,
        /// Exit 0 printing this to stdout
        Stdout(String),
        /// Exit nonzero with this stderr
        Failure(String),
        /// Never finishes within the deadline
        Timeout,
    }

    impl MockResponse {
        pub fn stdout(stdout: &str) -> Self {
            MockResponse::Stdout(stdout.to_string())
        }

        pub fn failure(stderr: &str) -> Self {
            MockResponse::Failure(stderr.to_string())
        }
    }

    #[derive(Clone, Debug)]
    struct Rule {
        program: String,
        arg: Option<String>,
        response: MockResponse,
    }

    impl Rule {
        fn matches(&self, program: &str, args: &[&str]) -> bool {
            self.program == program
                && self
                    .arg
                    .as_deref()
                    .map_or(true, |wanted| args.contains(&wanted))
        }
    }

    /// Mock executor; unmatched invocations succeed with empty output
    #[derive(Clone, Default)]
    pub struct MockExecutor {
        invocations: Arc<Mutex<Vec<Invocation>>>,
        // first matching rule wins
        rules: Arc<Mutex<Vec<Rule>>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer every invocation of `program` with `response`
        pub fn expect(self, program: &str, response: MockResponse) -> Self {
            self.push_rule(program, None, response)
        }

        /// Answer invocations of `program` that include `arg` with `response`
        pub fn expect_with_arg(self, program: &str, arg: &str, response: MockResponse) -> Self {
            self.push_rule(program, Some(arg), response)
        }

        fn push_rule(self, program: &str, arg: Option<&str>, response: MockResponse) -> Self {
            self.rules.lock().unwrap().push(Rule {
                program: program.to_string(),
                arg: arg.map(String::from),
                response,
            });
            self
        }

        pub fn get_calls(&self) -> Vec<Invocation> {
            self.invocations.lock().unwrap().clone()
        }

        pub fn was_called(&self, program: &str) -> bool {
            self.invocations
                .lock()
                .unwrap()
                .iter()
                .any(|c| c.program == program)
        }
    }

    impl CommandExecutor for MockExecutor {
        fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Result<Output> {
            self.invocations.lock().unwrap().push(Invocation {
                program: program.to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
                timeout,
            });

            let response = self
                .rules
                .lock()
                .unwrap()
                .iter()
                .find(|rule| rule.matches(program, args))
                .map(|rule| rule.response.clone())
                .unwrap_or_default();

            let stdout = match response {
                MockResponse::Empty => String::new(),
                MockResponse::Stdout(stdout) => stdout,
                MockResponse::Failure(stderr) => {
                    anyhow::bail!("{} failed with exit code Some(1): {}", program, stderr)
                }
                MockResponse::Timeout => anyhow::bail!("{} timed out after {:?}", program, timeout),
            };

            Ok(Output {
                status: std::process::ExitStatus::default(),
                stdout: stdout.into_bytes(),
                stderr: Vec::new(),
            })
        }
    }
}
