use std::{
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread,
};

#[cfg(test)]
use mockall::automock;
use tracing::{debug, error};

use crate::error::ReassignError;

/// A single call to an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub stdin: String,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: String::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = input.into();
        self
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    pub fn command(&self) -> String {
        self.program.display().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    /// Stdout split into lines, each trimmed of surrounding whitespace
    pub fn stdout_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines().map(str::trim)
    }
}

#[cfg_attr(test, automock)]
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ReassignError>;
}

/// Which signals turn a finished process into an error. Both default to strict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strictness {
    pub raise_on_exit_status: bool,
    pub raise_on_stderr: bool,
}

impl Default for Strictness {
    fn default() -> Self {
        Self {
            raise_on_exit_status: true,
            raise_on_stderr: true,
        }
    }
}

impl Strictness {
    pub fn check(
        &self,
        invocation: &Invocation,
        output: CommandOutput,
    ) -> Result<CommandOutput, ReassignError> {
        let bad_exit = self.raise_on_exit_status && output.exit_code != Some(0);
        let bad_stderr = self.raise_on_stderr && !output.stderr.is_empty();

        if bad_exit || bad_stderr {
            error!(
                "{} failed. exitstatus={:?}, stderr:\n{}",
                invocation.command(),
                output.exit_code,
                output.stderr
            );
            return Err(ReassignError::ExternalCommand {
                command: invocation.command(),
                args: invocation.args.clone(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        Ok(output)
    }
}

/// Runs invocations as real child processes, blocking until they exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner {
    strictness: Strictness,
}

impl ProcessRunner {
    pub fn new(strictness: Strictness) -> Self {
        Self { strictness }
    }

    fn execute(invocation: &Invocation) -> Result<CommandOutput, ReassignError> {
        let command = invocation.command();
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ReassignError::Spawn {
                command: command.clone(),
                source,
            })?;

        // stdin is fed and stderr drained on their own threads so that a child blocked writing
        // one pipe can never wait on us reading or writing another.
        let writer = child.stdin.take().map(|mut pipe| {
            let input = invocation.stdin.clone();
            thread::spawn(move || -> std::io::Result<()> {
                match pipe.write_all(input.as_bytes()) {
                    // The child is free to exit without reading its input
                    Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                    other => other,
                }
                // pipe dropped here, closing the write side
            })
        });

        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || -> std::io::Result<Vec<u8>> {
                let mut buf = Vec::new();
                pipe.read_to_end(&mut buf)?;
                Ok(buf)
            })
        });

        let mut stdout = Vec::new();
        let stdout_read = match child.stdout.take() {
            Some(mut pipe) => pipe.read_to_end(&mut stdout).map(drop),
            None => Ok(()),
        };
        if stdout_read.is_err() {
            // Closes the child's pipes so the helper threads can finish
            if let Err(e) = child.kill() {
                debug!("could not kill {command}: {e}");
            }
        }

        let stdin_written = writer.map_or(Ok(()), |handle| join(handle, &command, "writing stdin"));
        let stderr = stderr_reader.map_or(Ok(Vec::new()), |handle| {
            join(handle, &command, "reading stderr")
        });

        // The child is always reaped, whatever happened on its pipes
        let status = child
            .wait()
            .map_err(|e| ReassignError::io(format!("waiting for {command}"), e))?;
        stdout_read.map_err(|e| ReassignError::io(format!("reading stdout of {command}"), e))?;
        stdin_written?;
        let stderr = stderr?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code: status.code(),
        })
    }
}

fn join<T>(
    handle: thread::JoinHandle<std::io::Result<T>>,
    command: &str,
    what: &str,
) -> Result<T, ReassignError> {
    let context = format!("{what} of {command}");
    handle
        .join()
        .map_err(|_| ReassignError::io(&context, std::io::Error::other("pipe thread panicked")))?
        .map_err(|e| ReassignError::io(&context, e))
}

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ReassignError> {
        debug!(
            "running {} {}",
            invocation.command(),
            invocation.args.join(" ")
        );
        let output = Self::execute(invocation)?;
        debug!(
            "{} exited with {:?}\nstdout:\n{}\nstderr:\n{}",
            invocation.command(),
            output.exit_code,
            output.stdout,
            output.stderr
        );
        self.strictness.check(invocation, output)
    }
}

/// Path of a script under a tool installation root
pub fn tool_path(root: &Path, script: &str) -> PathBuf {
    root.join("bin").join(script)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use test_log::test;

    fn sh(script: &str) -> Invocation {
        Invocation::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn captures_stdout_and_exit_code() {
        let out = ProcessRunner::default()
            .run(&sh("echo '  Reassignment of partition orders-3 completed successfully  '"))
            .unwrap();

        assert_eq!(out.exit_code, Some(0));
        assert_eq!(
            out.stdout_lines().collect::<Vec<_>>(),
            vec!["Reassignment of partition orders-3 completed successfully"]
        );
    }

    #[test]
    fn invalid_utf8_output_is_decoded_lossily() {
        let out = ProcessRunner::default()
            .run(&sh(
                "printf 'Reassignment of partition orders-3 completed successfully\\n\\377\\n'",
            ))
            .unwrap();

        let lines: Vec<_> = out.stdout_lines().collect();
        assert_eq!(
            lines,
            vec![
                "Reassignment of partition orders-3 completed successfully",
                "\u{FFFD}"
            ]
        );
    }

    #[test]
    fn feeds_stdin_and_closes_it() {
        let out = ProcessRunner::default()
            .run(&Invocation::new("cat").stdin("line one\nline two\n"))
            .unwrap();

        assert_eq!(out.stdout, "line one\nline two\n");
    }

    #[test]
    fn large_output_on_both_pipes_does_not_deadlock() {
        // Well past the usual 64KiB pipe buffer on each stream
        let script = "i=0; while [ $i -lt 20000 ]; do \
            echo 'some stdout padding line'; \
            echo 'some stderr padding line' 1>&2; \
            i=$((i+1)); done";
        let runner = ProcessRunner::new(Strictness {
            raise_on_exit_status: true,
            raise_on_stderr: false,
        });

        let out = runner.run(&sh(script)).unwrap();

        assert_eq!(out.stdout.lines().count(), 20000);
        assert_eq!(out.stderr.lines().count(), 20000);
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let err = ProcessRunner::default().run(&sh("exit 2")).unwrap_err();

        match err {
            ReassignError::ExternalCommand {
                command,
                args,
                exit_code,
                ..
            } => {
                assert_eq!(command, "sh");
                assert_eq!(args, vec!["-c".to_string(), "exit 2".to_string()]);
                assert_eq!(exit_code, Some(2));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn stderr_output_is_an_error_by_default() {
        let err = ProcessRunner::default()
            .run(&sh("echo 'Warning: something' 1>&2"))
            .unwrap_err();

        match err {
            ReassignError::ExternalCommand {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(0));
                assert_eq!(stderr, "Warning: something\n");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn relaxed_stderr_check_passes_warnings_through() {
        let runner = ProcessRunner::new(Strictness {
            raise_on_exit_status: true,
            raise_on_stderr: false,
        });

        let out = runner.run(&sh("echo ok; echo 'Warning: something' 1>&2")).unwrap();

        assert_eq!(out.stdout, "ok\n");
        assert_eq!(out.stderr, "Warning: something\n");
    }

    #[test]
    fn relaxed_exit_check_returns_failed_output() {
        let runner = ProcessRunner::new(Strictness {
            raise_on_exit_status: false,
            raise_on_stderr: true,
        });

        let out = runner.run(&sh("exit 1")).unwrap();

        assert_eq!(out.exit_code, Some(1));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = ProcessRunner::default()
            .run(&Invocation::new("/definitely/not/a/real/kafka-tool"))
            .unwrap_err();

        assert!(matches!(err, ReassignError::Spawn { .. }));
    }

    #[test]
    fn tool_path_is_under_bin() {
        assert_eq!(
            tool_path(Path::new("/usr/share/kafka"), "kafka-reassign-partitions.sh"),
            PathBuf::from("/usr/share/kafka/bin/kafka-reassign-partitions.sh")
        );
    }
}
