//! Execution engine boundary.
//!
//! The pipeline never runs kernels itself; it hands a notebook path to an
//! engine command and receives the executed notebook on stdout.
use super::Notebook;
use crate::error::ExecutionFailureKind;
use crate::util::truncate_string;
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const MAX_STDERR_DETAIL_BYTES: usize = 2_000;
const CELL_ERROR_MARKER: &str = "CellExecutionError";

/// Runs one notebook to completion.
pub trait NotebookExecutor {
    /// Execute `source` and return the serialized executed notebook.
    ///
    /// Implementations must not write the artifact themselves; the caller
    /// persists the returned bytes only after they parse.
    fn execute(&self, source: &Path, timeout: Duration) -> Result<Vec<u8>, ExecutionFailureKind>;
}

/// Executes notebooks through an external command such as `jupyter nbconvert`.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    template: String,
}

impl CommandExecutor {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    fn argv(&self, source: &Path, timeout: Duration) -> Result<Vec<String>, ExecutionFailureKind> {
        let args = shell_words::split(&self.template).map_err(|err| {
            ExecutionFailureKind::EngineUnavailable(format!("parse command: {err}"))
        })?;
        if args.is_empty() {
            return Err(ExecutionFailureKind::EngineUnavailable(
                "execution command is empty".to_string(),
            ));
        }
        let input = source.display().to_string();
        let timeout = timeout.as_secs().to_string();
        Ok(args
            .into_iter()
            .map(|arg| arg.replace("{input}", &input).replace("{timeout}", &timeout))
            .collect())
    }
}

impl NotebookExecutor for CommandExecutor {
    fn execute(&self, source: &Path, timeout: Duration) -> Result<Vec<u8>, ExecutionFailureKind> {
        if !source.is_file() {
            return Err(ExecutionFailureKind::SourceMissing);
        }
        let argv = self.argv(source, timeout)?;
        let program = which::which(&argv[0]).map_err(|err| {
            ExecutionFailureKind::EngineUnavailable(format!("{}: {err}", argv[0]))
        })?;

        // Spool to files: a chatty engine can fill a pipe while we poll.
        let mut stdout = tempfile::tempfile().map_err(engine_io("spool stdout"))?;
        let mut stderr = tempfile::tempfile().map_err(engine_io("spool stderr"))?;
        let start = Instant::now();
        let mut child = Command::new(&program)
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::from(
                stdout.try_clone().map_err(engine_io("spool stdout"))?,
            ))
            .stderr(Stdio::from(
                stderr.try_clone().map_err(engine_io("spool stderr"))?,
            ))
            .spawn()
            .map_err(|err| {
                ExecutionFailureKind::EngineUnavailable(format!("spawn {}: {err}", program.display()))
            })?;

        let status = loop {
            if let Some(status) = child.try_wait().map_err(engine_io("wait for engine"))? {
                break status;
            }
            if start.elapsed() > timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExecutionFailureKind::TimedOut(timeout.as_secs()));
            }
            std::thread::sleep(POLL_INTERVAL);
        };
        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis(),
            exit = ?status.code(),
            notebook = %source.display(),
            "engine finished"
        );

        if !status.success() {
            let detail = read_spool(&mut stderr).unwrap_or_default();
            let detail = truncate_string(detail.trim(), MAX_STDERR_DETAIL_BYTES);
            return Err(if detail.contains(CELL_ERROR_MARKER) {
                ExecutionFailureKind::CellRaised(detail)
            } else {
                ExecutionFailureKind::EngineFailed(format!("exit {status}: {detail}"))
            });
        }

        let bytes = read_spool_bytes(&mut stdout).map_err(engine_io("read engine output"))?;
        Notebook::from_slice(&bytes)
            .map_err(|err| ExecutionFailureKind::InvalidOutput(err.to_string()))?;
        Ok(bytes)
    }
}

fn engine_io(action: &'static str) -> impl Fn(std::io::Error) -> ExecutionFailureKind {
    move |err| ExecutionFailureKind::EngineFailed(format!("{action}: {err}"))
}

fn read_spool_bytes(file: &mut fs::File) -> std::io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn read_spool(file: &mut fs::File) -> std::io::Result<String> {
    let bytes = read_spool_bytes(file)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
        path.display().to_string()
    }

    fn source(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("a.ipynb");
        fs::write(&path, b"{\"cells\": []}").expect("write source");
        path
    }

    #[test]
    fn substitutes_placeholders_into_argv() {
        let executor = CommandExecutor::new("engine --timeout={timeout} '{input}'");
        let argv = executor
            .argv(Path::new("dir with space/a.ipynb"), Duration::from_secs(9))
            .expect("argv");
        assert_eq!(argv, vec!["engine", "--timeout=9", "dir with space/a.ipynb"]);
    }

    #[test]
    fn returns_engine_stdout_when_it_parses() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = script(dir.path(), "engine.sh", "cat \"$1\"");
        let executor = CommandExecutor::new(format!("{engine} {{input}}"));
        let bytes = executor
            .execute(&source(dir.path()), Duration::from_secs(5))
            .expect("execute");
        assert_eq!(bytes, b"{\"cells\": []}");
    }

    #[test]
    fn classifies_engine_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nb = source(dir.path());

        let raising = script(
            dir.path(),
            "raise.sh",
            "echo 'nbclient.exceptions.CellExecutionError: boom' >&2; exit 1",
        );
        let err = CommandExecutor::new(format!("{raising} {{input}}"))
            .execute(&nb, Duration::from_secs(5))
            .expect_err("cell error");
        assert!(matches!(err, ExecutionFailureKind::CellRaised(ref detail) if detail.contains("boom")));

        let crashing = script(dir.path(), "crash.sh", "exit 3");
        let err = CommandExecutor::new(format!("{crashing} {{input}}"))
            .execute(&nb, Duration::from_secs(5))
            .expect_err("engine failure");
        assert!(matches!(err, ExecutionFailureKind::EngineFailed(_)));

        let garbage = script(dir.path(), "garbage.sh", "echo not-a-notebook");
        let err = CommandExecutor::new(format!("{garbage} {{input}}"))
            .execute(&nb, Duration::from_secs(5))
            .expect_err("invalid output");
        assert!(matches!(err, ExecutionFailureKind::InvalidOutput(_)));
    }

    #[test]
    fn kills_engine_after_timeout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let slow = script(dir.path(), "slow.sh", "sleep 5");
        let err = CommandExecutor::new(format!("{slow} {{input}}"))
            .execute(&source(dir.path()), Duration::from_millis(200))
            .expect_err("timeout");
        assert_eq!(err, ExecutionFailureKind::TimedOut(0));
    }

    #[test]
    fn missing_source_and_program_are_distinguished() {
        let dir = tempfile::tempdir().expect("tempdir");
        let executor = CommandExecutor::new("definitely-not-an-engine-xyz {input}");
        let err = executor
            .execute(&dir.path().join("absent.ipynb"), Duration::from_secs(1))
            .expect_err("missing source");
        assert_eq!(err, ExecutionFailureKind::SourceMissing);

        let err = executor
            .execute(&source(dir.path()), Duration::from_secs(1))
            .expect_err("missing program");
        assert!(matches!(err, ExecutionFailureKind::EngineUnavailable(_)));
    }
}
