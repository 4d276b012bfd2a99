//! Runners that drive external tools as child processes.
//!
//! Each tool is invoked with long-form flags describing the run and writes
//! its machine-readable output to the file named by `--output`. Progress is
//! read line by line from stdout.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::bench::{BenchParams, BenchProgressFn, BenchmarkRunner, TargetSpec, TargetState};
use crate::compliance::{
    ComplianceOutput, ComplianceProgressFn, ComplianceRunner, ContainerSpec, TestsConfig,
};
use crate::error::RunnerError;

static BENCH_PROGRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(Preparing|Benchmarking|Cleanup):.*\s([\d.]+)%").expect("valid progress regex")
});

static TEST_PROGRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^progress:\s*(\d+)\s*/\s*(\d+)").expect("valid progress regex"));

/// Resolve `command` the way a shell would: as a path when it contains a
/// separator, otherwise by searching `PATH`.
pub fn find_tool(command: &str) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(command))
        .find(|p| p.is_file())
}

fn parse_bench_progress(line: &str) -> Option<(TargetState, f64)> {
    let caps = BENCH_PROGRESS_RE.captures(line)?;
    let state = match &caps[1] {
        "Preparing" => TargetState::Preparing,
        "Benchmarking" => TargetState::Running,
        _ => TargetState::Cleanup,
    };
    let value = caps[2].parse().ok()?;
    Some((state, value))
}

fn parse_test_progress(line: &str) -> Option<(u64, u64)> {
    let caps = TEST_PROGRESS_RE.captures(line)?;
    Some((caps[2].parse().ok()?, caps[1].parse().ok()?))
}

fn output_path(run_name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{run_name}-{}.json", Uuid::new_v4()))
}

/// Run `cmd` to completion, feeding each stdout line to `on_line`.
async fn drive(tool: &str, mut cmd: Command, mut on_line: impl FnMut(&str)) -> Result<(), RunnerError> {
    debug!(tool, cmd = ?cmd.as_std(), "spawning tool");
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RunnerError::Spawn {
            tool: tool.to_owned(),
            source,
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let read_stdout = async move {
        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                if !line.trim().is_empty() {
                    on_line(&line);
                }
            }
        }
        Ok::<_, std::io::Error>(())
    };
    let read_stderr = async move {
        let mut buf = String::new();
        if let Some(mut stderr) = stderr {
            stderr.read_to_string(&mut buf).await?;
        }
        Ok::<_, std::io::Error>(buf)
    };

    let (out, err) = tokio::join!(read_stdout, read_stderr);
    out?;
    let stderr = err?;
    let status = child.wait().await?;
    if !status.success() {
        warn!(tool, code = ?status.code(), "tool exited with failure");
        return Err(RunnerError::Exit {
            tool: tool.to_owned(),
            code: status.code(),
            stderr: stderr.trim().to_owned(),
        });
    }
    Ok(())
}

async fn take_output(path: &Path) -> Result<String, RunnerError> {
    let data = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| RunnerError::Output(format!("unable to read {}: {e}", path.display())))?;
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "unable to remove tool output");
    }
    Ok(data)
}

/// Benchmark runner backed by an external command.
#[derive(Debug, Clone)]
pub struct CommandBenchRunner {
    command: String,
}

impl CommandBenchRunner {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl BenchmarkRunner for CommandBenchRunner {
    async fn check(&self) -> Result<(), RunnerError> {
        match find_tool(&self.command) {
            Some(_) => Ok(()),
            None => Err(RunnerError::ToolNotFound(self.command.clone())),
        }
    }

    async fn run(
        &self,
        run_name: &str,
        target: &TargetSpec,
        params: &BenchParams,
        progress: BenchProgressFn<'_>,
    ) -> Result<String, RunnerError> {
        let output = output_path(&format!("{run_name}-{}", target.name));
        let mut cmd = Command::new(&self.command);
        cmd.arg("--name")
            .arg(format!("{run_name}-{}", target.name))
            .arg("--image")
            .arg(&target.target.image)
            .arg("--host-port")
            .arg(target.host_port.to_string())
            .arg("--target-port")
            .arg(target.target.port.to_string())
            .arg("--access-key")
            .arg(&target.target.access_key)
            .arg("--secret-key")
            .arg(&target.target.secret_key)
            .arg("--objects")
            .arg(params.num_objects.to_string())
            .arg("--obj-size")
            .arg(&params.object_size)
            .arg("--duration")
            .arg(&params.duration)
            .arg("--output")
            .arg(&output);
        if let Some(args) = &target.target.args {
            cmd.arg("--args").arg(args);
        }

        drive(&self.command, cmd, |line| match parse_bench_progress(line) {
            Some((state, value)) => progress(state, value),
            None => debug!(target_name = %target.name, "{line}"),
        })
        .await?;

        let samples = take_output(&output).await?;
        serde_json::from_str::<Vec<serde_json::Value>>(&samples)
            .map_err(|e| RunnerError::Output(format!("benchmark samples: {e}")))?;
        Ok(samples)
    }
}

/// Compliance runner backed by an external command.
#[derive(Debug, Clone)]
pub struct CommandComplianceRunner {
    command: String,
}

impl CommandComplianceRunner {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl ComplianceRunner for CommandComplianceRunner {
    async fn check(&self) -> Result<(), RunnerError> {
        match find_tool(&self.command) {
            Some(_) => Ok(()),
            None => Err(RunnerError::ToolNotFound(self.command.clone())),
        }
    }

    async fn run(
        &self,
        run_name: &str,
        container: &ContainerSpec,
        tests: &TestsConfig,
        progress: ComplianceProgressFn<'_>,
    ) -> Result<ComplianceOutput, RunnerError> {
        let output = output_path(run_name);
        let mut cmd = Command::new(&self.command);
        cmd.arg("--name")
            .arg(&container.name)
            .arg("--image")
            .arg(&container.container.image)
            .arg("--host-port")
            .arg(container.host_port.to_string())
            .arg("--target-port")
            .arg(container.container.target_port.to_string())
            .arg("--suite")
            .arg(&tests.suite)
            .arg("--output")
            .arg(&output);
        for (flag, patterns) in [
            ("--include", &tests.include),
            ("--exclude", &tests.exclude),
            ("--ignore", &tests.ignore),
        ] {
            for pattern in patterns {
                cmd.arg(flag).arg(pattern);
            }
        }

        drive(&self.command, cmd, |line| match parse_test_progress(line) {
            Some((total, run)) => progress(total, run),
            None => debug!(run = run_name, "{line}"),
        })
        .await?;

        let raw = take_output(&output).await?;
        serde_json::from_str(&raw).map_err(|e| RunnerError::Output(format!("test results: {e}")))
    }
}
