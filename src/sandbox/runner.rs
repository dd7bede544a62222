use std::io;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;

use crate::model::{Classification, ExecutionResult};

use super::CompiledUnit;

/// Executes compiled units against a single input
///
/// A runner never retries and never fails: problems with the execution
/// environment itself are reported as a crashed execution.
pub trait SandboxRunner: Send + Sync {
    fn run(
        &self,
        unit: &CompiledUnit,
        input: &[u8],
        time_limit: Duration,
    ) -> impl Future<Output = ExecutionResult> + Send;
}

/// Runs the unit as a plain child process bounded only by wall-clock time
///
/// The child is placed in its own process group. On timeout the group is killed
/// and the child reaped before returning; on every other way out of the call,
/// including the caller's future being dropped, the group is killed when its
/// guard drops and `kill_on_drop` takes care of the child.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl SandboxRunner for ProcessRunner {
    async fn run(&self, unit: &CompiledUnit, input: &[u8], time_limit: Duration) -> ExecutionResult {
        let start_time = Instant::now();
        match self.execute(unit, input, time_limit).await {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Execution environment failure in {}: {e:#}", unit.work_dir().display());
                ExecutionResult::environment_failure(format!("{e:#}"), start_time.elapsed())
            }
        }
    }
}

impl ProcessRunner {
    async fn execute(
        &self,
        unit: &CompiledUnit,
        input: &[u8],
        time_limit: Duration,
    ) -> Result<ExecutionResult> {
        let (program, args) = unit.command().split_first().context("Empty run command")?;

        let mut child = Command::new(program)
            .args(args)
            .current_dir(unit.work_dir())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn '{program}'"))?;
        let group = ProcessGroup::of(&child);
        let start_time = Instant::now();

        let mut stdin = child.stdin.take().context("Failed to open stdin")?;
        let mut stdout = child.stdout.take().context("Failed to open stdout")?;
        let mut stderr = child.stderr.take().context("Failed to open stderr")?;

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        let res = {
            let feed = async move {
                let written = stdin.write_all(input).await;
                drop(stdin); // closes the pipe so the program sees EOF
                match written {
                    // the program exited or closed stdin without reading everything
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                    other => other,
                }
            };
            let fut_stdout = stdout.read_to_end(&mut stdout_buf);
            let fut_stderr = stderr.read_to_end(&mut stderr_buf);
            let fut_exit_status = child.wait();

            timeout(time_limit, async {
                tokio::try_join!(feed, fut_stdout, fut_stderr, fut_exit_status)
            })
            .await
        };
        let elapsed = start_time.elapsed();

        match res {
            Err(_) => {
                terminate(&group, &mut child).await;
                Ok(ExecutionResult::timed_out(elapsed))
            }
            Ok(Err(e)) => {
                terminate(&group, &mut child).await;
                Err(e).context("Failed to communicate with subprocess")
            }
            Ok(Ok((_, _, _, exit_status))) => {
                let classification = if exit_status.success() {
                    Classification::Completed
                } else {
                    Classification::Crashed {
                        exit_code: exit_status.code(),
                    }
                };
                Ok(ExecutionResult {
                    classification,
                    stdout: stdout_buf,
                    stderr: stderr_buf,
                    elapsed,
                })
            }
        }
    }
}

/// The process group led by a spawned child
///
/// Dropping it kills every process still left in the group.
struct ProcessGroup {
    pgid: Option<libc::pid_t>,
}

impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self {
            pgid: child.id().map(|pid| pid as libc::pid_t),
        }
    }

    fn kill(&self) {
        if let Some(pgid) = self.pgid {
            // SAFETY: plain syscall; the child leads its own group since it was spawned with `process_group(0)`
            unsafe {
                libc::killpg(pgid, libc::SIGKILL);
            }
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Kills the child's process group and reaps the child
async fn terminate(group: &ProcessGroup, child: &mut Child) {
    group.kill();
    child
        .kill()
        .await
        .unwrap_or_else(|e| log::warn!("Failed to kill process: {e:#}"));
}
