use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::time::timeout;

use crate::config::Config;
use crate::model::SourceArtifact;

use super::{CompileError, CompiledUnit, ScratchDir, Toolchain, UnitPaths, create_toolchains};

/// Turns source artifacts into runnable units, one private scratch directory per call
pub struct Compiler {
    toolchains: HashMap<String, Arc<dyn Toolchain>>,
    scratch_root: PathBuf,
    time_limit: Duration,
}

impl Compiler {
    /// Creates the compiler described by `config`, failing if the scratch root is unusable
    pub fn build(config: &Config) -> Result<Self> {
        let scratch_root = config.scratch_root()?;

        // Probe once so an unwritable root aborts the run instead of failing every unit
        ScratchDir::create(&scratch_root, "probe", "probe").with_context(|| {
            format!("Scratch root {} is not writable", scratch_root.display())
        })?;
        log::info!("Compiling under scratch root {}", scratch_root.display());

        Ok(Self::new(
            create_toolchains(config),
            scratch_root,
            config.grading.compile_time_limit.into(),
        ))
    }

    pub fn new(
        toolchains: HashMap<String, Arc<dyn Toolchain>>,
        scratch_root: PathBuf,
        time_limit: Duration,
    ) -> Self {
        Self {
            toolchains,
            scratch_root,
            time_limit,
        }
    }

    /// Compiles `artifact` with its declared toolchain
    ///
    /// Every failure, including the compiler binary being missing, is reported as a
    /// [`CompileError`]. On failure the scratch directory is already gone when this returns.
    pub async fn compile(&self, artifact: &SourceArtifact) -> Result<CompiledUnit, CompileError> {
        let toolchain = self.toolchains.get(&artifact.toolchain).ok_or_else(|| {
            CompileError::environment(format!("Unknown toolchain '{}'", artifact.toolchain))
        })?;

        let scratch = ScratchDir::create(&self.scratch_root, &artifact.owner, &artifact.question)
            .map_err(|e| CompileError::environment(format!("{e:#}")))?;

        let source_name = artifact
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                CompileError::environment(format!(
                    "Source path {} has no file name",
                    artifact.path.display()
                ))
            })?;
        let paths = UnitPaths::new(scratch.path(), &source_name);

        tokio::fs::copy(&artifact.path, &paths.source)
            .await
            .map_err(|e| {
                CompileError::environment(format!(
                    "Failed to read source {}: {e}",
                    artifact.path.display()
                ))
            })?;

        let command = toolchain.compile_command(&paths);
        let start_time = Instant::now();
        let compile_log = self.execute_compile_command(&command, &paths.dir).await?;
        log::debug!(
            "Compiled {} for {}/{} with {} in {:?}",
            source_name,
            artifact.owner,
            artifact.question,
            toolchain.name(),
            start_time.elapsed()
        );

        if !toolchain.is_runnable(&paths) {
            let mut diagnostics = compile_log;
            diagnostics.push_str("Compiler reported success but produced nothing runnable");
            return Err(CompileError::diagnostics(diagnostics));
        }

        Ok(CompiledUnit::new(toolchain.run_command(&paths), scratch))
    }

    /// Runs the compiler under the compile time limit, returning its combined output
    async fn execute_compile_command(
        &self,
        command: &[String],
        work_dir: &Path,
    ) -> Result<String, CompileError> {
        let Some((program, args)) = command.split_first() else {
            return Err(CompileError::environment("Empty compile command"));
        };

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match timeout(self.time_limit, cmd.output()).await {
            Ok(Ok(output)) => {
                let mut compile_log = String::from_utf8_lossy(&output.stdout).into_owned();
                compile_log.push_str(&String::from_utf8_lossy(&output.stderr));

                if output.status.success() {
                    Ok(compile_log)
                } else if compile_log.trim().is_empty() {
                    Err(CompileError::diagnostics(format!(
                        "Compiler exited with {}",
                        output.status
                    )))
                } else {
                    Err(CompileError::diagnostics(compile_log))
                }
            }
            Ok(Err(e)) => Err(CompileError::environment(format!(
                "Failed to spawn '{program}': {e}"
            ))),
            Err(_) => Err(CompileError::diagnostics(format!(
                "Compilation timeout after {:?}",
                self.time_limit
            ))),
        }
    }
}
