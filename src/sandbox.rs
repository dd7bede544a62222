mod compare;
mod compile;
mod runner;
mod toolchain;

pub use compare::compare;
pub use compile::Compiler;
pub use runner::{ProcessRunner, SandboxRunner};
pub use toolchain::{BytecodeToolchain, NativeToolchain, Toolchain, UnitPaths};

use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use chrono::Local;

use crate::config::{Config, ToolchainKind};

// Scratch directories only need to be reachable by the grading user
const SCRATCH_DIR_PERMISSIONS: u32 = 0o700;

static SCRATCH_SEQ: AtomicU64 = AtomicU64::new(0);

/// A private working directory for one judged unit, removed on drop
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Creates a fresh directory under `root` keyed by owner, question and a process-wide sequence
    pub fn create(root: &Path, owner: &str, question: &str) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("Failed to create scratch root {}", root.display()))?;

        let name = format!(
            "{}-{}-{}-{}-{}",
            sanitize(owner),
            sanitize(question),
            Local::now().format("%y%m%d-%H-%M-%S"),
            std::process::id(),
            SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed),
        );
        let path = root.join(name);

        // `create_dir` fails on an existing path, so two units can never share one
        fs::create_dir(&path)
            .with_context(|| format!("Failed to create scratch dir {}", path.display()))?;
        fs::set_permissions(&path, fs::Permissions::from_mode(SCRATCH_DIR_PERMISSIONS))?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            log::warn!("Failed to clean scratch dir {}: {e}", self.path.display());
        }
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// A successfully compiled submission, owned by the judge that compiled it
///
/// Dropping the unit removes its scratch directory together with the executable,
/// so the unit cannot outlive the judging pass it belongs to.
#[derive(Debug)]
pub struct CompiledUnit {
    command: Vec<String>,
    scratch: ScratchDir,
}

impl CompiledUnit {
    pub(crate) fn new(command: Vec<String>, scratch: ScratchDir) -> Self {
        Self { command, scratch }
    }

    /// Program and arguments that start the compiled submission
    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn work_dir(&self) -> &Path {
        self.scratch.path()
    }
}

/// Compilation did not produce a runnable unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// Captured compiler output, or the reason the compiler could not be invoked
    pub diagnostics: String,
    /// The toolchain itself failed (missing binary, unreadable source, unwritable scratch)
    pub environment: bool,
}

impl CompileError {
    pub fn diagnostics(diagnostics: impl Into<String>) -> Self {
        Self {
            diagnostics: diagnostics.into(),
            environment: false,
        }
    }

    pub fn environment(reason: impl Into<String>) -> Self {
        Self {
            diagnostics: reason.into(),
            environment: true,
        }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.environment {
            write!(f, "toolchain failure: {}", self.diagnostics)
        } else {
            write!(f, "compilation failed: {}", self.diagnostics)
        }
    }
}

/// Builds one toolchain per configured entry, keyed by name
pub fn create_toolchains(config: &Config) -> HashMap<String, Arc<dyn Toolchain>> {
    config
        .toolchains
        .iter()
        .map(|t| {
            let toolchain: Arc<dyn Toolchain> = match t.kind {
                ToolchainKind::Native => Arc::new(NativeToolchain::build(t)),
                ToolchainKind::Bytecode => Arc::new(BytecodeToolchain::build(t)),
            };
            log::debug!("Toolchain {} registered ({:?})", t.name, t.kind);
            (t.name.clone(), toolchain)
        })
        .collect()
}
