use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::ToolchainConfig;

/// Locations of one unit's files inside its scratch directory
#[derive(Debug, Clone)]
pub struct UnitPaths {
    pub dir: PathBuf,
    /// Copy of the submitted source, keeping its original file name
    pub source: PathBuf,
    pub executable: PathBuf,
}

impl UnitPaths {
    pub fn new(dir: &Path, source_name: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            source: dir.join(source_name),
            executable: dir.join("main"),
        }
    }

    fn stem(&self) -> String {
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A way of turning a source file into something runnable
///
/// Each configured toolchain kind supplies its own compile and run commands;
/// the compiler picks the implementation from the artifact's declared toolchain.
pub trait Toolchain: Send + Sync {
    /// Creates the toolchain from its configuration entry
    fn build(config: &ToolchainConfig) -> Self
    where
        Self: Sized;

    fn name(&self) -> &str;

    /// Command that compiles `paths.source`, run inside `paths.dir`
    fn compile_command(&self, paths: &UnitPaths) -> Vec<String>;

    /// Command that starts the compiled program
    fn run_command(&self, paths: &UnitPaths) -> Vec<String>;

    /// Checks the compiler left behind what `run_command` needs
    fn is_runnable(&self, paths: &UnitPaths) -> bool;
}

/// Compiles to a standalone executable
pub struct NativeToolchain {
    name: String,
    compile: Vec<String>,
}

/// Compiles into the scratch directory and runs through a runtime such as `java`
pub struct BytecodeToolchain {
    name: String,
    compile: Vec<String>,
    run: Vec<String>,
}

impl Toolchain for NativeToolchain {
    fn build(config: &ToolchainConfig) -> Self {
        Self {
            name: config.name.clone(),
            compile: config.compile.clone(),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn compile_command(&self, paths: &UnitPaths) -> Vec<String> {
        substitute(&self.compile, paths)
    }

    fn run_command(&self, paths: &UnitPaths) -> Vec<String> {
        vec![paths.executable.to_string_lossy().into_owned()]
    }

    fn is_runnable(&self, paths: &UnitPaths) -> bool {
        paths.executable.is_file()
    }
}

impl Toolchain for BytecodeToolchain {
    fn build(config: &ToolchainConfig) -> Self {
        Self {
            name: config.name.clone(),
            compile: config.compile.clone(),
            run: config.run.clone(),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn compile_command(&self, paths: &UnitPaths) -> Vec<String> {
        substitute(&self.compile, paths)
    }

    fn run_command(&self, paths: &UnitPaths) -> Vec<String> {
        substitute(&self.run, paths)
    }

    fn is_runnable(&self, paths: &UnitPaths) -> bool {
        paths.dir.is_dir()
    }
}

/// Applies the `%INPUT%`, `%OUTPUT%`, `%DIR%` and `%STEM%` template substitutions
fn substitute(template: &[String], paths: &UnitPaths) -> Vec<String> {
    let source = paths.source.to_string_lossy();
    let executable = paths.executable.to_string_lossy();
    let dir = paths.dir.to_string_lossy();
    let stem = paths.stem();

    let mut mapping = HashMap::<&str, &str>::new();
    mapping.insert("%INPUT%", &source);
    mapping.insert("%OUTPUT%", &executable);
    mapping.insert("%DIR%", &dir);
    mapping.insert("%STEM%", &stem);

    template
        .iter()
        .map(|s| {
            let mut t = s.clone();
            for (k, v) in mapping.iter() {
                t = t.replace(k, v);
            }
            t
        })
        .collect()
}
