#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use gradekit::config::{CompareMode, Config, ToolchainConfig, ToolchainKind};
use gradekit::judge::QuestionFixture;
use gradekit::model::{SourceArtifact, TestCase};

// Global counter to ensure unique test directories
static TEST_DIR_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Creates an empty directory private to one test
pub fn create_test_dir(name: &str) -> PathBuf {
    let id = TEST_DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir()
        .join("gradekit-tests")
        .join(format!("{}-{id}-{name}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn cleanup_test_dir(dir: &Path) {
    if let Err(e) = fs::remove_dir_all(dir) {
        eprintln!("Warning: Failed to remove test dir {}: {}", dir.display(), e);
    }
}

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

/// Toolchains built from `/bin/sh` so tests need no real compiler
///
/// `sh` syntax-checks the script with `sh -n` and runs it with `sh`;
/// `shx` copies the script to the unit's `main` and executes that directly.
pub fn shell_config(scratch: &Path) -> Config {
    let mut config = Config::default();
    config.grading.scratch_dir = Some(scratch.to_path_buf());
    config.grading.max_workers = 2;
    config.toolchains = vec![
        ToolchainConfig {
            name: "sh".to_string(),
            kind: ToolchainKind::Bytecode,
            extensions: strings(&["sh"]),
            compile: strings(&["sh", "-n", "%INPUT%"]),
            run: strings(&["sh", "%INPUT%"]),
        },
        ToolchainConfig {
            name: "shx".to_string(),
            kind: ToolchainKind::Native,
            extensions: strings(&["shx"]),
            compile: strings(&[
                "sh",
                "-c",
                r#"cp "$0" "$1" && chmod +x "$1""#,
                "%INPUT%",
                "%OUTPUT%",
            ]),
            run: Vec::new(),
        },
    ];
    config
}

pub fn fixture(id: &str, cases: &[(&str, &str)], time_limit: Duration) -> Arc<QuestionFixture> {
    Arc::new(QuestionFixture {
        id: id.to_string(),
        cases: cases
            .iter()
            .enumerate()
            .map(|(i, (input, expected))| TestCase::new(i + 1, *input, *expected))
            .collect(),
        time_limit,
        compare: CompareMode::Boundary,
    })
}

/// Writes `script` as a student's source and describes it as an artifact
pub fn write_source(
    root: &Path,
    owner: &str,
    question: &str,
    toolchain: &str,
    script: &str,
) -> SourceArtifact {
    let dir = root.join(owner);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{question}.{toolchain}"));
    fs::write(&path, script).unwrap();
    SourceArtifact {
        owner: owner.to_string(),
        question: question.to_string(),
        toolchain: toolchain.to_string(),
        path,
    }
}

pub const ADDER: &str = "read a\nread b\nprintf '%s' $((a + b))\n";
