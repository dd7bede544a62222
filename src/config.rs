use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "gradekit", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(long = "config", short = 'c', global = true)]
    pub config_path: Option<PathBuf>,

    /// Maximum number of submissions judged at the same time
    #[arg(long = "threads", short = 't', global = true)]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Grade every submission against the question fixtures
    Grade {
        /// Directory holding one sub-directory of `.in`/`.out` fixtures per question
        #[arg(long, default_value = "Questions")]
        questions: PathBuf,
        /// Directory holding one sub-directory of sources per student
        #[arg(long, default_value = "Submissions")]
        submissions: PathBuf,
        /// Directory the reports are written to
        #[arg(long, default_value = "Results")]
        results: PathBuf,
    },
    /// Write expected outputs by running each question's reference solution
    Generate {
        #[arg(long, default_value = "Questions")]
        questions: PathBuf,
    },
}

impl CliArgs {
    /// Load the configuration from the specified file, or fall back to the defaults
    pub fn to_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config_path {
            Some(path) => {
                let file = std::fs::File::open(path)
                    .with_context(|| format!("Failed to open config {}", path.display()))?;
                let reader = std::io::BufReader::new(file);
                serde_json::from_reader(reader)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
            None => Config::default(),
        };

        if let Some(threads) = self.threads {
            config.grading.max_workers = threads;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub grading: GradingConfig,
    pub toolchains: Vec<ToolchainConfig>,
    pub questions: Vec<QuestionConfig>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GradingConfig {
    pub max_workers: usize,
    /// Root under which every judged unit gets its own scratch directory
    pub scratch_dir: Option<PathBuf>,
    pub time_limit: MicroSecond,
    pub compile_time_limit: MicroSecond,
    /// Marks for a question that passes all of its cases
    pub weight: f64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ToolchainConfig {
    pub name: String,
    pub kind: ToolchainKind,
    pub extensions: Vec<String>,
    pub compile: Vec<String>,
    #[serde(default)]
    pub run: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolchainKind {
    /// Compiles to an executable that is run directly
    Native,
    /// Compiles into the scratch directory; the `run` template starts a runtime
    Bytecode,
}

#[derive(Deserialize, Debug, Clone)]
pub struct QuestionConfig {
    pub id: String,
    pub time_limit: Option<MicroSecond>,
    pub weight: Option<f64>,
    #[serde(default)]
    pub compare: CompareMode,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompareMode {
    /// Trim the whole payload only
    #[default]
    Boundary,
    /// Also ignore trailing whitespace on each line and trailing empty lines
    Lines,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MicroSecond(pub u64);

impl From<MicroSecond> for Duration {
    fn from(value: MicroSecond) -> Self {
        Duration::from_micros(value.0)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grading: GradingConfig::default(),
            toolchains: default_toolchains(),
            questions: Vec::new(),
        }
    }
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            scratch_dir: None,
            time_limit: MicroSecond(1_000_000),
            compile_time_limit: MicroSecond(30_000_000),
            weight: 4.0,
        }
    }
}

fn default_toolchains() -> Vec<ToolchainConfig> {
    let strings = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    vec![
        ToolchainConfig {
            name: "cpp".to_string(),
            kind: ToolchainKind::Native,
            extensions: strings(&["cpp", "cc"]),
            compile: strings(&["g++", "-O2", "-o", "%OUTPUT%", "%INPUT%"]),
            run: Vec::new(),
        },
        ToolchainConfig {
            name: "java".to_string(),
            kind: ToolchainKind::Bytecode,
            extensions: strings(&["java"]),
            compile: strings(&["javac", "-d", "%DIR%", "%INPUT%"]),
            run: strings(&["java", "-cp", "%DIR%", "%STEM%"]),
        },
    ]
}

impl Config {
    pub fn question(&self, id: &str) -> Option<&QuestionConfig> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn time_limit_for(&self, id: &str) -> Duration {
        self.question(id)
            .and_then(|q| q.time_limit)
            .unwrap_or(self.grading.time_limit)
            .into()
    }

    pub fn weight_for(&self, id: &str) -> f64 {
        self.question(id)
            .and_then(|q| q.weight)
            .unwrap_or(self.grading.weight)
    }

    pub fn compare_mode_for(&self, id: &str) -> CompareMode {
        self.question(id).map(|q| q.compare).unwrap_or_default()
    }

    /// Resolves the scratch root, defaulting to the user's cache directory
    pub fn scratch_root(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.grading.scratch_dir {
            return Ok(dir.clone());
        }

        use directories::ProjectDirs;

        let proj_dirs = ProjectDirs::from("", "", "gradekit")
            .ok_or_else(|| anyhow!("Unable to find user directory"))?;
        Ok(proj_dirs.cache_dir().join("scratch"))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.grading.max_workers == 0 {
            bail!("The number of judging workers must not be 0");
        }
        if !(self.grading.weight.is_finite() && self.grading.weight >= 0.0) {
            bail!("Default question weight must be a non-negative number");
        }

        let mut names = HashSet::new();
        for toolchain in &self.toolchains {
            if !names.insert(toolchain.name.as_str()) {
                bail!("Duplicate toolchain name: {}", toolchain.name);
            }
            if toolchain.compile.is_empty() {
                bail!("Toolchain {} has an empty compile command", toolchain.name);
            }
            if toolchain.kind == ToolchainKind::Bytecode && toolchain.run.is_empty() {
                bail!("Bytecode toolchain {} needs a run command", toolchain.name);
            }
        }

        for question in &self.questions {
            if let Some(weight) = question.weight {
                if !(weight.is_finite() && weight >= 0.0) {
                    bail!("Question {} has an invalid weight", question.id);
                }
            }
        }
        Ok(())
    }
}
