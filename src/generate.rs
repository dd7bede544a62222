use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::discovery::find_source;
use crate::fixtures::list_inputs;
use crate::model::{Classification, QuestionId, SourceArtifact};
use crate::sandbox::{Compiler, SandboxRunner};

/// File stem of the trusted reference solution inside a question directory
pub const REFERENCE_STEM: &str = "correct";

#[derive(Debug, Default)]
pub struct GenerateSummary {
    /// Number of `.out` files written
    pub generated: usize,
    pub failed_questions: Vec<QuestionId>,
}

/// Writes `<name>.out` for every `<name>.in` by running each question's reference solution
///
/// A question whose reference is missing, does not compile, or fails on an input
/// is reported and left as is from that input on; other questions continue.
pub async fn generate_expected<R: SandboxRunner>(
    questions_dir: &Path,
    config: &Config,
    compiler: &Compiler,
    runner: &R,
) -> Result<GenerateSummary> {
    let mut question_dirs = Vec::new();
    for entry in fs::read_dir(questions_dir)
        .with_context(|| format!("Failed to read questions dir {}", questions_dir.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            question_dirs.push(entry.path());
        }
    }
    question_dirs.sort();

    let mut summary = GenerateSummary::default();
    for dir in question_dirs {
        let id = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let Some((toolchain, path)) = find_source(&dir, REFERENCE_STEM, config) else {
            log::error!("Correct code not found for question {id}");
            summary.failed_questions.push(id);
            continue;
        };

        let artifact = SourceArtifact {
            owner: REFERENCE_STEM.to_string(),
            question: id.clone(),
            toolchain,
            path,
        };
        let unit = match compiler.compile(&artifact).await {
            Ok(unit) => unit,
            Err(e) => {
                log::error!("Reference solution for {id}: {e}");
                summary.failed_questions.push(id);
                continue;
            }
        };
        log::info!("Compiled reference solution for question {id}");

        let time_limit = config.time_limit_for(&id);
        for input_path in list_inputs(&dir)? {
            let input = fs::read(&input_path)
                .with_context(|| format!("Failed to read {}", input_path.display()))?;
            let result = runner.run(&unit, &input, time_limit).await;

            if result.classification != Classification::Completed {
                log::error!(
                    "Reference solution for {id} failed on {}: {:?}",
                    input_path.display(),
                    result.classification
                );
                summary.failed_questions.push(id.clone());
                break;
            }

            let output_path = input_path.with_extension("out");
            fs::write(&output_path, result.stdout.trim_ascii())
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
            summary.generated += 1;
        }
    }

    Ok(summary)
}
