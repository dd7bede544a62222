use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::judge::QuestionFixture;
use crate::model::{QuestionId, TestCase};

/// Input files (`<stem>.in`) of a question directory in case order
///
/// Integer stems come first in numeric order (`2.in` before `10.in`), any other
/// stems follow in lexicographic order.
pub fn list_inputs(question_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for entry in fs::read_dir(question_dir)
        .with_context(|| format!("Failed to read question dir {}", question_dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "in") {
            inputs.push(path);
        }
    }

    inputs.sort_by_cached_key(|path| {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        (stem.parse::<u64>().map_err(|_| stem.clone()), stem)
    });
    Ok(inputs)
}

/// Loads the cases of one question; inputs without a matching `.out` are skipped
pub fn load_question(question_dir: &Path, id: &str, config: &Config) -> Result<QuestionFixture> {
    let mut cases = Vec::new();

    for input_path in list_inputs(question_dir)? {
        let output_path = input_path.with_extension("out");
        if !output_path.is_file() {
            log::warn!(
                "Skipping {}: no expected output {}",
                input_path.display(),
                output_path.display()
            );
            continue;
        }

        let input = fs::read(&input_path)
            .with_context(|| format!("Failed to read {}", input_path.display()))?;
        let expected = fs::read(&output_path)
            .with_context(|| format!("Failed to read {}", output_path.display()))?;
        cases.push(TestCase::new(cases.len() + 1, input, expected));
    }

    if cases.is_empty() {
        log::warn!("Question {id} has no test cases");
    }

    Ok(QuestionFixture {
        id: id.to_string(),
        cases,
        time_limit: config.time_limit_for(id),
        compare: config.compare_mode_for(id),
    })
}

/// Loads every question under `questions_dir`, one sub-directory per question
pub fn load_questions(
    questions_dir: &Path,
    config: &Config,
) -> Result<BTreeMap<QuestionId, Arc<QuestionFixture>>> {
    let mut questions = BTreeMap::new();

    for entry in fs::read_dir(questions_dir)
        .with_context(|| format!("Failed to read questions dir {}", questions_dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let id = entry.file_name().to_string_lossy().into_owned();
        let fixture = load_question(&entry.path(), &id, config)?;
        log::info!("Loaded question {id} with {} cases", fixture.cases.len());
        questions.insert(id, Arc::new(fixture));
    }

    Ok(questions)
}
