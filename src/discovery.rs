use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::Config;
use crate::model::{QuestionId, SourceArtifact, StudentId};

/// Students found in the submissions directory and the sources they handed in
#[derive(Debug, Default)]
pub struct Submissions {
    pub roster: Vec<StudentId>,
    pub artifacts: Vec<SourceArtifact>,
}

/// File stem a student uses for a question
///
/// Student folders are named `First_Last_Roll`; the source for `Ques2` is then
/// `f_l_2`. Returns `None` when the folder name has fewer than two parts.
pub fn source_stem(student: &str, question: &str) -> Option<String> {
    let lower = student.to_lowercase();
    let mut parts = lower.split('_');
    let first = parts.next()?.chars().next()?;
    let second = parts.next()?.chars().next()?;
    let suffix = question.chars().last()?;
    Some(format!("{first}_{second}_{suffix}"))
}

/// Scans `submissions_dir` for one folder per student
///
/// For every question the first existing `<stem>.<ext>` wins, trying
/// toolchains and their extensions in configuration order.
pub fn discover(
    submissions_dir: &Path,
    questions: &[QuestionId],
    config: &Config,
) -> Result<Submissions> {
    let mut student_dirs = Vec::new();
    for entry in fs::read_dir(submissions_dir).with_context(|| {
        format!(
            "Failed to read submissions dir {}",
            submissions_dir.display()
        )
    })? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            student_dirs.push(entry.path());
        }
    }
    student_dirs.sort();

    let mut submissions = Submissions::default();
    for dir in student_dirs {
        let student = match dir.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => continue,
        };
        if source_stem(&student, "x").is_none() {
            log::warn!("Cannot derive file names from folder {student}, skipping this student");
            continue;
        }

        for question in questions {
            let Some(stem) = source_stem(&student, question) else {
                continue;
            };
            match find_source(&dir, &stem, config) {
                Some((toolchain, path)) => {
                    submissions.artifacts.push(SourceArtifact {
                        owner: student.clone(),
                        question: question.clone(),
                        toolchain,
                        path,
                    });
                }
                None => log::debug!("{student}: no source {stem}.* for {question}"),
            }
        }
        submissions.roster.push(student);
    }

    log::info!(
        "Discovered {} sources from {} students",
        submissions.artifacts.len(),
        submissions.roster.len()
    );
    Ok(submissions)
}

/// First `<stem>.<ext>` in `dir`, trying toolchains and extensions in configuration order
pub fn find_source(dir: &Path, stem: &str, config: &Config) -> Option<(String, PathBuf)> {
    config.toolchains.iter().find_map(|toolchain| {
        toolchain.extensions.iter().find_map(|ext| {
            let path = dir.join(format!("{stem}.{ext}"));
            path.is_file().then(|| (toolchain.name.clone(), path))
        })
    })
}
