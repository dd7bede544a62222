use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::{QuestionId, StudentId, StudentReport};

/// Per-student diagnostic text: pass ratio per question and every failing case
pub fn render_student(report: &StudentReport) -> String {
    let mut out = String::new();

    for (question, result) in &report.questions {
        out.push_str(&format!(
            "{question}: {}/{} test cases passed.\n",
            result.passed, result.total
        ));

        if result.is_absent() {
            out.push_str("File for this code not present.\n");
            continue;
        }

        let mut failures = result.case_failures().peekable();
        if failures.peek().is_some() {
            out.push_str("Failed cases:\n");
            for case in failures {
                out.push_str(&format!("  Test Case {}:\n", case.case_index));
                out.push_str(&format!("    Input:           {}\n", case.input));
                out.push_str(&format!("    Expected Output: {}\n", case.expected));
                out.push_str(&format!("    Current Output:  {}\n\n", case.actual));
            }
        }

        if let Some(log) = &result.compile_log {
            out.push_str("Compiler output:\n");
            for line in log.lines() {
                out.push_str(&format!("    {line}\n"));
            }
        }
    }

    out
}

/// One row per student with the percentage per question and the total marks
pub fn render_summary(
    reports: &BTreeMap<StudentId, StudentReport>,
    questions: &[QuestionId],
) -> String {
    let mut out = String::from("Name");
    for question in questions {
        out.push('\t');
        out.push_str(question);
    }
    out.push_str("\tTotal Marks\n");

    for (student, report) in reports {
        out.push_str(student);
        for question in questions {
            let percent = report
                .questions
                .get(question)
                .map_or(0.0, |r| r.ratio() * 100.0);
            out.push_str(&format!("\t{percent:.2}%"));
        }
        out.push_str(&format!("\t{:.2}\n", report.total));
    }

    out
}

/// Writes `<student>.txt` for every student plus `summary.txt` and `summary.json`
pub fn write_reports(
    results_dir: &Path,
    reports: &BTreeMap<StudentId, StudentReport>,
    questions: &[QuestionId],
) -> Result<()> {
    fs::create_dir_all(results_dir)
        .with_context(|| format!("Failed to create results dir {}", results_dir.display()))?;

    for (student, report) in reports {
        let path = results_dir.join(format!("{student}.txt"));
        fs::write(&path, render_student(report))
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let summary_path = results_dir.join("summary.txt");
    fs::write(&summary_path, render_summary(reports, questions))
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;

    let json_path = results_dir.join("summary.json");
    let file = fs::File::create(&json_path)
        .with_context(|| format!("Failed to create {}", json_path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), reports)
        .with_context(|| format!("Failed to write {}", json_path.display()))?;

    log::info!(
        "Wrote reports for {} students to {}",
        reports.len(),
        results_dir.display()
    );
    Ok(())
}
