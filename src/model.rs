use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

pub type StudentId = String;
pub type QuestionId = String;

/// One student's submitted source for one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceArtifact {
    pub owner: StudentId,
    pub question: QuestionId,
    /// Name of the configured toolchain that builds this source
    pub toolchain: String,
    pub path: PathBuf,
}

/// One (input, expected output) fixture pair; `index` is 1-based and unique within its question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub index: usize,
    pub input: Vec<u8>,
    pub expected: Vec<u8>,
}

impl TestCase {
    pub fn new(index: usize, input: impl Into<Vec<u8>>, expected: impl Into<Vec<u8>>) -> Self {
        Self {
            index,
            input: input.into(),
            expected: expected.into(),
        }
    }
}

/// How a single execution terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Completed,
    TimedOut,
    /// Non-zero exit, death by signal (`exit_code` is `None`), or an environment failure
    Crashed { exit_code: Option<i32> },
}

/// Captured outcome of running one compiled unit against one input
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub classification: Classification,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub elapsed: Duration,
}

impl ExecutionResult {
    pub fn timed_out(elapsed: Duration) -> Self {
        Self {
            classification: Classification::TimedOut,
            stdout: Vec::new(),
            stderr: Vec::new(),
            elapsed,
        }
    }

    /// An execution that never got far enough to produce output
    pub fn environment_failure(message: String, elapsed: Duration) -> Self {
        Self {
            classification: Classification::Crashed { exit_code: None },
            stdout: Vec::new(),
            stderr: message.into_bytes(),
            elapsed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Verdict {
    Pass,
    WrongAnswer,
    CompileError,
    RuntimeError,
    Timeout,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Pass => "Pass",
            Verdict::WrongAnswer => "Wrong Answer",
            Verdict::CompileError => "Compile Error",
            Verdict::RuntimeError => "Runtime Error",
            Verdict::Timeout => "Timeout",
        }
    }
}

/// Diagnostic for one non-passing case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseFailure {
    pub case_index: usize,
    pub verdict: Verdict,
    pub input: String,
    pub expected: String,
    /// Program output, or the verdict label when there is nothing comparable
    pub actual: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum Diagnostic {
    Case(CaseFailure),
    SubmissionAbsent,
}

/// Judged outcome of one (student, question) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionResult {
    pub question: QuestionId,
    pub passed: usize,
    pub total: usize,
    pub failures: Vec<Diagnostic>,
    /// Compiler output when compilation failed
    pub compile_log: Option<String>,
}

impl QuestionResult {
    pub fn absent(question: impl Into<QuestionId>, total: usize) -> Self {
        Self {
            question: question.into(),
            passed: 0,
            total,
            failures: vec![Diagnostic::SubmissionAbsent],
            compile_log: None,
        }
    }

    /// Every case fails with `RuntimeError`; used when judging itself broke down
    pub fn worst_case(question: impl Into<QuestionId>, cases: &[TestCase], message: &str) -> Self {
        let failures = cases
            .iter()
            .map(|case| {
                Diagnostic::Case(CaseFailure {
                    case_index: case.index,
                    verdict: Verdict::RuntimeError,
                    input: payload_text(&case.input),
                    expected: payload_text(&case.expected),
                    actual: format!("Harness Error: {message}"),
                })
            })
            .collect();

        Self {
            question: question.into(),
            passed: 0,
            total: cases.len(),
            failures,
            compile_log: None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self.failures.as_slice(), [Diagnostic::SubmissionAbsent])
    }

    pub fn case_failures(&self) -> impl Iterator<Item = &CaseFailure> {
        self.failures.iter().filter_map(|d| match d {
            Diagnostic::Case(failure) => Some(failure),
            Diagnostic::SubmissionAbsent => None,
        })
    }

    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }
}

/// Final per-student view handed to the report sink
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentReport {
    pub student: StudentId,
    pub questions: BTreeMap<QuestionId, QuestionResult>,
    pub scores: BTreeMap<QuestionId, f64>,
    pub total: f64,
}

/// Lossy text rendering of a payload for diagnostics, trimmed like the comparator sees it
pub fn payload_text(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload.trim_ascii()).into_owned()
}
