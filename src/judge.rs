use std::time::Duration;

use crate::config::CompareMode;
use crate::model::{
    CaseFailure, Classification, Diagnostic, ExecutionResult, QuestionId, QuestionResult,
    SourceArtifact, TestCase, Verdict, payload_text,
};
use crate::sandbox::{CompileError, Compiler, SandboxRunner, compare};

/// Everything needed to judge any submission for one question
#[derive(Debug, Clone)]
pub struct QuestionFixture {
    pub id: QuestionId,
    /// Ordered by case index
    pub cases: Vec<TestCase>,
    pub time_limit: Duration,
    pub compare: CompareMode,
}

/// Compiles one artifact once and runs it against every case of its question
pub struct CaseJudge<R> {
    compiler: Compiler,
    runner: R,
}

impl<R: SandboxRunner> CaseJudge<R> {
    pub fn new(compiler: Compiler, runner: R) -> Self {
        Self { compiler, runner }
    }

    /// Produces exactly one verdict per case, in case order
    pub async fn judge(&self, artifact: &SourceArtifact, fixture: &QuestionFixture) -> QuestionResult {
        let unit = match self.compiler.compile(artifact).await {
            Ok(unit) => unit,
            Err(err) => {
                if err.environment {
                    log::warn!("{}/{}: {err}", artifact.owner, artifact.question);
                } else {
                    log::info!("{}/{}: compile error", artifact.owner, artifact.question);
                }
                return compile_failed(fixture, err);
            }
        };

        let mut passed = 0;
        let mut failures = Vec::new();

        for case in &fixture.cases {
            let result = self.runner.run(&unit, &case.input, fixture.time_limit).await;
            let verdict = compare(&result, &case.expected, fixture.compare);
            log::debug!(
                "{}/{} case {}: {} in {:?}",
                artifact.owner,
                artifact.question,
                case.index,
                verdict.label(),
                result.elapsed
            );

            if verdict == Verdict::Pass {
                passed += 1;
            } else {
                failures.push(Diagnostic::Case(CaseFailure {
                    case_index: case.index,
                    verdict,
                    input: payload_text(&case.input),
                    expected: payload_text(&case.expected),
                    actual: actual_output(verdict, &result),
                }));
            }
        }

        // scratch directory and executable are removed here
        drop(unit);

        QuestionResult {
            question: fixture.id.clone(),
            passed,
            total: fixture.cases.len(),
            failures,
            compile_log: None,
        }
    }
}

fn compile_failed(fixture: &QuestionFixture, err: CompileError) -> QuestionResult {
    let failures = fixture
        .cases
        .iter()
        .map(|case| {
            Diagnostic::Case(CaseFailure {
                case_index: case.index,
                verdict: Verdict::CompileError,
                input: payload_text(&case.input),
                expected: payload_text(&case.expected),
                actual: Verdict::CompileError.label().to_string(),
            })
        })
        .collect();

    QuestionResult {
        question: fixture.id.clone(),
        passed: 0,
        total: fixture.cases.len(),
        failures,
        compile_log: Some(err.diagnostics),
    }
}

/// What the report shows as the program's output for a failed case
fn actual_output(verdict: Verdict, result: &ExecutionResult) -> String {
    match (verdict, result.classification) {
        (Verdict::WrongAnswer, _) => payload_text(&result.stdout),
        (
            Verdict::RuntimeError,
            Classification::Crashed {
                exit_code: Some(code),
            },
        ) => format!("{} (exit code {code})", verdict.label()),
        _ => verdict.label().to_string(),
    }
}
