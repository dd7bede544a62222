mod common;

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;

use gradekit::judge::CaseJudge;
use gradekit::model::{
    CaseFailure, Classification, Diagnostic, ExecutionResult, QuestionResult, Verdict,
};
use gradekit::sandbox::{CompiledUnit, Compiler, ProcessRunner, SandboxRunner};

use common::*;

/// Counts how often the judge reaches the runner
#[derive(Clone, Default)]
struct CountingRunner {
    calls: Arc<AtomicUsize>,
}

impl SandboxRunner for CountingRunner {
    async fn run(&self, unit: &CompiledUnit, input: &[u8], time_limit: Duration) -> ExecutionResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ProcessRunner.run(unit, input, time_limit).await
    }
}

fn two_case_question() -> Arc<gradekit::judge::QuestionFixture> {
    fixture("Q1", &[("3\n4", "7"), ("0\n0", "0")], Duration::from_secs(1))
}

fn assert_counts_add_up(result: &QuestionResult) {
    assert_eq!(result.passed + result.failures.len(), result.total);
}

#[tokio::test]
async fn correct_program_passes_every_case() {
    let root = create_test_dir("judge-pass");
    let config = shell_config(&root.join("scratch"));
    let judge = CaseJudge::new(Compiler::build(&config).unwrap(), ProcessRunner);

    let artifact = write_source(&root, "Ann_Lee_1", "Q1", "sh", ADDER);
    let result = judge.judge(&artifact, &two_case_question()).await;

    assert_eq!(
        result,
        QuestionResult {
            question: "Q1".to_string(),
            passed: 2,
            total: 2,
            failures: vec![],
            compile_log: None,
        }
    );
    cleanup_test_dir(&root);
}

#[tokio::test]
async fn compile_error_fails_every_case_without_running() {
    let root = create_test_dir("judge-compile-error");
    let config = shell_config(&root.join("scratch"));
    let runner = CountingRunner::default();
    let judge = CaseJudge::new(Compiler::build(&config).unwrap(), runner.clone());

    let artifact = write_source(&root, "Ann_Lee_1", "Q1", "sh", "if then fi (\n");
    let result = judge.judge(&artifact, &two_case_question()).await;

    assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.passed, 0);
    assert_eq!(result.total, 2);
    let verdicts: Vec<_> = result.case_failures().map(|f| (f.case_index, f.verdict)).collect();
    assert_eq!(
        verdicts,
        vec![(1, Verdict::CompileError), (2, Verdict::CompileError)]
    );
    assert!(result.compile_log.is_some());
    assert_eq!(result.case_failures().next().unwrap().actual, "Compile Error");
    assert_counts_add_up(&result);
    cleanup_test_dir(&root);
}

#[tokio::test]
async fn unknown_toolchain_and_missing_source_are_compile_errors() {
    let root = create_test_dir("judge-environment");
    let config = shell_config(&root.join("scratch"));
    let judge = CaseJudge::new(Compiler::build(&config).unwrap(), ProcessRunner);

    let mut artifact = write_source(&root, "Ann_Lee_1", "Q1", "sh", ADDER);
    artifact.toolchain = "fortran".to_string();
    let result = judge.judge(&artifact, &two_case_question()).await;
    assert_eq!(result.passed, 0);
    assert!(result.case_failures().all(|f| f.verdict == Verdict::CompileError));
    assert!(result.compile_log.unwrap().contains("fortran"));

    let mut artifact = write_source(&root, "Ann_Lee_1", "Q1", "sh", ADDER);
    artifact.path = root.join("does-not-exist.sh");
    let result = judge.judge(&artifact, &two_case_question()).await;
    assert_eq!(result.failures.len(), 2);
    assert!(result.case_failures().all(|f| f.verdict == Verdict::CompileError));
    cleanup_test_dir(&root);
}

#[tokio::test]
async fn failures_keep_input_expected_and_actual() {
    let root = create_test_dir("judge-diagnostics");
    let config = shell_config(&root.join("scratch"));
    let judge = CaseJudge::new(Compiler::build(&config).unwrap(), ProcessRunner);

    let script = "read a\nread b\nif [ \"$a\" = 0 ]; then exit 3; fi\necho $((a * b))\n";
    let artifact = write_source(&root, "Ann_Lee_1", "Q1", "sh", script);
    let result = judge.judge(&artifact, &two_case_question()).await;

    assert_eq!(
        result.failures,
        vec![
            Diagnostic::Case(CaseFailure {
                case_index: 1,
                verdict: Verdict::WrongAnswer,
                input: "3\n4".to_string(),
                expected: "7".to_string(),
                actual: "12".to_string(),
            }),
            Diagnostic::Case(CaseFailure {
                case_index: 2,
                verdict: Verdict::RuntimeError,
                input: "0\n0".to_string(),
                expected: "0".to_string(),
                actual: "Runtime Error (exit code 3)".to_string(),
            }),
        ]
    );
    assert_counts_add_up(&result);
    cleanup_test_dir(&root);
}

#[tokio::test]
async fn timeout_is_reported_and_later_cases_still_run() {
    let root = create_test_dir("judge-timeout");
    let config = shell_config(&root.join("scratch"));
    let judge = CaseJudge::new(Compiler::build(&config).unwrap(), ProcessRunner);

    // prints the right answer before hanging, which must not count
    let script = "read a\nprintf '%s' \"$a\"\nif [ \"$a\" = slow ]; then sleep 10; fi\n";
    let artifact = write_source(&root, "Ann_Lee_1", "Q1", "sh", script);
    let question = fixture(
        "Q1",
        &[("slow", "slow"), ("1", "1"), ("slow", "slow")],
        Duration::from_millis(300),
    );

    let start = Instant::now();
    let result = judge.judge(&artifact, &question).await;
    assert!(start.elapsed() < Duration::from_secs(5));

    assert_eq!(result.passed, 1);
    let verdicts: Vec<_> = result
        .case_failures()
        .map(|f| (f.case_index, f.verdict, f.actual.as_str()))
        .collect();
    assert_eq!(
        verdicts,
        vec![(1, Verdict::Timeout, "Timeout"), (3, Verdict::Timeout, "Timeout")]
    );
    assert_counts_add_up(&result);
    cleanup_test_dir(&root);
}

#[tokio::test]
async fn runner_classifies_executions() {
    let root = create_test_dir("runner");
    let config = shell_config(&root.join("scratch"));
    let compiler = Compiler::build(&config).unwrap();

    let artifact = write_source(&root, "Ann_Lee_1", "Q1", "sh", "cat\necho oops >&2\n");
    let unit = compiler.compile(&artifact).await.unwrap();

    let result = ProcessRunner.run(&unit, b"  hello \n", Duration::from_secs(1)).await;
    assert_eq!(result.classification, Classification::Completed);
    // stdout is captured verbatim, trimming is left to the comparator
    assert_eq!(result.stdout, b"  hello \n");
    assert_eq!(result.stderr, b"oops\n");

    let work_dir = unit.work_dir().to_path_buf();
    assert!(work_dir.is_dir());
    drop(unit);
    assert!(!work_dir.exists());
    cleanup_test_dir(&root);
}

#[tokio::test]
async fn runner_survives_programs_that_ignore_stdin() {
    let root = create_test_dir("runner-stdin");
    let config = shell_config(&root.join("scratch"));
    let compiler = Compiler::build(&config).unwrap();

    let artifact = write_source(&root, "Ann_Lee_1", "Q1", "sh", "exec 0<&-\necho done\n");
    let unit = compiler.compile(&artifact).await.unwrap();

    let input = vec![b'x'; 1 << 20];
    let result = ProcessRunner.run(&unit, &input, Duration::from_secs(2)).await;
    assert_eq!(result.classification, Classification::Completed);
    assert_eq!(result.stdout, b"done\n");
    cleanup_test_dir(&root);
}

#[tokio::test]
async fn crashed_run_keeps_output() {
    let root = create_test_dir("runner-crash");
    let config = shell_config(&root.join("scratch"));
    let compiler = Compiler::build(&config).unwrap();

    let artifact = write_source(&root, "Ann_Lee_1", "Q1", "sh", "echo partial\nexit 42\n");
    let unit = compiler.compile(&artifact).await.unwrap();

    let result = ProcessRunner.run(&unit, b"", Duration::from_secs(1)).await;
    assert_eq!(
        result.classification,
        Classification::Crashed {
            exit_code: Some(42)
        }
    );
    assert_eq!(result.stdout, b"partial\n");
    cleanup_test_dir(&root);
}

#[tokio::test]
async fn native_toolchain_runs_the_built_executable() {
    let root = create_test_dir("native");
    let scratch = root.join("scratch");
    let config = shell_config(&scratch);
    let judge = CaseJudge::new(Compiler::build(&config).unwrap(), ProcessRunner);

    let script = format!("#!/bin/sh\n{ADDER}");
    let artifact = write_source(&root, "Ann_Lee_1", "Q1", "shx", &script);
    let result = judge.judge(&artifact, &two_case_question()).await;
    assert_eq!(result.passed, 2);

    // nothing left behind in the scratch root
    assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
    cleanup_test_dir(&root);
}

#[tokio::test]
async fn background_processes_do_not_outlive_the_run() {
    let root = create_test_dir("runner-background");
    let config = shell_config(&root.join("scratch"));
    let compiler = Compiler::build(&config).unwrap();

    let marker = root.join("marker");
    let script = format!(
        "(sleep 1; touch '{}') >/dev/null 2>&1 </dev/null &\necho ok\n",
        marker.display()
    );
    let artifact = write_source(&root, "Ann_Lee_1", "Q1", "sh", &script);
    let unit = compiler.compile(&artifact).await.unwrap();

    let result = ProcessRunner.run(&unit, b"", Duration::from_secs(2)).await;
    assert_eq!(result.classification, Classification::Completed);
    assert_eq!(result.stdout, b"ok\n");

    tokio::time::sleep(Duration::from_millis(1800)).await;
    assert!(!marker.exists());
    cleanup_test_dir(&root);
}
