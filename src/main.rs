use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use anyhow::bail;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use gradekit::config::{CliArgs, Command, Config};
use gradekit::create_timestamp;
use gradekit::generate::generate_expected;
use gradekit::judge::CaseJudge;
use gradekit::sandbox::{Compiler, ProcessRunner};
use gradekit::worker::Coordinator;
use gradekit::{discovery, fixtures, report, score};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let config = cli.to_config()?;
    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Ctrl-c received, finishing submissions already being judged...");
            signal_token.cancel();
        }
    });

    match cli.command {
        Command::Grade {
            questions,
            submissions,
            results,
        } => grade(&config, &questions, &submissions, &results, shutdown_token).await,
        Command::Generate { questions } => generate(&config, &questions).await,
    }
}

async fn grade(
    config: &Config,
    questions_dir: &Path,
    submissions_dir: &Path,
    results_dir: &Path,
    token: CancellationToken,
) -> anyhow::Result<()> {
    log::info!("Grading run started at {}", create_timestamp());
    let start_time = Instant::now();

    let fixtures = fixtures::load_questions(questions_dir, config)?;
    let question_ids: Vec<_> = fixtures.keys().cloned().collect();
    let submissions = discovery::discover(submissions_dir, &question_ids, config)?;

    let compiler = Compiler::build(config)?;
    let coordinator = Coordinator::new(
        CaseJudge::new(compiler, ProcessRunner),
        config.grading.max_workers,
        token,
    );

    // ======= JUDGING START =======

    let matrix = coordinator
        .grade_all(&submissions.roster, submissions.artifacts, &fixtures)
        .await;

    // ======= JUDGING END, ALL UNITS JOINED =======

    let weights: HashMap<_, _> = question_ids
        .iter()
        .map(|q| (q.clone(), config.weight_for(q)))
        .collect();
    let reports = score::aggregate(&matrix, &weights);
    report::write_reports(results_dir, &reports, &question_ids)?;

    log::info!("Grading finished in {:?}", start_time.elapsed());
    Ok(())
}

async fn generate(config: &Config, questions_dir: &Path) -> anyhow::Result<()> {
    let compiler = Compiler::build(config)?;
    let summary = generate_expected(questions_dir, config, &compiler, &ProcessRunner).await?;
    log::info!("Generated {} expected outputs", summary.generated);

    if !summary.failed_questions.is_empty() {
        bail!(
            "Expected outputs are incomplete for: {}",
            summary.failed_questions.join(", ")
        );
    }
    Ok(())
}
