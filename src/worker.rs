use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::judge::{CaseJudge, QuestionFixture};
use crate::model::{QuestionId, QuestionResult, SourceArtifact, StudentId};
use crate::queue::{JobQueue, JudgeJob};
use crate::sandbox::SandboxRunner;

/// Judged results keyed by (student, question)
pub type GradingMatrix = HashMap<(StudentId, QuestionId), QuestionResult>;

/// Fans judging out over a bounded pool of workers
pub struct Coordinator<R> {
    judge: Arc<CaseJudge<R>>,
    max_workers: usize,
    token: CancellationToken,
}

impl<R: SandboxRunner + 'static> Coordinator<R> {
    pub fn new(judge: CaseJudge<R>, max_workers: usize, token: CancellationToken) -> Self {
        Self {
            judge: Arc::new(judge),
            max_workers: max_workers.max(1),
            token,
        }
    }

    /// Grades every (student, question) pair and returns once all of them have a result
    ///
    /// Students come from `roster` plus the owners of `artifacts`; questions come
    /// from `fixtures`. A pair without an artifact is recorded as absent, and a
    /// judging task that dies is recorded as a worst-case result for its pair only.
    pub async fn grade_all(
        &self,
        roster: &[StudentId],
        artifacts: Vec<SourceArtifact>,
        fixtures: &BTreeMap<QuestionId, Arc<QuestionFixture>>,
    ) -> GradingMatrix {
        let results = Arc::new(Mutex::new(GradingMatrix::new()));
        let queue = Arc::new(JobQueue::new());

        let mut by_pair: HashMap<(StudentId, QuestionId), SourceArtifact> = HashMap::new();
        for artifact in artifacts {
            if !fixtures.contains_key(&artifact.question) {
                log::warn!(
                    "Ignoring {} for unknown question {}",
                    artifact.path.display(),
                    artifact.question
                );
                continue;
            }
            let key = (artifact.owner.clone(), artifact.question.clone());
            if let Some(kept) = by_pair.get(&key) {
                log::warn!(
                    "Ignoring {}: {} already submitted for {}/{}",
                    artifact.path.display(),
                    kept.path.display(),
                    key.0,
                    key.1
                );
                continue;
            }
            by_pair.insert(key, artifact);
        }

        let mut students: BTreeSet<StudentId> = roster.iter().cloned().collect();
        students.extend(by_pair.keys().map(|(student, _)| student.clone()));

        for student in &students {
            for (question, fixture) in fixtures {
                match by_pair.remove(&(student.clone(), question.clone())) {
                    Some(artifact) => {
                        queue
                            .push(JudgeJob {
                                artifact,
                                fixture: Arc::clone(fixture),
                            })
                            .await
                    }
                    None => {
                        log::info!("{student}/{question}: submission absent");
                        results.lock().insert(
                            (student.clone(), question.clone()),
                            QuestionResult::absent(question.clone(), fixture.cases.len()),
                        );
                    }
                }
            }
        }
        queue.close().await;

        let n_jobs = queue.len().await;
        let n_workers = self.max_workers.min(n_jobs);
        log::info!(
            "Judging {n_jobs} submissions from {} students with {n_workers} workers",
            students.len()
        );

        let mut workers = JoinSet::new();
        for id in 1..=n_workers {
            workers.spawn(worker(
                id,
                Arc::clone(&self.judge),
                Arc::clone(&queue),
                Arc::clone(&results),
                self.token.clone(),
            ));
        }

        // Every judging run has finished once the pool is drained
        while let Some(res) = workers.join_next().await {
            if let Err(e) = res {
                log::error!("Worker handle finished with error: {e:?}");
            }
        }

        for JudgeJob { artifact, fixture } in queue.drain().await {
            log::warn!(
                "{}/{}: not judged before shutdown",
                artifact.owner,
                artifact.question
            );
            results.lock().insert(
                (artifact.owner, artifact.question),
                QuestionResult::worst_case(
                    fixture.id.clone(),
                    &fixture.cases,
                    "grading cancelled before this submission was judged",
                ),
            );
        }

        match Arc::try_unwrap(results) {
            Ok(results) => results.into_inner(),
            Err(shared) => shared.lock().clone(),
        }
    }
}

async fn worker<R: SandboxRunner + 'static>(
    id: usize,
    judge: Arc<CaseJudge<R>>,
    queue: Arc<JobQueue>,
    results: Arc<Mutex<GradingMatrix>>,
    token: CancellationToken,
) {
    log::info!("Worker {id} initialized");

    loop {
        let job = tokio::select! {
            biased;

            _ = token.cancelled() => {
                log::info!("Worker {id} received shutdown signal, stopping");
                break;
            }
            job = queue.pop() => job,
        };
        let Some(JudgeJob { artifact, fixture }) = job else {
            break;
        };

        let key = (artifact.owner.clone(), artifact.question.clone());
        log::debug!("Worker {id} got {}/{} from queue", key.0, key.1);

        // A separate task so that a panic while judging stays contained to this pair
        let judge_ref = Arc::clone(&judge);
        let task_fixture = Arc::clone(&fixture);
        let handle =
            tokio::spawn(async move { judge_ref.judge(&artifact, &task_fixture).await });

        let result = match handle.await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Judging {}/{} failed on worker {id}: {e}", key.0, key.1);
                QuestionResult::worst_case(fixture.id.clone(), &fixture.cases, &e.to_string())
            }
        };

        log::info!(
            "{}/{}: {}/{} test cases passed",
            key.0,
            key.1,
            result.passed,
            result.total
        );
        results.lock().insert(key, result);
    }

    log::info!("Worker {id} has shut down gracefully");
}
