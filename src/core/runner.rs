//! 会话执行器（Session Runner）
//!
//! 在会话线程上按固定顺序执行「请求且可用」的作业：mark_running → 执行 → mark_done / mark_failed。
//! 作业的任何错误或 panic 都在这里被捕获并记录，之后继续下一个作业；全部尝试完后给出会话结论。

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::core::session::{LayoutOptions, SessionLayout};
use crate::core::tracker::{JobStatus, ProcessingTracker};
use crate::core::{panic_message, FailureKind, JobFailure, PipelineError};
use crate::jobs::{generate_job_ids, ExecutorError, JobContext, JobFlags, JobId, JobName, JobRegistry};

/// 会话结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOutcome {
    Succeeded,
    Failed,
    Partial,
}

impl SessionOutcome {
    /// 全部 done → succeeded；全部 failed → failed；其余 partial；没有作业视为 succeeded
    pub fn classify(done: usize, failed: usize) -> Self {
        match (done, failed) {
            (_, 0) => SessionOutcome::Succeeded,
            (0, _) => SessionOutcome::Failed,
            _ => SessionOutcome::Partial,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SessionOutcome::Succeeded)
    }
}

/// 一次会话运行的结果
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session: String,
    pub outcome: SessionOutcome,
    /// 本次涉及的作业数（含此前已完成而跳过的）
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<JobFailure>,
    /// 此前已完成、本次未重新执行的作业
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub already_complete: Vec<JobId>,
}

impl SessionReport {
    fn setup_failure(session: String, failure: JobFailure) -> Self {
        Self {
            session,
            outcome: SessionOutcome::Failed,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            errors: vec![failure],
            already_complete: Vec::new(),
        }
    }
}

/// 一个会话的运行请求
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub path: PathBuf,
    pub flags: JobFlags,
    pub workers: usize,
    /// 重置跟踪文件后全部重跑
    pub reset: bool,
}

enum JobRun {
    Ran,
    AlreadyDone,
}

/// 会话执行器：共享同一个作业注册表，可在多个会话线程间共享
#[derive(Debug, Clone)]
pub struct SessionRunner {
    registry: Arc<JobRegistry>,
    layout: LayoutOptions,
}

impl SessionRunner {
    pub fn new(registry: Arc<JobRegistry>, layout: LayoutOptions) -> Self {
        Self { registry, layout }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn layout_options(&self) -> &LayoutOptions {
        &self.layout
    }

    pub fn resolve(&self, path: &Path) -> Result<SessionLayout, PipelineError> {
        SessionLayout::resolve(path, &self.layout)
    }

    /// 运行一个会话的全部请求作业；不会返回错误，初始化失败也折算为 failed 结论
    pub fn run(&self, request: &SessionRequest) -> SessionReport {
        let fallback_name = request
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| request.path.display().to_string());
        match self.try_run(request) {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(session = %fallback_name, error = %e, "session setup failed");
                let failure = JobFailure::new(FailureKind::Setup, e.to_string())
                    .with_location(request.path.display().to_string());
                SessionReport::setup_failure(fallback_name, failure)
            }
        }
    }

    fn try_run(&self, request: &SessionRequest) -> Result<SessionReport, PipelineError> {
        let layout = self.resolve(&request.path)?;
        let jobs = self.registry.jobs_to_run(&layout, &request.flags);
        tracing::info!(
            session = %layout.name(),
            jobs = jobs.len(),
            workers = request.workers,
            reset = request.reset,
            "starting session"
        );

        if jobs.is_empty() && !request.reset {
            return Ok(self.finish(&layout, 0, 0, Vec::new(), Vec::new()));
        }

        let mut tracker = ProcessingTracker::open(layout.tracker_path())?;
        let pairs: Vec<(JobName, JobId)> = generate_job_ids(&layout, &jobs, !request.reset)
            .into_iter()
            .map(|(job, id)| match tracker.id_for(job) {
                Some(existing) if !request.reset => (job, existing.clone()),
                _ => (job, id),
            })
            .collect();
        tracker.initialize(&pairs, request.reset)?;

        Ok(self.drive(&layout, &mut tracker, &pairs, request.workers))
    }

    /// 单作业模式：只执行 ID 匹配的作业（ID 按确定性规则对全部作业生成）
    pub fn run_single(
        &self,
        path: &Path,
        job_id: &JobId,
        workers: usize,
    ) -> Result<SessionReport, PipelineError> {
        let layout = self.resolve(path)?;
        let mut tracker = ProcessingTracker::open(layout.tracker_path())?;
        // 已记录的 ID（含重置后生成的）优先，其次是确定性 ID
        let candidates: Vec<(JobName, JobId)> = self
            .registry
            .job_names()
            .into_iter()
            .map(|job| match tracker.id_for(job) {
                Some(existing) => (job, existing.clone()),
                None => (job, JobId::derive(&layout, job)),
            })
            .collect();
        let Some(pair) = candidates.iter().find(|(_, id)| id == job_id).cloned() else {
            let valid: Vec<String> = candidates
                .iter()
                .map(|(job, id)| format!("{id} ({job})"))
                .collect();
            return Err(PipelineError::Validation(format!(
                "Job id '{job_id}' does not match any job of session {}. Valid ids: {}",
                layout.name(),
                valid.join(", ")
            )));
        };

        let pair = [pair];
        tracker.initialize(&pair, false)?;
        if tracker.entry(&pair[0].1).map(|e| e.status) == Some(JobStatus::Done) {
            tracing::warn!(
                session = %layout.name(),
                job = %pair[0].0,
                job_id = %job_id,
                "job already complete; reset the tracker to run it again"
            );
        }
        Ok(self.drive(&layout, &mut tracker, &pair, workers))
    }

    fn drive(
        &self,
        layout: &SessionLayout,
        tracker: &mut ProcessingTracker,
        jobs: &[(JobName, JobId)],
        workers: usize,
    ) -> SessionReport {
        let mut done = 0;
        let mut failed = 0;
        let mut errors = Vec::new();
        let mut already_complete = Vec::new();

        for (job, id) in jobs {
            match self.process_job(layout, tracker, *job, id, workers) {
                Ok(JobRun::Ran) => done += 1,
                Ok(JobRun::AlreadyDone) => {
                    done += 1;
                    already_complete.push(id.clone());
                }
                Err(failure) => {
                    failed += 1;
                    errors.push(failure);
                }
            }
        }
        self.finish(layout, done, failed, errors, already_complete)
    }

    fn finish(
        &self,
        layout: &SessionLayout,
        done: usize,
        failed: usize,
        errors: Vec<JobFailure>,
        already_complete: Vec<JobId>,
    ) -> SessionReport {
        let outcome = SessionOutcome::classify(done, failed);
        tracing::info!(session = %layout.name(), ?outcome, done, failed, "session finished");
        SessionReport {
            session: layout.name().to_string(),
            outcome,
            attempted: done + failed,
            succeeded: done,
            failed,
            errors,
            already_complete,
        }
    }

    /// 执行单个作业；此前已终结的作业不会重跑（除非重置）
    fn process_job(
        &self,
        layout: &SessionLayout,
        tracker: &mut ProcessingTracker,
        job: JobName,
        id: &JobId,
        workers: usize,
    ) -> Result<JobRun, JobFailure> {
        let location = layout.root().display().to_string();
        let tracker_failure = |e: &dyn std::fmt::Display| {
            JobFailure::new(FailureKind::Tracker, e.to_string())
                .with_job(job.as_str())
                .with_location(location.clone())
        };

        let status = tracker.entry(id).map(|e| e.status);
        match status {
            Some(JobStatus::Done) => {
                tracing::info!(session = %layout.name(), job = %job, "already complete, skipping");
                return Ok(JobRun::AlreadyDone);
            }
            Some(JobStatus::Failed) => {
                let previous = tracker.entry(id).and_then(|e| e.error.clone());
                let message = match previous {
                    Some(err) => format!("failed in a previous run: {}", err.message),
                    None => "failed in a previous run".to_string(),
                };
                return Err(JobFailure::new(FailureKind::PreviouslyFailed, message)
                    .with_job(job.as_str())
                    .with_location(location.clone()));
            }
            Some(JobStatus::Running) => {
                tracing::warn!(session = %layout.name(), job = %job, "job left running by a previous run");
                return Err(JobFailure::new(
                    FailureKind::StaleRunning,
                    "job was left running by a previous run; reset the tracker to retry",
                )
                .with_job(job.as_str())
                .with_location(location.clone()));
            }
            Some(JobStatus::Pending) => {}
            None => return Err(tracker_failure(&format!("job id {id} missing from tracker"))),
        }

        let Some(descriptor) = self.registry.get(job) else {
            return Err(JobFailure::new(FailureKind::NotConfigured, "job is not registered")
                .with_job(job.as_str())
                .with_location(location.clone()));
        };

        tracker.mark_running(id).map_err(|e| tracker_failure(&e))?;
        tracing::info!(session = %layout.name(), job = %job, job_id = %id, "running job");

        let start = Instant::now();
        let ctx = JobContext {
            job,
            job_id: id,
            session: layout,
            workers,
        };
        let executor = descriptor.executor();
        let result = match catch_unwind(AssertUnwindSafe(|| executor.execute(&ctx))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(ExecutorError::NotConfigured(job))) => Err(JobFailure::new(
                FailureKind::NotConfigured,
                format!("no executor command configured for {job}"),
            )),
            Ok(Err(ExecutorError::Failed(e))) => {
                Err(JobFailure::new(FailureKind::Execution, format!("{e:#}")))
            }
            Err(payload) => Err(JobFailure::new(
                FailureKind::Panic,
                panic_message(payload.as_ref()),
            )),
        };
        let result = result.map_err(|f| f.with_job(job.as_str()).with_location(location.clone()));

        let outcome = match &result {
            Ok(()) => "done".to_string(),
            Err(f) => f.kind.to_string(),
        };
        let audit = serde_json::json!({
            "event": "job_audit",
            "session": layout.name(),
            "job": job.as_str(),
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "workers": workers,
        });
        tracing::info!(audit = %audit, "job");

        match result {
            Ok(()) => tracker
                .mark_done(id)
                .map(|()| JobRun::Ran)
                .map_err(|e| tracker_failure(&e)),
            Err(failure) => {
                tracing::warn!(session = %layout.name(), job = %job, error = %failure, "job failed");
                if let Err(e) = tracker.mark_failed(id, failure.clone()) {
                    tracing::error!(session = %layout.name(), job = %job, error = %e, "failed to record job failure");
                }
                Err(failure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::{BEHAVIOR_DATA_DIR, RAW_DATA_DIR};
    use crate::jobs::from_fn;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make_session(base: &Path, name: &str, jobs: &[JobName]) -> PathBuf {
        let root = base.join(name);
        let data = root.join(RAW_DATA_DIR).join(BEHAVIOR_DATA_DIR);
        std::fs::create_dir_all(&data).unwrap();
        for job in jobs {
            std::fs::write(data.join(job.input_file()), b"npz").unwrap();
        }
        root
    }

    fn request(path: PathBuf, reset: bool) -> SessionRequest {
        SessionRequest {
            path,
            flags: JobFlags::all(),
            workers: 2,
            reset,
        }
    }

    fn registry_with(failing: &[JobName], calls: Arc<AtomicUsize>) -> Arc<JobRegistry> {
        let mut registry = JobRegistry::new();
        for job in JobName::ALL {
            let fail = failing.contains(&job);
            let calls = Arc::clone(&calls);
            registry.register(
                job,
                from_fn(move |ctx| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(ctx.workers, 2);
                    if fail {
                        Err(ExecutorError::Failed(anyhow::anyhow!("decoder crashed")))
                    } else {
                        Ok(())
                    }
                }),
            );
        }
        Arc::new(registry)
    }

    #[test]
    fn test_classify() {
        assert_eq!(SessionOutcome::classify(0, 0), SessionOutcome::Succeeded);
        assert_eq!(SessionOutcome::classify(3, 0), SessionOutcome::Succeeded);
        assert_eq!(SessionOutcome::classify(0, 2), SessionOutcome::Failed);
        assert_eq!(SessionOutcome::classify(1, 2), SessionOutcome::Partial);
    }

    #[test]
    fn test_all_jobs_succeed_and_tracker_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = [JobName::Runtime, JobName::FaceCamera, JobName::SensorMicrocontroller];
        let path = make_session(dir.path(), "s1", &jobs);
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = SessionRunner::new(registry_with(&[], calls.clone()), LayoutOptions::default());

        let report = runner.run(&request(path.clone(), false));
        assert_eq!(report.outcome, SessionOutcome::Succeeded);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let layout = runner.resolve(&path).unwrap();
        let snap = ProcessingTracker::load_snapshot(&layout.tracker_path())
            .unwrap()
            .unwrap();
        assert_eq!(snap.jobs.len(), 3);
        assert!(snap.jobs.iter().all(|j| j.status == JobStatus::Done));
        let order: Vec<JobName> = snap.jobs.iter().map(|j| j.job).collect();
        assert_eq!(order, jobs.to_vec());
    }

    #[test]
    fn test_failure_isolation_gives_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_session(dir.path(), "s1", &JobName::ALL);
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = SessionRunner::new(
            registry_with(&[JobName::Runtime], calls.clone()),
            LayoutOptions::default(),
        );

        let report = runner.run(&request(path, false));
        assert_eq!(report.outcome, SessionOutcome::Partial);
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors[0].kind, FailureKind::Execution);
        assert_eq!(report.errors[0].job.as_deref(), Some("runtime_processing"));
    }

    #[test]
    fn test_all_failing_gives_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_session(dir.path(), "s1", &[JobName::Runtime, JobName::BodyCamera]);
        let runner = SessionRunner::new(
            registry_with(&JobName::ALL, Arc::new(AtomicUsize::new(0))),
            LayoutOptions::default(),
        );
        let report = runner.run(&request(path, false));
        assert_eq!(report.outcome, SessionOutcome::Failed);
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn test_panicking_executor_is_contained() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_session(dir.path(), "s1", &[JobName::Runtime, JobName::FaceCamera]);
        let mut registry = JobRegistry::new();
        registry.register(JobName::Runtime, from_fn(|_| panic!("index out of bounds")));
        registry.register(JobName::FaceCamera, from_fn(|_| Ok(())));
        let runner = SessionRunner::new(Arc::new(registry), LayoutOptions::default());

        let report = runner.run(&request(path, false));
        assert_eq!(report.outcome, SessionOutcome::Partial);
        assert_eq!(report.errors[0].kind, FailureKind::Panic);
        assert!(report.errors[0].message.contains("index out of bounds"));
    }

    #[test]
    fn test_no_available_jobs_is_trivial_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_session(dir.path(), "s1", &[]);
        let runner = SessionRunner::new(
            registry_with(&[], Arc::new(AtomicUsize::new(0))),
            LayoutOptions::default(),
        );
        let report = runner.run(&request(path.clone(), false));
        assert_eq!(report.outcome, SessionOutcome::Succeeded);
        assert_eq!(report.attempted, 0);
        assert!(!runner.resolve(&path).unwrap().tracker_path().exists());
    }

    #[test]
    fn test_resume_skips_done_and_reset_reruns() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_session(dir.path(), "s1", &[JobName::Runtime, JobName::FaceCamera]);
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = SessionRunner::new(registry_with(&[], calls.clone()), LayoutOptions::default());

        runner.run(&request(path.clone(), false));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let resumed = runner.run(&request(path.clone(), false));
        assert_eq!(resumed.outcome, SessionOutcome::Succeeded);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let reset = runner.run(&request(path.clone(), true));
        assert_eq!(reset.outcome, SessionOutcome::Succeeded);
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        // 重置后续跑沿用已记录的 ID
        runner.run(&request(path.clone(), false));
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let layout = runner.resolve(&path).unwrap();
        let snap = ProcessingTracker::load_snapshot(&layout.tracker_path())
            .unwrap()
            .unwrap();
        assert_eq!(snap.jobs.len(), 2);
    }

    #[test]
    fn test_stale_running_entry_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_session(dir.path(), "s1", &[JobName::Runtime]);
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = SessionRunner::new(registry_with(&[], calls.clone()), LayoutOptions::default());

        // 模拟崩溃：作业停留在 running
        let layout = runner.resolve(&path).unwrap();
        let id = JobId::derive(&layout, JobName::Runtime);
        let mut tracker = ProcessingTracker::open(layout.tracker_path()).unwrap();
        tracker.initialize(&[(JobName::Runtime, id.clone())], false).unwrap();
        tracker.mark_running(&id).unwrap();

        let report = runner.run(&request(path, false));
        assert_eq!(report.outcome, SessionOutcome::Failed);
        assert_eq!(report.errors[0].kind, FailureKind::StaleRunning);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_session_is_setup_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SessionRunner::new(
            registry_with(&[], Arc::new(AtomicUsize::new(0))),
            LayoutOptions::default(),
        );
        let report = runner.run(&request(dir.path().join("missing"), false));
        assert_eq!(report.outcome, SessionOutcome::Failed);
        assert_eq!(report.errors[0].kind, FailureKind::Setup);
    }

    #[test]
    fn test_run_single_by_job_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_session(dir.path(), "s1", &JobName::ALL);
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = SessionRunner::new(registry_with(&[], calls.clone()), LayoutOptions::default());
        let layout = runner.resolve(&path).unwrap();
        let id = JobId::derive(&layout, JobName::BodyCamera);

        let report = runner.run_single(&path, &id, 2).unwrap();
        assert_eq!(report.outcome, SessionOutcome::Succeeded);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let err = runner.run_single(&path, &JobId::from("nope"), 2).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn test_run_single_reports_already_complete_job() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_session(dir.path(), "s1", &[JobName::Runtime]);
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = SessionRunner::new(registry_with(&[], calls.clone()), LayoutOptions::default());
        let id = JobId::derive(&runner.resolve(&path).unwrap(), JobName::Runtime);

        let first = runner.run_single(&path, &id, 2).unwrap();
        assert!(first.already_complete.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let again = runner.run_single(&path, &id, 2).unwrap();
        assert_eq!(again.outcome, SessionOutcome::Succeeded);
        assert_eq!(again.already_complete, vec![id]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let json = serde_json::to_value(&again).unwrap();
        assert_eq!(json["already_complete"].as_array().unwrap().len(), 1);
    }
}
