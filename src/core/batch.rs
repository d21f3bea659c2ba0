//! 批次管理器（Batch Manager）
//!
//! 进程级控制器：维护会话队列与有界的活动会话集合，每个活动会话在独立的 OS 线程上运行 SessionRunner。
//! 后台管理循环按固定间隔轮询已结束的线程、回收结果并从队列补位，队列与活动集合都为空时退出。
//! 所有集合只在持锁时修改，锁不会跨越作业执行。
//! 会话以规范化后的根目录为键，目录名只用于展示。

use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Serialize;

use crate::core::allocator::{host_cpu_count, Allocation, WorkerRequest};
use crate::core::runner::{SessionReport, SessionRequest, SessionRunner};
use crate::core::session::SessionLayout;
use crate::core::state::{BatchStatus, SessionPhase, SessionStatus};
use crate::core::tracker::ProcessingTracker;
use crate::core::{panic_message, FailureKind, JobFailure, PipelineError};
use crate::jobs::JobFlags;

/// 管理循环自身故障在错误表中的键
pub const MANAGER_FAULT_KEY: &str = "batch_manager";

/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub poll_interval: Duration,
    /// 覆盖探测到的主机核心数
    pub cpu_count: Option<usize>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            cpu_count: None,
        }
    }
}

/// 一次提交
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub paths: Vec<PathBuf>,
    pub flags: JobFlags,
    pub workers: WorkerRequest,
    pub reset: bool,
}

/// 提交结果
#[derive(Debug, Clone, Serialize)]
pub struct SubmitSummary {
    pub started: bool,
    pub total_sessions: usize,
    pub immediate_start: usize,
    pub queued: usize,
    pub max_parallel: usize,
    pub workers_per_session: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub invalid_paths: Vec<String>,
    /// 已在队列或运行中而被忽略的会话（根目录路径）
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

struct QueuedSession {
    layout: SessionLayout,
    request: SessionRequest,
}

struct ActiveSession {
    layout: SessionLayout,
    handle: JoinHandle<SessionReport>,
}

struct FinishedSession {
    layout: SessionLayout,
    phase: SessionPhase,
}

#[derive(Default)]
struct BatchState {
    queued: VecDeque<QueuedSession>,
    active: HashMap<String, ActiveSession>,
    finished: HashMap<String, FinishedSession>,
    errors: HashMap<String, Vec<JobFailure>>,
    allocation: Option<Allocation>,
    requested_workers: Option<WorkerRequest>,
    loop_running: bool,
}

/// 批次状态中会话的键：规范化的根目录
fn session_key(layout: &SessionLayout) -> String {
    layout.root().display().to_string()
}

impl BatchState {
    fn contains_pending(&self, key: &str) -> bool {
        self.active.contains_key(key) || self.queued.iter().any(|q| session_key(&q.layout) == key)
    }

    fn is_drained(&self) -> bool {
        self.queued.is_empty() && self.active.is_empty()
    }
}

struct BatchInner {
    runner: SessionRunner,
    options: BatchOptions,
    state: Mutex<BatchState>,
}

/// 批次管理器句柄（廉价 Clone，内部共享同一份状态）
#[derive(Clone)]
pub struct BatchManager {
    inner: Arc<BatchInner>,
}

impl BatchManager {
    pub fn new(runner: SessionRunner, options: BatchOptions) -> Self {
        Self {
            inner: Arc::new(BatchInner {
                runner,
                options,
                state: Mutex::new(BatchState::default()),
            }),
        }
    }

    pub fn runner(&self) -> &SessionRunner {
        &self.inner.runner
    }

    fn lock(&self) -> MutexGuard<'_, BatchState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// 当前批次的资源配置（尚未提交时为 None）
    pub fn allocation(&self) -> Option<Allocation> {
        self.lock().allocation
    }

    /// 提交会话：校验路径、入队并在需要时启动管理循环
    pub fn submit(&self, request: SubmitRequest) -> Result<SubmitSummary, PipelineError> {
        if request.paths.is_empty() {
            return Err(PipelineError::Validation(
                "No session paths provided".to_string(),
            ));
        }

        let mut layouts = Vec::new();
        let mut invalid_paths = Vec::new();
        for path in &request.paths {
            match self.inner.runner.resolve(path) {
                Ok(layout) => layouts.push(layout),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "rejecting session path");
                    invalid_paths.push(path.display().to_string());
                }
            }
        }
        if layouts.is_empty() {
            return Err(PipelineError::Validation(format!(
                "No valid session directories in request: {}",
                invalid_paths.join(", ")
            )));
        }

        let mut state = self.lock();
        let allocation = match (state.loop_running, state.allocation, state.requested_workers) {
            (true, Some(allocation), Some(current)) => {
                if current != request.workers {
                    return Err(PipelineError::ConcurrencyConflict(format!(
                        "a batch is running with {} workers per session; wait for it to finish before changing the worker count",
                        allocation.workers_per_session
                    )));
                }
                allocation
            }
            _ => {
                let cpus = self.inner.options.cpu_count.or_else(host_cpu_count);
                let allocation = Allocation::compute(request.workers, cpus);
                state.allocation = Some(allocation);
                state.requested_workers = Some(request.workers);
                allocation
            }
        };

        let occupied = state.active.len() + state.queued.len();
        let mut skipped = Vec::new();
        let mut accepted = 0;
        for layout in layouts {
            let key = session_key(&layout);
            if state.contains_pending(&key) {
                tracing::info!(session = %key, "session already queued or running, skipping");
                skipped.push(key);
                continue;
            }
            state.finished.remove(&key);
            state.errors.remove(&key);
            let session_request = SessionRequest {
                path: layout.root().to_path_buf(),
                flags: request.flags,
                workers: allocation.workers_per_session,
                reset: request.reset,
            };
            state.queued.push_back(QueuedSession {
                layout,
                request: session_request,
            });
            accepted += 1;
        }

        let immediate_start = accepted.min(allocation.max_parallel.saturating_sub(occupied));
        let queued = accepted - immediate_start;

        self.fill_slots(&mut state);
        let started = !state.is_drained() && !state.loop_running;
        if started {
            state.loop_running = true;
        }
        drop(state);
        if started {
            self.spawn_manager_loop();
        }

        tracing::info!(
            accepted,
            immediate_start,
            queued,
            max_parallel = allocation.max_parallel,
            workers_per_session = allocation.workers_per_session,
            "sessions submitted"
        );

        Ok(SubmitSummary {
            started: accepted > 0,
            total_sessions: accepted,
            immediate_start,
            queued,
            max_parallel: allocation.max_parallel,
            workers_per_session: allocation.workers_per_session,
            invalid_paths,
            skipped,
        })
    }

    /// 管理循环运行在专用线程上，不依附于调用方的 tokio 运行时
    fn spawn_manager_loop(&self) {
        let manager = self.clone();
        let poll = self.inner.options.poll_interval;
        let spawned = std::thread::Builder::new()
            .name("batch-manager".into())
            .spawn(move || {
                while manager.tick() {
                    std::thread::sleep(poll);
                }
                tracing::info!("batch drained, manager loop exiting");
            });
        if let Err(e) = spawned {
            tracing::error!(error = %e, "failed to start manager loop");
            let mut state = self.lock();
            state.loop_running = false;
            record_fault(&mut state, format!("failed to start manager loop: {e}"));
        }
    }

    /// 管理循环的一次迭代；返回 false 表示批次已排空、循环应退出
    fn tick(&self) -> bool {
        match catch_unwind(AssertUnwindSafe(|| self.tick_inner())) {
            Ok(keep_running) => keep_running,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(error = %message, "manager loop iteration panicked");
                let mut state = self.lock();
                record_fault(&mut state, message);
                true
            }
        }
    }

    fn tick_inner(&self) -> bool {
        let mut state = self.lock();
        reap_finished(&mut state);
        self.fill_slots(&mut state);
        if state.is_drained() {
            state.loop_running = false;
            false
        } else {
            true
        }
    }

    /// 按 FIFO 从队列补位，直到活动会话达到上限
    fn fill_slots(&self, state: &mut BatchState) {
        let max_parallel = state.allocation.map(|a| a.max_parallel).unwrap_or(1);
        while state.active.len() < max_parallel {
            let Some(next) = state.queued.pop_front() else {
                break;
            };
            let key = session_key(&next.layout);
            let name = next.layout.name().to_string();
            let runner = self.inner.runner.clone();
            let request = next.request;
            let spawned = std::thread::Builder::new()
                .name(format!("session-{name}"))
                .spawn(move || runner.run(&request));
            match spawned {
                Ok(handle) => {
                    tracing::info!(session = %key, "session started");
                    state.active.insert(
                        key,
                        ActiveSession {
                            layout: next.layout,
                            handle,
                        },
                    );
                }
                Err(e) => {
                    tracing::error!(session = %key, error = %e, "failed to spawn session thread");
                    let failure = JobFailure::new(FailureKind::Spawn, e.to_string())
                        .with_location(key.clone());
                    state.errors.insert(key.clone(), vec![failure]);
                    state.finished.insert(
                        key,
                        FinishedSession {
                            layout: next.layout,
                            phase: SessionPhase::Failed,
                        },
                    );
                }
            }
        }
    }

    /// 当前是否没有排队或运行中的会话
    pub fn is_idle(&self) -> bool {
        let state = self.lock();
        state.is_drained() && !state.loop_running
    }

    /// 等待批次排空
    pub async fn wait_until_idle(&self) {
        let poll = self
            .inner
            .options
            .poll_interval
            .min(Duration::from_millis(100));
        while !self.is_idle() {
            tokio::time::sleep(poll).await;
        }
    }

    /// 状态快照；只在复制内存集合时持锁，跟踪文件在锁外读取
    pub fn status(&self) -> BatchStatus {
        struct Row {
            name: String,
            layout: SessionLayout,
            phase: SessionPhase,
            errors: Option<Vec<JobFailure>>,
        }

        let (rows, faults) = {
            let state = self.lock();
            let mut rows = Vec::new();
            for q in &state.queued {
                rows.push(Row {
                    name: q.layout.name().to_string(),
                    layout: q.layout.clone(),
                    phase: SessionPhase::Queued,
                    errors: None,
                });
            }
            for active in state.active.values() {
                rows.push(Row {
                    name: active.layout.name().to_string(),
                    layout: active.layout.clone(),
                    phase: SessionPhase::Active,
                    errors: None,
                });
            }
            for (key, finished) in &state.finished {
                rows.push(Row {
                    name: finished.layout.name().to_string(),
                    layout: finished.layout.clone(),
                    phase: finished.phase,
                    errors: Some(state.errors.get(key).cloned().unwrap_or_default()),
                });
            }
            let faults = state
                .errors
                .get(MANAGER_FAULT_KEY)
                .cloned()
                .unwrap_or_default();
            (rows, faults)
        };

        let sessions = rows
            .into_iter()
            .map(|row| {
                let snapshot = if row.phase == SessionPhase::Queued {
                    None
                } else {
                    match ProcessingTracker::load_snapshot(&row.layout.tracker_path()) {
                        Ok(snap) => snap,
                        Err(e) => {
                            tracing::debug!(session = %row.name, error = %e, "tracker unreadable");
                            None
                        }
                    }
                };
                let errors = match row.errors {
                    Some(errors) => errors,
                    None => snapshot.as_ref().map(|s| s.errors()).unwrap_or_default(),
                };
                SessionStatus::new(row.name, row.layout.root().to_path_buf(), row.phase)
                    .with_snapshot(snapshot.as_ref())
                    .with_errors(errors)
            })
            .collect();

        BatchStatus::from_sessions(sessions, faults)
    }
}

/// 回收已结束的会话线程，把结果并入 finished / errors
fn reap_finished(state: &mut BatchState) {
    let done: Vec<String> = state
        .active
        .iter()
        .filter(|(_, a)| a.handle.is_finished())
        .map(|(key, _)| key.clone())
        .collect();

    for key in done {
        let Some(active) = state.active.remove(&key) else {
            continue;
        };
        let (phase, errors) = match active.handle.join() {
            Ok(report) => (SessionPhase::from(report.outcome), report.errors),
            Err(payload) => (
                SessionPhase::Failed,
                vec![JobFailure::new(FailureKind::Panic, panic_message(payload.as_ref()))
                    .with_location(active.layout.root().display().to_string())],
            ),
        };
        tracing::info!(session = %key, ?phase, "session finished");
        if !errors.is_empty() {
            state.errors.insert(key.clone(), errors);
        }
        state.finished.insert(
            key,
            FinishedSession {
                layout: active.layout,
                phase,
            },
        );
    }
}

fn record_fault(state: &mut BatchState, message: String) {
    state
        .errors
        .entry(MANAGER_FAULT_KEY.to_string())
        .or_default()
        .push(JobFailure::new(FailureKind::ManagerLoop, message));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::{LayoutOptions, BEHAVIOR_DATA_DIR, RAW_DATA_DIR};
    use crate::jobs::{from_fn, ExecutorError, JobName, JobRegistry};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make_session(base: &Path, name: &str) -> PathBuf {
        let data = base.join(name).join(RAW_DATA_DIR).join(BEHAVIOR_DATA_DIR);
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join(JobName::Runtime.input_file()), b"npz").unwrap();
        base.join(name)
    }

    fn manager_with(registry: JobRegistry, cpus: usize) -> BatchManager {
        let runner = SessionRunner::new(Arc::new(registry), LayoutOptions::default());
        BatchManager::new(
            runner,
            BatchOptions {
                poll_interval: Duration::from_millis(10),
                cpu_count: Some(cpus),
            },
        )
    }

    fn sleeping_registry(ms: u64) -> JobRegistry {
        let mut registry = JobRegistry::new();
        registry.register(
            JobName::Runtime,
            from_fn(move |_| {
                std::thread::sleep(Duration::from_millis(ms));
                Ok(())
            }),
        );
        registry
    }

    #[tokio::test]
    async fn test_empty_paths_rejected() {
        let manager = manager_with(sleeping_registry(0), 16);
        let err = manager.submit(SubmitRequest::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(manager.is_idle());
        assert!(manager.status().is_empty());
    }

    #[tokio::test]
    async fn test_all_invalid_paths_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(sleeping_registry(0), 16);
        let err = manager
            .submit(SubmitRequest {
                paths: vec![dir.path().join("nope")],
                ..SubmitRequest::default()
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(manager.is_idle());
    }

    #[tokio::test]
    async fn test_partial_invalid_paths_reported() {
        let dir = tempfile::tempdir().unwrap();
        let good = make_session(dir.path(), "s1");
        let manager = manager_with(sleeping_registry(0), 16);
        let summary = manager
            .submit(SubmitRequest {
                paths: vec![good, dir.path().join("nope")],
                ..SubmitRequest::default()
            })
            .unwrap();
        assert_eq!(summary.total_sessions, 1);
        assert_eq!(summary.invalid_paths.len(), 1);
        manager.wait_until_idle().await;
        assert_eq!(manager.status().summary.succeeded, 1);
    }

    #[tokio::test]
    async fn test_active_never_exceeds_max_parallel() {
        let dir = tempfile::tempdir().unwrap();
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut registry = JobRegistry::new();
        {
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            registry.register(
                JobName::Runtime,
                from_fn(move |_| {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(30));
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }),
            );
        }
        // 64 核 → 最多 2 个并行会话
        let manager = manager_with(registry, 64);
        let paths: Vec<PathBuf> = (0..5)
            .map(|i| make_session(dir.path(), &format!("s{i}")))
            .collect();
        let summary = manager
            .submit(SubmitRequest {
                paths,
                ..SubmitRequest::default()
            })
            .unwrap();
        assert_eq!(summary.max_parallel, 2);
        assert_eq!(summary.immediate_start, 2);
        assert_eq!(summary.queued, 3);
        assert_eq!(summary.workers_per_session, 30);

        manager.wait_until_idle().await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
        let status = manager.status();
        assert_eq!(status.summary.succeeded, 5);
        assert_eq!(status.summary.total, 5);
    }

    #[tokio::test]
    async fn test_staggered_submits_respect_max_parallel() {
        let dir = tempfile::tempdir().unwrap();
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut registry = JobRegistry::new();
        {
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            registry.register(
                JobName::Runtime,
                from_fn(move |_| {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(25));
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }),
            );
        }
        let manager = manager_with(registry, 64);

        // 循环运行期间分批提交，submit 与管理循环都会补位
        let mut submitted = 0;
        for round in 0..6 {
            let paths: Vec<PathBuf> = (0..(round % 3 + 1))
                .map(|i| make_session(dir.path(), &format!("r{round}-{i}")))
                .collect();
            submitted += paths.len();
            let summary = manager
                .submit(SubmitRequest {
                    paths,
                    ..SubmitRequest::default()
                })
                .unwrap();
            assert_eq!(summary.max_parallel, 2);
            assert!(manager.status().summary.processing <= 2);
            tokio::time::sleep(Duration::from_millis(7 * (round as u64 + 1))).await;
            assert!(manager.status().summary.processing <= 2);
        }

        manager.wait_until_idle().await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
        let status = manager.status();
        assert_eq!(status.summary.total, submitted);
        assert_eq!(status.summary.succeeded, submitted);
        assert!(status.faults.is_empty());
    }

    #[tokio::test]
    async fn test_same_named_sessions_in_different_dirs_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let first = make_session(&dir.path().join("mouseA"), "2024-01-01");
        let second = make_session(&dir.path().join("mouseB"), "2024-01-01");
        let manager = manager_with(sleeping_registry(20), 16);
        let summary = manager
            .submit(SubmitRequest {
                paths: vec![first.clone(), second.clone()],
                ..SubmitRequest::default()
            })
            .unwrap();
        assert_eq!(summary.total_sessions, 2);
        assert!(summary.skipped.is_empty());
        manager.wait_until_idle().await;

        let status = manager.status();
        assert_eq!(status.summary.total, 2);
        assert_eq!(status.summary.succeeded, 2);
        assert!(status.sessions.iter().all(|s| s.name == "2024-01-01"));
        assert_ne!(status.sessions[0].path, status.sessions[1].path);

        // 重新提交其中一个不影响另一个的结果
        manager
            .submit(SubmitRequest {
                paths: vec![second],
                ..SubmitRequest::default()
            })
            .unwrap();
        manager.wait_until_idle().await;
        assert_eq!(manager.status().summary.succeeded, 2);
    }

    #[tokio::test]
    async fn test_duplicate_submit_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_session(dir.path(), "s1");
        let manager = manager_with(sleeping_registry(100), 16);
        let request = SubmitRequest {
            paths: vec![path],
            ..SubmitRequest::default()
        };
        manager.submit(request.clone()).unwrap();
        let again = manager.submit(request.clone()).unwrap();
        assert_eq!(again.total_sessions, 0);
        let root = manager.runner().resolve(&request.paths[0]).unwrap();
        assert_eq!(again.skipped, vec![root.root().display().to_string()]);
        manager.wait_until_idle().await;

        // 结束后再次提交是一次新的运行
        let rerun = manager.submit(request).unwrap();
        assert_eq!(rerun.total_sessions, 1);
        manager.wait_until_idle().await;
        assert_eq!(manager.status().sessions.len(), 1);
    }

    #[tokio::test]
    async fn test_worker_change_while_running_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let first = make_session(dir.path(), "s1");
        let second = make_session(dir.path(), "s2");
        let manager = manager_with(sleeping_registry(150), 16);
        manager
            .submit(SubmitRequest {
                paths: vec![first],
                workers: WorkerRequest::Explicit(2),
                ..SubmitRequest::default()
            })
            .unwrap();
        let err = manager
            .submit(SubmitRequest {
                paths: vec![second.clone()],
                workers: WorkerRequest::Explicit(3),
                ..SubmitRequest::default()
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::ConcurrencyConflict(_)));

        manager.wait_until_idle().await;
        let summary = manager
            .submit(SubmitRequest {
                paths: vec![second],
                workers: WorkerRequest::Explicit(3),
                ..SubmitRequest::default()
            })
            .unwrap();
        assert_eq!(summary.workers_per_session, 3);
        manager.wait_until_idle().await;
    }

    #[tokio::test]
    async fn test_failed_and_panicking_sessions_are_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let ok = make_session(dir.path(), "ok");
        let bad = make_session(dir.path(), "bad");
        let mut registry = JobRegistry::new();
        registry.register(
            JobName::Runtime,
            from_fn(|ctx| {
                if ctx.session.name() == "bad" {
                    Err(ExecutorError::Failed(anyhow::anyhow!("corrupt log")))
                } else {
                    Ok(())
                }
            }),
        );
        let manager = manager_with(registry, 96);
        manager
            .submit(SubmitRequest {
                paths: vec![ok, bad],
                ..SubmitRequest::default()
            })
            .unwrap();
        manager.wait_until_idle().await;

        let status = manager.status();
        assert_eq!(status.summary.succeeded, 1);
        assert_eq!(status.summary.failed, 1);
        let bad = status.sessions.iter().find(|s| s.name == "bad").unwrap();
        assert_eq!(bad.phase, SessionPhase::Failed);
        assert_eq!(bad.errors[0].kind, FailureKind::Execution);
        assert_eq!(bad.total, 1);
        assert_eq!(bad.completed, 0);
    }

    #[test]
    fn test_manager_outlives_submitting_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![make_session(dir.path(), "a"), make_session(dir.path(), "b")];
        let manager = manager_with(sleeping_registry(50), 16);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let summary = runtime
            .block_on(async {
                manager.submit(SubmitRequest {
                    paths,
                    ..SubmitRequest::default()
                })
            })
            .unwrap();
        assert_eq!(summary.max_parallel, 1);
        assert_eq!(summary.queued, 1);
        drop(runtime);

        for _ in 0..500 {
            if manager.is_idle() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(manager.is_idle());
        assert_eq!(manager.status().summary.succeeded, 2);
    }

    #[test]
    fn test_manager_runs_without_tokio_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_session(dir.path(), "s1");
        let manager = manager_with(sleeping_registry(0), 16);
        manager
            .submit(SubmitRequest {
                paths: vec![path],
                ..SubmitRequest::default()
            })
            .unwrap();
        for _ in 0..500 {
            if manager.is_idle() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(manager.is_idle());
        assert_eq!(manager.status().summary.succeeded, 1);
    }
}
