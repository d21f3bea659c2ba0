//! 处理跟踪文件（每会话一份，持久化）
//!
//! 记录 JobId → {status, error}，是断点续跑的唯一依据。写入走「临时文件 + rename」，
//! 读者永远看到最后一次完整写入的记录。单会话只有其 Runner 线程写入，因此不需要跨线程锁。

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{JobFailure, TrackerError};
use crate::jobs::{JobId, JobName};

/// 读取时遇到不完整文件的重试次数
const READ_RETRIES: usize = 3;
const READ_RETRY_DELAY: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 单个作业的跟踪记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedJob {
    pub id: JobId,
    pub job: JobName,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// 跟踪文件快照（按写入顺序）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub jobs: Vec<TrackedJob>,
}

impl TrackerSnapshot {
    pub fn count(&self, status: JobStatus) -> usize {
        self.jobs.iter().filter(|j| j.status == status).count()
    }

    /// 第一个 running 的作业
    pub fn current_job(&self) -> Option<JobName> {
        self.jobs
            .iter()
            .find(|j| j.status == JobStatus::Running)
            .map(|j| j.job)
    }

    pub fn errors(&self) -> Vec<JobFailure> {
        self.jobs.iter().filter_map(|j| j.error.clone()).collect()
    }

    pub fn get(&self, id: &JobId) -> Option<&TrackedJob> {
        self.jobs.iter().find(|j| &j.id == id)
    }
}

/// 跟踪器：持有磁盘记录的内存副本，每次迁移后原子落盘
#[derive(Debug)]
pub struct ProcessingTracker {
    path: PathBuf,
    record: TrackerSnapshot,
}

impl ProcessingTracker {
    /// 打开跟踪文件；不存在时得到空记录（首次 initialize 时创建文件）
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TrackerError> {
        let path = path.as_ref().to_path_buf();
        let record = Self::load_snapshot(&path)?.unwrap_or_default();
        Ok(Self { path, record })
    }

    /// 只读加载快照（供状态查询）；文件不存在返回 None
    pub fn load_snapshot(path: &Path) -> Result<Option<TrackerSnapshot>, TrackerError> {
        let mut attempt = 0;
        loop {
            let data = match std::fs::read_to_string(path) {
                Ok(data) => data,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(source) => {
                    return Err(TrackerError::Io {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            };
            match serde_json::from_str(&data) {
                Ok(snapshot) => return Ok(Some(snapshot)),
                Err(source) if attempt + 1 >= READ_RETRIES => {
                    return Err(TrackerError::Malformed {
                        path: path.to_path_buf(),
                        source,
                    })
                }
                Err(_) => {
                    attempt += 1;
                    std::thread::sleep(READ_RETRY_DELAY);
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 为每个不存在的 JobId 创建 pending 记录；reset 时先清空全部旧记录
    pub fn initialize(&mut self, jobs: &[(JobName, JobId)], reset: bool) -> Result<(), TrackerError> {
        if reset {
            tracing::info!(path = %self.path.display(), "resetting processing tracker");
            self.record.jobs.clear();
        }
        for (job, id) in jobs {
            if self.record.get(id).is_none() {
                self.record.jobs.push(TrackedJob {
                    id: id.clone(),
                    job: *job,
                    status: JobStatus::Pending,
                    error: None,
                    started_at: None,
                    finished_at: None,
                });
            }
        }
        self.persist()
    }

    pub fn mark_running(&mut self, id: &JobId) -> Result<(), TrackerError> {
        self.transition(id, JobStatus::Running, None)
    }

    pub fn mark_done(&mut self, id: &JobId) -> Result<(), TrackerError> {
        self.transition(id, JobStatus::Done, None)
    }

    pub fn mark_failed(&mut self, id: &JobId, failure: JobFailure) -> Result<(), TrackerError> {
        self.transition(id, JobStatus::Failed, Some(failure))
    }

    pub fn entry(&self, id: &JobId) -> Option<&TrackedJob> {
        self.record.get(id)
    }

    /// 已记录的某作业的 ID（续跑时沿用，避免同一作业出现两条记录）
    pub fn id_for(&self, job: JobName) -> Option<&JobId> {
        self.record.jobs.iter().find(|j| j.job == job).map(|j| &j.id)
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        self.record.clone()
    }

    fn transition(
        &mut self,
        id: &JobId,
        to: JobStatus,
        error: Option<JobFailure>,
    ) -> Result<(), TrackerError> {
        let entry = self
            .record
            .jobs
            .iter_mut()
            .find(|j| &j.id == id)
            .ok_or_else(|| TrackerError::UnknownJob(id.to_string()))?;

        let allowed = matches!(
            (entry.status, to),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Done)
                | (JobStatus::Running, JobStatus::Failed)
        );
        if !allowed {
            return Err(TrackerError::InvalidTransition {
                job_id: id.to_string(),
                from: entry.status,
                to,
            });
        }

        let now = Utc::now();
        entry.status = to;
        match to {
            JobStatus::Running => entry.started_at = Some(now),
            JobStatus::Done | JobStatus::Failed => entry.finished_at = Some(now),
            JobStatus::Pending => {}
        }
        entry.error = error;
        self.persist()
    }

    /// 原子写入：同目录临时文件 + fsync + rename
    fn persist(&self) -> Result<(), TrackerError> {
        let io_err = |source: std::io::Error| TrackerError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let data = serde_json::to_vec_pretty(&self.record).map_err(|source| {
            TrackerError::Malformed {
                path: self.path.clone(),
                source,
            }
        })?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        {
            let mut file = std::fs::File::create(&tmp).map_err(io_err)?;
            file.write_all(&data).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }
}
