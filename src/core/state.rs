//! 状态投影：会话阶段、会话状态与批次汇总
//!
//! BatchManager 内部状态由互斥锁保护；对外只暴露这里的只读投影，供工具与 CLI 序列化。

use std::cmp::Ordering;
use std::path::PathBuf;

use serde::Serialize;

use crate::core::runner::SessionOutcome;
use crate::core::tracker::{JobStatus, TrackerSnapshot};
use crate::core::JobFailure;
use crate::jobs::JobName;

/// 会话阶段：queued → active → {succeeded, failed, partial}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Queued,
    #[serde(rename = "processing")]
    Active,
    Succeeded,
    Failed,
    Partial,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionPhase::Succeeded | SessionPhase::Failed | SessionPhase::Partial
        )
    }

    /// 排序权重：processing → queued → succeeded → partial → failed
    fn rank(&self) -> u8 {
        match self {
            SessionPhase::Active => 0,
            SessionPhase::Queued => 1,
            SessionPhase::Succeeded => 2,
            SessionPhase::Partial => 3,
            SessionPhase::Failed => 4,
        }
    }
}

impl From<SessionOutcome> for SessionPhase {
    fn from(outcome: SessionOutcome) -> Self {
        match outcome {
            SessionOutcome::Succeeded => SessionPhase::Succeeded,
            SessionOutcome::Failed => SessionPhase::Failed,
            SessionOutcome::Partial => SessionPhase::Partial,
        }
    }
}

/// 单个作业的状态明细
#[derive(Clone, Debug, Serialize)]
pub struct JobDetail {
    pub job: JobName,
    pub status: JobStatus,
}

/// 单个会话的状态
#[derive(Clone, Debug, Serialize)]
pub struct SessionStatus {
    pub name: String,
    pub path: PathBuf,
    pub phase: SessionPhase,
    /// 已完成（done）的作业数
    pub completed: usize,
    pub total: usize,
    /// 跟踪文件中第一个 running 的作业
    pub current_job: Option<JobName>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<JobDetail>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<JobFailure>,
}

impl SessionStatus {
    pub fn new(name: String, path: PathBuf, phase: SessionPhase) -> Self {
        Self {
            name,
            path,
            phase,
            completed: 0,
            total: 0,
            current_job: None,
            jobs: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// 用跟踪文件快照填充进度
    pub fn with_snapshot(mut self, snapshot: Option<&TrackerSnapshot>) -> Self {
        if let Some(snap) = snapshot {
            self.completed = snap.count(JobStatus::Done);
            self.total = snap.jobs.len();
            self.current_job = snap.current_job();
            self.jobs = snap
                .jobs
                .iter()
                .map(|j| JobDetail {
                    job: j.job,
                    status: j.status,
                })
                .collect();
        }
        self
    }

    pub fn with_errors(mut self, errors: Vec<JobFailure>) -> Self {
        self.errors = errors;
        self
    }

    fn display_order(&self, other: &Self) -> Ordering {
        self.phase
            .rank()
            .cmp(&other.phase.rank())
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.path.cmp(&other.path))
    }
}

/// 批次汇总；failed 包含 partial 会话
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub processing: usize,
    pub queued: usize,
}

/// get_processing_status 的完整结果
#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchStatus {
    pub sessions: Vec<SessionStatus>,
    pub summary: BatchSummary,
    /// 不属于任何会话的故障（例如管理循环内部错误）
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub faults: Vec<JobFailure>,
}

impl BatchStatus {
    pub fn from_sessions(mut sessions: Vec<SessionStatus>, faults: Vec<JobFailure>) -> Self {
        sessions.sort_by(|a, b| a.display_order(b));
        let mut summary = BatchSummary {
            total: sessions.len(),
            ..BatchSummary::default()
        };
        for s in &sessions {
            match s.phase {
                SessionPhase::Queued => summary.queued += 1,
                SessionPhase::Active => summary.processing += 1,
                SessionPhase::Succeeded => summary.succeeded += 1,
                SessionPhase::Failed | SessionPhase::Partial => summary.failed += 1,
            }
        }
        Self {
            sessions,
            summary,
            faults,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(name: &str, phase: SessionPhase) -> SessionStatus {
        SessionStatus::new(name.into(), PathBuf::from(name), phase)
    }

    #[test]
    fn test_sort_order_and_summary() {
        let status = BatchStatus::from_sessions(
            vec![
                status("e", SessionPhase::Failed),
                status("b", SessionPhase::Queued),
                status("d", SessionPhase::Partial),
                status("c", SessionPhase::Succeeded),
                status("a", SessionPhase::Queued),
                status("z", SessionPhase::Active),
            ],
            vec![],
        );
        let names: Vec<&str> = status.sessions.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["z", "a", "b", "c", "d", "e"]);
        assert_eq!(
            status.summary,
            BatchSummary {
                total: 6,
                succeeded: 1,
                failed: 2,
                processing: 1,
                queued: 2,
            }
        );
    }

    #[test]
    fn test_active_serializes_as_processing() {
        let json = serde_json::to_value(SessionPhase::Active).unwrap();
        assert_eq!(json, "processing");
        assert_eq!(serde_json::to_value(SessionPhase::Partial).unwrap(), "partial");
    }

    #[test]
    fn test_outcome_maps_to_phase() {
        assert_eq!(SessionPhase::from(SessionOutcome::Partial), SessionPhase::Partial);
        assert!(SessionPhase::from(SessionOutcome::Failed).is_terminal());
        assert!(!SessionPhase::Queued.is_terminal());
    }
}
