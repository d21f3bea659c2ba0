//! 作业 ID
//!
//! 由会话根目录 + `<session_name>_<job_name>` 派生（UUID v5），同一会话同一作业在续跑时 ID 不变；
//! 显式重置时加盐（时间戳 + 随机数），得到全新的 ID。

use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::SessionLayout;
use crate::jobs::JobName;

const JOB_ID_NAMESPACE: Uuid = Uuid::from_u128(0x5b1e_77c4_3a0f_4d6b_9e21_b7d0_c4a8_13f2);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// 确定性 ID
    pub fn derive(layout: &SessionLayout, job: JobName) -> Self {
        let key = format!("{}::{}", layout.root().display(), full_job_name(layout, job));
        Self(Uuid::new_v5(&JOB_ID_NAMESPACE, key.as_bytes()).simple().to_string())
    }

    /// 加盐 ID（重置时使用）
    pub fn salted(layout: &SessionLayout, job: JobName) -> Self {
        let salt = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let key = format!(
            "{}::{}::{}::{}",
            layout.root().display(),
            full_job_name(layout, job),
            salt,
            Uuid::new_v4()
        );
        Self(Uuid::new_v5(&JOB_ID_NAMESPACE, key.as_bytes()).simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `<session_name>_<job_name>`
pub fn full_job_name(layout: &SessionLayout, job: JobName) -> String {
    format!("{}_{}", layout.name(), job.as_str())
}

/// 为一组作业生成 ID；reuse_existing 为 true 时确定性（续跑），否则加盐（重置）
pub fn generate_job_ids(
    layout: &SessionLayout,
    jobs: &[JobName],
    reuse_existing: bool,
) -> BTreeMap<JobName, JobId> {
    jobs.iter()
        .map(|job| {
            let id = if reuse_existing {
                JobId::derive(layout, *job)
            } else {
                JobId::salted(layout, *job)
            };
            (*job, id)
        })
        .collect()
}
