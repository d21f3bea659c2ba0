//! 作业：名称、请求标志、ID 生成、执行器与注册表
//!
//! 每种作业消费一个日志源（`<log_id>_log.npz`），由外部执行器解码并写出产物。
//! JobName 的声明顺序即会话内的固定执行顺序。

pub mod executor;
pub mod id;
pub mod registry;

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use executor::{
    from_fn, CommandExecutor, ExecutorError, JobContext, JobExecutor, UnconfiguredExecutor,
};
pub use id::{generate_job_ids, JobId};
pub use registry::{JobDescriptor, JobRegistry};

/// 已知作业（顺序 = 执行顺序）
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum JobName {
    #[serde(rename = "runtime_processing")]
    Runtime,
    #[serde(rename = "face_camera_processing")]
    FaceCamera,
    #[serde(rename = "body_camera_processing")]
    BodyCamera,
    #[serde(rename = "actor_microcontroller_processing")]
    ActorMicrocontroller,
    #[serde(rename = "sensor_microcontroller_processing")]
    SensorMicrocontroller,
    #[serde(rename = "encoder_microcontroller_processing")]
    EncoderMicrocontroller,
}

impl JobName {
    pub const ALL: [JobName; 6] = [
        JobName::Runtime,
        JobName::FaceCamera,
        JobName::BodyCamera,
        JobName::ActorMicrocontroller,
        JobName::SensorMicrocontroller,
        JobName::EncoderMicrocontroller,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobName::Runtime => "runtime_processing",
            JobName::FaceCamera => "face_camera_processing",
            JobName::BodyCamera => "body_camera_processing",
            JobName::ActorMicrocontroller => "actor_microcontroller_processing",
            JobName::SensorMicrocontroller => "sensor_microcontroller_processing",
            JobName::EncoderMicrocontroller => "encoder_microcontroller_processing",
        }
    }

    /// 日志源 ID（运行时日志为 1，相机为 51/62，微控制器为 101/152/203）
    pub fn log_id(&self) -> u16 {
        match self {
            JobName::Runtime => 1,
            JobName::FaceCamera => 51,
            JobName::BodyCamera => 62,
            JobName::ActorMicrocontroller => 101,
            JobName::SensorMicrocontroller => 152,
            JobName::EncoderMicrocontroller => 203,
        }
    }

    /// 作业所需的输入文件名（位于 raw_data/behavior_data 下）
    pub fn input_file(&self) -> String {
        format!("{}_log.npz", self.log_id())
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobName::ALL
            .into_iter()
            .find(|j| j.as_str() == s)
            .ok_or_else(|| format!("Unknown job name: {s}"))
    }
}

fn default_true() -> bool {
    true
}

/// 每种作业是否请求执行；全部为 false 时视为请求全部作业
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobFlags {
    /// 处理运行时（VR 状态）日志
    #[serde(rename = "process_runtime", default = "default_true")]
    pub runtime: bool,
    /// 处理面部相机时间戳
    #[serde(rename = "process_face_camera", default = "default_true")]
    pub face_camera: bool,
    /// 处理身体相机时间戳
    #[serde(rename = "process_body_camera", default = "default_true")]
    pub body_camera: bool,
    /// 处理 Actor 微控制器数据
    #[serde(rename = "process_actor_microcontroller", default = "default_true")]
    pub actor_microcontroller: bool,
    /// 处理 Sensor 微控制器数据
    #[serde(rename = "process_sensor_microcontroller", default = "default_true")]
    pub sensor_microcontroller: bool,
    /// 处理 Encoder 微控制器数据
    #[serde(rename = "process_encoder_microcontroller", default = "default_true")]
    pub encoder_microcontroller: bool,
}

impl JobFlags {
    pub fn all() -> Self {
        Self {
            runtime: true,
            face_camera: true,
            body_camera: true,
            actor_microcontroller: true,
            sensor_microcontroller: true,
            encoder_microcontroller: true,
        }
    }

    pub fn none() -> Self {
        Self {
            runtime: false,
            face_camera: false,
            body_camera: false,
            actor_microcontroller: false,
            sensor_microcontroller: false,
            encoder_microcontroller: false,
        }
    }

    pub fn only(jobs: &[JobName]) -> Self {
        let mut flags = Self::none();
        for job in jobs {
            flags.set(*job, true);
        }
        flags
    }

    pub fn is_requested(&self, job: JobName) -> bool {
        match job {
            JobName::Runtime => self.runtime,
            JobName::FaceCamera => self.face_camera,
            JobName::BodyCamera => self.body_camera,
            JobName::ActorMicrocontroller => self.actor_microcontroller,
            JobName::SensorMicrocontroller => self.sensor_microcontroller,
            JobName::EncoderMicrocontroller => self.encoder_microcontroller,
        }
    }

    pub fn set(&mut self, job: JobName, value: bool) {
        match job {
            JobName::Runtime => self.runtime = value,
            JobName::FaceCamera => self.face_camera = value,
            JobName::BodyCamera => self.body_camera = value,
            JobName::ActorMicrocontroller => self.actor_microcontroller = value,
            JobName::SensorMicrocontroller => self.sensor_microcontroller = value,
            JobName::EncoderMicrocontroller => self.encoder_microcontroller = value,
        }
    }

    /// 全 false 归一化为全 true
    pub fn normalized(self) -> Self {
        if JobName::ALL.iter().any(|j| self.is_requested(*j)) {
            self
        } else {
            Self::all()
        }
    }

    /// 按执行顺序返回请求的作业（已归一化）
    pub fn requested(&self) -> Vec<JobName> {
        let flags = self.normalized();
        JobName::ALL
            .into_iter()
            .filter(|j| flags.is_requested(*j))
            .collect()
    }
}

impl Default for JobFlags {
    fn default() -> Self {
        Self::all()
    }
}
