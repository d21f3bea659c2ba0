//! 核心：资源分配、会话布局、跟踪器、会话执行器与批次管理

pub mod allocator;
pub mod batch;
pub mod builder;
pub mod error;
pub mod runner;
pub mod session;
pub mod state;
pub mod tracker;

pub use allocator::{Allocation, WorkerRequest};
pub use batch::{BatchManager, BatchOptions, SubmitRequest, SubmitSummary};
pub use builder::PipelineBuilder;
pub use error::{panic_message, FailureKind, JobFailure, PipelineError, TrackerError};
pub use runner::{SessionOutcome, SessionReport, SessionRequest, SessionRunner};
pub use session::{discover_sessions, list_output_files, LayoutOptions, OutputFile, SessionLayout};
pub use state::{BatchStatus, BatchSummary, SessionPhase, SessionStatus};
pub use tracker::{JobStatus, ProcessingTracker, TrackerSnapshot};
