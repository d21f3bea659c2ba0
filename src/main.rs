//! behavior - 行为数据处理命令行
//!
//! 入口：初始化日志、加载配置、构建流水线，然后按子命令执行：
//! 单会话同步处理（process）、批次处理（batch）、查询工具（discover / jobs / outputs）或 stdio 服务（serve）。

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use behavior_pipeline::config::load_config;
use behavior_pipeline::core::allocator::host_cpu_count;
use behavior_pipeline::core::{
    Allocation, SessionOutcome, SessionRequest, SubmitRequest, WorkerRequest,
};
use behavior_pipeline::jobs::{JobFlags, JobId};
use behavior_pipeline::tools::ToolExecutor;
use behavior_pipeline::{observability, server, PipelineBuilder};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;

/// Behavior data processing pipeline
#[derive(Parser, Debug)]
#[command(name = "behavior", version, about)]
struct Cli {
    /// 额外的配置文件（覆盖 config/default.toml）
    #[arg(long, global = true, env = "BEHAVIOR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process one session synchronously
    Process {
        /// Session root or its raw_data directory
        #[arg(short = 's', long)]
        session_path: PathBuf,
        /// Run only the job with this id (remote mode); job flags and reset do not apply
        #[arg(
            short = 'j',
            long,
            conflicts_with_all = [
                "runtime", "face_camera", "body_camera", "actor", "sensor", "encoder", "reset_tracker"
            ]
        )]
        job_id: Option<String>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Queue several sessions and wait until the batch drains
    Batch {
        #[arg(required = true)]
        session_paths: Vec<PathBuf>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Find session directories under a root
    Discover { root_directory: PathBuf },
    /// Show which jobs have their inputs present
    Jobs { session_path: PathBuf },
    /// List a session's processed output files
    Outputs { session_path: PathBuf },
    /// Serve the tools as JSON lines over stdin/stdout
    Serve,
}

/// 作业选择与资源参数；不指定任何作业时处理全部作业
#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Process the runtime log
    #[arg(long)]
    runtime: bool,
    /// Process face camera timestamps
    #[arg(long)]
    face_camera: bool,
    /// Process body camera timestamps
    #[arg(long)]
    body_camera: bool,
    /// Process the actor microcontroller log
    #[arg(long)]
    actor: bool,
    /// Process the sensor microcontroller log
    #[arg(long)]
    sensor: bool,
    /// Process the encoder microcontroller log
    #[arg(long)]
    encoder: bool,
    /// Workers per session; -1 picks automatically
    #[arg(short = 'w', long, default_value_t = -1, allow_negative_numbers = true)]
    workers: i64,
    /// Clear the processing tracker and rerun every job
    #[arg(short = 'r', long)]
    reset_tracker: bool,
}

impl RunArgs {
    fn flags(&self) -> JobFlags {
        JobFlags {
            runtime: self.runtime,
            face_camera: self.face_camera,
            body_camera: self.body_camera,
            actor_microcontroller: self.actor,
            sensor_microcontroller: self.sensor,
            encoder_microcontroller: self.encoder,
        }
        .normalized()
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    observability::init();
    let cli = Cli::parse();

    let cfg = load_config(cli.config.clone()).context("Failed to load config")?;
    let components = PipelineBuilder::new(cfg).build();

    match cli.command {
        Command::Process {
            session_path,
            job_id,
            run,
        } => {
            let runner = components.runner.clone();
            let allocation = Allocation::compute(
                WorkerRequest::from_raw(run.workers),
                components.config.pipeline.cpu_count.or_else(host_cpu_count),
            );
            let workers = allocation.workers_per_session;
            let report = tokio::task::spawn_blocking(move || match job_id {
                Some(id) => runner.run_single(&session_path, &JobId::from(id), workers),
                None => Ok(runner.run(&SessionRequest {
                    path: session_path,
                    flags: run.flags(),
                    workers,
                    reset: run.reset_tracker,
                })),
            })
            .await
            .context("session thread panicked")??;
            print_json(&report)?;
            Ok(match report.outcome {
                SessionOutcome::Succeeded => ExitCode::SUCCESS,
                SessionOutcome::Failed | SessionOutcome::Partial => ExitCode::FAILURE,
            })
        }
        Command::Batch { session_paths, run } => {
            let summary = components.manager.submit(SubmitRequest {
                paths: session_paths,
                flags: run.flags(),
                workers: WorkerRequest::from_raw(run.workers),
                reset: run.reset_tracker,
            })?;
            tracing::info!(
                total = summary.total_sessions,
                max_parallel = summary.max_parallel,
                workers_per_session = summary.workers_per_session,
                "batch submitted"
            );
            components.manager.wait_until_idle().await;
            let status = components.manager.status();
            print_json(&status)?;
            Ok(if status.summary.failed == 0 && status.faults.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Discover { root_directory } => {
            let out = components
                .executor
                .execute(
                    "discover_sessions",
                    serde_json::json!({ "root_directory": root_directory }),
                )
                .await?;
            print_json(&out)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Jobs { session_path } => {
            let out = call_with_session(&components.executor, "list_available_jobs", session_path)
                .await?;
            print_json(&out)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Outputs { session_path } => {
            let out =
                call_with_session(&components.executor, "check_output_files", session_path).await?;
            print_json(&out)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Serve => {
            tracing::info!("serving tools over stdio");
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            server::serve(&components.executor, stdin, tokio::io::stdout())
                .await
                .context("stdio server failed")?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn call_with_session(
    executor: &ToolExecutor,
    tool: &str,
    session_path: PathBuf,
) -> anyhow::Result<Value> {
    Ok(executor
        .execute(tool, serde_json::json!({ "session_path": session_path }))
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_negative_workers_and_flags() {
        let cli = Cli::try_parse_from([
            "behavior", "process", "-s", "/data/s1", "-w", "-1", "--face-camera", "-r",
        ])
        .unwrap();
        let Command::Process { run, job_id, .. } = cli.command else {
            panic!("expected process");
        };
        assert_eq!(run.workers, -1);
        assert!(run.reset_tracker);
        assert!(job_id.is_none());
        let flags = run.flags();
        assert!(flags.face_camera);
        assert!(!flags.runtime);
    }

    #[test]
    fn test_job_id_rejects_flags_and_reset() {
        for extra in ["--face-camera", "-r"] {
            let err = Cli::try_parse_from(["behavior", "process", "-s", "/data/s1", "-j", "abc", extra])
                .unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
        }
        let cli =
            Cli::try_parse_from(["behavior", "process", "-s", "/data/s1", "-j", "abc", "-w", "4"])
                .unwrap();
        let Command::Process { run, job_id, .. } = cli.command else {
            panic!("expected process");
        };
        assert_eq!(job_id.as_deref(), Some("abc"));
        assert_eq!(run.workers, 4);
    }

    #[test]
    fn test_no_flags_means_all_jobs() {
        let cli = Cli::try_parse_from(["behavior", "batch", "/a", "/b"]).unwrap();
        let Command::Batch { run, session_paths } = cli.command else {
            panic!("expected batch");
        };
        assert_eq!(session_paths.len(), 2);
        assert_eq!(run.flags(), JobFlags::all());
    }
}
