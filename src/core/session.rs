//! 会话目录布局
//!
//! 会话根目录下有 raw_data/（原始日志，behavior_data/ 子目录存放 *_log.npz）与 processed_data/
//! （作业输出与跟踪文件）。传入路径既可以是会话根目录，也可以是其 raw_data 目录，二者解析到同一个根。

use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::core::PipelineError;

pub const RAW_DATA_DIR: &str = "raw_data";
pub const BEHAVIOR_DATA_DIR: &str = "behavior_data";
pub const PROCESSED_DATA_DIR: &str = "processed_data";
pub const TRACKING_DIR: &str = "tracking";
pub const DEFAULT_TRACKER_FILE: &str = "behavior_processing_tracker.json";

/// 布局选项：可选的 processed_data 根目录与跟踪文件名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutOptions {
    /// 设置后，processed_data 位于 `<root>/<session_name>/processed_data`
    pub processed_data_root: Option<PathBuf>,
    pub tracker_file: String,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            processed_data_root: None,
            tracker_file: DEFAULT_TRACKER_FILE.to_string(),
        }
    }
}

/// 已解析的会话目录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLayout {
    root: PathBuf,
    name: String,
    processed_dir: PathBuf,
    tracker_file: String,
}

impl SessionLayout {
    /// 解析会话路径：必须是已存在的目录；以 raw_data 结尾时取其父目录作为会话根
    pub fn resolve(path: &Path, options: &LayoutOptions) -> Result<Self, PipelineError> {
        if !path.is_dir() {
            return Err(PipelineError::InvalidSession {
                path: path.to_path_buf(),
                reason: "not an existing directory".to_string(),
            });
        }
        let canonical = path.canonicalize()?;
        let root = if canonical.file_name().is_some_and(|n| n == RAW_DATA_DIR) {
            canonical
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| canonical.clone())
        } else {
            canonical
        };
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| PipelineError::InvalidSession {
                path: path.to_path_buf(),
                reason: "session root has no directory name".to_string(),
            })?;
        let processed_dir = match &options.processed_data_root {
            Some(base) => base.join(&name).join(PROCESSED_DATA_DIR),
            None => root.join(PROCESSED_DATA_DIR),
        };
        Ok(Self {
            root,
            name,
            processed_dir,
            tracker_file: options.tracker_file.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn raw_data_dir(&self) -> PathBuf {
        self.root.join(RAW_DATA_DIR)
    }

    pub fn behavior_data_dir(&self) -> PathBuf {
        self.raw_data_dir().join(BEHAVIOR_DATA_DIR)
    }

    pub fn processed_data_dir(&self) -> &Path {
        &self.processed_dir
    }

    /// 作业输出目录
    pub fn output_dir(&self) -> PathBuf {
        self.processed_dir.join(BEHAVIOR_DATA_DIR)
    }

    pub fn tracker_path(&self) -> PathBuf {
        self.processed_dir.join(TRACKING_DIR).join(&self.tracker_file)
    }
}

/// 递归查找会话根目录（含 raw_data/ 的目录）；找到后不再向下遍历，跳过隐藏目录
pub fn discover_sessions(root: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    if !root.is_dir() {
        return Err(PipelineError::Validation(format!(
            "Root directory does not exist: {}",
            root.display()
        )));
    }

    let mut sessions = Vec::new();
    let mut walker = WalkDir::new(root).follow_links(false).into_iter();
    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory during discovery");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if entry.depth() > 0 && hidden {
            walker.skip_current_dir();
            continue;
        }
        if entry.path().join(RAW_DATA_DIR).is_dir() {
            sessions.push(entry.path().to_path_buf());
            walker.skip_current_dir();
        }
    }
    sessions.sort();
    Ok(sessions)
}

/// 输出文件（相对输出目录的路径与字节数）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFile {
    pub name: String,
    pub size_bytes: u64,
}

/// 列出会话输出目录下的所有文件；目录不存在时返回空列表
pub fn list_output_files(layout: &SessionLayout) -> Result<Vec<OutputFile>, PipelineError> {
    let dir = layout.output_dir();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(&dir).follow_links(false) {
        let entry = entry.map_err(|e| PipelineError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let name = entry
            .path()
            .strip_prefix(&dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .to_string();
        files.push(OutputFile { name, size_bytes });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}
