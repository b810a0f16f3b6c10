//! # 工作单元数据模型
//!
//! 一个 `WorkItem` 对应一个输入图像及其派生的输出/失败路径。
//!
//! ## 依赖关系
//! - 由 `batch/collector.rs` 在遍历时创建
//! - 被 `batch/engine.rs`、`batch/guard.rs` 和 `adapters/` 使用

use std::path::{Path, PathBuf};

/// 批处理的工作单元（创建后不可变）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// 输入图像路径
    pub input_path: PathBuf,
    /// 成功时的产物路径
    pub output_path: PathBuf,
    /// 部分失败时的产物路径
    pub failure_path: PathBuf,
    /// 相对于输入根目录的子目录
    pub relative_subpath: PathBuf,
    /// 用于日志和结果表的名称（`子目录/文件名`）
    pub display_name: String,
}

impl WorkItem {
    /// 根据输入文件与镜像目录构造工作单元
    pub fn new(
        input_path: PathBuf,
        relative_subpath: PathBuf,
        root_out: &Path,
        failure_out: &Path,
        output_extension: &str,
    ) -> Self {
        let file_name = input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = input_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.clone());
        let file_out = format!("{}{}", stem, output_extension);

        let display_name = relative_subpath
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .chain(std::iter::once(file_name))
            .collect::<Vec<_>>()
            .join("/");

        WorkItem {
            output_path: root_out.join(&relative_subpath).join(&file_out),
            failure_path: failure_out.join(&relative_subpath).join(&file_out),
            input_path,
            relative_subpath,
            display_name,
        }
    }

    /// 输入图像所在目录
    pub fn input_dir(&self) -> &Path {
        self.input_path.parent().unwrap_or_else(|| Path::new("."))
    }
}
