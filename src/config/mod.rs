//! # 配置模块
//!
//! - `BatchConfig`: 批处理运行设置（输入/输出路径、并行度、跳过策略等）
//! - `params`: 算法参数文件（YAML）
//!
//! 配置在运行开始前构造并校验一次，引擎运行期间只读。
//!
//! ## 依赖关系
//! - 由 `commands/` 从命令行参数构造
//! - 被 `batch/engine.rs` 和 `adapters/` 读取

pub mod params;

pub use params::AlgorithmParams;

use crate::error::{BatchError, Result};
use std::path::{Path, PathBuf};

/// 未指定输出目录时，在输入目录下使用的名称
pub const DEFAULT_OUTPUT_DIR: &str = "analyzed";
/// 未指定失败目录时，在输出目录下使用的名称
pub const DEFAULT_FAILURE_DIR: &str = "failed";
/// 未指定结果表时，在输入目录下使用的文件名
pub const DEFAULT_TABLE_NAME: &str = "batch_results.tsv";

/// 已有产物时的跳过策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkipPolicy {
    /// 输出或失败产物任一存在即跳过
    #[default]
    Existing,
    /// 仅输出产物存在时跳过；只有失败产物的项目会重新处理
    RetryFailures,
    /// 从不跳过，覆盖已有产物
    Overwrite,
}

/// 批处理运行配置
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// 输入根目录
    pub root_in: PathBuf,
    /// 输入文件扩展名（区分大小写的后缀匹配，例如 ".png"）
    pub extension: String,
    /// 输出根目录（默认 `root_in/analyzed`）
    pub root_out: Option<PathBuf>,
    /// 失败产物根目录（默认 `root_out/failed`）
    pub failure_out: Option<PathBuf>,
    /// 结果表路径（默认 `root_in/batch_results.tsv`）
    pub table_out: Option<PathBuf>,
    /// 产物扩展名
    pub output_extension: String,
    /// 覆盖已有结果表
    pub overwrite_table: bool,
    /// 是否写出图像产物
    pub save_artifacts: bool,
    /// 并行作业数（0 = CPU 核数，1 = 顺序执行）
    pub parallelism: usize,
    pub skip_policy: SkipPolicy,
    /// 显示进度条
    pub show_progress: bool,
}

impl BatchConfig {
    pub fn new(root_in: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        BatchConfig {
            root_in: root_in.into(),
            extension: extension.into(),
            root_out: None,
            failure_out: None,
            table_out: None,
            output_extension: ".png".to_string(),
            overwrite_table: false,
            save_artifacts: true,
            parallelism: 1,
            skip_policy: SkipPolicy::Existing,
            show_progress: false,
        }
    }

    pub fn with_output(mut self, root_out: impl Into<PathBuf>) -> Self {
        self.root_out = Some(root_out.into());
        self
    }

    pub fn with_failures(mut self, failure_out: impl Into<PathBuf>) -> Self {
        self.failure_out = Some(failure_out.into());
        self
    }

    pub fn with_table(mut self, table_out: impl Into<PathBuf>) -> Self {
        self.table_out = Some(table_out.into());
        self
    }

    pub fn with_output_extension(mut self, extension: impl Into<String>) -> Self {
        self.output_extension = extension.into();
        self
    }

    pub fn overwrite_table(mut self, overwrite: bool) -> Self {
        self.overwrite_table = overwrite;
        self
    }

    pub fn save_artifacts(mut self, save: bool) -> Self {
        self.save_artifacts = save;
        self
    }

    pub fn parallelism(mut self, jobs: usize) -> Self {
        self.parallelism = jobs;
        self
    }

    pub fn skip_policy(mut self, policy: SkipPolicy) -> Self {
        self.skip_policy = policy;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// 解析默认值并校验，得到本次运行使用的实际路径
    pub fn resolve(&self) -> Result<ResolvedPaths> {
        if !self.root_in.is_dir() {
            return Err(BatchError::DirectoryNotFound {
                path: self.root_in.display().to_string(),
            });
        }
        if self.extension.is_empty() {
            return Err(BatchError::InvalidArgument(
                "input extension must not be empty".to_string(),
            ));
        }

        let root_out = self
            .root_out
            .clone()
            .unwrap_or_else(|| self.root_in.join(DEFAULT_OUTPUT_DIR));
        let failure_out = self
            .failure_out
            .clone()
            .unwrap_or_else(|| root_out.join(DEFAULT_FAILURE_DIR));
        let table_out = self
            .table_out
            .clone()
            .unwrap_or_else(|| self.root_in.join(DEFAULT_TABLE_NAME));

        check_disjoint_trees(&self.root_in, &root_out, &failure_out)?;

        Ok(ResolvedPaths {
            root_in: self.root_in.clone(),
            root_out,
            failure_out,
            table_out,
        })
    }
}

/// 输出树与失败树必须互不覆盖
///
/// 一棵树嵌套在另一棵之下时（默认 `analyzed/failed`），输入中与嵌套路径同名的
/// 子目录会镜像到另一棵树上，使不同图像的产物落在同一路径。
fn check_disjoint_trees(root_in: &Path, root_out: &Path, failure_out: &Path) -> Result<()> {
    if root_out == failure_out {
        return Err(BatchError::InvalidArgument(format!(
            "output and failure directories must differ (both are '{}')",
            root_out.display()
        )));
    }

    for (outer, inner) in [(root_out, failure_out), (failure_out, root_out)] {
        let Ok(nested) = inner.strip_prefix(outer) else {
            continue;
        };
        let shadow = root_in.join(nested);
        let walked = !shadow.starts_with(root_out) && !shadow.starts_with(failure_out);
        if walked && shadow.is_dir() {
            return Err(BatchError::InvalidArgument(format!(
                "input directory '{}' would be mirrored onto '{}'; choose another location with --failures or --output",
                shadow.display(),
                inner.display()
            )));
        }
    }
    Ok(())
}

/// 解析后的运行路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub root_in: PathBuf,
    pub root_out: PathBuf,
    pub failure_out: PathBuf,
    pub table_out: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_defaults() {
        let dir = TempDir::new().unwrap();
        let resolved = BatchConfig::new(dir.path(), ".png").resolve().unwrap();

        assert_eq!(resolved.root_out, dir.path().join("analyzed"));
        assert_eq!(resolved.failure_out, dir.path().join("analyzed").join("failed"));
        assert_eq!(resolved.table_out, dir.path().join("batch_results.tsv"));
    }

    #[test]
    fn test_resolve_explicit_paths() {
        let dir = TempDir::new().unwrap();
        let resolved = BatchConfig::new(dir.path(), ".tif")
            .with_output("/tmp/out")
            .with_failures("/tmp/bad")
            .with_table("/tmp/results.csv")
            .resolve()
            .unwrap();

        assert_eq!(resolved.root_out, PathBuf::from("/tmp/out"));
        assert_eq!(resolved.failure_out, PathBuf::from("/tmp/bad"));
        assert_eq!(resolved.table_out, PathBuf::from("/tmp/results.csv"));
    }

    #[test]
    fn test_input_dir_shadowing_failure_tree_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("failed")).unwrap();

        let err = BatchConfig::new(dir.path(), ".png").resolve().unwrap_err();
        assert!(matches!(err, BatchError::InvalidArgument(_)));

        // 把失败目录移出输出树即可
        let resolved = BatchConfig::new(dir.path(), ".png")
            .with_failures(dir.path().join("rejects"))
            .resolve()
            .unwrap();
        assert_eq!(resolved.failure_out, dir.path().join("rejects"));
    }

    #[test]
    fn test_output_nested_in_failure_tree() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("good")).unwrap();

        let err = BatchConfig::new(dir.path(), ".png")
            .with_failures(dir.path().join("bad"))
            .with_output(dir.path().join("bad/good"))
            .resolve();
        assert!(err.is_err());

        let same = BatchConfig::new(dir.path(), ".png")
            .with_output(dir.path().join("out"))
            .with_failures(dir.path().join("out"))
            .resolve();
        assert!(same.is_err());
    }

    #[test]
    fn test_missing_input_root() {
        let err = BatchConfig::new("/definitely/not/here", ".png")
            .resolve()
            .unwrap_err();
        assert!(matches!(err, BatchError::DirectoryNotFound { .. }));
    }
}
