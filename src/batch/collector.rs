//! # 文件收集器
//!
//! 遍历输入目录树，生成待处理的工作单元，并在输出/失败目录下镜像子目录结构。
//!
//! ## 功能
//! - 区分大小写的扩展名后缀匹配
//! - 递归目录搜索（按文件名排序，顺序模式下结果确定）
//! - 跳过输出目录和失败目录，避免把派生产物当作输入
//! - 惰性创建镜像子目录
//! - 独立的计数预扫描，用于进度显示
//!
//! ## 依赖关系
//! - 被 `batch/engine.rs` 调用
//! - 使用 `walkdir` 遍历目录

use crate::models::WorkItem;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// 输入文件集合
#[derive(Debug, Clone)]
pub struct FileCollector {
    /// 输入根目录
    root_in: PathBuf,
    /// 扩展名后缀
    extension: String,
    /// 输出根目录
    root_out: PathBuf,
    /// 失败产物根目录
    failure_out: PathBuf,
    /// 产物扩展名
    output_extension: String,
    /// 需要排除的目录（输出、失败目录）
    excluded_dirs: Vec<PathBuf>,
    /// 需要排除的文件名（例如明场参考图像）
    excluded_names: Vec<String>,
}

impl FileCollector {
    /// 创建新的文件收集器
    pub fn new(root_in: &Path, extension: &str, root_out: &Path, failure_out: &Path) -> Self {
        let root_in = absolute(root_in);
        let root_out = absolute(root_out);
        let failure_out = absolute(failure_out);

        Self {
            excluded_dirs: vec![root_out.clone(), failure_out.clone()],
            root_in,
            extension: extension.to_string(),
            root_out,
            failure_out,
            output_extension: ".png".to_string(),
            excluded_names: Vec::new(),
        }
    }

    /// 设置产物扩展名
    pub fn with_output_extension(mut self, extension: &str) -> Self {
        self.output_extension = extension.to_string();
        self
    }

    /// 设置需要排除的文件名
    pub fn exclude_names(mut self, names: Vec<String>) -> Self {
        self.excluded_names = names;
        self
    }

    /// 统计匹配文件数量（完整预扫描，与 `items` 使用相同的过滤条件）
    pub fn count(&self) -> usize {
        self.walk()
            .filter(|e| e.file_type().is_file() && self.matches(e.path()))
            .count()
    }

    /// 惰性生成工作单元；遇到新的子目录时创建对应的镜像目录
    pub fn items(&self) -> WorkItems<'_> {
        WorkItems {
            collector: self,
            walker: Box::new(self.walk()),
            mirrored: Some(HashSet::new()),
        }
    }

    /// 与 `items` 相同的序列，但不创建任何目录（用于预演）
    pub fn preview(&self) -> WorkItems<'_> {
        WorkItems {
            collector: self,
            walker: Box::new(self.walk()),
            mirrored: None,
        }
    }

    fn walk(&self) -> impl Iterator<Item = DirEntry> + '_ {
        WalkDir::new(&self.root_in)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| !self.is_excluded_dir(e))
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry");
                    None
                }
            })
    }

    /// 目录是否位于输出或失败目录之下
    fn is_excluded_dir(&self, entry: &DirEntry) -> bool {
        entry.file_type().is_dir()
            && entry.depth() > 0
            && self
                .excluded_dirs
                .iter()
                .any(|excluded| entry.path().starts_with(excluded))
    }

    /// 检查文件名是否匹配扩展名且未被排除
    fn matches(&self, path: &Path) -> bool {
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => {
                name.ends_with(&self.extension) && !self.excluded_names.iter().any(|n| n == name)
            }
            None => false,
        }
    }

    /// 相对于输入根目录的子路径
    fn relative_subpath(&self, dir: &Path) -> PathBuf {
        dir.strip_prefix(&self.root_in)
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// 在输出目录和失败目录下创建镜像子目录（已存在不算错误）
    fn mirror(&self, subpath: &Path) {
        for root in [&self.root_out, &self.failure_out] {
            let target = root.join(subpath);
            if let Err(e) = fs::create_dir_all(&target) {
                warn!(path = %target.display(), error = %e, "could not create output directory");
            }
        }
    }
}

/// 工作单元迭代器
pub struct WorkItems<'a> {
    collector: &'a FileCollector,
    walker: Box<dyn Iterator<Item = DirEntry> + Send + 'a>,
    /// 已镜像的子目录；`None` 表示不创建目录
    mirrored: Option<HashSet<PathBuf>>,
}

impl Iterator for WorkItems<'_> {
    type Item = WorkItem;

    fn next(&mut self) -> Option<WorkItem> {
        for entry in self.walker.by_ref() {
            let collector = self.collector;

            if entry.file_type().is_dir() {
                if let Some(mirrored) = self.mirrored.as_mut() {
                    let subpath = collector.relative_subpath(entry.path());
                    if mirrored.insert(subpath.clone()) {
                        debug!(subpath = %subpath.display(), "mirroring directory");
                        collector.mirror(&subpath);
                    }
                }
                continue;
            }

            if !entry.file_type().is_file() || !collector.matches(entry.path()) {
                continue;
            }

            let subpath = entry
                .path()
                .parent()
                .map(|p| collector.relative_subpath(p))
                .unwrap_or_default();

            return Some(WorkItem::new(
                entry.into_path(),
                subpath,
                &collector.root_out,
                &collector.failure_out,
                &collector.output_extension,
            ));
        }
        None
    }
}

/// 转为绝对路径，便于与遍历结果做前缀比较
fn absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        touch(&root, "a/1.png");
        touch(&root, "a/2.png");
        touch(&root, "b/3.png");
        touch(&root, "b/notes.txt");
        touch(&root, "b/4.PNG");
        let out = root.join("analyzed");
        let failed = out.join("failed");
        fs::create_dir_all(&failed).unwrap();
        (dir, out, failed)
    }

    #[test]
    fn test_count_matches_items() {
        let (dir, out, failed) = setup();
        let collector = FileCollector::new(dir.path(), ".png", &out, &failed);

        let names: Vec<String> = collector.items().map(|i| i.display_name).collect();
        assert_eq!(collector.count(), 3);
        assert_eq!(names, vec!["a/1.png", "a/2.png", "b/3.png"]);
    }

    #[test]
    fn test_output_tree_is_excluded() {
        let (dir, out, failed) = setup();
        touch(&out, "a/1.png");
        touch(&failed, "a/2.png");

        let collector = FileCollector::new(dir.path(), ".png", &out, &failed);
        assert_eq!(collector.count(), 3);
        assert_eq!(collector.items().count(), 3);
    }

    #[test]
    fn test_items_mirror_subdirectories() {
        let (dir, out, failed) = setup();
        let collector = FileCollector::new(dir.path(), ".png", &out, &failed);

        let items: Vec<WorkItem> = collector.items().collect();

        assert!(out.join("a").is_dir());
        assert!(out.join("b").is_dir());
        assert!(failed.join("a").is_dir());
        assert!(failed.join("b").is_dir());
        // 输出目录本身不被镜像进自身
        assert!(!out.join("analyzed").exists());
        assert!(items[2].output_path.ends_with("analyzed/b/3.png"));
    }

    #[test]
    fn test_preview_creates_nothing() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a/1.png");
        let out = dir.path().join("analyzed");
        let failed = out.join("failed");

        let collector = FileCollector::new(dir.path(), ".png", &out, &failed);
        assert_eq!(collector.preview().count(), 1);
        assert!(!out.exists());
    }

    #[test]
    fn test_excluded_names() {
        let (dir, out, failed) = setup();
        let collector =
            FileCollector::new(dir.path(), ".png", &out, &failed).exclude_names(vec!["2.png".into()]);
        assert_eq!(collector.count(), 2);
    }

    #[test]
    fn test_output_extension() {
        let (dir, out, failed) = setup();
        let collector =
            FileCollector::new(dir.path(), ".png", &out, &failed).with_output_extension(".tif");
        let first = collector.items().next().unwrap();
        assert!(first.output_path.ends_with("a/1.tif"));
    }
}
